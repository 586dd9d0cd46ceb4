//! End-to-end cue orchestration
//!
//! The full sequence a human triggers as one action: discover the fleet,
//! open a sync window so clocks line up, prepare the cue on each target
//! with acknowledgement, then multicast a fire for a near-future deadline
//! so every node activates on the same show-time instant.

use std::time::Duration;

use mled_core::time::diff;
use mled_core::CuePrepare;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::controller::{Controller, PrepareOutcome, Target};
use crate::error::{ControllerError, Result};

/// Settle margin added after the fire deadline before verification
const VERIFY_MARGIN: Duration = Duration::from_millis(300);

/// Which nodes a show run addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowSelector {
    All,
    Node(u32),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct ShowRequest {
    pub selector: ShowSelector,
    pub cue: CuePrepare,
    /// Beacon/TIME_REQ window before preparing
    pub sync_window: Duration,
    /// Re-discover after the deadline and check active cues
    pub verify: bool,
}

impl ShowRequest {
    pub fn new(selector: ShowSelector, cue: CuePrepare) -> Self {
        Self {
            selector,
            cue,
            sync_window: Duration::from_millis(1200),
            verify: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    /// Fired without verification
    Fired { prepared: usize },
    /// Every targeted node reports the cue active
    Converged { nodes: usize },
    /// Some targeted nodes never switched
    NotConverged { expected: usize, active: usize },
    /// A prepare failed or went unanswered; nothing was fired
    PrepareUnconfirmed { node_id: u32, code: Option<u16> },
}

/// Run one complete show action
pub async fn run_show(controller: &mut Controller, request: ShowRequest) -> Result<ShowOutcome> {
    controller.discover().await?;
    if controller.nodes().is_empty() {
        return Err(ControllerError::NoNodes);
    }

    let target_ids = resolve(controller, &request.selector)?;
    info!(targets = target_ids.len(), cue_id = request.cue.cue_id, "show starting");

    controller.sync_window(request.sync_window).await?;

    for &node_id in &target_ids {
        match controller.prepare(Target::Node(node_id), request.cue).await? {
            PrepareOutcome::Confirmed => {}
            PrepareOutcome::Failed(code) => {
                return Ok(ShowOutcome::PrepareUnconfirmed {
                    node_id,
                    code: Some(code),
                })
            }
            PrepareOutcome::Unconfirmed => {
                return Ok(ShowOutcome::PrepareUnconfirmed {
                    node_id,
                    code: None,
                })
            }
        }
    }

    let execute_at = controller
        .show_ms()
        .wrapping_add(controller.config().fire_delay_ms);
    controller.fire(request.cue.cue_id, execute_at).await?;

    if !request.verify {
        return Ok(ShowOutcome::Fired {
            prepared: target_ids.len(),
        });
    }

    // Sleep past the deadline, then ask the fleet what it is playing.
    let remaining = diff(execute_at, controller.show_ms()).max(0) as u64;
    sleep(Duration::from_millis(remaining) + VERIFY_MARGIN).await;
    controller.discover().await?;

    let epoch = controller.epoch();
    let active = target_ids
        .iter()
        .filter(|&&id| {
            controller
                .nodes()
                .get(id)
                .map(|n| n.epoch == epoch && n.active_cue_id == request.cue.cue_id)
                .unwrap_or(false)
        })
        .count();

    if active == target_ids.len() {
        Ok(ShowOutcome::Converged { nodes: active })
    } else {
        warn!(expected = target_ids.len(), active, "fleet did not converge");
        Ok(ShowOutcome::NotConverged {
            expected: target_ids.len(),
            active,
        })
    }
}

fn resolve(controller: &Controller, selector: &ShowSelector) -> Result<Vec<u32>> {
    let table = controller.nodes();
    match selector {
        ShowSelector::All => Ok(table.records().iter().map(|n| n.node_id).collect()),
        ShowSelector::Node(id) => {
            if table.get(*id).is_none() {
                return Err(ControllerError::TargetNotFound(format!("{id:#x}")));
            }
            Ok(vec![*id])
        }
        ShowSelector::Name(name) => table
            .find_by_name(name)
            .map(|n| vec![n.node_id])
            .ok_or_else(|| ControllerError::TargetNotFound(name.clone())),
    }
}
