//! Node protocol engine
//!
//! Pure state machine: feed it decoded packets and a local millisecond
//! clock, get back effects (packets to send, patterns to apply). All I/O
//! and timing live in [`crate::runtime`], which keeps every protocol rule
//! here testable without sockets.

use std::net::SocketAddr;

use mled_core::time::{self, apply_offset, diff, is_due};
use mled_core::types::{STATE_RUNNING, STATE_TIME_SYNCED};
use mled_core::{AckCode, CuePrepare, Header, MsgType, Packet, PatternConfig, Pong, TargetMode};
use tracing::{debug, info, trace, warn};

/// Upper bound on prepared-but-unfired cue slots
pub const DEFAULT_CUE_SLOTS: usize = 64;

/// Minimum spacing between TIME_REQ sends
pub const TIME_REQ_MIN_INTERVAL_MS: u32 = 500;

/// Outstanding TIME_REQ correlation entries kept
const PENDING_TIME_REQS: usize = 4;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: u32,
    pub name: String,
    pub cue_slots: usize,
    /// Reported in PONG; software nodes have no radio, so this is a fixed
    /// self-report
    pub rssi_dbm: i8,
    /// Render frame interval reported in PONG
    pub frame_ms: u16,
}

impl NodeConfig {
    pub fn new(node_id: u32, name: impl Into<String>) -> Self {
        Self {
            node_id,
            name: name.into(),
            cue_slots: DEFAULT_CUE_SLOTS,
            rssi_dbm: 0,
            frame_ms: 20,
        }
    }
}

/// Something the runtime must do on the engine's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send { packet: Packet, to: SocketAddr },
    Apply { cue_id: u32, prepare: CuePrepare },
    Clear { fade_out_ms: u16 },
}

#[derive(Debug, Clone, Copy)]
struct PendingFire {
    cue_id: u32,
    execute_at_show_ms: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimeReq {
    msg_id: u32,
    sent_local_ms: u32,
}

/// The currently rendering cue
#[derive(Debug, Clone, Copy)]
pub struct ActiveCue {
    pub cue_id: u32,
    pub config: PatternConfig,
}

pub struct NodeEngine {
    config: NodeConfig,
    /// Controller epoch this node is fenced to; None until the first beacon
    epoch: Option<u32>,
    /// Estimated show-time minus local-time offset
    offset_ms: Option<i32>,
    /// True once a TIME_RESP refined the coarse beacon offset
    precise_sync: bool,
    slots: Vec<Option<CuePrepare>>,
    pending_fires: Vec<PendingFire>,
    active: Option<ActiveCue>,
    /// Last (sender_id, msg_id) answered with a PONG
    last_ping: Option<(u32, u32)>,
    last_time_req_local_ms: Option<u32>,
    pending_time_reqs: Vec<PendingTimeReq>,
    next_msg_id: u32,
}

impl NodeEngine {
    pub fn new(config: NodeConfig) -> Self {
        let slots = vec![None; config.cue_slots];
        Self {
            config,
            epoch: None,
            offset_ms: None,
            precise_sync: false,
            slots,
            pending_fires: Vec::new(),
            active: None,
            last_ping: None,
            last_time_req_local_ms: None,
            pending_time_reqs: Vec::new(),
            next_msg_id: 1,
        }
    }

    pub fn node_id(&self) -> u32 {
        self.config.node_id
    }

    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    pub fn is_synced(&self) -> bool {
        self.offset_ms.is_some()
    }

    pub fn active_cue(&self) -> Option<&ActiveCue> {
        self.active.as_ref()
    }

    /// Local milliseconds mapped onto controller show-time
    pub fn show_ms(&self, now_local_ms: u32) -> u32 {
        apply_offset(now_local_ms, self.offset_ms.unwrap_or(0))
    }

    /// Process one inbound packet
    pub fn handle_packet(
        &mut self,
        packet: &Packet,
        from: SocketAddr,
        now_local_ms: u32,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let header = &packet.header;

        match header.kind() {
            // Discovery is epoch-agnostic so an unsynced node is still found.
            Some(MsgType::Ping) => {
                self.handle_ping(header, from, now_local_ms, &mut effects);
            }
            Some(MsgType::Beacon) => {
                if self.fence_epoch(header.epoch_id, true) {
                    self.handle_beacon(header, from, now_local_ms, &mut effects);
                }
            }
            Some(MsgType::TimeResp) => {
                if self.fence_epoch(header.epoch_id, false) && self.addressed_to_me(header) {
                    if let mled_core::Body::TimeResp(resp) = &packet.body {
                        self.handle_time_resp(resp, now_local_ms);
                    }
                }
            }
            Some(MsgType::CuePrepare) => {
                if self.fence_epoch(header.epoch_id, false) && self.addressed_to_me(header) {
                    if let mled_core::Body::CuePrepare(prepare) = &packet.body {
                        self.handle_cue_prepare(header, prepare, from, &mut effects);
                    }
                }
            }
            Some(MsgType::CueFire) => {
                if self.fence_epoch(header.epoch_id, false) && self.addressed_to_me(header) {
                    if let mled_core::Body::CueFire(fire) = &packet.body {
                        self.handle_cue_fire(header, fire.cue_id, from, now_local_ms, &mut effects);
                    }
                }
            }
            Some(MsgType::CueCancel) => {
                if self.fence_epoch(header.epoch_id, false) && self.addressed_to_me(header) {
                    if let mled_core::Body::CueCancel(cancel) = &packet.body {
                        self.handle_cue_cancel(header, cancel.cue_id, from, &mut effects);
                    }
                }
            }
            // Controller-bound or unknown traffic; nothing for a node to do.
            Some(MsgType::TimeReq) | Some(MsgType::Pong) | Some(MsgType::Ack) | None => {}
        }

        effects
    }

    /// Fire cues whose deadline has passed; call on every timer wake
    pub fn tick(&mut self, now_local_ms: u32) -> Vec<Effect> {
        let show_now = self.show_ms(now_local_ms);
        let mut effects = Vec::new();

        let mut i = 0;
        while i < self.pending_fires.len() {
            if is_due(show_now, self.pending_fires[i].execute_at_show_ms) {
                let fire = self.pending_fires.swap_remove(i);
                self.activate(fire.cue_id, &mut effects);
            } else {
                i += 1;
            }
        }

        effects
    }

    /// Milliseconds until the earliest pending fire, if any
    pub fn next_wake_ms(&self, now_local_ms: u32) -> Option<u32> {
        let show_now = self.show_ms(now_local_ms);
        self.pending_fires
            .iter()
            .map(|f| diff(f.execute_at_show_ms, show_now).max(0) as u32)
            .min()
    }

    fn handle_ping(
        &mut self,
        header: &Header,
        from: SocketAddr,
        now_local_ms: u32,
        effects: &mut Vec<Effect>,
    ) {
        // Discovery pings are repeated for loss tolerance with a shared
        // msg_id; answer each burst once.
        let key = (header.sender_id, header.msg_id);
        if self.last_ping == Some(key) {
            trace!(msg_id = header.msg_id, "duplicate ping suppressed");
            return;
        }
        self.last_ping = Some(key);

        let pong = Pong {
            uptime_ms: now_local_ms,
            rssi_dbm: self.config.rssi_dbm,
            state_flags: STATE_RUNNING
                | if self.is_synced() {
                    STATE_TIME_SYNCED
                } else {
                    0
                },
            brightness_pct: self
                .active
                .as_ref()
                .map(|a| a.config.brightness_pct)
                .unwrap_or(0),
            pattern_type: self
                .active
                .as_ref()
                .map(|a| a.config.pattern.type_code())
                .unwrap_or(0),
            frame_ms: self.config.frame_ms,
            active_cue_id: self.active.as_ref().map(|a| a.cue_id).unwrap_or(0),
            controller_epoch: self.epoch.unwrap_or(0),
            show_ms_now: self.show_ms(now_local_ms),
            name: self.config.name.clone(),
        };

        let packet = Packet::pong(
            self.epoch.unwrap_or(0),
            header.msg_id,
            self.config.node_id,
            pong,
        );
        effects.push(Effect::Send { packet, to: from });
    }

    fn handle_beacon(
        &mut self,
        header: &Header,
        from: SocketAddr,
        now_local_ms: u32,
        effects: &mut Vec<Effect>,
    ) {
        // Beacons give a coarse offset for free; keep it only until a
        // TIME_RESP provides a delay-compensated one.
        if !self.precise_sync {
            self.offset_ms = Some(diff(header.execute_at_ms, now_local_ms));
            if let Some(effect) = self.maybe_request_time(from, now_local_ms) {
                effects.push(effect);
            }
        }
    }

    fn maybe_request_time(&mut self, to: SocketAddr, now_local_ms: u32) -> Option<Effect> {
        if let Some(last) = self.last_time_req_local_ms {
            if (time::duration(last, now_local_ms) as i64) < TIME_REQ_MIN_INTERVAL_MS as i64 {
                return None;
            }
        }
        let epoch = self.epoch?;

        let msg_id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);

        self.last_time_req_local_ms = Some(now_local_ms);
        if self.pending_time_reqs.len() >= PENDING_TIME_REQS {
            self.pending_time_reqs.remove(0);
        }
        self.pending_time_reqs.push(PendingTimeReq {
            msg_id,
            sent_local_ms: now_local_ms,
        });

        let packet = Packet::time_req(epoch, msg_id, self.config.node_id);
        Some(Effect::Send { packet, to })
    }

    fn handle_time_resp(&mut self, resp: &mled_core::TimeResp, now_local_ms: u32) {
        let Some(pos) = self
            .pending_time_reqs
            .iter()
            .position(|p| p.msg_id == resp.req_msg_id)
        else {
            debug!(req_msg_id = resp.req_msg_id, "uncorrelated time response");
            return;
        };
        let pending = self.pending_time_reqs.remove(pos);

        let estimate = time::estimate_offset(
            pending.sent_local_ms,
            resp.master_rx_show_ms,
            resp.master_tx_show_ms,
            now_local_ms,
        );
        self.offset_ms = Some(estimate.round() as i32);
        self.precise_sync = true;
        info!(offset_ms = estimate, "time sync refined");
    }

    fn handle_cue_prepare(
        &mut self,
        header: &Header,
        prepare: &CuePrepare,
        from: SocketAddr,
        effects: &mut Vec<Effect>,
    ) {
        // Re-preparing an existing cue overwrites it in place.
        let slot = self
            .slots
            .iter()
            .position(|s| s.map(|p| p.cue_id) == Some(prepare.cue_id))
            .or_else(|| self.slots.iter().position(Option::is_none));

        let code = match slot {
            Some(i) => {
                self.slots[i] = Some(*prepare);
                debug!(cue_id = prepare.cue_id, slot = i, "cue prepared");
                AckCode::Ok
            }
            None => {
                warn!(cue_id = prepare.cue_id, "no free cue slot");
                AckCode::SlotsFull
            }
        };

        self.ack_if_requested(header, code, from, effects);
    }

    fn handle_cue_fire(
        &mut self,
        header: &Header,
        cue_id: u32,
        from: SocketAddr,
        now_local_ms: u32,
        effects: &mut Vec<Effect>,
    ) {
        if !self.slots.iter().any(|s| s.map(|p| p.cue_id) == Some(cue_id)) {
            warn!(cue_id, "fire for unprepared cue");
            self.ack_if_requested(header, AckCode::UnknownCue, from, effects);
            return;
        }

        let execute_at = header.execute_at_ms;
        let show_now = self.show_ms(now_local_ms);

        if is_due(show_now, execute_at) {
            // Late fire: apply immediately rather than drop the cue.
            self.activate(cue_id, effects);
        } else {
            // Fires are repeated for loss tolerance; keep one entry per cue.
            self.pending_fires.retain(|f| f.cue_id != cue_id);
            self.pending_fires.push(PendingFire {
                cue_id,
                execute_at_show_ms: execute_at,
            });
            debug!(cue_id, execute_at, "fire scheduled");
        }

        self.ack_if_requested(header, AckCode::Ok, from, effects);
    }

    fn handle_cue_cancel(
        &mut self,
        header: &Header,
        cue_id: u32,
        from: SocketAddr,
        effects: &mut Vec<Effect>,
    ) {
        self.pending_fires.retain(|f| f.cue_id != cue_id);
        for slot in &mut self.slots {
            if slot.map(|p| p.cue_id) == Some(cue_id) {
                *slot = None;
            }
        }
        if let Some(active) = &self.active {
            if active.cue_id == cue_id {
                let fade_out_ms = 0;
                self.active = None;
                effects.push(Effect::Clear { fade_out_ms });
            }
        }
        debug!(cue_id, "cue cancelled");

        // Cancel is idempotent; unknown cue ids still ack clean.
        self.ack_if_requested(header, AckCode::Ok, from, effects);
    }

    fn activate(&mut self, cue_id: u32, effects: &mut Vec<Effect>) {
        let Some(prepare) = self
            .slots
            .iter()
            .filter_map(|s| *s)
            .find(|p| p.cue_id == cue_id)
        else {
            return;
        };
        info!(cue_id, "cue active");
        self.active = Some(ActiveCue {
            cue_id,
            config: prepare.pattern,
        });
        effects.push(Effect::Apply { cue_id, prepare });
    }

    fn ack_if_requested(
        &mut self,
        header: &Header,
        code: AckCode,
        from: SocketAddr,
        effects: &mut Vec<Effect>,
    ) {
        if !header.flags.ack_req {
            return;
        }
        let packet = Packet::ack(
            self.epoch.unwrap_or(0),
            self.config.node_id,
            mled_core::Ack {
                ack_for_msg_id: header.msg_id,
                code: code as u16,
            },
        );
        effects.push(Effect::Send { packet, to: from });
    }

    /// Accept or reject a message for its epoch, adopting newer epochs
    ///
    /// Only a beacon may establish the first epoch (`adopt_first`); cue
    /// traffic heard before the controller itself is dropped. Messages from
    /// an older epoch are stale controller restarts and are dropped. A newer
    /// epoch wins immediately: prepared and pending cue state from the old
    /// epoch is discarded.
    fn fence_epoch(&mut self, msg_epoch: u32, adopt_first: bool) -> bool {
        match self.epoch {
            None if adopt_first => {
                info!(epoch = msg_epoch, "controller epoch adopted");
                self.epoch = Some(msg_epoch);
                true
            }
            None => {
                debug!(msg_epoch, "dropped before first beacon");
                false
            }
            Some(current) => {
                let age = diff(msg_epoch, current);
                if age < 0 {
                    debug!(msg_epoch, current, "stale epoch dropped");
                    false
                } else {
                    if age > 0 {
                        info!(old = current, new = msg_epoch, "newer epoch adopted");
                        self.epoch = Some(msg_epoch);
                        self.reset_cue_state();
                    }
                    true
                }
            }
        }
    }

    fn reset_cue_state(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.pending_fires.clear();
        self.pending_time_reqs.clear();
        self.precise_sync = false;
    }

    fn addressed_to_me(&self, header: &Header) -> bool {
        match header.flags.target_mode {
            TargetMode::All => true,
            TargetMode::Node => header.target == self.config.node_id,
            // Software nodes carry no group membership; treat group sends
            // like broadcasts.
            TargetMode::Group => true,
        }
    }
}
