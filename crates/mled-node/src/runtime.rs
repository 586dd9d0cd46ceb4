//! Async node runtime
//!
//! Wraps a [`NodeEngine`] in a socket and a deadline timer. The select loop
//! wakes on inbound packets or on the earliest pending fire, never by
//! polling.

use std::time::Duration;

use mled_core::ShowClock;
use mled_transport::{GroupConfig, ShowSocket};
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::engine::{Effect, NodeConfig, NodeEngine};
use crate::error::{NodeError, Result};
use crate::sink::PatternSink;

/// Fallback wake interval when no fire is scheduled
const IDLE_WAKE: Duration = Duration::from_secs(1);

pub struct NodeRuntime<S: PatternSink> {
    engine: NodeEngine,
    socket: ShowSocket,
    sink: S,
    clock: ShowClock,
}

impl<S: PatternSink> NodeRuntime<S> {
    pub fn new(config: NodeConfig, group: &GroupConfig, sink: S) -> Result<Self> {
        let socket = ShowSocket::bind(group)?;
        Ok(Self {
            engine: NodeEngine::new(config),
            socket,
            sink,
            clock: ShowClock::new(),
        })
    }

    /// Run until the receiver closes
    pub async fn run(mut self) -> Result<()> {
        let mut receiver = self.socket.start_receiver();
        info!(
            node_id = self.engine.node_id(),
            local = %self.socket.local_addr()?,
            "node running"
        );

        loop {
            let now = self.clock.now_ms();
            let wake = self
                .engine
                .next_wake_ms(now)
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(IDLE_WAKE);
            let deadline = Instant::now() + wake;

            tokio::select! {
                inbound = receiver.recv() => {
                    let (packet, from) = inbound.ok_or(NodeError::ReceiverClosed)?;
                    let effects = self
                        .engine
                        .handle_packet(&packet, from, self.clock.now_ms());
                    self.run_effects(effects).await;
                }
                _ = sleep_until(deadline) => {
                    let effects = self.engine.tick(self.clock.now_ms());
                    self.run_effects(effects).await;
                }
            }
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { packet, to } => {
                    if let Err(e) = self.socket.send_to(&packet, to).await {
                        warn!(%to, "send failed: {}", e);
                    }
                }
                Effect::Apply { cue_id, prepare } => self.sink.apply(cue_id, &prepare),
                Effect::Clear { fade_out_ms } => self.sink.clear(fade_out_ms),
            }
        }
    }
}
