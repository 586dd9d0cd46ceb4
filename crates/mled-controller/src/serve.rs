//! Long-running controller daemon
//!
//! Keeps the group socket open indefinitely: beacons on a steady cadence,
//! pings for liveness, answers TIME_REQs, and maintains a shared node table
//! that status consumers snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mled_core::{Body, Packet, ShowClock, TimeResp};
use mled_transport::{GroupConfig, ShowSocket};
use parking_lot::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::controller::random_epoch;
use crate::error::{ControllerError, Result};
use crate::registry::{NodeRecord, NodeTable};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub beacon_interval: Duration,
    /// Liveness ping cadence
    pub ping_interval: Duration,
    /// Sweep cadence for dropping long-gone nodes
    pub prune_interval: Duration,
    /// Age at which a record is dropped entirely
    pub prune_age: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            beacon_interval: Duration::from_millis(300),
            ping_interval: Duration::from_secs(5),
            prune_interval: Duration::from_secs(60),
            prune_age: Duration::from_secs(300),
        }
    }
}

pub struct ControllerServer {
    socket: ShowSocket,
    table: Arc<RwLock<NodeTable>>,
    clock: ShowClock,
    epoch: u32,
    next_msg_id: u32,
    config: ServerConfig,
}

impl ControllerServer {
    pub fn new(group: &GroupConfig, config: ServerConfig) -> Result<Self> {
        let socket = ShowSocket::bind(group)?;
        Ok(Self {
            socket,
            table: Arc::new(RwLock::new(NodeTable::new())),
            clock: ShowClock::new(),
            epoch: random_epoch(),
            next_msg_id: rand::random(),
            config,
        })
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Shared handle to the live node table
    pub fn table(&self) -> Arc<RwLock<NodeTable>> {
        self.table.clone()
    }

    fn next_msg_id(&mut self) -> u32 {
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        id
    }

    /// Run until the receiver closes
    pub async fn run(mut self) -> Result<()> {
        let mut receiver = self.socket.start_receiver();
        let mut beacon_timer = interval(self.config.beacon_interval);
        let mut ping_timer = interval(self.config.ping_interval);
        let mut prune_timer = interval(self.config.prune_interval);

        info!(
            epoch = self.epoch,
            group = %self.socket.group_addr(),
            "controller serving"
        );

        loop {
            tokio::select! {
                inbound = receiver.recv() => {
                    let (packet, from) = inbound.ok_or(ControllerError::ReceiverClosed)?;
                    self.handle(packet, from).await;
                }
                _ = beacon_timer.tick() => {
                    let msg_id = self.next_msg_id();
                    let beacon = Packet::beacon(self.epoch, msg_id, self.clock.now_ms());
                    if let Err(e) = self.socket.send_group(&beacon).await {
                        warn!("beacon send failed: {}", e);
                    }
                }
                _ = ping_timer.tick() => {
                    let msg_id = self.next_msg_id();
                    let ping = Packet::ping(self.epoch, msg_id);
                    if let Err(e) = self.socket.send_group(&ping).await {
                        warn!("ping send failed: {}", e);
                    }
                }
                _ = prune_timer.tick() => {
                    self.table.write().prune(Instant::now(), self.config.prune_age);
                }
            }
        }
    }

    async fn handle(&mut self, packet: Packet, from: std::net::SocketAddr) {
        match &packet.body {
            Body::Pong(pong) => {
                debug!(node = packet.header.sender_id, %from, "pong");
                self.table
                    .write()
                    .upsert(NodeRecord::from_pong(&packet.header, pong, from));
            }
            Body::TimeReq => {
                if packet.header.epoch_id != self.epoch {
                    return;
                }
                let rx = self.clock.now_ms();
                let msg_id = self.next_msg_id();
                let resp = Packet::time_resp(
                    self.epoch,
                    msg_id,
                    packet.header.sender_id,
                    TimeResp {
                        req_msg_id: packet.header.msg_id,
                        master_rx_show_ms: rx,
                        master_tx_show_ms: self.clock.now_ms(),
                    },
                );
                if let Err(e) = self.socket.send_to(&resp, from).await {
                    warn!(%from, "time response send failed: {}", e);
                }
            }
            // Our own multicast traffic loops back; nothing to do with it.
            _ => {}
        }
    }
}
