//! One-shot controller operations
//!
//! A [`Controller`] owns an ephemeral socket and a fresh random epoch. It
//! is the sending side of every protocol exchange: discovery bursts,
//! beacons, TIME_REQ answering, cue prepare/fire/cancel. Long-running
//! operation lives in [`crate::serve`].

use std::net::SocketAddr;
use std::time::Duration;

use mled_core::{
    AckCode, Body, CuePrepare, Header, MsgType, Packet, ShowClock, TargetMode, TimeResp,
};
use mled_transport::{GroupConfig, PacketReceiver, ShowSocket};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::{NodeRecord, NodeTable};

/// Timing knobs for controller exchanges
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long to collect PONGs after a discovery burst
    pub discovery_timeout: Duration,
    /// PINGs per discovery burst (loss tolerance)
    pub discovery_repeat: u32,
    /// Gap between repeated sends within a burst
    pub discovery_gap: Duration,
    /// How long to wait for a requested ACK
    pub ack_wait: Duration,
    /// CUE_FIRE repeats
    pub fire_repeat: u32,
    /// Scheduling headroom between "now" and a fire deadline
    pub fire_delay_ms: u32,
    pub beacon_interval: Duration,
    /// Answer TIME_REQs; disabling leaves nodes on coarse beacon sync
    pub answer_time_reqs: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(2),
            discovery_repeat: 2,
            discovery_gap: Duration::from_millis(20),
            ack_wait: Duration::from_secs(1),
            fire_repeat: 3,
            fire_delay_ms: 800,
            beacon_interval: Duration::from_millis(300),
            answer_time_reqs: true,
        }
    }
}

/// Who a cue message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Node(u32),
    Group(u32),
}

impl Target {
    fn apply(self, header: &mut Header) {
        match self {
            Target::All => header.flags.target_mode = TargetMode::All,
            Target::Node(id) => {
                header.flags.target_mode = TargetMode::Node;
                header.target = id;
            }
            Target::Group(id) => {
                header.flags.target_mode = TargetMode::Group;
                header.target = id;
            }
        }
    }
}

/// Result of an acknowledged CUE_PREPARE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    Confirmed,
    /// Node answered with a failure code
    Failed(u16),
    /// No ACK arrived within the wait window
    Unconfirmed,
}

/// Nonzero random epoch for a controller session
pub fn random_epoch() -> u32 {
    loop {
        let epoch: u32 = rand::random();
        if epoch != 0 {
            return epoch;
        }
    }
}

pub struct Controller {
    socket: ShowSocket,
    receiver: PacketReceiver,
    table: NodeTable,
    clock: ShowClock,
    epoch: u32,
    next_msg_id: u32,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(group: &GroupConfig, config: ControllerConfig) -> Result<Self> {
        let socket = ShowSocket::bind_ephemeral(group)?;
        let receiver = socket.start_receiver();
        let epoch = random_epoch();
        info!(epoch, "controller session started");
        Ok(Self {
            socket,
            receiver,
            table: NodeTable::new(),
            clock: ShowClock::new(),
            epoch,
            // Random seed so ping dedup on nodes never collides with a
            // previous controller session.
            next_msg_id: rand::random(),
            config,
        })
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Controller show-time in milliseconds
    pub fn show_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.table
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn next_msg_id(&mut self) -> u32 {
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        id
    }

    /// Discovery burst: repeated PINGs sharing one msg_id, then a bounded
    /// collect of PONGs into the node table
    pub async fn discover(&mut self) -> Result<&NodeTable> {
        let msg_id = self.next_msg_id();
        let ping = Packet::ping(self.epoch, msg_id);
        for i in 0..self.config.discovery_repeat {
            if i > 0 {
                sleep(self.config.discovery_gap).await;
            }
            self.socket.send_group(&ping).await?;
        }

        let before = self.table.len();
        let deadline = Instant::now() + self.config.discovery_timeout;
        while let Ok(Some((packet, from))) = timeout_at(deadline, self.receiver.recv()).await {
            self.absorb(&packet, from).await?;
        }
        info!(
            found = self.table.len(),
            new = self.table.len() - before,
            "discovery complete"
        );
        Ok(&self.table)
    }

    /// Send one BEACON carrying current show-time
    pub async fn beacon_once(&mut self) -> Result<()> {
        let msg_id = self.next_msg_id();
        let beacon = Packet::beacon(self.epoch, msg_id, self.show_ms());
        self.socket.send_group(&beacon).await?;
        Ok(())
    }

    /// Beacon for `window`, answering TIME_REQs as time master
    ///
    /// Returns the number of TIME_REQs answered.
    pub async fn sync_window(&mut self, window: Duration) -> Result<u32> {
        let deadline = Instant::now() + window;
        let mut answered = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.beacon_once().await?;

            let slice_end = (now + self.config.beacon_interval).min(deadline);
            while let Ok(Some((packet, from))) = timeout_at(slice_end, self.receiver.recv()).await
            {
                if packet.header.kind() == Some(MsgType::TimeReq) {
                    answered += 1;
                }
                self.absorb(&packet, from).await?;
            }
        }

        debug!(answered, "sync window closed");
        Ok(answered)
    }

    /// Send an acknowledged CUE_PREPARE and wait for the verdict
    pub async fn prepare(&mut self, target: Target, cue: CuePrepare) -> Result<PrepareOutcome> {
        let msg_id = self.next_msg_id();
        let mut packet = Packet::cue_prepare(self.epoch, msg_id, cue);
        target.apply(&mut packet.header);
        packet.header.flags.ack_req = true;
        self.socket.send_group(&packet).await?;

        let deadline = Instant::now() + self.config.ack_wait;
        while let Ok(Some((packet, from))) = timeout_at(deadline, self.receiver.recv()).await {
            if let Body::Ack(ack) = &packet.body {
                if ack.ack_for_msg_id == msg_id {
                    return Ok(if ack.code == AckCode::Ok as u16 {
                        PrepareOutcome::Confirmed
                    } else {
                        warn!(node = packet.header.sender_id, code = ack.code, "prepare refused");
                        PrepareOutcome::Failed(ack.code)
                    });
                }
            }
            self.absorb(&packet, from).await?;
        }
        warn!(cue_id = cue.cue_id, "prepare unacknowledged");
        Ok(PrepareOutcome::Unconfirmed)
    }

    /// Multicast CUE_FIRE, repeated for loss tolerance with a shared msg_id
    pub async fn fire(&mut self, cue_id: u32, execute_at_show_ms: u32) -> Result<()> {
        let msg_id = self.next_msg_id();
        let packet = Packet::cue_fire(self.epoch, msg_id, cue_id, execute_at_show_ms);
        self.repeat_send(&packet).await?;
        info!(cue_id, execute_at_show_ms, "cue fired");
        Ok(())
    }

    /// Multicast CUE_CANCEL, repeated like a fire
    pub async fn cancel(&mut self, cue_id: u32) -> Result<()> {
        let msg_id = self.next_msg_id();
        let packet = Packet::cue_cancel(self.epoch, msg_id, cue_id);
        self.repeat_send(&packet).await?;
        info!(cue_id, "cue cancelled");
        Ok(())
    }

    async fn repeat_send(&mut self, packet: &Packet) -> Result<()> {
        for i in 0..self.config.fire_repeat {
            if i > 0 {
                sleep(self.config.discovery_gap).await;
            }
            self.socket.send_group(packet).await?;
        }
        Ok(())
    }

    /// Fold an inbound packet into controller state, replying where the
    /// protocol calls for it
    async fn absorb(&mut self, packet: &Packet, from: SocketAddr) -> Result<()> {
        match &packet.body {
            Body::Pong(pong) => {
                self.table
                    .upsert(NodeRecord::from_pong(&packet.header, pong, from));
            }
            Body::TimeReq => {
                // Requests fenced to a foreign epoch belong to another
                // controller; the node will come to us via our beacons.
                if self.config.answer_time_reqs && packet.header.epoch_id == self.epoch {
                    let rx = self.show_ms();
                    self.answer_time_req(&packet.header, from, rx).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Answer a TIME_REQ with receive/transmit show-time stamps
    pub async fn answer_time_req(
        &mut self,
        req: &Header,
        from: SocketAddr,
        rx_show_ms: u32,
    ) -> Result<()> {
        let msg_id = self.next_msg_id();
        let resp = Packet::time_resp(
            self.epoch,
            msg_id,
            req.sender_id,
            TimeResp {
                req_msg_id: req.msg_id,
                master_rx_show_ms: rx_show_ms,
                master_tx_show_ms: self.show_ms(),
            },
        );
        self.socket.send_to(&resp, from).await?;
        debug!(node = req.sender_id, "time request answered");
        Ok(())
    }
}
