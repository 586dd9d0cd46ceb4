//! Discovered-node registry
//!
//! Nodes are keyed by node id; every PONG overwrites the previous record
//! (latest wins), so a repeated discovery burst collapses to one entry per
//! node. Status is derived on read from record age and signal strength.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mled_core::{Header, Pattern, Pong};
use serde::Serialize;

/// Record age beyond which a node is reported offline
pub const OFFLINE_AFTER: Duration = Duration::from_secs(30);

/// Record age beyond which a still-present node is reported weak
pub const WEAK_AFTER: Duration = Duration::from_secs(5);

/// RSSI floor below which a node is reported weak
pub const WEAK_RSSI_DBM: i8 = -75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Weak,
    Offline,
}

/// Everything the controller knows about one node
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub node_id: u32,
    pub addr: SocketAddr,
    pub name: String,
    pub uptime_ms: u32,
    pub rssi_dbm: i8,
    pub state_flags: u8,
    pub brightness_pct: u8,
    pub pattern_type: u8,
    pub frame_ms: u16,
    pub active_cue_id: u32,
    pub epoch: u32,
    pub show_ms: u32,
    pub last_seen: Instant,
}

impl NodeRecord {
    pub fn from_pong(header: &Header, pong: &Pong, addr: SocketAddr) -> Self {
        Self {
            node_id: header.sender_id,
            addr,
            name: pong.name.clone(),
            uptime_ms: pong.uptime_ms,
            rssi_dbm: pong.rssi_dbm,
            state_flags: pong.state_flags,
            brightness_pct: pong.brightness_pct,
            pattern_type: pong.pattern_type,
            frame_ms: pong.frame_ms,
            active_cue_id: pong.active_cue_id,
            epoch: pong.controller_epoch,
            show_ms: pong.show_ms_now,
            last_seen: Instant::now(),
        }
    }

    pub fn status(&self, now: Instant) -> NodeStatus {
        let age = now.saturating_duration_since(self.last_seen);
        if age > OFFLINE_AFTER {
            NodeStatus::Offline
        } else if age > WEAK_AFTER || (self.rssi_dbm != 0 && self.rssi_dbm < WEAK_RSSI_DBM) {
            // RSSI zero means the node has no radio to report on.
            NodeStatus::Weak
        } else {
            NodeStatus::Online
        }
    }

    pub fn to_dto(&self, now: Instant) -> NodeDto {
        let name = if self.name.is_empty() {
            format!("{:08x}", self.node_id)
        } else {
            self.name.clone()
        };
        NodeDto {
            node_id: self.node_id,
            addr: self.addr.to_string(),
            name,
            status: self.status(now),
            rssi_dbm: self.rssi_dbm,
            brightness_pct: self.brightness_pct,
            pattern: Pattern::type_name(self.pattern_type).to_string(),
            active_cue_id: self.active_cue_id,
            epoch: self.epoch,
            show_ms: self.show_ms,
            uptime_ms: self.uptime_ms,
            age_ms: now.saturating_duration_since(self.last_seen).as_millis() as u64,
        }
    }
}

/// Serializable node view for status output
#[derive(Debug, Clone, Serialize)]
pub struct NodeDto {
    pub node_id: u32,
    pub addr: String,
    pub name: String,
    pub status: NodeStatus,
    pub rssi_dbm: i8,
    pub brightness_pct: u8,
    pub pattern: String,
    pub active_cue_id: u32,
    pub epoch: u32,
    pub show_ms: u32,
    pub uptime_ms: u32,
    pub age_ms: u64,
}

/// Latest-wins table of discovered nodes
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: HashMap<u32, NodeRecord>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: NodeRecord) {
        self.nodes.insert(record.node_id, record);
    }

    pub fn get(&self, node_id: u32) -> Option<&NodeRecord> {
        self.nodes.get(&node_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.values().find(|n| n.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records sorted by node id for stable output
    pub fn records(&self) -> Vec<&NodeRecord> {
        let mut records: Vec<_> = self.nodes.values().collect();
        records.sort_by_key(|n| n.node_id);
        records
    }

    pub fn snapshot(&self, now: Instant) -> Vec<NodeDto> {
        self.records().into_iter().map(|n| n.to_dto(now)).collect()
    }

    /// Drop records not seen for `max_age`
    pub fn prune(&mut self, now: Instant, max_age: Duration) {
        self.nodes
            .retain(|_, n| now.saturating_duration_since(n.last_seen) <= max_age);
    }
}
