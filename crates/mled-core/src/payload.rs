//! Fixed-layout message payloads
//!
//! Each payload validates a minimum length on decode and ignores any extra
//! bytes, so payloads may grow in later protocol revisions without breaking
//! older decoders.

use crate::pattern::{PatternConfig, PATTERN_CONFIG_SIZE};
use crate::{Error, Result};
use bytes::BufMut;

pub const TIME_RESP_SIZE: usize = 12;
pub const CUE_PREPARE_SIZE: usize = 8 + PATTERN_CONFIG_SIZE;
pub const CUE_FIRE_SIZE: usize = 4;
pub const PONG_SIZE: usize = 43;
pub const ACK_SIZE: usize = 8;

/// Name field width inside PONG (NUL-terminated)
pub const NODE_NAME_SIZE: usize = 16;

fn short(msg_type: u8, needed: usize, buf: &[u8]) -> Error {
    Error::ShortPayload {
        msg_type,
        needed,
        have: buf.len(),
    }
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

/// TIME_RESP payload: controller's receive/transmit show-time stamps for a
/// correlated TIME_REQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResp {
    pub req_msg_id: u32,
    pub master_rx_show_ms: u32,
    pub master_tx_show_ms: u32,
}

impl TimeResp {
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.req_msg_id);
        buf.put_u32_le(self.master_rx_show_ms);
        buf.put_u32_le(self.master_tx_show_ms);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < TIME_RESP_SIZE {
            return Err(short(0x04, TIME_RESP_SIZE, buf));
        }
        Ok(Self {
            req_msg_id: u32_at(buf, 0),
            master_rx_show_ms: u32_at(buf, 4),
            master_tx_show_ms: u32_at(buf, 8),
        })
    }
}

/// CUE_PREPARE payload: load a pattern into a pending cue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePrepare {
    pub cue_id: u32,
    pub fade_in_ms: u16,
    pub fade_out_ms: u16,
    pub pattern: PatternConfig,
}

impl CuePrepare {
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.cue_id);
        buf.put_u16_le(self.fade_in_ms);
        buf.put_u16_le(self.fade_out_ms);
        self.pattern.encode_to(buf);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CUE_PREPARE_SIZE {
            return Err(short(0x10, CUE_PREPARE_SIZE, buf));
        }
        Ok(Self {
            cue_id: u32_at(buf, 0),
            fade_in_ms: u16_at(buf, 4),
            fade_out_ms: u16_at(buf, 6),
            pattern: PatternConfig::decode(&buf[8..])?,
        })
    }
}

/// CUE_FIRE / CUE_CANCEL payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueFire {
    pub cue_id: u32,
}

impl CueFire {
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.cue_id);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CUE_FIRE_SIZE {
            return Err(short(0x11, CUE_FIRE_SIZE, buf));
        }
        Ok(Self {
            cue_id: u32_at(buf, 0),
        })
    }
}

/// PONG payload: a node's self-reported state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub uptime_ms: u32,
    pub rssi_dbm: i8,
    pub state_flags: u8,
    pub brightness_pct: u8,
    pub pattern_type: u8,
    pub frame_ms: u16,
    pub active_cue_id: u32,
    pub controller_epoch: u32,
    pub show_ms_now: u32,
    /// Node name; at most 16 bytes on the wire, truncated at the first NUL
    pub name: String,
}

impl Pong {
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.uptime_ms);
        buf.put_i8(self.rssi_dbm);
        buf.put_u8(self.state_flags);
        buf.put_u8(self.brightness_pct);
        buf.put_u8(self.pattern_type);
        buf.put_u16_le(self.frame_ms);
        buf.put_u32_le(self.active_cue_id);
        buf.put_u32_le(self.controller_epoch);
        buf.put_u32_le(self.show_ms_now);

        let mut name = [0u8; NODE_NAME_SIZE];
        let raw = self.name.as_bytes();
        let n = raw.len().min(NODE_NAME_SIZE);
        name[..n].copy_from_slice(&raw[..n]);
        buf.put_slice(&name);
        buf.put_slice(&[0u8; 5]); // reserved padding
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < PONG_SIZE {
            return Err(short(0x21, PONG_SIZE, buf));
        }
        let name_raw = &buf[22..22 + NODE_NAME_SIZE];
        let name_end = name_raw
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NODE_NAME_SIZE);
        let name = String::from_utf8_lossy(&name_raw[..name_end]).into_owned();

        Ok(Self {
            uptime_ms: u32_at(buf, 0),
            rssi_dbm: buf[4] as i8,
            state_flags: buf[5],
            brightness_pct: buf[6],
            pattern_type: buf[7],
            frame_ms: u16_at(buf, 8),
            active_cue_id: u32_at(buf, 10),
            controller_epoch: u32_at(buf, 14),
            show_ms_now: u32_at(buf, 18),
            name,
        })
    }
}

/// ACK payload: success/failure reply for a message that requested one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub ack_for_msg_id: u32,
    pub code: u16,
}

impl Ack {
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.ack_for_msg_id);
        buf.put_u16_le(self.code);
        buf.put_u16_le(0); // reserved
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ACK_SIZE {
            return Err(short(0x22, ACK_SIZE, buf));
        }
        Ok(Self {
            ack_for_msg_id: u32_at(buf, 0),
            code: u16_at(buf, 4),
        })
    }
}
