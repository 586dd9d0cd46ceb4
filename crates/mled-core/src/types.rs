//! Protocol type codes and header flags

/// Message type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    Beacon = 0x01,
    TimeReq = 0x03,
    TimeResp = 0x04,
    CuePrepare = 0x10,
    CueFire = 0x11,
    CueCancel = 0x12,
    Ping = 0x20,
    Pong = 0x21,
    Ack = 0x22,
}

impl MsgType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x01 => Some(MsgType::Beacon),
            0x03 => Some(MsgType::TimeReq),
            0x04 => Some(MsgType::TimeResp),
            0x10 => Some(MsgType::CuePrepare),
            0x11 => Some(MsgType::CueFire),
            0x12 => Some(MsgType::CueCancel),
            0x20 => Some(MsgType::Ping),
            0x21 => Some(MsgType::Pong),
            0x22 => Some(MsgType::Ack),
            _ => None,
        }
    }
}

/// Addressing mode carried in the low two flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TargetMode {
    /// All nodes accept the message (`target` ignored)
    #[default]
    All = 0,
    /// Only the node whose id equals `target`
    Node = 1,
    /// Only nodes belonging to group `target`
    Group = 2,
}

impl TargetMode {
    pub fn from_u8(val: u8) -> Self {
        match val & 0x03 {
            1 => TargetMode::Node,
            2 => TargetMode::Group,
            _ => TargetMode::All,
        }
    }
}

/// ACK_REQ flag bit
pub const FLAG_ACK_REQ: u8 = 0x04;

/// Header flags byte
///
/// ```text
/// [1:0] target mode (0=all, 1=node, 2=group)
/// [2]   ACK_REQ
/// [7:3] reserved (zero on write, ignored on read)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub target_mode: TargetMode,
    pub ack_req: bool,
}

impl Flags {
    pub fn to_byte(self) -> u8 {
        let mut flags = self.target_mode as u8;
        if self.ack_req {
            flags |= FLAG_ACK_REQ;
        }
        flags
    }

    pub fn from_byte(byte: u8) -> Self {
        Self {
            target_mode: TargetMode::from_u8(byte),
            ack_req: (byte & FLAG_ACK_REQ) != 0,
        }
    }
}

/// ACK result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AckCode {
    Ok = 0,
    MalformedPayload = 1,
    SlotsFull = 2,
    UnknownCue = 3,
}

impl AckCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(AckCode::Ok),
            1 => Some(AckCode::MalformedPayload),
            2 => Some(AckCode::SlotsFull),
            3 => Some(AckCode::UnknownCue),
            _ => None,
        }
    }
}

/// PONG state flag: node main loop is running
pub const STATE_RUNNING: u8 = 0x01;

/// PONG state flag: node considers its show clock synchronized
pub const STATE_TIME_SYNCED: u8 = 0x04;
