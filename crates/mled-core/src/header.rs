//! Fixed 32-byte packet header
//!
//! MLED/1 header layout (all integers little-endian):
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Bytes 0-3:   Magic "MLED"                                  │
//! │ Byte  4:     Version (1)                                   │
//! │ Byte  5:     Message type                                  │
//! │ Byte  6:     Flags ([1:0] target mode, [2] ACK_REQ)        │
//! │ Byte  7:     Header length (32)                            │
//! │ Bytes 8-11:  epoch_id (u32)                                │
//! │ Bytes 12-15: msg_id (u32)                                  │
//! │ Bytes 16-19: sender_id (u32, 0 = controller)               │
//! │ Bytes 20-23: target (u32, per target mode)                 │
//! │ Bytes 24-27: execute_at_ms (u32 show-time, 0 = immediate)  │
//! │ Bytes 28-29: payload_len (u16)                             │
//! │ Bytes 30-31: reserved (zero on write, ignored on read)     │
//! └────────────────────────────────────────────────────────────┘
//! ```

use crate::types::{Flags, MsgType};
use crate::{Error, Result, HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
use bytes::{Buf, BufMut};

/// A decoded MLED packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw message type code; may be a code this build does not know
    pub msg_type: u8,
    pub flags: Flags,
    pub epoch_id: u32,
    pub msg_id: u32,
    pub sender_id: u32,
    pub target: u32,
    pub execute_at_ms: u32,
    pub payload_len: u16,
}

impl Header {
    /// Create a header for a known message type with zeroed fields
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type: msg_type as u8,
            flags: Flags::default(),
            epoch_id: 0,
            msg_id: 0,
            sender_id: 0,
            target: 0,
            execute_at_ms: 0,
            payload_len: 0,
        }
    }

    /// The message type, if this build recognizes the code
    pub fn kind(&self) -> Option<MsgType> {
        MsgType::from_u8(self.msg_type)
    }

    /// Encode the header into a buffer
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_slice(&MAGIC);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.msg_type);
        buf.put_u8(self.flags.to_byte());
        buf.put_u8(HEADER_SIZE as u8);
        buf.put_u32_le(self.epoch_id);
        buf.put_u32_le(self.msg_id);
        buf.put_u32_le(self.sender_id);
        buf.put_u32_le(self.target);
        buf.put_u32_le(self.execute_at_ms);
        buf.put_u16_le(self.payload_len);
        buf.put_u16_le(0); // reserved
    }

    /// Decode and validate a header from the front of a datagram
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let mut buf = &buf[..HEADER_SIZE];

        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let msg_type = buf.get_u8();
        let flags = Flags::from_byte(buf.get_u8());

        let hdr_len = buf.get_u8();
        if hdr_len as usize != HEADER_SIZE {
            return Err(Error::InvalidHeaderLen(hdr_len));
        }

        let epoch_id = buf.get_u32_le();
        let msg_id = buf.get_u32_le();
        let sender_id = buf.get_u32_le();
        let target = buf.get_u32_le();
        let execute_at_ms = buf.get_u32_le();
        let payload_len = buf.get_u16_le();
        let _reserved = buf.get_u16_le();

        Ok(Self {
            msg_type,
            flags,
            epoch_id,
            msg_id,
            sender_id,
            target,
            execute_at_ms,
            payload_len,
        })
    }
}
