//! MLED Core
//!
//! Wire format and protocol primitives for MLED/1, a UDP multicast
//! show-control protocol for addressable-LED nodes.
//!
//! This crate provides:
//! - The 32-byte packet header ([`Header`]) and payload layouts
//! - Packet encoding/decoding ([`Packet`], [`codec`])
//! - Pattern configuration as a tagged enum ([`Pattern`], [`PatternConfig`])
//! - Wrap-around-safe show-time arithmetic and offset estimation ([`time`])

use std::net::Ipv4Addr;

pub mod codec;
pub mod error;
pub mod header;
pub mod pattern;
pub mod payload;
pub mod time;
pub mod types;

pub use codec::{Body, Packet};
pub use error::{Error, Result};
pub use header::Header;
pub use pattern::{Pattern, PatternConfig, Rgb};
pub use payload::{Ack, CueFire, CuePrepare, Pong, TimeResp};
pub use time::ShowClock;
pub use types::{AckCode, Flags, MsgType, TargetMode};

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes at the start of every packet
pub const MAGIC: [u8; 4] = *b"MLED";

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Default multicast group
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 32, 6);

/// Default UDP port
pub const DEFAULT_PORT: u16 = 4626;

/// Multicast TTL (link-local scope)
pub const DEFAULT_TTL: u32 = 1;
