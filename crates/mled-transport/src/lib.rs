//! MLED Transport Layer
//!
//! UDP multicast plumbing for MLED/1: a group-joined socket, unicast
//! replies, and a channel-based packet receiver.

pub mod error;
pub mod multicast;

pub use error::{Result, TransportError};
pub use multicast::{GroupConfig, PacketReceiver, ShowSocket};
