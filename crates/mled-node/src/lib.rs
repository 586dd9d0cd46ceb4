//! MLED Node
//!
//! A software implementation of an MLED show node: answers discovery,
//! tracks the controller epoch, synchronizes its show clock, and schedules
//! prepared cues for synchronized activation.
//!
//! The protocol rules live in [`engine::NodeEngine`], a pure state machine;
//! [`runtime::NodeRuntime`] supplies the socket and timers.

pub mod engine;
pub mod error;
pub mod runtime;
pub mod sink;

pub use engine::{Effect, NodeConfig, NodeEngine};
pub use error::{NodeError, Result};
pub use runtime::NodeRuntime;
pub use sink::{PatternSink, TracingSink};
