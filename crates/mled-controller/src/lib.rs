//! MLED Controller
//!
//! The sending side of the MLED protocol: node discovery, show-time
//! mastering, and two-phase cue orchestration. [`Controller`] covers
//! one-shot operations, [`serve::ControllerServer`] runs as a daemon, and
//! [`show::run_show`] glues the whole prepare/sync/fire sequence together.

pub mod controller;
pub mod error;
pub mod registry;
pub mod serve;
pub mod show;

pub use controller::{Controller, ControllerConfig, PrepareOutcome, Target};
pub use error::{ControllerError, Result};
pub use registry::{NodeDto, NodeRecord, NodeStatus, NodeTable};
pub use serve::{ControllerServer, ServerConfig};
pub use show::{run_show, ShowOutcome, ShowRequest, ShowSelector};
