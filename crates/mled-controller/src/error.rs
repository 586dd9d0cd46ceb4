//! Controller error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControllerError>;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(#[from] mled_transport::TransportError),

    #[error("receiver channel closed")]
    ReceiverClosed,

    #[error("no nodes discovered")]
    NoNodes,

    #[error("target node not found: {0}")]
    TargetNotFound(String),
}
