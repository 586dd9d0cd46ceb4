//! Node error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("transport error: {0}")]
    Transport(#[from] mled_transport::TransportError),

    #[error("receiver channel closed")]
    ReceiverClosed,
}
