//! Error types for the dissection engine

use fiveco_protocol::ParseError;
use thiserror::Error;

/// Errors returned by the engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The delivery is not FiveCo legacy traffic; nothing was consumed
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(#[from] ParseError),

    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
