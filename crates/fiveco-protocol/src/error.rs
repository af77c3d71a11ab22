//! Error types for FiveCo legacy frame parsing

use thiserror::Error;

/// Reasons a delivery does not look like FiveCo legacy traffic
///
/// Any of these rejects the whole delivery: no frame is decoded and no byte
/// is consumed, so another protocol may claim the data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer bytes left than the smallest possible frame
    #[error("frame too short: {remaining} bytes remaining, need at least 8")]
    TooShort { remaining: usize },

    /// Command field is not one of the known function codes
    #[error("unknown command: 0x{0:04X}")]
    UnknownCommand(u16),

    /// Declared payload length runs past the end of the delivery
    #[error("payload length {declared} overruns delivery ({available} bytes available)")]
    LengthOverrun { declared: usize, available: usize },
}
