//! Events emitted by the dissector
//!
//! Events are buffered inside the [`Dissector`](crate::Dissector) and
//! drained by the caller. Correlation events are only emitted on the first
//! visit of a frame occurrence, so re-analysis does not repeat them.

use fiveco_protocol::{CommandCode, ParseError};
use serde::Serialize;

use crate::state::{FlowId, Occurrence};

/// Dissector activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DissectorEvent {
    /// A frame was decoded
    FrameDecoded {
        /// Flow of the delivery
        flow: FlowId,
        /// Frame occurrence
        occurrence: Occurrence,
        /// Function code
        command: CommandCode,
        /// Synthetic id assigned to the occurrence
        synthetic_id: u64,
        /// Whether the occurrence was replayed from a previous pass
        replay: bool,
    },

    /// A delivery was not FiveCo legacy traffic
    DeliveryRejected {
        /// Flow of the delivery
        flow: FlowId,
        /// Caller-supplied packet number
        packet: u64,
        /// First boundary violation found
        #[serde(serialize_with = "serialize_display")]
        reason: ParseError,
    },

    /// Trailer did not match the computed checksum
    ChecksumMismatch {
        /// Frame occurrence
        occurrence: Occurrence,
        /// Trailer found on the wire
        received: u16,
        /// Checksum computed over header and payload
        computed: u16,
    },

    /// An answer was paired with its request
    AnswerMatched {
        /// Flow of the exchange
        flow: FlowId,
        /// Answer code
        command: CommandCode,
        /// Synthetic id shared by request and answer
        synthetic_id: u64,
    },

    /// An answer hit a request that was already answered
    DuplicateAnswer {
        /// Flow of the exchange
        flow: FlowId,
        /// Answer code
        command: CommandCode,
        /// Synthetic id looked up
        synthetic_id: u64,
    },

    /// An answer had no matching request
    UnmatchedAnswer {
        /// Flow of the answer
        flow: FlowId,
        /// Answer code
        command: CommandCode,
        /// Synthetic id looked up
        synthetic_id: u64,
    },

    /// Correlation state was cleared
    SessionReset,
}

fn serialize_display<S: serde::Serializer>(
    value: &ParseError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
