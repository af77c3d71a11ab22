//! Correlation state types

use fiveco_protocol::CommandCode;
use serde::{Deserialize, Serialize};

/// Opaque identity of one transport connection, supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub u64);

impl FlowId {
    /// Get the raw flow key
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// One physical occurrence of a frame: the flow and delivery it arrived in
/// and its offset inside that delivery
///
/// Re-analysing a capture visits the same occurrences again; everything the
/// correlator decides is cached under this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence {
    /// Flow the delivery belongs to
    pub flow: FlowId,
    /// Caller-supplied packet number of the delivery
    pub packet: u64,
    /// Byte offset of the frame in the delivery
    pub offset: usize,
}

/// Key of a pending request record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestKey {
    /// Flow the request was seen on
    pub flow: FlowId,
    /// Command of the answer this request expects
    pub answer: CommandCode,
    /// Synthetic id assigned to the request
    pub id: u64,
}

/// A request waiting for (or matched with) its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Private copy of the request payload
    pub payload: Vec<u8>,
    /// Whether an answer has been matched
    pub replied: bool,
}

impl PendingRequest {
    pub(crate) fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            replied: false,
        }
    }
}

/// What correlation decided for one frame occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Correlation {
    /// Request recorded under `key`
    Request { key: RequestKey },
    /// Answer paired with the request stored under `key`
    Matched { key: RequestKey },
    /// Answer to a request that an earlier frame already answered
    AlreadyReplied { key: RequestKey },
    /// Answer without a matching request
    Unmatched,
    /// Neither a tracked request nor an answer
    Untracked,
}

/// Cached result for one frame occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccurrenceRecord {
    /// Synthetic id assigned on first visit
    pub synthetic_id: u64,
    /// Correlation outcome of the first visit
    pub correlation: Correlation,
}

/// How far synthetic counters are shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CounterScope {
    /// One counter for every flow of the session
    #[default]
    Session,
    /// One counter per flow
    PerFlow,
}

/// Transport a delivery arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// TCP stream, after reassembly
    Tcp,
    /// UDP datagram
    Udp,
}
