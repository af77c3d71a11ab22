//! FiveCo Legacy Dissection Engine
//!
//! This crate turns reassembled transport deliveries into decode trees,
//! pairing every answer with the request that produced it.
//!
//! # Architecture
//!
//! The wire sequence field of the protocol is unreliable, so the engine
//! keeps its own correlation state for one analysis session:
//!
//! - A **synthetic counter**, advanced once per newly observed request and
//!   shared by the whole session or kept per flow ([`CounterScope`])
//! - A **pending table** of request payloads keyed by flow, expected answer
//!   and synthetic id
//! - An **occurrence cache** so that analysing the same frame twice gives
//!   the same result
//!
//! The engine is synchronous and single-threaded: callers hand over one
//! delivery at a time and serialize calls.
//!
//! # Example
//!
//! ```rust
//! use fiveco_engine::{Delivery, Dissector, FlowId};
//! use fiveco_protocol::{encode_frame, CommandCode};
//!
//! let mut dissector = Dissector::new();
//! let flow = FlowId(1);
//!
//! let request = encode_frame(CommandCode::ReadRegister, 0, &[0x14]);
//! let answer = encode_frame(CommandCode::ReadRegisterAnswer, 0, &[0x14, 0x2D]);
//!
//! dissector.dissect(&Delivery::new(flow, 1, &request)).unwrap();
//! let result = dissector.dissect(&Delivery::new(flow, 2, &answer)).unwrap();
//!
//! let tree = result.frames[0].tree();
//! let timeout = tree.find("5co-legacy.RegTCPTimeout").unwrap();
//! assert_eq!(timeout.label, "Register TCP Timeout: 45 secondes");
//! ```

pub mod correlator;
pub mod engine;
pub mod error;
pub mod events;
pub mod state;

pub use correlator::Correlator;
pub use engine::{Delivery, DissectedFrame, Dissection, Dissector, DissectorConfig};
pub use error::EngineError;
pub use events::DissectorEvent;
pub use state::{
    Correlation, CounterScope, FlowId, Occurrence, OccurrenceRecord, PendingRequest, RequestKey,
    Transport,
};
