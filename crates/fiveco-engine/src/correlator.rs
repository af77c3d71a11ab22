//! Conversation correlator
//!
//! Pairs answers with the requests that produced them. The wire sequence
//! field cannot be trusted (several devices always send zero), so every
//! request gets a synthetic id from a counter and answers are looked up
//! under the counter's current value.
//!
//! Decisions are cached per frame occurrence: visiting the same frame again
//! replays the first decision and leaves the counters and pending table
//! untouched.

use std::collections::HashMap;

use fiveco_protocol::{CommandCode, RequestContext};
use tracing::{debug, trace};

use crate::state::{
    Correlation, CounterScope, FlowId, Occurrence, OccurrenceRecord, PendingRequest, RequestKey,
};

/// Request/answer bookkeeping for one analysis session
#[derive(Debug, Default)]
pub struct Correlator {
    scope: CounterScope,
    session_counter: u64,
    flow_counters: HashMap<FlowId, u64>,
    pending: HashMap<RequestKey, PendingRequest>,
    occurrences: HashMap<Occurrence, OccurrenceRecord>,
}

impl Correlator {
    /// Create an empty correlator
    pub fn new(scope: CounterScope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    /// Counter scope in use
    pub fn scope(&self) -> CounterScope {
        self.scope
    }

    /// Correlate one frame occurrence
    ///
    /// On the first visit of `occurrence` this assigns the synthetic id,
    /// records requests and resolves answers. Later visits return the
    /// cached record unchanged.
    pub fn correlate(
        &mut self,
        occurrence: Occurrence,
        command: CommandCode,
        payload: &[u8],
    ) -> OccurrenceRecord {
        let flow = occurrence.flow;
        if let Some(record) = self.occurrences.get(&occurrence) {
            trace!("Replaying occurrence {:?}: id {}", occurrence, record.synthetic_id);
            return *record;
        }

        let synthetic_id = if command.is_request() {
            self.next_id(flow)
        } else {
            self.current_id(flow)
        };
        trace!("Frame {} at {:?} gets synthetic id {}", command, occurrence, synthetic_id);

        let correlation = if command.is_request() {
            self.record_request(flow, command, synthetic_id, payload)
        } else if command.is_answer() {
            self.resolve_answer(flow, command, synthetic_id)
        } else {
            Correlation::Untracked
        };

        let record = OccurrenceRecord {
            synthetic_id,
            correlation,
        };
        self.occurrences.insert(occurrence, record);
        record
    }

    fn record_request(
        &mut self,
        flow: FlowId,
        command: CommandCode,
        id: u64,
        payload: &[u8],
    ) -> Correlation {
        let Some(answer) = command.expected_answer() else {
            return Correlation::Untracked;
        };

        let key = RequestKey { flow, answer, id };
        self.pending.entry(key).or_insert_with(|| {
            trace!("Pending {} request on flow {} with id {}", command, flow.0, id);
            PendingRequest::new(payload)
        });
        Correlation::Request { key }
    }

    fn resolve_answer(&mut self, flow: FlowId, command: CommandCode, id: u64) -> Correlation {
        let key = RequestKey {
            flow,
            answer: command,
            id,
        };

        match self.pending.get_mut(&key) {
            Some(request) if !request.replied => {
                request.replied = true;
                Correlation::Matched { key }
            }
            Some(_) => {
                debug!("Duplicate {} on flow {} for id {}", command, flow.0, id);
                Correlation::AlreadyReplied { key }
            }
            None => {
                debug!("No request for {} on flow {} with id {}", command, flow.0, id);
                Correlation::Unmatched
            }
        }
    }

    fn next_id(&mut self, flow: FlowId) -> u64 {
        let counter = match self.scope {
            CounterScope::Session => &mut self.session_counter,
            CounterScope::PerFlow => self.flow_counters.entry(flow).or_insert(0),
        };
        *counter += 1;
        *counter
    }

    /// Current counter value seen by `flow`
    pub fn current_id(&self, flow: FlowId) -> u64 {
        match self.scope {
            CounterScope::Session => self.session_counter,
            CounterScope::PerFlow => self.flow_counters.get(&flow).copied().unwrap_or(0),
        }
    }

    /// Request context to decode a frame with, given its record
    pub fn context(&self, record: &OccurrenceRecord) -> RequestContext<'_> {
        match record.correlation {
            Correlation::Matched { key } => match self.pending.get(&key) {
                Some(request) => RequestContext::Matched(&request.payload),
                None => RequestContext::Unmatched,
            },
            Correlation::AlreadyReplied { .. } => RequestContext::AlreadyReplied,
            Correlation::Unmatched => RequestContext::Unmatched,
            Correlation::Request { .. } | Correlation::Untracked => RequestContext::NotApplicable,
        }
    }

    /// Stored request record
    pub fn pending(&self, key: &RequestKey) -> Option<&PendingRequest> {
        self.pending.get(key)
    }

    /// Number of stored request records
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of stored records still waiting for an answer
    pub fn unreplied_count(&self) -> usize {
        self.pending.values().filter(|r| !r.replied).count()
    }

    /// Whether `occurrence` was already correlated
    pub fn has_seen(&self, occurrence: &Occurrence) -> bool {
        self.occurrences.contains_key(occurrence)
    }

    /// Forget everything: counters, pending requests and cached occurrences
    pub fn reset(&mut self) {
        self.session_counter = 0;
        self.flow_counters.clear();
        self.pending.clear();
        self.occurrences.clear();
    }
}
