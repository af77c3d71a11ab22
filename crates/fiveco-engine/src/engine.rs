//! Dissection engine
//!
//! Entry point of an analysis session: takes one reassembled delivery at a
//! time, splits it into frames, correlates each frame and returns the
//! decode trees and summaries.

use fiveco_protocol::{
    decode_payload, split_frames, AnnotatedFrame, Annotation, AnnotationKind, CommandCode,
    DecodeNode, DecodedFrame, DisplayOptions, Frame, FrameAnnotation, SegmentType,
    DUPLICATE_ANSWER, PRODUCT_SPECIFIC,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::correlator::Correlator;
use crate::error::EngineError;
use crate::events::DissectorEvent;
use crate::state::{Correlation, CounterScope, FlowId, Occurrence, OccurrenceRecord, Transport};

/// Dissector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissectorConfig {
    /// How far synthetic counters are shared
    pub counter_scope: CounterScope,
    /// TCP ports the protocol is registered on
    pub tcp_ports: Vec<u16>,
    /// UDP ports the protocol is registered on
    pub udp_ports: Vec<u16>,
    /// Maximum characters shown for text registers
    pub text_display_limit: usize,
}

impl Default for DissectorConfig {
    fn default() -> Self {
        Self {
            counter_scope: CounterScope::Session,
            tcp_ports: vec![8010, 8004],
            udp_ports: vec![7010],
            text_display_limit: 16,
        }
    }
}

impl DissectorConfig {
    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.text_display_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "text_display_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One reassembled transport delivery
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    /// Connection the bytes arrived on
    pub flow: FlowId,
    /// Caller-supplied packet number, stable across analysis passes
    pub packet: u64,
    /// Delivery bytes
    pub data: &'a [u8],
}

impl<'a> Delivery<'a> {
    /// Create a delivery
    pub fn new(flow: FlowId, packet: u64, data: &'a [u8]) -> Self {
        Self { flow, packet, data }
    }
}

/// One decoded frame of a delivery
#[derive(Debug, Clone, Serialize)]
pub struct DissectedFrame {
    /// Frame occurrence
    pub occurrence: Occurrence,
    /// Function code
    pub command: CommandCode,
    /// Synthetic id used for correlation
    pub synthetic_id: u64,
    /// Correlation outcome
    pub correlation: Correlation,
    /// Whether the checksum trailer is correct
    pub checksum_ok: bool,
    /// Decode tree and summary
    pub annotated: AnnotatedFrame,
}

impl DissectedFrame {
    /// One-line summary
    pub fn summary(&self) -> String {
        self.annotated.summary_text()
    }

    /// Root of the decode tree
    pub fn tree(&self) -> &DecodeNode {
        &self.annotated.tree
    }
}

/// Result of dissecting one delivery
#[derive(Debug, Clone, Serialize)]
pub struct Dissection {
    /// Frames in delivery order
    pub frames: Vec<DissectedFrame>,
    /// Bytes consumed (always the whole delivery)
    pub consumed: usize,
}

impl Dissection {
    /// Delivery info line: frame summaries joined with `, `
    pub fn info(&self) -> String {
        self.frames
            .iter()
            .map(DissectedFrame::summary)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The dissection engine for one analysis session
pub struct Dissector {
    config: DissectorConfig,
    correlator: Correlator,
    event_buffer: Vec<DissectorEvent>,
}

impl Dissector {
    /// Create a dissector with default configuration
    pub fn new() -> Self {
        let config = DissectorConfig::default();
        Self {
            correlator: Correlator::new(config.counter_scope),
            config,
            event_buffer: Vec::new(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: DissectorConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            correlator: Correlator::new(config.counter_scope),
            config,
            event_buffer: Vec::new(),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &DissectorConfig {
        &self.config
    }

    /// Update the configuration
    ///
    /// Changing the counter scope starts a new session.
    pub fn set_config(&mut self, config: DissectorConfig) -> Result<(), EngineError> {
        config.validate()?;
        let rescope = config.counter_scope != self.config.counter_scope;
        self.config = config;
        if rescope {
            self.correlator = Correlator::new(self.config.counter_scope);
            self.event_buffer.push(DissectorEvent::SessionReset);
            info!("Counter scope changed to {:?}, session reset", self.config.counter_scope);
        }
        Ok(())
    }

    /// Correlation state of the session
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Whether deliveries on `port` should be offered to this dissector
    pub fn claims_port(&self, transport: Transport, port: u16) -> bool {
        match transport {
            Transport::Tcp => self.config.tcp_ports.contains(&port),
            Transport::Udp => self.config.udp_ports.contains(&port),
        }
    }

    /// Start a new analysis session: counters zeroed, pending table cleared
    pub fn reset_session(&mut self) {
        self.correlator.reset();
        self.event_buffer.push(DissectorEvent::SessionReset);
        info!("Analysis session reset");
    }

    /// Dissect one delivery
    ///
    /// Either every frame is decoded and the whole delivery consumed, or the
    /// delivery is rejected with [`EngineError::ProtocolMismatch`] and no
    /// state changes.
    pub fn dissect(&mut self, delivery: &Delivery<'_>) -> Result<Dissection, EngineError> {
        let frames = match split_frames(delivery.data) {
            Ok(frames) => frames,
            Err(e) => {
                debug!(
                    "Delivery {} on flow {} rejected: {}",
                    delivery.packet, delivery.flow.0, e
                );
                self.event_buffer.push(DissectorEvent::DeliveryRejected {
                    flow: delivery.flow,
                    packet: delivery.packet,
                    reason: e.clone(),
                });
                return Err(e.into());
            }
        };

        let options = DisplayOptions {
            text_limit: self.config.text_display_limit,
        };

        let mut dissected = Vec::with_capacity(frames.len());
        for frame in frames {
            dissected.push(self.dissect_frame(delivery, frame, &options));
        }

        Ok(Dissection {
            frames: dissected,
            consumed: delivery.data.len(),
        })
    }

    fn dissect_frame(
        &mut self,
        delivery: &Delivery<'_>,
        frame: Frame<'_>,
        options: &DisplayOptions,
    ) -> DissectedFrame {
        let command = frame.command();
        let occurrence = Occurrence {
            flow: delivery.flow,
            packet: delivery.packet,
            offset: frame.offset,
        };

        let replay = self.correlator.has_seen(&occurrence);
        let record = self
            .correlator
            .correlate(occurrence, command, frame.payload);

        let payload = decode_payload(command, frame.payload, self.correlator.context(&record));
        let mut annotated = DecodedFrame { frame, payload }.annotate(options);
        annotate_correlation(&mut annotated.tree, &frame, &record);

        let checksum_ok = frame.checksum_ok();
        if !replay {
            self.push_first_visit_events(delivery.flow, occurrence, &frame, &record);
        }
        self.event_buffer.push(DissectorEvent::FrameDecoded {
            flow: delivery.flow,
            occurrence,
            command,
            synthetic_id: record.synthetic_id,
            replay,
        });

        DissectedFrame {
            occurrence,
            command,
            synthetic_id: record.synthetic_id,
            correlation: record.correlation,
            checksum_ok,
            annotated,
        }
    }

    fn push_first_visit_events(
        &mut self,
        flow: FlowId,
        occurrence: Occurrence,
        frame: &Frame<'_>,
        record: &OccurrenceRecord,
    ) {
        let command = frame.command();
        let synthetic_id = record.synthetic_id;

        if !frame.checksum_ok() {
            debug!(
                "Bad checksum on {} at {:?}: 0x{:04x}, should be 0x{:04x}",
                command,
                occurrence,
                frame.checksum,
                frame.computed_checksum()
            );
            self.event_buffer.push(DissectorEvent::ChecksumMismatch {
                occurrence,
                received: frame.checksum,
                computed: frame.computed_checksum(),
            });
        }

        let event = match record.correlation {
            Correlation::Matched { .. } => DissectorEvent::AnswerMatched {
                flow,
                command,
                synthetic_id,
            },
            Correlation::AlreadyReplied { .. } => DissectorEvent::DuplicateAnswer {
                flow,
                command,
                synthetic_id,
            },
            Correlation::Unmatched => DissectorEvent::UnmatchedAnswer {
                flow,
                command,
                synthetic_id,
            },
            Correlation::Request { .. } | Correlation::Untracked => return,
        };
        self.event_buffer.push(event);
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<DissectorEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}

impl Default for Dissector {
    fn default() -> Self {
        Self::new()
    }
}

/// Add the synthetic id node, and correlation findings the payload decoder
/// did not already report
fn annotate_correlation(tree: &mut DecodeNode, frame: &Frame<'_>, record: &OccurrenceRecord) {
    let id_range = frame.offset + 2..frame.offset + 4;
    let id_node = DecodeNode::new(
        "Synthetic ID",
        "5co-legacy.internal_id",
        id_range,
        SegmentType::Sequence,
    )
    .with_value(record.synthetic_id.to_string());
    let at = tree.children.len().min(1);
    tree.children.insert(at, id_node);

    let finding = match record.correlation {
        Correlation::AlreadyReplied { .. } => {
            Annotation::new(AnnotationKind::DuplicateAnswer, DUPLICATE_ANSWER)
        }
        Correlation::Unmatched => Annotation::new(AnnotationKind::CorrelationMiss, PRODUCT_SPECIFIC),
        _ => return,
    };
    if !tree.has_annotation(finding.kind) {
        tree.annotate(finding);
    }
}
