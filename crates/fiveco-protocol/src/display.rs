//! Display and annotation support for protocol frames
//!
//! This module provides the decode tree handed back to callers: nested
//! labeled fields with byte ranges and inline annotations, plus a one-line
//! summary per frame. Ranges are absolute offsets into the delivery buffer.

use std::ops::Range;

use crate::frame::{Frame, HEADER_LEN};
use crate::payload::Payload;

/// Short protocol tag
pub const PROTOCOL_TAG: &str = "5co-legacy";
/// Full protocol name
pub const PROTOCOL_NAME: &str = "FiveCo's Legacy Register Access Protocol";

/// Type of segment for UI coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SegmentType {
    /// Whole protocol frame
    Protocol,
    /// Header subtree
    Header,
    /// Function code
    Command,
    /// Wire or synthetic sequence id
    Sequence,
    /// Length field
    Length,
    /// Payload subtree or opaque payload bytes
    Data,
    /// I2C slave address
    Address,
    /// Register reference or value
    Register,
    /// Status or ack information
    Status,
    /// Network configuration values
    Network,
    /// Checksum trailer
    Checksum,
    /// Bytes that could not be interpreted
    Undecoded,
}

/// How serious an annotation is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Severity {
    /// Informational
    Note,
    /// Decoding degraded
    Warning,
    /// Data violates the protocol
    Error,
}

/// Kinds of inline, non-fatal findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AnnotationKind {
    /// Trailer does not match the computed checksum
    ChecksumMismatch,
    /// Answer without a matching request
    CorrelationMiss,
    /// Answer matching a request that was already answered
    DuplicateAnswer,
    /// Register address missing from the catalog
    UnknownRegister,
    /// Payload present where the command carries none
    UnexpectedPayload,
    /// Payload too short for its declared structure
    Malformed,
}

impl AnnotationKind {
    /// Default severity for this kind
    pub fn severity(self) -> Severity {
        match self {
            Self::ChecksumMismatch | Self::UnexpectedPayload | Self::Malformed => Severity::Error,
            Self::DuplicateAnswer | Self::UnknownRegister => Severity::Warning,
            Self::CorrelationMiss => Severity::Note,
        }
    }
}

/// A finding attached to a decode tree node
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Annotation {
    /// What was found
    pub kind: AnnotationKind,
    /// How serious it is
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
}

impl Annotation {
    /// Create an annotation with the kind's default severity
    pub fn new(kind: AnnotationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

/// A labeled field in the decode tree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodeNode {
    /// Label (e.g., "Function", "I2C Address")
    pub label: String,
    /// Filter-style field name (e.g., "5co-legacy.fct")
    pub field: &'static str,
    /// Byte range in the delivery
    pub range: Range<usize>,
    /// Decoded value, if the field has one
    pub value: Option<String>,
    /// Type of segment (UI maps this to colors)
    pub segment_type: SegmentType,
    /// Inline findings
    pub annotations: Vec<Annotation>,
    /// Nested fields
    pub children: Vec<DecodeNode>,
}

impl DecodeNode {
    /// Create a node without value
    pub fn new(
        label: impl Into<String>,
        field: &'static str,
        range: Range<usize>,
        segment_type: SegmentType,
    ) -> Self {
        Self {
            label: label.into(),
            field,
            range,
            value: None,
            segment_type,
            annotations: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the decoded value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach an annotation
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Append a child
    pub fn push(&mut self, child: DecodeNode) {
        self.children.push(child);
    }

    /// Attach an annotation in place
    pub fn annotate(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Display text: `label: value` or just the label
    pub fn text(&self) -> String {
        match &self.value {
            Some(value) => format!("{}: {}", self.label, value),
            None => self.label.clone(),
        }
    }

    /// Depth-first iteration over this node and all descendants
    pub fn iter(&self) -> impl Iterator<Item = &DecodeNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// First node (depth-first) with the given field name
    pub fn find(&self, field: &str) -> Option<&DecodeNode> {
        self.iter().find(|n| n.field == field)
    }

    /// All nodes with the given field name, in tree order
    pub fn find_all<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a DecodeNode> {
        self.iter().filter(move |n| n.field == field)
    }

    /// Whether any node in the subtree carries an annotation of `kind`
    pub fn has_annotation(&self, kind: AnnotationKind) -> bool {
        self.iter()
            .any(|n| n.annotations.iter().any(|a| a.kind == kind))
    }

    /// Render the subtree as indented text
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        out.push_str(&indent);
        out.push_str(&self.text());
        out.push('\n');
        for annotation in &self.annotations {
            out.push_str(&indent);
            out.push_str(&format!("    [{:?}] {}\n", annotation.severity, annotation.message));
        }
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

/// A part of the summary with semantic type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SummaryPart {
    /// Text content
    pub text: String,
    /// Type of this part (UI maps this to colors)
    pub part_type: SegmentType,
    /// Optional byte range this summary part corresponds to (for hover linking)
    pub range: Option<Range<usize>>,
}

impl SummaryPart {
    /// Create a plain text summary part (uses Data type for default color)
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            part_type: SegmentType::Data,
            range: None,
        }
    }

    /// Create a summary part with type and byte range for hover linking
    pub fn with_range(text: impl Into<String>, part_type: SegmentType, range: Range<usize>) -> Self {
        Self {
            text: text.into(),
            part_type,
            range: Some(range),
        }
    }
}

/// Annotated frame ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AnnotatedFrame {
    /// Protocol tag
    pub protocol: &'static str,
    /// Summary parts with semantic types
    pub summary: Vec<SummaryPart>,
    /// Decode tree rooted at the protocol frame
    pub tree: DecodeNode,
}

impl AnnotatedFrame {
    /// One-line summary text
    pub fn summary_text(&self) -> String {
        self.summary.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Rendering options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Maximum characters shown for text registers
    pub text_limit: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self { text_limit: 16 }
    }
}

/// Trait for decoded frames that can describe their display representation
pub trait FrameAnnotation {
    /// Create an annotated frame
    fn annotate(&self, options: &DisplayOptions) -> AnnotatedFrame;
}

/// A frame together with its decoded payload
#[derive(Debug, Clone)]
pub struct DecodedFrame<'a> {
    /// Frame boundaries and header
    pub frame: Frame<'a>,
    /// Typed payload
    pub payload: Payload,
}

impl FrameAnnotation for DecodedFrame<'_> {
    fn annotate(&self, options: &DisplayOptions) -> AnnotatedFrame {
        let frame = &self.frame;
        let header = frame.header;
        let base = frame.offset;
        let command = header.command;

        let mut root = DecodeNode::new(
            format!("{} ({})", PROTOCOL_NAME, command.name()),
            PROTOCOL_TAG,
            frame.range(),
            SegmentType::Protocol,
        );

        // Header (bytes 0-5)
        let mut header_node = DecodeNode::new(
            "Header",
            "5co-legacy.header",
            base..base + HEADER_LEN,
            SegmentType::Header,
        );
        header_node.push(
            DecodeNode::new("Function", "5co-legacy.fct", base..base + 2, SegmentType::Command)
                .with_value(format!("{} (0x{:04x})", command.name(), command.code())),
        );
        header_node.push(
            DecodeNode::new("Frame ID", "5co-legacy.id", base + 2..base + 4, SegmentType::Sequence)
                .with_value(header.sequence.to_string()),
        );
        header_node.push(
            DecodeNode::new(
                "Data length",
                "5co-legacy.length",
                base + 4..base + 6,
                SegmentType::Length,
            )
            .with_value(header.payload_len.to_string()),
        );
        root.push(header_node);

        // Data (only when parameters are present)
        if !frame.payload.is_empty() {
            let mut data = DecodeNode::new(
                "Data",
                "5co-legacy.data",
                frame.payload_range(),
                SegmentType::Data,
            );
            self.payload
                .annotate_into(&mut data, frame.payload_range().start, options);
            root.push(data);
        }

        // Checksum trailer
        let computed = frame.computed_checksum();
        let checksum_ok = computed == frame.checksum;
        let mut checksum = DecodeNode::new(
            "Checksum",
            "5co-legacy.checksum",
            frame.checksum_range(),
            SegmentType::Checksum,
        );
        if checksum_ok {
            checksum.value = Some(format!("0x{:04x} [correct]", frame.checksum));
        } else {
            checksum.value = Some(format!(
                "0x{:04x} [incorrect, should be 0x{:04x}]",
                frame.checksum, computed
            ));
            checksum.annotate(Annotation::new(
                AnnotationKind::ChecksumMismatch,
                format!("Bad checksum, should be 0x{:04x}", computed),
            ));
        }
        root.push(checksum);

        // Summary: "<name> ID=<seq> Len=<len>[ BAD CHECKSUM]"
        let mut summary = vec![
            SummaryPart::with_range(command.name(), SegmentType::Command, base..base + 2),
            SummaryPart::plain(" ID="),
            SummaryPart::with_range(
                header.sequence.to_string(),
                SegmentType::Sequence,
                base + 2..base + 4,
            ),
            SummaryPart::plain(" Len="),
            SummaryPart::with_range(
                header.payload_len.to_string(),
                SegmentType::Length,
                base + 4..base + 6,
            ),
        ];
        if !checksum_ok {
            summary.push(SummaryPart::with_range(
                " [BAD CHECKSUM !!]",
                SegmentType::Checksum,
                frame.checksum_range(),
            ));
        }

        AnnotatedFrame {
            protocol: PROTOCOL_TAG,
            summary,
            tree: root,
        }
    }
}

/// Decode and annotate every frame of a delivery without request context
///
/// Answers that need their request are shown as product specific. Returns
/// `None` when the delivery is not FiveCo legacy traffic.
pub fn decode_and_annotate(data: &[u8]) -> Option<Vec<AnnotatedFrame>> {
    let frames = crate::frame::split_frames(data).ok()?;
    let options = DisplayOptions::default();
    Some(
        frames
            .into_iter()
            .map(|frame| {
                let payload = crate::payload::decode_payload(
                    frame.command(),
                    frame.payload,
                    crate::payload::RequestContext::NotApplicable,
                );
                DecodedFrame { frame, payload }.annotate(&options)
            })
            .collect(),
    )
}
