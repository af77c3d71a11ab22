//! Frame boundaries
//!
//! # Frame Format
//! ```text
//! [command:2] [sequence:2] [length:2] [payload:length] [checksum:2]
//! ```
//!
//! All fields are big-endian. The sequence field is set by the sender and is
//! frequently left at zero, so it cannot be trusted to pair answers with
//! requests. Several frames may be coalesced in one transport delivery.

use std::ops::Range;

use crate::checksum;
use crate::command::CommandCode;
use crate::error::ParseError;

/// Header length (command, sequence and length words)
pub const HEADER_LEN: usize = 6;
/// Trailer length (checksum word)
pub const CHECKSUM_LEN: usize = 2;
/// Smallest possible frame (empty payload)
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameHeader {
    /// Function code
    pub command: CommandCode,
    /// Sequence id as sent on the wire (unreliable)
    pub sequence: u16,
    /// Payload length in bytes
    pub payload_len: u16,
}

impl FrameHeader {
    /// Parse a header at the start of `data`
    ///
    /// `data` is everything left in the delivery from this frame on; the
    /// declared length is checked against it.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(ParseError::TooShort {
                remaining: data.len(),
            });
        }

        let raw_command = read_u16(data, 0);
        let command = CommandCode::try_from(raw_command)?;
        let sequence = read_u16(data, 2);
        let payload_len = read_u16(data, 4);

        let available = data.len() - MIN_FRAME_LEN;
        if payload_len as usize > available {
            return Err(ParseError::LengthOverrun {
                declared: payload_len as usize,
                available,
            });
        }

        Ok(Self {
            command,
            sequence,
            payload_len,
        })
    }

    /// Total frame length including header and checksum
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize + CHECKSUM_LEN
    }
}

/// One frame located inside a delivery buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Byte offset of the frame inside the delivery
    pub offset: usize,
    /// Parsed header
    pub header: FrameHeader,
    /// Payload bytes
    pub payload: &'a [u8],
    /// Received checksum trailer
    pub checksum: u16,
    raw: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Function code of this frame
    pub fn command(&self) -> CommandCode {
        self.header.command
    }

    /// Complete frame bytes
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Always false: a frame carries at least its header and checksum
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Byte range of the whole frame in the delivery
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.raw.len()
    }

    /// Byte range of the payload in the delivery
    pub fn payload_range(&self) -> Range<usize> {
        let start = self.offset + HEADER_LEN;
        start..start + self.payload.len()
    }

    /// Byte range of the checksum trailer in the delivery
    pub fn checksum_range(&self) -> Range<usize> {
        let start = self.offset + HEADER_LEN + self.payload.len();
        start..start + CHECKSUM_LEN
    }

    /// Checksum computed over header and payload
    pub fn computed_checksum(&self) -> u16 {
        checksum::checksum(&self.raw[..HEADER_LEN + self.payload.len()])
    }

    /// Whether the received trailer matches the computed checksum
    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum() == self.checksum
    }
}

/// Walks a delivery buffer frame by frame
///
/// Yields `Err` once on the first malformed boundary and then stops.
pub struct FrameReader<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    /// Create a reader over one delivery
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next frame to be read
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<Frame<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.offset..];
        let header = match FrameHeader::parse(rest) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("Rejecting delivery at offset {}: {}", self.offset, e);
                self.failed = true;
                return Some(Err(e));
            }
        };

        let len = header.frame_len();
        let raw = &rest[..len];
        let payload = &raw[HEADER_LEN..HEADER_LEN + header.payload_len as usize];
        let checksum = read_u16(raw, len - CHECKSUM_LEN);

        let frame = Frame {
            offset: self.offset,
            header,
            payload,
            checksum,
            raw,
        };
        self.offset += len;
        Some(Ok(frame))
    }
}

/// Split a delivery into frames, all or nothing
///
/// Every boundary is validated before anything is returned, so a delivery
/// with one bad frame yields no frames at all.
pub fn split_frames(data: &[u8]) -> Result<Vec<Frame<'_>>, ParseError> {
    if data.is_empty() {
        return Err(ParseError::TooShort { remaining: 0 });
    }
    FrameReader::new(data).collect()
}

/// Build a complete frame, computing its checksum
pub fn encode_frame(command: CommandCode, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.extend_from_slice(&command.code().to_be_bytes());
    frame.extend_from_slice(&sequence.to_be_bytes());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    let sum = checksum::checksum(&frame);
    frame.extend_from_slice(&sum.to_be_bytes());
    frame
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}
