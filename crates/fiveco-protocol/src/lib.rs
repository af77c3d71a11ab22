//! FiveCo Legacy Protocol Library
//!
//! This crate provides parsing and encoding for FiveCo's legacy register
//! access protocol, spoken by FiveCo devices over TCP (ports 8010 and 8004)
//! and UDP (port 7010).
//!
//! # Architecture
//!
//! - [`frame`]: splits a transport delivery into frames, all or nothing
//! - [`checksum`]: the inverted-byte ones-complement trailer
//! - [`command`]: function codes and their request/answer pairing
//! - [`registers`]: the catalog of registers common to all products
//! - [`payload`]: typed payload decoding, with request replay for answers
//! - [`display`]: decode tree and one-line summary per frame
//!
//! This crate is stateless. Answers to I2C and register-read requests can
//! only be decoded with their request payload; pairing answers with requests
//! is the job of the `fiveco-engine` crate.
//!
//! # Example
//!
//! ```rust
//! use fiveco_protocol::{decode_and_annotate, encode_frame, CommandCode};
//!
//! let bytes = encode_frame(CommandCode::ReadRegister, 1, &[0x14]);
//! let frames = decode_and_annotate(&bytes).unwrap();
//! assert_eq!(frames[0].summary_text(), "Read register ID=1 Len=1");
//! ```

pub mod checksum;
pub mod command;
pub mod display;
pub mod error;
pub mod frame;
pub mod payload;
pub mod registers;

pub use command::CommandCode;
pub use display::{
    decode_and_annotate, AnnotatedFrame, Annotation, AnnotationKind, DecodeNode, DecodedFrame,
    DisplayOptions, FrameAnnotation, SegmentType, Severity, SummaryPart, PROTOCOL_NAME,
    PROTOCOL_TAG,
};
pub use error::ParseError;
pub use frame::{encode_frame, split_frames, Frame, FrameHeader, FrameReader, MIN_FRAME_LEN};
pub use payload::{
    decode_payload, encode_register_write, Payload, RequestContext, DUPLICATE_ANSWER,
    PRODUCT_SPECIFIC,
};
pub use registers::{RegisterCatalog, RegisterDef};
