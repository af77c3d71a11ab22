//! Payload decoding
//!
//! Payloads are first parsed into a typed [`Payload`] and then rendered into
//! the decode tree. Answers to I2C and register-read requests do not repeat
//! their addressing, so they are decoded by replaying the request payload
//! supplied through [`RequestContext`].
//!
//! Offsets stored in the typed structures are relative to the start of the
//! payload.

use std::net::Ipv4Addr;
use std::ops::Range;

use tracing::debug;

use crate::command::CommandCode;
use crate::display::{Annotation, AnnotationKind, DecodeNode, DisplayOptions, SegmentType};
use crate::registers::{hex_dump, RegisterCatalog, RegisterDef};

/// Shown where the payload structure is unknown without the request
pub const PRODUCT_SPECIFIC: &str = "Interpretation depends on product type";
/// Shown on an answer whose request was already answered
pub const DUPLICATE_ANSWER: &str = "WARNING : Answer already found ! Maybe packets ID not incremented.";
const NO_DATA_EXPECTED: &str = "ERROR: No data should be present with that packet type !!";

/// Request information available when decoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestContext<'a> {
    /// Not an answer, or correlation was not attempted
    NotApplicable,
    /// Payload of the request this answer replies to
    Matched(&'a [u8]),
    /// The matching request was already answered by an earlier frame
    AlreadyReplied,
    /// No request matches this answer
    Unmatched,
}

/// One I2C sub-record of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cTransfer {
    /// Offset of the slave address byte
    pub offset: usize,
    /// Slave address
    pub address: u8,
    /// Bytes written to the slave
    pub write: Vec<u8>,
    /// Number of bytes to read back (read variants only)
    pub read_len: Option<u8>,
}

impl I2cTransfer {
    /// Encoded size of this sub-record
    pub fn encoded_len(&self) -> usize {
        2 + self.write.len() + usize::from(self.read_len.is_some())
    }
}

/// What an I2C answer reports for one request sub-record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cOutcome {
    /// Bytes read from the slave
    Read { data: Vec<u8> },
    /// Write without read-back
    Written,
}

/// One replayed I2C sub-record of an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cResult {
    /// Slave address taken from the request
    pub address: u8,
    /// Number of bytes the request wrote
    pub written: u8,
    /// Answer bytes covered by this result
    pub range: Range<usize>,
    /// Read data or write confirmation
    pub outcome: I2cOutcome,
    /// Ack status byte and its offset (read-write-ack answers)
    pub ack: Option<(usize, u8)>,
}

/// One entry of a register-read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRead {
    /// Offset of the address byte
    pub offset: usize,
    /// Requested address
    pub address: u8,
    /// Catalog entry, `None` when the address is unknown
    pub def: Option<&'static RegisterDef>,
}

/// One register address followed by its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    /// Offset of the address byte
    pub offset: usize,
    /// Catalog entry
    pub def: &'static RegisterDef,
    /// Value bytes, always the declared size
    pub value: Vec<u8>,
}

impl RegisterValue {
    /// Register address
    pub fn address(&self) -> u8 {
        self.def.address
    }

    /// Offsets of the value bytes
    pub fn value_range(&self) -> Range<usize> {
        self.offset + 1..self.offset + 1 + self.value.len()
    }
}

/// Why structured register decoding stopped before the end of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterStop {
    /// Address missing from the catalog; remaining sizes are unknowable
    UnknownRegister { offset: usize, address: u8 },
    /// Answer does not echo the requested address
    Mismatch { offset: usize, expected: u8 },
    /// Payload ends inside the value of the register at `offset`
    Truncated { offset: usize },
    /// Answer bytes left after the last requested register
    Trailing { offset: usize },
}

/// Typed payload of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// No parameters
    Empty,
    /// I2C read, write or read-write-ack request
    I2cRequest {
        transfers: Vec<I2cTransfer>,
        /// Offset of an incomplete trailing sub-record
        truncated: Option<usize>,
    },
    /// I2C answer replayed against its request
    I2cAnswer {
        results: Vec<I2cResult>,
        /// Answer bytes not covered by the request structure
        undecoded: Option<Range<usize>>,
        /// Answer ends inside a result
        truncated: bool,
    },
    /// Addresses to scan
    I2cScan { addresses: Vec<u8> },
    /// Addresses found
    I2cScanAnswer { addresses: Vec<u8> },
    /// I2C error status
    I2cError { status: u8 },
    /// Registers to read
    ReadRegister { entries: Vec<RegisterRead> },
    /// Register write request, or register-read answer
    RegisterValues {
        values: Vec<RegisterValue>,
        stop: Option<RegisterStop>,
    },
    /// Flash block upload
    FlashLoad { offset: u32, size: u32 },
    /// Flash status text
    FlashStatus { status: String },
    /// Easy IP address assignment
    EasyIpConfig {
        mac: [u8; 6],
        ip: Ipv4Addr,
        mask: Ipv4Addr,
    },
    /// Parameters on a command that carries none
    Unexpected,
    /// Fixed-size payload of the wrong size
    WrongSize { expected: usize },
    /// Answer to an already answered request; not decoded again
    DuplicateAnswer,
    /// Structure unknown without the request
    ProductSpecific,
}

/// Decode the payload of a frame with `command`
pub fn decode_payload(command: CommandCode, data: &[u8], context: RequestContext<'_>) -> Payload {
    if data.is_empty() {
        return Payload::Empty;
    }

    match command {
        CommandCode::I2cRead | CommandCode::I2cReadWriteAck => parse_i2c_request(data, true),
        CommandCode::I2cWrite => parse_i2c_request(data, false),
        CommandCode::I2cScan => Payload::I2cScan {
            addresses: data.to_vec(),
        },
        CommandCode::I2cScanAnswer => Payload::I2cScanAnswer {
            addresses: data.to_vec(),
        },
        CommandCode::I2cReadWriteAckError => Payload::I2cError { status: data[0] },
        CommandCode::ReadRegister => Payload::ReadRegister {
            entries: parse_register_reads(data),
        },
        CommandCode::WriteRegister | CommandCode::WriteRegisterQuiet => {
            let (values, stop) = parse_register_writes(data);
            Payload::RegisterValues { values, stop }
        }
        CommandCode::I2cReadAnswer
        | CommandCode::I2cWriteAnswer
        | CommandCode::I2cReadWriteAckAnswer
        | CommandCode::ReadRegisterAnswer => match context {
            RequestContext::Matched(request) => {
                if command == CommandCode::ReadRegisterAnswer {
                    let (values, stop) = replay_register_answer(request, data);
                    Payload::RegisterValues { values, stop }
                } else {
                    replay_i2c_answer(command, request, data)
                }
            }
            RequestContext::AlreadyReplied => Payload::DuplicateAnswer,
            RequestContext::Unmatched | RequestContext::NotApplicable => Payload::ProductSpecific,
        },
        CommandCode::WriteRegisterAnswer
        | CommandCode::FlashAreaErase
        | CommandCode::EasyIpAddressConfigAnswer => Payload::Unexpected,
        CommandCode::FlashAreaLoad => {
            if data.len() < 6 {
                return Payload::WrongSize { expected: 6 };
            }
            Payload::FlashLoad {
                offset: be24(&data[0..3]),
                size: be24(&data[3..6]),
            }
        }
        CommandCode::FlashAreaAnswer => {
            // No terminator on the wire: the last byte is not part of the text
            let text = &data[..data.len() - 1];
            let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
            Payload::FlashStatus {
                status: String::from_utf8_lossy(&text[..end]).into_owned(),
            }
        }
        CommandCode::EasyIpAddressConfig => {
            if data.len() < 14 {
                return Payload::WrongSize { expected: 14 };
            }
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&data[0..6]);
            Payload::EasyIpConfig {
                mac,
                ip: Ipv4Addr::new(data[6], data[7], data[8], data[9]),
                mask: Ipv4Addr::new(data[10], data[11], data[12], data[13]),
            }
        }
    }
}

/// Parse I2C request sub-records until the payload is exhausted
fn parse_i2c_request(data: &[u8], with_read_len: bool) -> Payload {
    let mut transfers = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let start = i;
        let Some(&write_len) = data.get(i + 1) else {
            return Payload::I2cRequest {
                transfers,
                truncated: Some(start),
            };
        };
        let write_end = i + 2 + write_len as usize;
        let end = write_end + usize::from(with_read_len);
        if end > data.len() {
            return Payload::I2cRequest {
                transfers,
                truncated: Some(start),
            };
        }

        transfers.push(I2cTransfer {
            offset: start,
            address: data[i],
            write: data[i + 2..write_end].to_vec(),
            read_len: with_read_len.then(|| data[write_end]),
        });
        i = end;
    }

    Payload::I2cRequest {
        transfers,
        truncated: None,
    }
}

/// Parse a register-read request: one independent address per byte
pub fn parse_register_reads(data: &[u8]) -> Vec<RegisterRead> {
    data.iter()
        .enumerate()
        .map(|(offset, &address)| RegisterRead {
            offset,
            address,
            def: RegisterCatalog::lookup(address),
        })
        .collect()
}

/// Parse `{address, value}` tuples of a register write
///
/// Stops at the first unknown register: its size, and therefore the position
/// of every following tuple, cannot be known.
pub fn parse_register_writes(data: &[u8]) -> (Vec<RegisterValue>, Option<RegisterStop>) {
    let mut values = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let address = data[i];
        let Some(def) = RegisterCatalog::lookup(address) else {
            debug!("Register write stops at unknown register 0x{:02X} (offset {})", address, i);
            return (
                values,
                Some(RegisterStop::UnknownRegister { offset: i, address }),
            );
        };

        let value_start = i + 1;
        let value_end = value_start + def.size;
        if value_end > data.len() {
            debug!("Register write value of {} truncated (offset {})", def.name, i);
            return (values, Some(RegisterStop::Truncated { offset: i }));
        }

        values.push(RegisterValue {
            offset: i,
            def,
            value: data[value_start..value_end].to_vec(),
        });
        i = value_end;
    }

    (values, None)
}

/// Decode a register-read answer by walking the requested addresses
///
/// The answer echoes each requested address before its value.
fn replay_register_answer(
    request: &[u8],
    data: &[u8],
) -> (Vec<RegisterValue>, Option<RegisterStop>) {
    let mut values = Vec::new();
    let mut i = 0;

    for &address in request {
        if i >= data.len() {
            break;
        }

        let Some(def) = RegisterCatalog::lookup(address) else {
            return (
                values,
                Some(RegisterStop::UnknownRegister { offset: i, address }),
            );
        };
        if data[i] != address {
            return (
                values,
                Some(RegisterStop::Mismatch {
                    offset: i,
                    expected: address,
                }),
            );
        }

        let value_start = i + 1;
        let value_end = value_start + def.size;
        if value_end > data.len() {
            return (values, Some(RegisterStop::Truncated { offset: i }));
        }

        values.push(RegisterValue {
            offset: i,
            def,
            value: data[value_start..value_end].to_vec(),
        });
        i = value_end;
    }

    if i < data.len() {
        return (values, Some(RegisterStop::Trailing { offset: i }));
    }

    (values, None)
}

/// Decode an I2C answer by replaying the request's sub-records
fn replay_i2c_answer(command: CommandCode, request: &[u8], data: &[u8]) -> Payload {
    let with_read_len = command != CommandCode::I2cWriteAnswer;
    let with_ack = command == CommandCode::I2cReadWriteAckAnswer;

    let transfers = match parse_i2c_request(request, with_read_len) {
        Payload::I2cRequest { transfers, .. } => transfers,
        _ => Vec::new(),
    };

    let mut results = Vec::new();
    let mut i = 0;

    for transfer in &transfers {
        if i >= data.len() {
            break;
        }

        let written = transfer.write.len() as u8;
        let read_len = transfer.read_len.unwrap_or(0) as usize;

        let (range, outcome) = if read_len > 0 {
            let end = i + read_len;
            if end > data.len() {
                results.push(I2cResult {
                    address: transfer.address,
                    written,
                    range: i..data.len(),
                    outcome: I2cOutcome::Read {
                        data: data[i..].to_vec(),
                    },
                    ack: None,
                });
                return Payload::I2cAnswer {
                    results,
                    undecoded: None,
                    truncated: true,
                };
            }
            let read = I2cOutcome::Read {
                data: data[i..end].to_vec(),
            };
            (i..end, read)
        } else if with_ack || command == CommandCode::I2cWriteAnswer {
            (i..i, I2cOutcome::Written)
        } else {
            // Plain read answer with nothing to read back
            continue;
        };
        i = range.end;

        let ack = if with_ack {
            let Some(&status) = data.get(i) else {
                results.push(I2cResult {
                    address: transfer.address,
                    written,
                    range,
                    outcome,
                    ack: None,
                });
                return Payload::I2cAnswer {
                    results,
                    undecoded: None,
                    truncated: true,
                };
            };
            i += 1;
            Some((i - 1, status))
        } else {
            None
        };

        results.push(I2cResult {
            address: transfer.address,
            written,
            range,
            outcome,
            ack,
        });
    }

    Payload::I2cAnswer {
        results,
        undecoded: (i < data.len()).then(|| i..data.len()),
        truncated: false,
    }
}

fn be24(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

fn hex_list(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        String::new()
    } else {
        format!("{} ", hex_dump(bytes))
    }
}

fn offset_range(base: usize, range: &Range<usize>) -> Range<usize> {
    base + range.start..base + range.end
}

// ============================================================================
// Annotation
// ============================================================================

impl Payload {
    /// Render this payload into the `Data` node of a frame
    ///
    /// `base` is the absolute offset of the payload in the delivery.
    pub fn annotate_into(&self, data: &mut DecodeNode, base: usize, options: &DisplayOptions) {
        let end = data.range.end;

        match self {
            Payload::Empty => {}
            Payload::I2cRequest {
                transfers,
                truncated,
            } => {
                for t in transfers {
                    let at = base + t.offset;
                    data.push(
                        DecodeNode::new("I2C Address", "5co-legacy.i2cadd", at..at + 1, SegmentType::Address)
                            .with_value(t.address.to_string()),
                    );
                    data.push(
                        DecodeNode::new(
                            "I2C number of bytes to write",
                            "5co-legacy.i2c2write",
                            at + 1..at + 2,
                            SegmentType::Data,
                        )
                        .with_value(t.write.len().to_string()),
                    );
                    let write_end = at + 2 + t.write.len();
                    data.push(
                        DecodeNode::new("I2C bytes to write", "5co-legacy.i2cwrite", at + 2..write_end, SegmentType::Data)
                            .with_value(hex_list(&t.write)),
                    );
                    if let Some(read_len) = t.read_len {
                        data.push(
                            DecodeNode::new(
                                "I2C number of bytes to read",
                                "5co-legacy.i2c2read",
                                write_end..write_end + 1,
                                SegmentType::Data,
                            )
                            .with_value(read_len.to_string()),
                        );
                    }
                }
                if let Some(offset) = truncated {
                    data.push(
                        DecodeNode::new("Data not decoded", "5co-legacy.regreaduk", base + offset..end, SegmentType::Undecoded)
                            .with_annotation(Annotation::new(
                                AnnotationKind::Malformed,
                                "I2C sub-record truncated by end of payload",
                            )),
                    );
                }
            }
            Payload::I2cAnswer {
                results,
                undecoded,
                truncated,
            } => {
                for r in results {
                    let range = offset_range(base, &r.range);
                    match &r.outcome {
                        I2cOutcome::Read { data: read } => data.push(
                            DecodeNode::new("I2C bytes read", "5co-legacy.i2cread", range, SegmentType::Data).with_value(
                                format!(
                                    "from address {} ({} bytes written) : {}",
                                    r.address,
                                    r.written,
                                    hex_list(read)
                                ),
                            ),
                        ),
                        I2cOutcome::Written => data.push(
                            DecodeNode::new("I2C bytes write", "5co-legacy.i2writeanswer", range, SegmentType::Data)
                                .with_value(format!(
                                    "to address {} ({} bytes written)",
                                    r.address, r.written
                                )),
                        ),
                    }
                    if let Some((offset, status)) = r.ack {
                        let at = base + offset;
                        data.push(
                            DecodeNode::new("I2C ack state", "5co-legacy.i2cack", at..at + 1, SegmentType::Status)
                                .with_value(format!("0x{:02X}", status)),
                        );
                    }
                }
                if *truncated {
                    data.annotate(Annotation::new(
                        AnnotationKind::Malformed,
                        "Answer shorter than its request announces",
                    ));
                }
                if let Some(range) = undecoded {
                    data.push(
                        DecodeNode::new(
                            "Data not decoded",
                            "5co-legacy.regreaduk",
                            offset_range(base, range),
                            SegmentType::Undecoded,
                        )
                        .with_value(format!("({})", PRODUCT_SPECIFIC)),
                    );
                }
            }
            Payload::I2cScan { addresses } => data.push(
                DecodeNode::new("I2C addresses to scan", "5co-legacy.i2c2scan", base..end, SegmentType::Address)
                    .with_value(hex_list(addresses)),
            ),
            Payload::I2cScanAnswer { addresses } => data.push(
                DecodeNode::new("I2C addresses present", "5co-legacy.i2cscaned", base..end, SegmentType::Address)
                    .with_value(hex_list(addresses)),
            ),
            Payload::I2cError { status } => data.push(
                DecodeNode::new("I2C error", "5co-legacy.i2cerror", base..end, SegmentType::Status)
                    .with_value(format!("0x{:02X} ", status)),
            ),
            Payload::ReadRegister { entries } => {
                for entry in entries {
                    let at = base + entry.offset;
                    let node = match entry.def {
                        Some(def) => DecodeNode::new(
                            format!("Read {} (0x{:02X})", def.name, entry.address),
                            "5co-legacy.regread",
                            at..at + 1,
                            SegmentType::Register,
                        ),
                        None => DecodeNode::new(
                            format!("Read Register unknown (0x{:02X})", entry.address),
                            "5co-legacy.regreadunknown",
                            at..at + 1,
                            SegmentType::Undecoded,
                        )
                        .with_annotation(Annotation::new(
                            AnnotationKind::UnknownRegister,
                            format!("Register 0x{:02X} is not a common register", entry.address),
                        )),
                    };
                    data.push(node);
                }
            }
            Payload::RegisterValues { values, stop } => {
                for v in values {
                    let range = offset_range(base, &v.value_range());
                    let field = if matches!(v.def.format, crate::registers::RegisterFormat::Raw) {
                        "5co-legacy.regread"
                    } else {
                        v.def.field
                    };
                    data.push(DecodeNode::new(
                        v.def.describe(&v.value, options.text_limit),
                        field,
                        range,
                        SegmentType::Register,
                    ));
                }
                if let Some(stop) = stop {
                    let (offset, annotation) = match stop {
                        RegisterStop::UnknownRegister { offset, address } => (
                            *offset,
                            Annotation::new(
                                AnnotationKind::UnknownRegister,
                                format!("Register 0x{:02X} is not a common register", address),
                            ),
                        ),
                        RegisterStop::Mismatch { offset, expected } => (
                            *offset,
                            Annotation::new(
                                AnnotationKind::Malformed,
                                format!("Answer does not echo requested register 0x{:02X}", expected),
                            ),
                        ),
                        RegisterStop::Truncated { offset } => (
                            *offset,
                            Annotation::new(AnnotationKind::Malformed, "Register value truncated by end of payload"),
                        ),
                        RegisterStop::Trailing { offset } => (
                            *offset,
                            Annotation::new(AnnotationKind::Malformed, "Answer longer than its request"),
                        ),
                    };
                    let start = (base + offset).min(end);
                    data.push(
                        DecodeNode::new("Data not decoded", "5co-legacy.regreaduk", start..end, SegmentType::Undecoded)
                            .with_value(format!("({})", PRODUCT_SPECIFIC))
                            .with_annotation(annotation),
                    );
                }
            }
            Payload::FlashLoad { offset, size } => {
                data.value = Some(format!(
                    "({} bytes to load into flash at offset {})",
                    size, offset
                ));
                data.push(
                    DecodeNode::new("Flash offset", "5co-legacy.flash.offset", base..base + 3, SegmentType::Data)
                        .with_value(offset.to_string()),
                );
                data.push(
                    DecodeNode::new("Flash size", "5co-legacy.flash.size", base + 3..base + 6, SegmentType::Length)
                        .with_value(size.to_string()),
                );
            }
            Payload::FlashStatus { status } => {
                data.value = Some(format!("({})", status));
                data.push(
                    DecodeNode::new("Flash status", "5co-legacy.flash.status", base..end, SegmentType::Status)
                        .with_value(status.clone()),
                );
            }
            Payload::EasyIpConfig { mac, ip, mask } => {
                let mac_text = mac
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(":");
                data.push(
                    DecodeNode::new("MAC address", "5co-legacy.EasyIPMAC", base..base + 6, SegmentType::Network)
                        .with_value(mac_text),
                );
                data.push(
                    DecodeNode::new("New IP address", "5co-legacy.EasyIPIP", base + 6..base + 10, SegmentType::Network)
                        .with_value(ip.to_string()),
                );
                data.push(
                    DecodeNode::new("New subnet mask", "5co-legacy.EasyIPSM", base + 10..base + 14, SegmentType::Network)
                        .with_value(mask.to_string()),
                );
            }
            Payload::Unexpected => {
                data.value = Some(format!("({})", NO_DATA_EXPECTED));
                data.annotate(Annotation::new(AnnotationKind::UnexpectedPayload, NO_DATA_EXPECTED));
            }
            Payload::WrongSize { expected } => {
                data.annotate(Annotation::new(
                    AnnotationKind::Malformed,
                    format!("Expected {} bytes of parameters, got {}", expected, end - base),
                ));
            }
            Payload::DuplicateAnswer => {
                data.value = Some(DUPLICATE_ANSWER.to_string());
                data.annotate(Annotation::new(AnnotationKind::DuplicateAnswer, DUPLICATE_ANSWER));
            }
            Payload::ProductSpecific => {
                data.value = Some(format!("({})", PRODUCT_SPECIFIC));
                data.annotate(Annotation::new(AnnotationKind::CorrelationMiss, PRODUCT_SPECIFIC));
            }
        }
    }
}

/// Encode `{address, value}` tuples into a register-write payload
pub fn encode_register_write(entries: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (address, value) in entries {
        out.push(*address);
        out.extend_from_slice(value);
    }
    out
}
