//! Capture script parsing
//!
//! A capture script lists reassembled deliveries, one per line:
//!
//! ```text
//! # packet  flow  [endpoint]  bytes
//! 1         1     tcp:8010    0021 0000 0001 14 ffc8
//! 2         1     tcp:8010    0023 0000 0002 142d ...
//! ```
//!
//! The endpoint is optional. Bytes are hex and may be split by whitespace.
//! Everything after `#` is a comment.

use fiveco_engine::{FlowId, Transport};
use thiserror::Error;

/// Errors found while reading a capture script
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    /// Line has fewer columns than required
    #[error("line {line}: expected '<packet> <flow> [tcp:PORT|udp:PORT] <hex bytes>'")]
    MissingField { line: usize },

    /// Packet or flow column is not a number
    #[error("line {line}: invalid number '{value}'")]
    InvalidNumber { line: usize, value: String },

    /// Endpoint column is malformed
    #[error("line {line}: invalid endpoint '{value}'")]
    InvalidEndpoint { line: usize, value: String },

    /// Byte column is not valid hex
    #[error("line {line}: invalid hex: {source}")]
    InvalidHex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },
}

/// Transport and port a delivery arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub transport: Transport,
    pub port: u16,
}

/// One delivery from a capture script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDelivery {
    /// Packet number
    pub packet: u64,
    /// Flow the delivery belongs to
    pub flow: FlowId,
    /// Endpoint, when the script names one
    pub endpoint: Option<Endpoint>,
    /// Delivery bytes
    pub data: Vec<u8>,
}

/// Parse a whole capture script
pub fn parse_script(text: &str) -> Result<Vec<ScriptDelivery>, ScriptError> {
    let mut deliveries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        deliveries.push(parse_line(line, content)?);
    }

    Ok(deliveries)
}

fn parse_line(line: usize, content: &str) -> Result<ScriptDelivery, ScriptError> {
    let mut columns = content.split_whitespace().peekable();

    let packet = parse_number(line, columns.next())?;
    let flow = FlowId(parse_number(line, columns.next())?);

    let endpoint = match columns.peek() {
        Some(column) if column.contains(':') => {
            let endpoint = parse_endpoint(line, column)?;
            columns.next();
            Some(endpoint)
        }
        _ => None,
    };

    let hex_text: String = columns.collect();
    if hex_text.is_empty() {
        return Err(ScriptError::MissingField { line });
    }
    let data = hex::decode(&hex_text).map_err(|source| ScriptError::InvalidHex { line, source })?;

    Ok(ScriptDelivery {
        packet,
        flow,
        endpoint,
        data,
    })
}

fn parse_number(line: usize, column: Option<&str>) -> Result<u64, ScriptError> {
    let value = column.ok_or(ScriptError::MissingField { line })?;
    value.parse().map_err(|_| ScriptError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

fn parse_endpoint(line: usize, column: &str) -> Result<Endpoint, ScriptError> {
    let invalid = || ScriptError::InvalidEndpoint {
        line,
        value: column.to_string(),
    };

    let (transport, port) = column.split_once(':').ok_or_else(invalid)?;
    let transport = match transport.to_ascii_lowercase().as_str() {
        "tcp" => Transport::Tcp,
        "udp" => Transport::Udp,
        _ => return Err(invalid()),
    };
    let port = port.parse().map_err(|_| invalid())?;

    Ok(Endpoint { transport, port })
}
