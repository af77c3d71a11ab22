//! Command (function) codes
//!
//! The first 16-bit word of every frame selects the function. Requests sent
//! to a device are answered by a dedicated answer code; the pairing is fixed
//! and drives request/answer correlation.

use crate::error::ParseError;

/// FiveCo legacy function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum CommandCode {
    /// Deprecated I2C read
    I2cRead = 0x0001,
    /// Deprecated I2C write
    I2cWrite = 0x0002,
    /// Answer to [`CommandCode::I2cRead`]
    I2cReadAnswer = 0x0003,
    /// Answer to [`CommandCode::I2cWrite`]
    I2cWriteAnswer = 0x0004,
    /// Scan the I2C bus for slaves
    I2cScan = 0x0005,
    /// Addresses found by a scan
    I2cScanAnswer = 0x0006,
    /// Combined I2C read and write, with ack status
    I2cReadWriteAck = 0x0007,
    /// Answer to [`CommandCode::I2cReadWriteAck`]
    I2cReadWriteAckAnswer = 0x0008,
    /// I2C transaction failure
    I2cReadWriteAckError = 0x0009,
    /// Read a list of registers
    ReadRegister = 0x0021,
    /// Write a list of registers
    WriteRegister = 0x0022,
    /// Answer to [`CommandCode::ReadRegister`]
    ReadRegisterAnswer = 0x0023,
    /// Answer to [`CommandCode::WriteRegister`]
    WriteRegisterAnswer = 0x0024,
    /// Write registers without expecting an answer
    WriteRegisterQuiet = 0x0025,
    /// Assign an IP address to the device owning a MAC address
    EasyIpAddressConfig = 0x002A,
    /// Acknowledge of an easy IP config
    EasyIpAddressConfigAnswer = 0x002B,
    /// Erase the flash area
    FlashAreaErase = 0x0031,
    /// Upload a block into the flash area
    FlashAreaLoad = 0x0032,
    /// Status answer of flash operations
    FlashAreaAnswer = 0x0033,
}

impl TryFrom<u16> for CommandCode {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::I2cRead),
            0x0002 => Ok(Self::I2cWrite),
            0x0003 => Ok(Self::I2cReadAnswer),
            0x0004 => Ok(Self::I2cWriteAnswer),
            0x0005 => Ok(Self::I2cScan),
            0x0006 => Ok(Self::I2cScanAnswer),
            0x0007 => Ok(Self::I2cReadWriteAck),
            0x0008 => Ok(Self::I2cReadWriteAckAnswer),
            0x0009 => Ok(Self::I2cReadWriteAckError),
            0x0021 => Ok(Self::ReadRegister),
            0x0022 => Ok(Self::WriteRegister),
            0x0023 => Ok(Self::ReadRegisterAnswer),
            0x0024 => Ok(Self::WriteRegisterAnswer),
            0x0025 => Ok(Self::WriteRegisterQuiet),
            0x002A => Ok(Self::EasyIpAddressConfig),
            0x002B => Ok(Self::EasyIpAddressConfigAnswer),
            0x0031 => Ok(Self::FlashAreaErase),
            0x0032 => Ok(Self::FlashAreaLoad),
            0x0033 => Ok(Self::FlashAreaAnswer),
            _ => Err(ParseError::UnknownCommand(value)),
        }
    }
}

impl CommandCode {
    /// All known codes, in wire order
    pub const ALL: [CommandCode; 19] = [
        Self::I2cRead,
        Self::I2cWrite,
        Self::I2cReadAnswer,
        Self::I2cWriteAnswer,
        Self::I2cScan,
        Self::I2cScanAnswer,
        Self::I2cReadWriteAck,
        Self::I2cReadWriteAckAnswer,
        Self::I2cReadWriteAckError,
        Self::ReadRegister,
        Self::WriteRegister,
        Self::ReadRegisterAnswer,
        Self::WriteRegisterAnswer,
        Self::WriteRegisterQuiet,
        Self::EasyIpAddressConfig,
        Self::EasyIpAddressConfigAnswer,
        Self::FlashAreaErase,
        Self::FlashAreaLoad,
        Self::FlashAreaAnswer,
    ];

    /// Raw wire value
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Human-readable function name
    pub fn name(self) -> &'static str {
        match self {
            Self::I2cRead => "I2C Read (deprecated)",
            Self::I2cWrite => "I2C Write (deprecated)",
            Self::I2cReadAnswer => "I2C Read Answer (deprecated)",
            Self::I2cWriteAnswer => "I2C Write Answer (deprecated)",
            Self::I2cScan => "I2C Scan",
            Self::I2cScanAnswer => "I2C Scan Answer",
            Self::I2cReadWriteAck => "I2C Read and write with ack",
            Self::I2cReadWriteAckAnswer => "I2C Read and write with ack Answer",
            Self::I2cReadWriteAckError => "I2C Read and write error",
            Self::ReadRegister => "Read register",
            Self::WriteRegister => "Write register",
            Self::ReadRegisterAnswer => "Read register Answer",
            Self::WriteRegisterAnswer => "Write register Answer",
            Self::WriteRegisterQuiet => "Write register (no answer wanted)",
            Self::EasyIpAddressConfig => "Easy IP address config",
            Self::EasyIpAddressConfigAnswer => "Easy IP address config Acknowledge",
            Self::FlashAreaErase => "Flash area Erase",
            Self::FlashAreaLoad => "Flash area Upload",
            Self::FlashAreaAnswer => "Flash area Answer",
        }
    }

    /// Whether a frame with this code opens a new request/answer exchange
    ///
    /// Each request observed for the first time advances the synthetic
    /// sequence counter.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::I2cRead
                | Self::I2cWrite
                | Self::I2cScan
                | Self::I2cReadWriteAck
                | Self::ReadRegister
                | Self::WriteRegister
        )
    }

    /// Answer code a device sends back for this request
    ///
    /// `None` for answers and for commands that are not tracked.
    pub fn expected_answer(self) -> Option<CommandCode> {
        match self {
            Self::I2cRead => Some(Self::I2cReadAnswer),
            Self::I2cWrite => Some(Self::I2cWriteAnswer),
            Self::I2cScan => Some(Self::I2cScanAnswer),
            Self::I2cReadWriteAck => Some(Self::I2cReadWriteAckAnswer),
            Self::ReadRegister => Some(Self::ReadRegisterAnswer),
            Self::WriteRegister => Some(Self::WriteRegisterAnswer),
            _ => None,
        }
    }

    /// Whether this code answers one of the tracked requests
    pub fn is_answer(self) -> bool {
        matches!(
            self,
            Self::I2cReadAnswer
                | Self::I2cWriteAnswer
                | Self::I2cScanAnswer
                | Self::I2cReadWriteAckAnswer
                | Self::ReadRegisterAnswer
                | Self::WriteRegisterAnswer
        )
    }

    /// Whether decoding this answer needs the payload of its request
    ///
    /// I2C and register-read answers do not repeat the addressing
    /// information, so their structure can only be recovered by replaying
    /// the request.
    pub fn needs_request_context(self) -> bool {
        matches!(
            self,
            Self::I2cReadAnswer
                | Self::I2cWriteAnswer
                | Self::I2cReadWriteAckAnswer
                | Self::ReadRegisterAnswer
        )
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
