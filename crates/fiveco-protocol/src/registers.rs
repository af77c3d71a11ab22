//! Register catalog
//!
//! Registers common to every FiveCo product. Product-specific registers are
//! not listed; their size is unknown, which is why decoding a write stops at
//! the first register missing from this table.

/// Named value formatters for numeric registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Product type and model, two 16-bit halves
    TypeModel,
    /// Firmware version, or hardware and firmware versions
    Version,
    /// 48-bit Ethernet MAC address
    MacAddress,
    /// IPv4 address
    Ipv4Address,
    /// IPv4 subnet mask
    Ipv4Mask,
    /// TCP inactivity timeout in seconds
    Timeout,
}

impl Formatter {
    /// Render a big-endian numeric value
    pub fn format(self, value: u64) -> String {
        match self {
            Self::TypeModel => format_type_model(value as u32),
            Self::Version => format_version(value as u32),
            Self::MacAddress => format_mac(value),
            Self::Ipv4Address | Self::Ipv4Mask => format_ipv4(value as u32),
            Self::Timeout => format_timeout(value as u32),
        }
    }
}

/// How a register's value bytes are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFormat {
    /// Numeric value passed through a formatter
    Custom(Formatter),
    /// Fixed-size text, shown up to a bounded prefix
    Text,
    /// Hex dump of the value bytes
    Raw,
    /// Function register without value bytes
    NoPayload,
}

/// A known register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDef {
    /// Register address
    pub address: u8,
    /// Value size in bytes
    pub size: usize,
    /// Display name
    pub name: &'static str,
    /// Filter-style field name
    pub field: &'static str,
    /// Rendering strategy
    pub format: RegisterFormat,
}

impl RegisterDef {
    /// Render `value` (exactly `size` bytes) for display
    ///
    /// Text registers are cut at the first NUL and at `text_limit` characters.
    pub fn render_value(&self, value: &[u8], text_limit: usize) -> String {
        match self.format {
            RegisterFormat::Custom(formatter) => formatter.format(be_value(value)),
            RegisterFormat::Text => {
                let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
                String::from_utf8_lossy(&value[..end])
                    .chars()
                    .take(text_limit)
                    .collect()
            }
            RegisterFormat::Raw => hex_dump(value),
            RegisterFormat::NoPayload => String::new(),
        }
    }

    /// Line shown for this register and its value
    pub fn describe(&self, value: &[u8], text_limit: usize) -> String {
        match self.format {
            RegisterFormat::Custom(_) | RegisterFormat::Text => {
                format!("{}: {}", self.name, self.render_value(value, text_limit))
            }
            RegisterFormat::Raw => format!(
                "{} (Add: 0x{:02X}, Size: {} bytes): {}",
                self.name,
                self.address,
                self.size,
                self.render_value(value, text_limit)
            ),
            RegisterFormat::NoPayload => self.name.to_string(),
        }
    }
}

const fn marker(address: u8, name: &'static str, field: &'static str) -> RegisterDef {
    RegisterDef {
        address,
        size: 0,
        name,
        field,
        format: RegisterFormat::NoPayload,
    }
}

/// Registers indexed by address
static REGISTERS: &[RegisterDef] = &[
    RegisterDef {
        address: 0x00,
        size: 4,
        name: "Register Type/Model",
        field: "5co-legacy.RegTypeModel",
        format: RegisterFormat::Custom(Formatter::TypeModel),
    },
    RegisterDef {
        address: 0x01,
        size: 4,
        name: "Register Version",
        field: "5co-legacy.RegVersion",
        format: RegisterFormat::Custom(Formatter::Version),
    },
    marker(0x02, "Function Reset device", "5co-legacy.RegReset"),
    marker(0x03, "Function Save user parameters", "5co-legacy.RegSave"),
    marker(0x04, "Function Restore user parameters", "5co-legacy.RegRestore"),
    marker(0x05, "Function Restore factory parameters", "5co-legacy.RegRestoreFact"),
    marker(0x06, "Function Save factory parameters", "5co-legacy.SaveFact"),
    marker(0x07, "Register unknown", "5co-legacy.RegUnknown07"),
    marker(0x08, "Register unknown", "5co-legacy.RegUnknown08"),
    marker(0x09, "Register unknown", "5co-legacy.RegUnknown09"),
    marker(0x0A, "Register unknown", "5co-legacy.RegUnknown0A"),
    marker(0x0B, "Register unknown", "5co-legacy.RegUnknown0B"),
    marker(0x0C, "Register unknown", "5co-legacy.RegUnknown0C"),
    marker(0x0D, "Register unknown", "5co-legacy.RegUnknown0D"),
    marker(0x0E, "Register unknown", "5co-legacy.RegUnknown0E"),
    marker(0x0F, "Register unknown", "5co-legacy.RegUnknown0F"),
    RegisterDef {
        address: 0x10,
        size: 4,
        name: "Register Communication options",
        field: "5co-legacy.RegComOption",
        format: RegisterFormat::Raw,
    },
    RegisterDef {
        address: 0x11,
        size: 6,
        name: "Register Ethernet MAC Address",
        field: "5co-legacy.RegMAC",
        format: RegisterFormat::Custom(Formatter::MacAddress),
    },
    RegisterDef {
        address: 0x12,
        size: 4,
        name: "Register IP Address",
        field: "5co-legacy.RegIPAdd",
        format: RegisterFormat::Custom(Formatter::Ipv4Address),
    },
    RegisterDef {
        address: 0x13,
        size: 4,
        name: "Register IP Mask",
        field: "5co-legacy.RegIPMask",
        format: RegisterFormat::Custom(Formatter::Ipv4Mask),
    },
    RegisterDef {
        address: 0x14,
        size: 1,
        name: "Register TCP Timeout",
        field: "5co-legacy.RegTCPTimeout",
        format: RegisterFormat::Custom(Formatter::Timeout),
    },
    RegisterDef {
        address: 0x15,
        size: 16,
        name: "Register Module name",
        field: "5co-legacy.RegName",
        format: RegisterFormat::Text,
    },
];

/// Lookup interface to the register table
pub struct RegisterCatalog;

impl RegisterCatalog {
    /// Find a register by address
    pub fn lookup(address: u8) -> Option<&'static RegisterDef> {
        REGISTERS
            .get(address as usize)
            .filter(|def| def.address == address)
    }

    /// Whether `address` is a known register
    pub fn contains(address: u8) -> bool {
        Self::lookup(address).is_some()
    }

    /// Iterate over all known registers
    pub fn iter() -> impl Iterator<Item = &'static RegisterDef> {
        REGISTERS.iter()
    }
}

// ============================================================================
// Format Helpers
// ============================================================================

/// Big-endian integer value of up to eight bytes
pub fn be_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Space-separated `0xNN` dump
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format the type/model register: `high.low (HHHH.LLLL)`
pub fn format_type_model(value: u32) -> String {
    let high = (value >> 16) & 0xFFFF;
    let low = value & 0xFFFF;
    format!("{}.{} ({:04X}.{:04X})", high, low, high, low)
}

/// Format the version register
///
/// With a zero top byte only a firmware version is encoded in the two 16-bit
/// halves; otherwise each byte is a hardware or firmware version digit.
pub fn format_version(value: u32) -> String {
    if value & 0xFF00_0000 == 0 {
        format!("FW: {}.{}", (value >> 16) & 0xFFFF, value & 0xFFFF)
    } else {
        format!(
            "HW: {}.{} / FW: {}.{}",
            (value >> 24) & 0xFF,
            (value >> 16) & 0xFF,
            (value >> 8) & 0xFF,
            value & 0xFF
        )
    }
}

/// Format a 48-bit MAC address as `AA-BB-CC-DD-EE-FF`
pub fn format_mac(value: u64) -> String {
    let bytes = value.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}

/// Format an IPv4 address or mask as a dotted quad
pub fn format_ipv4(value: u32) -> String {
    std::net::Ipv4Addr::from(value).to_string()
}

/// Format the TCP timeout register
pub fn format_timeout(value: u32) -> String {
    if value == 0 {
        "Disabled".to_string()
    } else {
        format!("{} secondes", value)
    }
}
