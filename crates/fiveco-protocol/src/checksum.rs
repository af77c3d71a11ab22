//! Frame checksum
//!
//! An IP-like ones-complement sum over header and payload. Bytes are taken
//! in pairs, the first of each pair in the high half of a 16-bit word; every
//! byte is inverted before it is summed. An odd trailing byte is paired with
//! an inverted zero (0xFF). The 32-bit accumulator is folded twice into
//! 16 bits.

/// Compute the checksum over `bytes` (header followed by payload)
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut high = true;

    for &byte in bytes {
        if high {
            sum = sum.wrapping_add(((byte as u32) << 8) ^ 0xFF00);
        } else {
            sum = sum.wrapping_add((byte as u32) ^ 0x00FF);
        }
        high = !high;
    }

    if !high {
        sum = sum.wrapping_add(0xFF);
    }

    let folded = (sum >> 16) + (sum & 0xFFFF);
    let folded = (folded >> 16) + (folded & 0xFFFF);
    folded as u16
}

/// Check a received trailer against the computed checksum
pub fn verify(bytes: &[u8], trailer: u16) -> bool {
    checksum(bytes) == trailer
}
