// Variable-length quantities: 7-bit groups, most significant first,
// high bit set on every byte but the last.

use crate::error::SerializeError;

/// Largest encodable value (four 7-bit groups).
pub const MAX: u64 = 0x0FFF_FFFF;

/// Append the VLQ encoding of `value` to `out`. Zero encodes as a
/// single 0x00 byte.
pub fn encode(value: u64, out: &mut Vec<u8>) -> Result<(), SerializeError> {
    if value > MAX {
        return Err(SerializeError::VarinumOverflow(value));
    }
    let mut buffer = value & 0x7F;
    let mut v = value >> 7;
    while v > 0 {
        buffer = (buffer << 8) | 0x80 | (v & 0x7F);
        v >>= 7;
    }
    loop {
        out.push((buffer & 0xFF) as u8);
        if buffer & 0x80 != 0 {
            buffer >>= 8;
        } else {
            break;
        }
    }
    Ok(())
}

/// Decode a VLQ starting at `bytes[0]`. Returns the value and the
/// number of bytes consumed, or `None` if the input ends inside a
/// quantity or runs past four groups.
pub fn decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().take(4).enumerate() {
        value = (value << 7) | u64::from(b & 0x7F);
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Number of bytes `encode` would write for `value`.
pub fn encoded_len(value: u64) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x001F_FFFF => 3,
        _ => 4,
    }
}
