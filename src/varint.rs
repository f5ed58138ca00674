//! Variable-length unsigned integers (LEB128)
//!
//! 7 bits per byte, least significant group first, high bit set on every
//! byte except the last.

/// Longest valid encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` to `buf`
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Number of bytes `put_varint` writes for `value`
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read one varint from the front of `input`, advancing it past the bytes read
///
/// Returns `None` if the input ends mid-value or the encoding does not fit
/// in 64 bits. `input` is left untouched in that case.
pub fn get_varint(input: &mut &[u8]) -> Option<u64> {
    let mut result = 0u64;

    for (i, &byte) in input.iter().enumerate().take(MAX_VARINT_LEN) {
        let group = (byte & 0x7F) as u64;
        // The tenth byte may only carry the single remaining bit
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return None;
        }
        result |= group << (7 * i);
        if byte & 0x80 == 0 {
            *input = &input[i + 1..];
            return Some(result);
        }
    }

    None
}
