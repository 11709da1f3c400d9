//! VLQ Module
//!
//! Base64 variable length quantities as used by the `mappings` field of a
//! version 3 source map.
//!
//! Each base64 digit carries six bits: five of value and a continuation
//! bit. The low bit of the first digit is the sign.

use crate::error::SourceMapError;

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: u64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: u64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: u64 = VLQ_BASE;
/// Shift of the thirteenth digit, the last one a 65 bit quantity needs.
const MAX_SHIFT: u32 = 12 * VLQ_BASE_SHIFT;

pub const B64_DIGITS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn to_base64_digit(value: u64) -> char {
    B64_DIGITS[(value & 63) as usize] as char
}

fn from_base64_digit(ch: char) -> Option<u64> {
    let value = match ch {
        'A'..='Z' => ch as u32 - 'A' as u32,
        'a'..='z' => ch as u32 - 'a' as u32 + 26,
        '0'..='9' => ch as u32 - '0' as u32 + 52,
        '+' => 62,
        '/' => 63,
        _ => return None,
    };
    Some(value as u64)
}

/// Encode a single signed number. The whole `i64` range is accepted: the
/// sign bit pushes `i64::MIN` to a 65 bit quantity.
pub fn encode_vlq(value: i64) -> String {
    let mut vlq = ((value.unsigned_abs() as u128) << 1) | (value < 0) as u128;

    let mut out = String::new();
    loop {
        let mut digit = (vlq & VLQ_BASE_MASK as u128) as u64;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(to_base64_digit(digit));

        if vlq == 0 {
            break;
        }
    }

    out
}

/// Decode every number packed into `segment`. A value that does not fit an
/// `i64` is an error, never truncated.
pub fn decode_vlqs(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let mut values = Vec::new();
    let mut vlq: u128 = 0;
    let mut shift: u32 = 0;

    for ch in segment.chars() {
        let digit = from_base64_digit(ch)
            .ok_or_else(|| SourceMapError::decode(segment, format!("invalid base64 character '{}'", ch)))?;
        if shift > MAX_SHIFT {
            return Err(SourceMapError::decode(segment, "vlq value out of range"));
        }
        vlq |= ((digit & VLQ_BASE_MASK) as u128) << shift;
        shift += VLQ_BASE_SHIFT;

        if digit & VLQ_CONTINUATION_BIT == 0 {
            let magnitude = (vlq >> 1) as i128;
            let value = if vlq & 1 == 1 { -magnitude } else { magnitude };
            let value = i64::try_from(value).map_err(|_| SourceMapError::decode(segment, "vlq value out of range"))?;
            values.push(value);
            vlq = 0;
            shift = 0;
        }
    }

    if vlq != 0 || shift != 0 {
        return Err(SourceMapError::decode(segment, "leftover vlq/shift in vlq decode"));
    }

    Ok(values)
}

/// Standard padded base64 of the UTF-8 bytes of `value`.
pub fn to_base64_string(value: &str) -> String {
    let encoded = value.as_bytes();
    let mut b64 = String::with_capacity(encoded.len().div_ceil(3) * 4);

    for chunk in encoded.chunks(3) {
        let i1 = chunk[0] as u64;
        let i2 = chunk.get(1).map(|b| *b as u64);
        let i3 = chunk.get(2).map(|b| *b as u64);

        b64.push(to_base64_digit(i1 >> 2));
        b64.push(to_base64_digit(((i1 & 3) << 4) | (i2.unwrap_or(0) >> 4)));
        match i2 {
            Some(i2) => b64.push(to_base64_digit(((i2 & 15) << 2) | (i3.unwrap_or(0) >> 6))),
            None => b64.push('='),
        }
        match i3 {
            Some(i3) => b64.push(to_base64_digit(i3 & 63)),
            None => b64.push('='),
        }
    }

    b64
}
