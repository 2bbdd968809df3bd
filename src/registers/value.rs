// src/registers/value.rs
//
// Typed parameter values and their bit-level packing into register buffers.

use std::fmt;

use super::ParameterType;

/// Widest NUMBER parameter supported
pub const MAX_NUMBER_BITS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Number(u64),
    String(String),
    Binary(Vec<u8>),
}

impl ParamValue {
    pub fn kind(&self) -> ParameterType {
        match self {
            ParamValue::Number(_) => ParameterType::Number,
            ParamValue::String(_) => ParameterType::String,
            ParamValue::Binary(_) => ParameterType::Binary,
        }
    }

    /// Parse text for a parameter of `kind` spanning `bit_len` bits.
    ///
    /// NUMBER accepts decimal or `0x` hex, STRING takes the text as is, BINARY
    /// takes hex digits. The error is a human-readable reason.
    pub fn parse(kind: ParameterType, text: &str, bit_len: usize) -> Result<Self, String> {
        let capacity = byte_len(bit_len);
        let value = match kind {
            ParameterType::Number => {
                // from_str_radix on its own would take a leading '+'
                let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => (hex, 16),
                    None => (text, 10),
                };
                if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                    return Err(format!("'{}' is not an unsigned number", text));
                }
                let n = u64::from_str_radix(digits, radix).map_err(|e| format!("not a number: {}", e))?;
                if bit_len < 64 && n >> bit_len != 0 {
                    return Err(format!("{} does not fit in {} bits", n, bit_len));
                }
                ParamValue::Number(n)
            }
            ParameterType::String => {
                if text.len() > capacity {
                    return Err(format!("{} bytes of text, room for {}", text.len(), capacity));
                }
                ParamValue::String(text.to_string())
            }
            ParameterType::Binary => {
                let bytes = hex::decode(text).map_err(|e| format!("not hex: {}", e))?;
                if bytes.len() > capacity {
                    return Err(format!("{} bytes of data, room for {}", bytes.len(), capacity));
                }
                let pad = (8 - bit_len % 8) % 8;
                if pad > 0 && bytes.len() == capacity && bytes[0] >> (8 - pad) != 0 {
                    return Err(format!("{} does not fit in {} bits", text, bit_len));
                }
                ParamValue::Binary(bytes)
            }
        };
        Ok(value)
    }

    /// Right-aligned big-endian bytes for a `bit_len`-bit field
    pub(crate) fn to_field(&self, bit_len: usize) -> Vec<u8> {
        let len = byte_len(bit_len);
        match self {
            ParamValue::Number(n) => {
                let be = n.to_be_bytes();
                let mut out = vec![0u8; len];
                let take = len.min(be.len());
                out[len - take..].copy_from_slice(&be[be.len() - take..]);
                out
            }
            ParamValue::String(s) => {
                let mut out = s.as_bytes().to_vec();
                out.resize(len, 0);
                out
            }
            ParamValue::Binary(b) => {
                let mut out = vec![0u8; len.saturating_sub(b.len())];
                out.extend_from_slice(b);
                out
            }
        }
    }

    /// Inverse of `to_field`
    pub(crate) fn from_field(kind: ParameterType, field: Vec<u8>) -> Self {
        match kind {
            ParameterType::Number => {
                ParamValue::Number(field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
            }
            ParameterType::String => {
                let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                ParamValue::String(String::from_utf8_lossy(&field[..end]).into_owned())
            }
            ParameterType::Binary => ParamValue::Binary(field),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Binary(b) => f.write_str(&hex::encode_upper(b)),
        }
    }
}

// ============================================================================
// Bit packing
// ============================================================================

fn byte_len(bit_len: usize) -> usize {
    bit_len / 8 + usize::from(bit_len % 8 != 0)
}

fn get_bit(buf: &[u8], index: usize) -> bool {
    buf[index / 8] & (0x80 >> (index % 8)) != 0
}

fn put_bit(buf: &mut [u8], index: usize, set: bool) {
    let mask = 0x80 >> (index % 8);
    if set {
        buf[index / 8] |= mask;
    } else {
        buf[index / 8] &= !mask;
    }
}

/// Copy `bit_len` bits starting at `start` out of `buf`, right-aligned.
/// Caller guarantees the span lies inside `buf`.
pub(crate) fn extract_bits(buf: &[u8], start: usize, bit_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; byte_len(bit_len)];
    let pad = out.len() * 8 - bit_len;
    for i in 0..bit_len {
        put_bit(&mut out, pad + i, get_bit(buf, start + i));
    }
    out
}

/// Write the low `bit_len` bits of right-aligned `field` into `buf` at `start`.
/// Bits of `buf` outside the span are untouched.
pub(crate) fn insert_bits(buf: &mut [u8], start: usize, bit_len: usize, field: &[u8]) {
    let pad = field.len() * 8 - bit_len;
    for i in 0..bit_len {
        put_bit(buf, start + i, get_bit(field, pad + i));
    }
}
