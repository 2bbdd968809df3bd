// src/registers/address.rs
//
// "bytes.bits" addressing inside a register buffer.
//
// A register is read as a big-endian bit stream: bit 0 is the most
// significant bit of byte 0. A parameter at position "2.3" starts on the
// fourth bit of byte 2; a size of "1.4" covers twelve bits from there.

use std::fmt;
use std::str::FromStr;

use super::error::ParamError;

const SEPARATOR: char = '.';

/// Largest byte count whose bit total still fits in a usize
const MAX_BYTES: usize = (usize::MAX - 7) / 8;

/// One "bytes.bits" pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BytesBits {
    pub bytes: usize,
    /// Always in 0..=7
    pub bits: u8,
}

impl BytesBits {
    pub fn new(bytes: usize, bits: u8) -> Result<Self, ParamError> {
        if bits > 7 {
            return Err(ParamError::address(
                &format!("{}{}{}", bytes, SEPARATOR, bits),
                format!("bit component {} is outside 0..=7", bits),
            ));
        }
        if bytes > MAX_BYTES {
            return Err(ParamError::address(
                &format!("{}{}{}", bytes, SEPARATOR, bits),
                "span overflows",
            ));
        }
        Ok(BytesBits { bytes, bits })
    }

    /// Total number of bits this pair denotes. Cannot overflow: byte counts
    /// are bounded at construction.
    pub fn total_bits(&self) -> usize {
        self.bytes * 8 + self.bits as usize
    }
}

impl FromStr for BytesBits {
    type Err = ParamError;

    fn from_str(literal: &str) -> Result<Self, Self::Err> {
        let (bytes, bits) = literal
            .split_once(SEPARATOR)
            .ok_or_else(|| ParamError::address(literal, "expected <bytes>.<bits>"))?;

        let bytes = parse_component(literal, bytes)?;
        let bits = parse_component(literal, bits)?;
        if bits > 7 {
            return Err(ParamError::address(
                literal,
                format!("bit component {} is outside 0..=7", bits),
            ));
        }
        if bytes > MAX_BYTES {
            return Err(ParamError::address(literal, "span overflows"));
        }

        Ok(BytesBits {
            bytes,
            bits: bits as u8,
        })
    }
}

fn parse_component(literal: &str, part: &str) -> Result<usize, ParamError> {
    // usize::from_str accepts a leading '+', which is not part of the notation
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamError::address(
            literal,
            format!("'{}' is not a non-negative integer", part),
        ));
    }
    part.parse()
        .map_err(|e| ParamError::address(literal, format!("'{}': {}", part, e)))
}

impl fmt::Display for BytesBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bytes, SEPARATOR, self.bits)
    }
}

/// Position and size of a parameter within its register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpec {
    pub position: BytesBits,
    pub size: BytesBits,
}

impl AddressSpec {
    /// Parse a position literal and a size literal. A zero-width size is rejected.
    pub fn parse(position: &str, size: &str) -> Result<Self, ParamError> {
        let position: BytesBits = position.parse()?;
        let size_spec: BytesBits = size.parse()?;
        if size_spec.total_bits() == 0 {
            return Err(ParamError::address(size, "size must cover at least one bit"));
        }
        if position.total_bits().checked_add(size_spec.total_bits()).is_none() {
            return Err(ParamError::address(size, "span overflows"));
        }
        Ok(AddressSpec {
            position,
            size: size_spec,
        })
    }

    pub fn byte_position(&self) -> usize {
        self.position.bytes
    }

    pub fn bit_offset(&self) -> u8 {
        self.position.bits
    }

    pub fn byte_size(&self) -> usize {
        self.size.bytes
    }

    pub fn bit_size(&self) -> u8 {
        self.size.bits
    }

    /// First bit covered, counted from the MSB of byte 0
    pub fn start_bit(&self) -> usize {
        self.position.total_bits()
    }

    pub fn bit_len(&self) -> usize {
        self.size.total_bits()
    }

    /// One past the last bit covered. Bounded by `parse`.
    pub fn end_bit(&self) -> usize {
        self.start_bit() + self.bit_len()
    }

    /// True when the span fits inside a register of `register_len` bytes
    pub fn fits(&self, register_len: usize) -> bool {
        register_len
            .checked_mul(8)
            .map_or(true, |register_bits| self.end_bit() <= register_bits)
    }

    /// True when the span starts and ends on byte boundaries
    pub fn is_byte_aligned(&self) -> bool {
        self.position.bits == 0 && self.size.bits == 0
    }
}
