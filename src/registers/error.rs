// src/registers/error.rs

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// Malformed "bytes.bits" literal
    #[error("invalid address '{literal}': {reason}")]
    InvalidAddressFormat { literal: String, reason: String },

    /// A configuration parameter was applied with no override and no default
    #[error("parameter '{name}' has no default value")]
    MissingDefault { name: String },

    /// Candidate value rejected by the parameter's verification rule
    #[error("value '{value}' for parameter '{name}' does not match '{rule}'")]
    VerificationFailed {
        name: String,
        value: String,
        rule: String,
    },

    #[error("invalid verification rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// Candidate value cannot be represented by the parameter's type or width
    #[error("invalid value '{value}' for parameter '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// Parameter span runs past the end of its register
    #[error("parameter '{name}' ends at bit {end_bit}, past the register's {register_bits} bits")]
    OutOfRange {
        name: String,
        end_bit: usize,
        register_bits: usize,
    },

    /// Numeric parameter wider than a u64
    #[error("parameter '{name}' is {bits} bits wide, numbers are limited to {max}")]
    TooWide { name: String, bits: usize, max: usize },

    #[error("register value is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The owning register no longer exists
    #[error("parameter '{name}' is not attached to a live register")]
    RegisterDropped { name: String },
}

impl ParamError {
    pub(crate) fn address(literal: &str, reason: impl Into<String>) -> Self {
        ParamError::InvalidAddressFormat {
            literal: literal.to_string(),
            reason: reason.into(),
        }
    }
}
