// src/registers/parameter.rs
//
// Parameters (endpoints): named, typed values at a fixed bit span of a register.

use std::sync::{Arc, Weak};

use regex::Regex;

use super::address::{AddressSpec, BytesBits};
use super::error::ParamError;
use super::register::Register;
use super::value::{extract_bits, insert_bits, ParamValue, MAX_NUMBER_BITS};
use super::ParameterType;

/// Compiled verification rule. The pattern must match the whole candidate.
#[derive(Debug, Clone)]
pub struct Verification {
    rule: String,
    pattern: Regex,
}

impl Verification {
    pub fn new(rule: &str) -> Result<Self, ParamError> {
        let pattern = Regex::new(&format!("^(?:{})$", rule)).map_err(|e| ParamError::InvalidRule {
            rule: rule.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Verification {
            rule: rule.to_string(),
            pattern,
        })
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        self.pattern.is_match(candidate)
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    register: Weak<Register>,
    kind: ParameterType,
    name: String,
    address: AddressSpec,
    default: Option<String>,
    verification: Option<Verification>,
}

impl Parameter {
    /// New parameter, not yet attached to a register.
    /// `position` and `size` are "bytes.bits" literals.
    pub fn new(
        kind: ParameterType,
        name: impl Into<String>,
        position: &str,
        size: &str,
    ) -> Result<Self, ParamError> {
        let name = name.into();
        let address = AddressSpec::parse(position, size)?;
        // Text is stored byte by byte; a ragged tail would clip a character
        if kind == ParameterType::String && address.size.bits != 0 {
            return Err(ParamError::address(
                size,
                "string parameters must cover whole bytes",
            ));
        }
        if kind == ParameterType::Number && address.bit_len() > MAX_NUMBER_BITS {
            return Err(ParamError::TooWide {
                name,
                bits: address.bit_len(),
                max: MAX_NUMBER_BITS,
            });
        }
        Ok(Parameter {
            register: Weak::new(),
            kind,
            name,
            address,
            default: None,
            verification: None,
        })
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_verification(mut self, rule: &str) -> Result<Self, ParamError> {
        self.verification = Some(Verification::new(rule)?);
        Ok(self)
    }

    pub(crate) fn bind(mut self, register: &Weak<Register>) -> Self {
        self.register = register.clone();
        self
    }

    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &AddressSpec {
        &self.address
    }

    pub fn position(&self) -> BytesBits {
        self.address.position
    }

    pub fn size(&self) -> BytesBits {
        self.address.size
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn verification_rule(&self) -> Option<&str> {
        self.verification.as_ref().map(Verification::rule)
    }

    /// Owning register, if it is still alive
    pub fn register(&self) -> Option<Arc<Register>> {
        self.register.upgrade()
    }

    /// Check `candidate` against the verification rule, if any
    pub fn verify(&self, candidate: &str) -> Result<(), ParamError> {
        match &self.verification {
            Some(v) if !v.accepts(candidate) => Err(ParamError::VerificationFailed {
                name: self.name.clone(),
                value: candidate.to_string(),
                rule: v.rule().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Verify and convert `text` into a typed value. Touches no state.
    pub fn parse_value(&self, text: &str) -> Result<ParamValue, ParamError> {
        self.verify(text)?;
        ParamValue::parse(self.kind, text, self.address.bit_len()).map_err(|reason| {
            ParamError::InvalidValue {
                name: self.name.clone(),
                value: text.to_string(),
                reason,
            }
        })
    }

    /// Decode this parameter out of a register buffer
    pub fn decode(&self, register_value: &[u8]) -> Result<ParamValue, ParamError> {
        self.check_span(register_value.len())?;
        let field = extract_bits(register_value, self.address.start_bit(), self.address.bit_len());
        Ok(ParamValue::from_field(self.kind, field))
    }

    /// Encode `value` into a register buffer. Bits outside the span are kept.
    pub fn encode_into(&self, register_value: &mut [u8], value: &ParamValue) -> Result<(), ParamError> {
        self.check_span(register_value.len())?;
        if value.kind() != self.kind {
            return Err(ParamError::InvalidValue {
                name: self.name.clone(),
                value: value.to_string(),
                reason: format!("expected a {} value", self.kind),
            });
        }
        let field = value.to_field(self.address.bit_len());
        insert_bits(
            register_value,
            self.address.start_bit(),
            self.address.bit_len(),
            &field,
        );
        Ok(())
    }

    /// Current value, read from the owning register
    pub fn value(&self) -> Result<ParamValue, ParamError> {
        let register = self.owner()?;
        self.decode(&register.value())
    }

    /// Verify `text`, then write it into the owning register.
    /// On any error the register is left as it was.
    pub fn set_value(&self, text: &str) -> Result<ParamValue, ParamError> {
        let value = self.parse_value(text)?;
        self.store(&value)?;
        Ok(value)
    }

    pub(crate) fn store(&self, value: &ParamValue) -> Result<(), ParamError> {
        let register = self.owner()?;
        register.modify(|buf| self.encode_into(buf, value))
    }

    fn owner(&self) -> Result<Arc<Register>, ParamError> {
        self.register.upgrade().ok_or_else(|| ParamError::RegisterDropped {
            name: self.name.clone(),
        })
    }

    pub(crate) fn check_span(&self, register_len: usize) -> Result<(), ParamError> {
        if self.address.fits(register_len) {
            Ok(())
        } else {
            Err(ParamError::OutOfRange {
                name: self.name.clone(),
                end_bit: self.address.end_bit(),
                register_bits: register_len.saturating_mul(8),
            })
        }
    }
}
