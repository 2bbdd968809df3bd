// src/registers/config.rs
//
// Configuration parameters: settings written to a mote, where a value must
// always be known (override or default) and always pass verification.

use std::ops::Deref;
use std::sync::Weak;

use super::error::ParamError;
use super::parameter::Parameter;
use super::register::Register;
use super::value::ParamValue;
use super::ParameterType;

#[derive(Debug, Clone)]
pub struct ConfigParameter {
    param: Parameter,
}

impl ConfigParameter {
    pub fn new(
        kind: ParameterType,
        name: impl Into<String>,
        position: &str,
        size: &str,
        default: Option<&str>,
        verification: Option<&str>,
    ) -> Result<Self, ParamError> {
        let mut param = Parameter::new(kind, name, position, size)?;
        if let Some(default) = default {
            param = param.with_default(default);
        }
        if let Some(rule) = verification {
            param = param.with_verification(rule)?;
        }
        Ok(ConfigParameter { param })
    }

    pub fn parameter(&self) -> &Parameter {
        &self.param
    }

    pub(crate) fn bind(self, register: &Weak<Register>) -> Self {
        ConfigParameter {
            param: self.param.bind(register),
        }
    }

    /// Pick the value to apply: `override_value` if given, else the default.
    /// Whichever is picked must pass verification.
    pub fn resolve(&self, override_value: Option<&str>) -> Result<ParamValue, ParamError> {
        let text = match override_value.or(self.param.default_value()) {
            Some(text) => text,
            None => {
                return Err(ParamError::MissingDefault {
                    name: self.param.name().to_string(),
                })
            }
        };
        self.param.parse_value(text)
    }

    /// Resolve, then write the result into the owning register.
    pub fn apply(&self, override_value: Option<&str>) -> Result<ParamValue, ParamError> {
        let value = self.resolve(override_value)?;
        self.param.store(&value)?;
        Ok(value)
    }
}

impl Deref for ConfigParameter {
    type Target = Parameter;

    fn deref(&self) -> &Parameter {
        &self.param
    }
}

impl From<Parameter> for ConfigParameter {
    fn from(param: Parameter) -> Self {
        ConfigParameter { param }
    }
}
