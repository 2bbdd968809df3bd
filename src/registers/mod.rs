// src/registers/mod.rs
//
// Register/parameter model for mote profiles.
// Registers hold a byte buffer; parameters locate typed values inside it by
// "bytes.bits" position and size.

mod address;
mod config;
mod error;
mod parameter;
mod register;
mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use address::{AddressSpec, BytesBits};
pub use config::ConfigParameter;
pub use error::ParamError;
pub use parameter::{Parameter, Verification};
pub use register::Register;
pub use value::{ParamValue, MAX_NUMBER_BITS};

/// Value type carried by a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Number,
    String,
    Binary,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Number => "number",
            ParameterType::String => "string",
            ParameterType::Binary => "binary",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Entry {
        kind: ParameterType,
    }

    #[test]
    fn test_parameter_type_names() {
        assert_eq!(ParameterType::Number.to_string(), "number");
        assert_eq!(ParameterType::Binary.as_str(), "binary");

        let entry: Entry = toml::from_str("kind = \"string\"").unwrap();
        assert_eq!(entry.kind, ParameterType::String);
        assert!(toml::from_str::<Entry>("kind = \"float\"").is_err());
    }
}
