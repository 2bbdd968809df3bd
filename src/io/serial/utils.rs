// src/io/serial/utils.rs
//
// Character framing for serial links, and its mapping onto serialport types.

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, StopBits};

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Character framing on the wire. Radio modems run 8-N-1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineSettings {
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for LineSettings {
    fn default() -> Self {
        LineSettings {
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

impl LineSettings {
    /// Short "8-N-1" style label for log lines
    pub fn label(&self) -> String {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        format!("{}-{}-{}", self.data_bits, parity, self.stop_bits)
    }

    /// Anything outside 5..=7 opens as eight data bits
    pub(crate) fn port_data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    /// Anything but 2 opens as one stop bit
    pub(crate) fn port_stop_bits(&self) -> StopBits {
        if self.stop_bits == 2 {
            StopBits::Two
        } else {
            StopBits::One
        }
    }

    pub(crate) fn port_parity(&self) -> SpParity {
        SpParity::from(&self.parity)
    }
}

impl From<&Parity> for SpParity {
    fn from(p: &Parity) -> Self {
        match p {
            Parity::None => SpParity::None,
            Parity::Odd => SpParity::Odd,
            Parity::Even => SpParity::Even,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_default_is_8n1() {
        let line = LineSettings::default();
        assert_eq!(line.label(), "8-N-1");
        assert!(matches!(line.port_data_bits(), DataBits::Eight));
        assert!(matches!(line.port_stop_bits(), StopBits::One));
        assert!(matches!(line.port_parity(), SpParity::None));
    }

    #[test]
    fn test_seven_even_two() {
        let line = LineSettings {
            data_bits: 7,
            stop_bits: 2,
            parity: Parity::Even,
        };
        assert_eq!(line.label(), "7-E-2");
        assert!(matches!(line.port_data_bits(), DataBits::Seven));
        assert!(matches!(line.port_stop_bits(), StopBits::Two));
        assert!(matches!(line.port_parity(), SpParity::Even));
    }

    #[test]
    fn test_out_of_range_counts_fall_back() {
        let line = LineSettings {
            data_bits: 9,
            stop_bits: 0,
            parity: Parity::Odd,
        };
        assert!(matches!(line.port_data_bits(), DataBits::Eight));
        assert!(matches!(line.port_stop_bits(), StopBits::One));
        assert!(matches!(SpParity::from(&Parity::Odd), SpParity::Odd));
    }
}
