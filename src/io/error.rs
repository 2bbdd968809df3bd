// src/io/error.rs
//
// Error taxonomy for serial links.
// Errors are Clone so the listener can hand the same failure to every subscriber.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The link could not be opened when the transport was constructed
    #[error("unable to open serial port {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// Listening, sending or resetting against a link that is not open
    #[error("serial port {port} is not open")]
    LinkNotOpen { port: String },

    /// `start_listening` called while a listener is already running
    #[error("serial port {port} already has a running listener")]
    AlreadyListening { port: String },

    /// Read, write or control-line failure on an open link
    #[error("serial port {port}: {message}")]
    Io { port: String, message: String },
}

impl TransportError {
    pub fn unavailable(port: impl Into<String>, reason: impl ToString) -> Self {
        TransportError::PortUnavailable {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_open(port: impl Into<String>) -> Self {
        TransportError::LinkNotOpen { port: port.into() }
    }

    pub fn io(port: impl Into<String>, message: impl std::fmt::Display) -> Self {
        TransportError::Io {
            port: port.into(),
            message: message.to_string(),
        }
    }

    /// Port identifier the error refers to
    pub fn port(&self) -> &str {
        match self {
            TransportError::PortUnavailable { port, .. }
            | TransportError::LinkNotOpen { port }
            | TransportError::AlreadyListening { port }
            | TransportError::Io { port, .. } => port,
        }
    }
}
