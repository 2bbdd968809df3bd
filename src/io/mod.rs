// src/io/mod.rs
//
// Device IO for the gateway. The radio modem hangs off a serial link.

mod error;
pub mod serial;

pub use error::TransportError;
