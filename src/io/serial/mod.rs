// src/io/serial/mod.rs
//
// Serial link to the radio modem.
//
// - framer: character stream to packet frames
// - link: the physical port seam (serialport, in-memory)
// - transport: listener thread, send, DTR reset, stop

pub mod framer;
pub mod link;
pub mod transport;
pub mod utils;

pub use framer::{Frame, FrameAssembler};
pub use link::{list_ports, Link, SerialPortInfo};
pub use transport::{
    FrameSubscription, SerialTransport, TransportEvent, TransportState, DEFAULT_BAUD_RATE,
    RESET_PULSE,
};
pub use utils::{LineSettings, Parity};
