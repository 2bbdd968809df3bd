// src/lib.rs
//
// motegate: serial modem gateway core for wireless mote networks.
//
// - io: serial framing transport to the radio modem
// - registers: register/parameter model for mote profiles
// - settings: TOML gateway settings

#[macro_use]
mod logging;

pub mod io;
pub mod registers;
pub mod settings;

pub use io::serial::{Frame, FrameAssembler, FrameSubscription, SerialTransport, TransportEvent};
pub use io::TransportError;
pub use logging::{init_file_logging, stop_file_logging};
pub use registers::{
    AddressSpec, ConfigParameter, ParamError, ParamValue, Parameter, ParameterType, Register,
};
pub use settings::{load_settings, save_settings, GatewaySettings, SerialSettings, SettingsError};
