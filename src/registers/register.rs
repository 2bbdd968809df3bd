// src/registers/register.rs
//
// Registers: fixed-length byte buffers on a mote, carved into parameters.
// A register is shared behind an Arc; its parameters point back at it weakly.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use super::config::ConfigParameter;
use super::error::ParamError;
use super::parameter::Parameter;

#[derive(Debug)]
enum Layout {
    Endpoints(Vec<Parameter>),
    Config(Vec<ConfigParameter>),
}

#[derive(Debug)]
pub struct Register {
    address: u8,
    name: String,
    length: usize,
    value: RwLock<Vec<u8>>,
    layout: Layout,
}

impl Register {
    /// Register of regular endpoints. Every span must fit in `length` bytes.
    pub fn with_endpoints(
        address: u8,
        name: impl Into<String>,
        length: usize,
        params: Vec<Parameter>,
    ) -> Result<Arc<Self>, ParamError> {
        for p in &params {
            p.check_span(length)?;
        }
        let name = name.into();
        Ok(Arc::new_cyclic(|weak: &Weak<Register>| Register {
            address,
            name,
            length,
            value: RwLock::new(vec![0; length]),
            layout: Layout::Endpoints(params.into_iter().map(|p| p.bind(weak)).collect()),
        }))
    }

    /// Register of configuration parameters. Every span must fit in `length` bytes.
    pub fn with_config(
        address: u8,
        name: impl Into<String>,
        length: usize,
        params: Vec<ConfigParameter>,
    ) -> Result<Arc<Self>, ParamError> {
        for p in &params {
            p.check_span(length)?;
        }
        let name = name.into();
        Ok(Arc::new_cyclic(|weak: &Weak<Register>| Register {
            address,
            name,
            length,
            value: RwLock::new(vec![0; length]),
            layout: Layout::Config(params.into_iter().map(|p| p.bind(weak)).collect()),
        }))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared length in bytes
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_config(&self) -> bool {
        matches!(self.layout, Layout::Config(_))
    }

    pub fn endpoints(&self) -> &[Parameter] {
        match &self.layout {
            Layout::Endpoints(params) => params,
            Layout::Config(_) => &[],
        }
    }

    pub fn config_parameters(&self) -> &[ConfigParameter] {
        match &self.layout {
            Layout::Config(params) => params,
            Layout::Endpoints(_) => &[],
        }
    }

    /// Find a parameter of either kind by name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        match &self.layout {
            Layout::Endpoints(params) => params.iter().find(|p| p.name() == name),
            Layout::Config(params) => params
                .iter()
                .find(|p| p.name() == name)
                .map(ConfigParameter::parameter),
        }
    }

    /// Snapshot of the current buffer
    pub fn value(&self) -> Vec<u8> {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the whole buffer, e.g. from a status packet
    pub fn update(&self, bytes: &[u8]) -> Result<(), ParamError> {
        if bytes.len() != self.length {
            return Err(ParamError::LengthMismatch {
                expected: self.length,
                actual: bytes.len(),
            });
        }
        self.value
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Edit the buffer in place. `f` runs on a scratch copy, which is only
    /// committed when it returns Ok.
    pub(crate) fn modify<F>(&self, f: F) -> Result<(), ParamError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), ParamError>,
    {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        let mut scratch = guard.clone();
        f(&mut scratch)?;
        *guard = scratch;
        Ok(())
    }

    /// Apply every configuration parameter's default.
    /// Stops at the first failure, leaving earlier parameters applied.
    pub fn apply_defaults(&self) -> Result<(), ParamError> {
        for p in self.config_parameters() {
            if let Err(e) = p.apply(None) {
                tlog!("[registers] {} (0x{:02X}): {}", self.name, self.address, e);
                return Err(e);
            }
        }
        Ok(())
    }
}
