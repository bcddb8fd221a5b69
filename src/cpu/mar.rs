//! Memory address register.
//!
//! Latches a 4-bit address from the bus and presents it, never tri-stated,
//! on a dedicated output wired to the RAM address mux.

use serde::{Serialize, Deserialize};
use crate::cpu::bus::BusValue;
use crate::word::Nibble;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAddressRegister {
    address: Nibble,
}

impl MemoryAddressRegister {
    pub fn new() -> Self {
        Self { address: Nibble::ZERO }
    }

    /// The dedicated address output.
    #[inline]
    pub fn address(&self) -> Nibble {
        self.address
    }

    /// Clock edge: capture the low nibble of the pre-edge bus when enabled.
    ///
    /// Because the capture uses the pre-edge value, a program counter that
    /// drives the bus and increments on the same edge is always seen one
    /// count behind.
    pub fn clock(&mut self, enable_in: bool, bus: BusValue) {
        if !enable_in {
            return;
        }
        if let Some(v) = bus.driven() {
            self.address = Nibble::new(v);
        }
    }

    pub fn reset(&mut self) {
        self.address = Nibble::ZERO;
    }
}
