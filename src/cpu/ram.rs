//! 16 x 8 random access memory.
//!
//! Two write paths share one cell array:
//! - program mode: a write pulse stores the programming-switch byte at the
//!   programming-switch address, bypassing the bus entirely
//! - runtime mode: the address comes from the MAR; `read_enable` drives the
//!   addressed cell onto the bus and `write_enable` latches the bus into it

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{event, Level};
use crate::cpu::bus::BusValue;
use crate::word::Nibble;

/// The number of memory cells.
pub const RAM_SIZE: usize = 16;

/// The RAM control inputs for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamControl {
    pub program_mode: bool,
    pub read_enable: bool,
    pub write_enable: bool,
}

impl RamControl {
    /// Runtime-mode control from the RAM_OUT / RAM_IN lines.
    pub fn runtime(read_enable: bool, write_enable: bool) -> Self {
        Self { program_mode: false, read_enable, write_enable }
    }

    fn check(&self, address: Nibble) -> Result<(), RamError> {
        if !self.program_mode && self.read_enable && self.write_enable {
            return Err(RamError::InvalidControl { address });
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ram {
    cells: [u8; RAM_SIZE],
}

impl Ram {
    /// Create a RAM with every cell cleared.
    pub fn new() -> Self {
        Self { cells: [0; RAM_SIZE] }
    }

    /// Read a cell directly (diagnostic port, not the bus).
    #[inline]
    pub fn read(&self, address: Nibble) -> u8 {
        self.cells[usize::from(address)]
    }

    /// The RAM's bus contribution for this settle phase.
    pub fn bus_output(&self, address: Nibble, control: RamControl) -> Result<BusValue, RamError> {
        control.check(address)?;
        if control.program_mode {
            return Ok(BusValue::Floating);
        }
        Ok(BusValue::gated(control.read_enable, self.read(address)))
    }

    /// Clock edge for the runtime path: store the pre-edge bus value.
    pub fn clock(&mut self, address: Nibble, control: RamControl, bus: BusValue) -> Result<(), RamError> {
        control.check(address)?;
        if control.program_mode || !control.write_enable {
            return Ok(());
        }
        if let Some(v) = bus.driven() {
            event!(Level::DEBUG, address = %address, value = v, "ram write");
            self.cells[usize::from(address)] = v;
        }
        Ok(())
    }

    /// A write pulse on the programming path.
    pub fn program(&mut self, program_mode: bool, address: Nibble, data: u8) -> Result<(), RamError> {
        if !program_mode {
            return Err(RamError::ProgramModeDisabled);
        }
        event!(Level::DEBUG, address = %address, value = data, "ram programmed");
        self.cells[usize::from(address)] = data;
        Ok(())
    }

    /// The whole cell array.
    pub fn cells(&self) -> &[u8; RAM_SIZE] {
        &self.cells
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|c| **c != 0).count();
        f.debug_struct("Ram")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &RAM_SIZE)
            .finish()
    }
}

/// Errors that can occur while driving the RAM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RamError {
    /// Read and write enable asserted together.
    #[error("RAM read and write enabled together at address {address}")]
    InvalidControl { address: Nibble },

    /// Programming write attempted outside program mode.
    #[error("RAM programming requires program mode")]
    ProgramModeDisabled,

    /// Image does not fit in memory.
    #[error("image of {size} bytes exceeds {} RAM cells", RAM_SIZE)]
    ImageTooLarge { size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: RamControl = RamControl { program_mode: true, read_enable: false, write_enable: true };

    #[test]
    fn test_initialization() {
        let ram = Ram::new();
        let idle = RamControl::default();
        assert_eq!(ram.bus_output(Nibble::ZERO, idle).unwrap(), BusValue::Floating);
        for addr in Nibble::all() {
            let out = ram.bus_output(addr, RamControl::runtime(true, false)).unwrap();
            assert_eq!(out, BusValue::Driving(0), "cell {} should be cleared", addr);
        }
    }

    #[test]
    fn test_program_then_read() {
        let mut ram = Ram::new();
        let data: Vec<u8> = (0..16).map(|i| (i * 37 + 11) as u8).collect();
        for addr in Nibble::all() {
            ram.program(true, addr, data[usize::from(addr)]).unwrap();
            // Program mode keeps the RAM off the bus
            assert_eq!(ram.bus_output(addr, PROGRAM).unwrap(), BusValue::Floating);
        }
        for addr in Nibble::all() {
            let out = ram.bus_output(addr, RamControl::runtime(true, false)).unwrap();
            assert_eq!(out, BusValue::Driving(data[usize::from(addr)]));
        }
    }

    #[test]
    fn test_program_requires_mode() {
        let mut ram = Ram::new();
        assert_eq!(ram.program(false, Nibble::new(3), 1), Err(RamError::ProgramModeDisabled));
        assert_eq!(ram.read(Nibble::new(3)), 0);
    }

    #[test]
    fn test_runtime_write() {
        let mut ram = Ram::new();
        let addr = Nibble::new(0b0010);
        ram.clock(addr, RamControl::runtime(false, true), BusValue::Driving(0b1100_1100)).unwrap();
        let out = ram.bus_output(addr, RamControl::runtime(true, false)).unwrap();
        assert_eq!(out, BusValue::Driving(0b1100_1100));
    }

    #[test]
    fn test_read_and_write_together_fails() {
        let mut ram = Ram::new();
        let both = RamControl::runtime(true, true);
        let addr = Nibble::new(5);
        assert_eq!(ram.bus_output(addr, both), Err(RamError::InvalidControl { address: addr }));
        assert!(ram.clock(addr, both, BusValue::Driving(1)).is_err());
        assert_eq!(ram.read(addr), 0);
    }
}
