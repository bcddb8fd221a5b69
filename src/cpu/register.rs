//! General purpose 8-bit registers.
//!
//! The machine has three of these:
//! - A: accumulator, feeds the ALU and can drive the bus
//! - B: second ALU operand
//! - Output: drives the display through its unbuffered output
//!
//! Each register has two outputs. The unbuffered output always shows the
//! latched value; the bus output is tri-stated unless `send` is asserted.

use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::{event, Level};
use crate::cpu::bus::{BusValue, Driver};

/// Which of the three registers this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterKind {
    A,
    B,
    Output,
}

impl RegisterKind {
    /// The bus driver identity of this register.
    pub fn driver(self) -> Driver {
        match self {
            RegisterKind::A => Driver::RegisterA,
            RegisterKind::B => Driver::RegisterB,
            RegisterKind::Output => Driver::Output,
        }
    }
}

/// An 8-bit latch with an unbuffered output and a gated bus output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    kind: RegisterKind,
    value: u8,
}

impl Register {
    /// Create a register holding zero.
    pub fn new(kind: RegisterKind) -> Self {
        Self { kind, value: 0 }
    }

    pub fn kind(&self) -> RegisterKind {
        self.kind
    }

    /// The latched value, as seen on the unbuffered output.
    #[inline]
    pub fn unbuffered(&self) -> u8 {
        self.value
    }

    /// The unbuffered output during a settle phase.
    ///
    /// While `load` is asserted the incoming bus value already shows on the
    /// unbuffered output, before the clock edge latches it.
    pub fn preview(&self, load: bool, bus: BusValue) -> u8 {
        match (load, bus) {
            (true, BusValue::Driving(v)) => v,
            _ => self.value,
        }
    }

    /// The bus contribution: the latched value while `send` is asserted.
    #[inline]
    pub fn bus_output(&self, send: bool) -> BusValue {
        BusValue::gated(send, self.value)
    }

    /// Clock edge: latch the pre-edge bus value when `load` is asserted.
    pub fn clock(&mut self, load: bool, bus: BusValue) {
        if !load {
            return;
        }
        match bus {
            BusValue::Driving(v) => {
                event!(Level::DEBUG, register = ?self.kind, value = v, "latch");
                self.value = v;
            }
            BusValue::Floating => {
                event!(Level::WARN, register = ?self.kind, "load from floating bus ignored");
            }
        }
    }

    /// Force the latched value back to zero.
    ///
    /// The bus output stays gated by `send` alone. While the machine holds
    /// reset it drives every control line low, which floats this output.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}={:08b} ({})", self.kind, self.value, self.value)
    }
}
