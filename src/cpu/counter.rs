//! Program counter.
//!
//! A 4-bit counter that wraps from 15 to 0. Its output is tri-stated unless
//! `enable_out` is asserted. A jump loads the counter from the bus.

use serde::{Serialize, Deserialize};
use crate::cpu::bus::BusValue;
use crate::word::Nibble;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCounter {
    count: Nibble,
}

impl ProgramCounter {
    pub fn new() -> Self {
        Self { count: Nibble::ZERO }
    }

    /// The current count, regardless of output gating.
    #[inline]
    pub fn count(&self) -> Nibble {
        self.count
    }

    /// The counter's bus contribution.
    ///
    /// Passes the latched count through while `enable_out` is asserted; an
    /// increment requested this cycle does not show until after the edge.
    #[inline]
    pub fn bus_output(&self, enable_out: bool) -> BusValue {
        BusValue::gated(enable_out, self.count.value())
    }

    /// Clock edge. A jump takes the low nibble of the pre-edge bus and wins
    /// over an increment requested in the same cycle.
    pub fn clock(&mut self, increment: bool, jump: bool, bus: BusValue) {
        if jump {
            if let Some(v) = bus.driven() {
                self.count = Nibble::new(v);
                return;
            }
        }
        if increment {
            self.count = self.count.wrapping_inc();
        }
    }

    pub fn reset(&mut self) {
        self.count = Nibble::ZERO;
    }
}
