//! Instruction register.
//!
//! Holds the current instruction byte, split on load into a 4-bit opcode
//! (always visible to the control unit) and a 4-bit operand (driven onto
//! the bus only while `send_address` is asserted).

use serde::{Serialize, Deserialize};
use tracing::{event, Level};
use crate::cpu::bus::BusValue;
use crate::word::{self, Nibble};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRegister {
    opcode: Nibble,
    operand: Nibble,
}

impl InstructionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dedicated opcode output.
    #[inline]
    pub fn opcode(&self) -> Nibble {
        self.opcode
    }

    /// The operand, regardless of gating (for diagnostics).
    #[inline]
    pub fn operand(&self) -> Nibble {
        self.operand
    }

    /// The whole instruction byte.
    pub fn instruction(&self) -> u8 {
        word::join(self.opcode, self.operand)
    }

    /// The operand's bus contribution.
    #[inline]
    pub fn bus_output(&self, send_address: bool) -> BusValue {
        BusValue::gated(send_address, self.operand.value())
    }

    /// Clock edge: re-derive both fields from the pre-edge bus when loading.
    pub fn clock(&mut self, load: bool, bus: BusValue) {
        if !load {
            return;
        }
        if let Some(byte) = bus.driven() {
            let (opcode, operand) = word::split(byte);
            event!(Level::DEBUG, opcode = %opcode, operand = %operand, "instruction latched");
            self.opcode = opcode;
            self.operand = operand;
        }
    }

    /// Clear the opcode; the operand output floats until sent again.
    pub fn reset(&mut self) {
        self.opcode = Nibble::ZERO;
        self.operand = Nibble::ZERO;
    }
}
