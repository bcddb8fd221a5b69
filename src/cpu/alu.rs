//! Arithmetic logic unit.
//!
//! An 8-bit ripple-carry adder/subtractor reading registers A and B
//! directly (not via the bus). Subtraction inverts B and feeds a carry-in
//! of one, so `A - B` is computed as `A + !B + 1`.

use serde::{Serialize, Deserialize};
use crate::cpu::bus::BusValue;

/// One-bit full adder, returning (sum, carry_out).
#[inline]
fn full_add(a: bool, b: bool, carry: bool) -> (bool, bool) {
    let sum = a ^ b ^ carry;
    let carry_out = (a && b) || (carry && (a ^ b));
    (sum, carry_out)
}

/// Add two bytes with a carry-in, returning (result, carry_out).
pub fn add_with_carry(a: u8, b: u8, carry_in: bool) -> (u8, bool) {
    let mut result = 0u8;
    let mut carry = carry_in;

    for i in 0..8 {
        let (sum, new_carry) = full_add((a >> i) & 1 == 1, (b >> i) & 1 == 1, carry);
        if sum {
            result |= 1 << i;
        }
        carry = new_carry;
    }

    (result, carry)
}

/// The adder/subtractor stage: `a + b`, or `a - b` when `subtract` is set.
#[inline]
pub fn adder_subtractor(a: u8, b: u8, subtract: bool) -> (u8, bool) {
    let operand = if subtract { !b } else { b };
    add_with_carry(a, operand, subtract)
}

/// Everything the ALU computes in one settle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AluResult {
    /// The 8-bit result (mod 256).
    pub value: u8,
    /// Carry out of bit 7. For subtraction this means "no borrow".
    pub carry: bool,
    /// Signed (two's-complement) overflow.
    pub overflow: bool,
    /// Result is zero.
    pub zero: bool,
}

/// Compute the ALU result for the given operands.
pub fn compute(a: u8, b: u8, subtract: bool) -> AluResult {
    let (value, carry) = adder_subtractor(a, b, subtract);

    // Overflow when both effective operands share a sign the result lacks.
    let effective_b = if subtract { !b } else { b };
    let overflow = (a ^ value) & (effective_b ^ value) & 0x80 != 0;

    AluResult {
        value,
        carry,
        overflow,
        zero: value == 0,
    }
}

/// The ALU as a bus component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alu;

impl Alu {
    pub fn new() -> Self {
        Alu
    }

    /// Flags and value are computed every cycle regardless of `send`.
    pub fn evaluate(&self, a: u8, b: u8, subtract: bool) -> AluResult {
        compute(a, b, subtract)
    }

    /// The ALU's bus contribution: the result while `send` is asserted.
    pub fn bus_output(&self, a: u8, b: u8, subtract: bool, send: bool) -> BusValue {
        BusValue::gated(send, compute(a, b, subtract).value)
    }
}
