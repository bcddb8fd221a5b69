//! Fixed-width binary words.
//!
//! The machine moves 8-bit bytes over its bus, but addresses, opcodes and
//! operands are all 4 bits wide. `Nibble` keeps that width in the type so a
//! value can never silently grow past 15.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A 4-bit unsigned value (0-15).
///
/// Used for:
/// - RAM addresses (the machine has 16 cells)
/// - The program counter and memory address register
/// - Both halves of an instruction byte
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Nibble(u8);

impl Nibble {
    /// Number of bits in a nibble.
    pub const WIDTH: u32 = 4;

    /// Largest representable value.
    pub const MAX: u8 = 0x0F;

    /// The zero nibble.
    pub const ZERO: Nibble = Nibble(0);

    /// Create a nibble, keeping only the low 4 bits.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Nibble(value & Self::MAX)
    }

    /// Create a nibble, rejecting values above 15.
    pub fn try_new(value: u8) -> Result<Self, WidthError> {
        if value > Self::MAX {
            return Err(WidthError { value: value as u16, bits: Self::WIDTH });
        }
        Ok(Nibble(value))
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Value plus one, wrapping from 15 back to 0.
    #[inline]
    pub const fn wrapping_inc(self) -> Self {
        Nibble::new(self.0.wrapping_add(1))
    }

    /// Iterate over every nibble, 0 through 15.
    pub fn all() -> impl Iterator<Item = Nibble> {
        (0..=Self::MAX).map(Nibble)
    }
}

impl fmt::Debug for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nibble({:04b})", self.0)
    }
}

impl fmt::Display for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl From<Nibble> for u8 {
    fn from(n: Nibble) -> Self {
        n.0
    }
}

impl From<Nibble> for usize {
    fn from(n: Nibble) -> Self {
        n.0 as usize
    }
}

impl TryFrom<u8> for Nibble {
    type Error = WidthError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Nibble::try_new(value)
    }
}

/// Split an instruction byte into its opcode (high) and operand (low) nibbles.
#[inline]
pub const fn split(byte: u8) -> (Nibble, Nibble) {
    (Nibble::new(byte >> 4), Nibble::new(byte))
}

/// Join an opcode and operand back into an instruction byte.
#[inline]
pub const fn join(high: Nibble, low: Nibble) -> u8 {
    (high.value() << 4) | low.value()
}

/// A value did not fit in the requested bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {value} does not fit in {bits} bits")]
pub struct WidthError {
    pub value: u16,
    pub bits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_masks_high_bits() {
        assert_eq!(Nibble::new(0x1F).value(), 0x0F);
        assert_eq!(Nibble::new(0xA3).value(), 0x03);
    }

    #[test]
    fn test_nibble_try_new() {
        assert_eq!(Nibble::try_new(15).unwrap().value(), 15);
        let err = Nibble::try_new(16).unwrap_err();
        assert_eq!(err, WidthError { value: 16, bits: 4 });
    }

    #[test]
    fn test_nibble_wraps() {
        assert_eq!(Nibble::new(15).wrapping_inc(), Nibble::ZERO);
        assert_eq!(Nibble::new(7).wrapping_inc().value(), 8);
    }

    #[test]
    fn test_split_and_join() {
        let (op, arg) = split(0b0001_1101);
        assert_eq!(op.value(), 0b0001);
        assert_eq!(arg.value(), 0b1101);
        assert_eq!(join(op, arg), 0b0001_1101);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format!("{}", Nibble::new(14)), "E");
        assert_eq!(format!("{:?}", Nibble::new(5)), "Nibble(0101)");
    }
}
