//! Two-input, 4-bit address multiplexer.
//!
//! Selects which address reaches the RAM: the MAR output while the machine
//! runs, or the programming switches while program mode is on.

use crate::word::Nibble;

/// Pass `first` when `select` is low, `second` when it is high.
#[inline]
pub fn mux_2x4(first: Nibble, second: Nibble, select: bool) -> Nibble {
    if select {
        second
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let a = Nibble::new(0b0101);
        let b = Nibble::new(0b1010);
        assert_eq!(mux_2x4(a, b, false), a, "first input");
        assert_eq!(mux_2x4(a, b, true), b, "second input");
    }
}
