//! Disassembler for SAP-1 RAM images.
//!
//! Converts image bytes back to assembly the assembler accepts. Bytes that
//! have no instruction reading (reserved opcodes, or a stray operand on an
//! operand-less instruction) come out as `DAT`, so reassembling a listing
//! always reproduces the image.

use crate::cpu::control::Opcode;
use crate::word;

/// Disassemble a single byte to text.
pub fn disassemble_instruction(byte: u8) -> String {
    let (opcode, operand) = word::split(byte);
    match Opcode::decode(opcode) {
        Some(op) if op.takes_operand() => format!("{} {}", op, operand.value()),
        Some(op) if operand.value() == 0 => op.to_string(),
        _ => format!("DAT 0x{:02X}", byte),
    }
}

/// Disassemble a whole image, one cell per line.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; SAP-1 Disassembly\n");
    output.push_str("; -----------------\n\n");

    for (addr, byte) in image.iter().enumerate() {
        let line = disassemble_instruction(*byte);
        output.push_str(&format!("    {:<10} ; {:X}: {:08b} ({})\n", line, addr, byte, byte));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_instructions() {
        assert_eq!(disassemble_instruction(0x19), "LDA 9");
        assert_eq!(disassemble_instruction(0x2E), "ADD 14");
        assert_eq!(disassemble_instruction(0xE0), "OUT");
        assert_eq!(disassemble_instruction(0xF0), "HLT");
        assert_eq!(disassemble_instruction(0x00), "NOP");
    }

    #[test]
    fn test_disassemble_data() {
        // 127 has opcode 7 (JC) so it still reads as an instruction
        assert_eq!(disassemble_instruction(127), "JC 15");
        assert_eq!(disassemble_instruction(0x9A), "DAT 0x9A");
        assert_eq!(disassemble_instruction(0xE5), "DAT 0xE5");
    }

    #[test]
    fn test_listing_reassembles() {
        let image = [0x19, 0x2E, 0x3D, 0xE0, 0, 0, 0, 0, 0, 16, 0, 0xB3, 0, 64, 127, 0xFF];
        let listing = disassemble(&image);
        assert!(listing.contains("E: 01111111 (127)"));
        assert_eq!(crate::asm::assemble(&listing).unwrap(), image);
    }
}
