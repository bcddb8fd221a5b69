//! Assembler and disassembler for SAP-1 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → 16-byte RAM image)
//! - A disassembler (image → assembly text)
//! - The on-disk program image format

pub mod assembler;
pub mod disasm;
pub mod image;

use crate::cpu::ram::RAM_SIZE;

/// A complete RAM image.
pub type Image = [u8; RAM_SIZE];

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{format_image, load_image, parse_image, save_image, ImageError};
