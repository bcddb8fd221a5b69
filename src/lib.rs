//! # SAP-1 Emulator
//!
//! A cycle-accurate model of the Simple-As-Possible 8-bit computer.
//!
//! Every component sits on one shared 8-bit bus. A microcoded control unit
//! asserts a 16-line control word per clock step; on each edge all loading
//! components latch the same bus value. Programs are 16 bytes: a 4-bit
//! opcode and a 4-bit operand per instruction, plus data.

pub mod word;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use word::{Nibble, WidthError};
pub use cpu::{Machine, MachineState, CpuError, Input, Output, BusValue, ControlWord, Opcode, Snapshot};
pub use asm::{assemble, disassemble, AssemblerError, ImageError, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
