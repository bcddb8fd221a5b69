//! The SAP-1 datapath and control.
//!
//! This module implements the complete machine:
//! - a single 8-bit bus shared by every component
//! - registers A, B and Output, the adder/subtractor ALU
//! - 4-bit program counter and memory address register
//! - 16 x 8 RAM with a separate programming path
//! - a microcoded control unit sequencing 3 to 5 micro-steps per instruction

pub mod alu;
pub mod bus;
pub mod control;
pub mod counter;
pub mod ir;
pub mod machine;
pub mod mar;
pub mod mux;
pub mod ram;
pub mod register;

pub use alu::{Alu, AluResult};
pub use bus::{BusContention, BusValue, Driver};
pub use control::{ControlError, ControlUnit, ControlWord, Flags, Line, Opcode};
pub use counter::ProgramCounter;
pub use ir::InstructionRegister;
pub use machine::{CpuError, Fault, Input, Machine, MachineState, Output, Snapshot};
pub use mar::MemoryAddressRegister;
pub use ram::{Ram, RamControl, RamError, RAM_SIZE};
pub use register::{Register, RegisterKind};
