//! TUI debugger for the SAP-1 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - RAM view with disassembly, PC and MAR markers
//! - Live register, flag and bus display
//! - The asserted control lines of the current micro-step
//! - Clock/step/run/breakpoint controls

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
