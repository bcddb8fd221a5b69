//! WebAssembly bindings for the SAP-1 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the machine.

use wasm_bindgen::prelude::*;
use crate::{Machine, Output};
use crate::asm::Image;
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::ram::RAM_SIZE;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
    program: Image,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a powered-on machine with empty RAM.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
            program: [0; RAM_SIZE],
        }
    }

    /// Assemble `source`, reset and load it.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<(), JsError> {
        self.program = assemble(source).map_err(js_err)?;
        self.reload()
    }

    /// Load a raw RAM image (at most 16 bytes).
    #[wasm_bindgen]
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), JsError> {
        if bytes.len() > RAM_SIZE {
            return Err(JsError::new("image larger than RAM"));
        }
        self.program = [0; RAM_SIZE];
        self.program[..bytes.len()].copy_from_slice(bytes);
        self.reload()
    }

    /// Reset and write the last loaded program back into RAM.
    #[wasm_bindgen]
    pub fn reload(&mut self) -> Result<(), JsError> {
        self.machine.assert_reset();
        self.machine.load_program(&self.program).map_err(js_err)
    }

    /// One clock pulse. Returns the executed control lines.
    #[wasm_bindgen]
    pub fn clock(&mut self) -> Result<String, JsError> {
        let word = self.machine.clock().map_err(js_err)?;
        Ok(word.to_string())
    }

    /// One whole instruction. Returns its disassembly.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let byte = self.machine.step_instruction().map_err(js_err)?;
        Ok(disassemble_instruction(byte))
    }

    /// Run until halt or `max_cycles` pulses.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.machine.run_until_halt(u64::from(max_cycles)).map_err(js_err)
    }

    /// Pulse reset. RAM keeps its contents.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.assert_reset();
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cycles()
    }

    /// The output register.
    #[wasm_bindgen]
    pub fn display(&self) -> u8 {
        self.machine.out.unbuffered()
    }

    /// The bus value, or `undefined` when floating.
    #[wasm_bindgen]
    pub fn bus(&self) -> Option<u8> {
        self.machine.read_output(Output::Bus).ok().and_then(|v| v.driven())
    }

    #[wasm_bindgen]
    pub fn step_counter(&self) -> u8 {
        self.machine.control.step()
    }

    /// Get all memory as a byte array.
    #[wasm_bindgen]
    pub fn memory(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(&self.machine.ram.cells()[..])
    }

    /// Get the whole machine state as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine.snapshot()).map_err(js_err)
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code to a RAM image.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u8>, JsError> {
    let image = assemble(source).map_err(js_err)?;
    Ok(image.to_vec())
}

/// Disassemble a single byte.
#[wasm_bindgen]
pub fn wasm_disassemble(value: u8) -> String {
    disassemble_instruction(value)
}
