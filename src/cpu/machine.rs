//! The complete machine.
//!
//! Wires every component to the shared bus and drives them from the
//! control unit. Each clock pulse runs in two phases:
//!
//! 1. **Settle** (no mutation): look up the control word for the current
//!    step, collect every component's bus contribution and resolve the bus.
//! 2. **Edge**: every component whose load, increment or write line is
//!    asserted updates from the *same* pre-edge bus value, so no component
//!    sees another's post-edge state within one pulse.
//!
//! The harness talks to the machine only through [`Input`] lines, clock
//! pulses and [`Output`] lines.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{event, Level};
use crate::cpu::alu::{Alu, AluResult};
use crate::cpu::bus::{self, BusContention, BusValue, Driver};
use crate::cpu::control::{ControlError, ControlUnit, ControlWord, Flags};
use crate::cpu::counter::ProgramCounter;
use crate::cpu::ir::InstructionRegister;
use crate::cpu::mar::MemoryAddressRegister;
use crate::cpu::mux::mux_2x4;
use crate::cpu::ram::{Ram, RamControl, RamError, RAM_SIZE};
use crate::cpu::register::{Register, RegisterKind};
use crate::word::{Nibble, WidthError};

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Clock pulses execute micro-steps.
    Running,
    /// A HALT micro-step has executed since the last reset.
    Halted,
    /// A structural fault aborted the run; only a reset recovers.
    Faulted,
}

/// External input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Input {
    /// Hold every resettable component at zero while high.
    Reset(bool),
    /// Route the programming switches to the RAM.
    ProgramMode(bool),
    /// Programming-switch address (0-15).
    ProgramAddress(u8),
    /// Programming-switch data byte.
    ProgramData(u8),
    /// Programming write button; a rising edge stores the data byte.
    ProgramWrite(bool),
}

/// External output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Output {
    /// The shared bus, `Floating` when nobody drives it.
    Bus,
    /// The output register's unbuffered line.
    Display,
    /// The micro-step counter.
    Step,
    /// 1 once a HALT micro-step has executed.
    Halt,
    ProgramCounter,
    MemoryAddress,
    Opcode,
    Operand,
    RegisterA,
    RegisterB,
    Carry,
    Zero,
    /// The ALU's signed-overflow output for the settled operands. Not latched.
    Overflow,
}

/// The state of the programming inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Inputs {
    reset: bool,
    program_mode: bool,
    program_address: Nibble,
    program_data: u8,
    program_write: bool,
}

/// Everything computed during one settle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settled {
    pub step: u8,
    pub opcode: Nibble,
    pub word: ControlWord,
    pub bus: BusValue,
    pub alu: AluResult,
    pub ram_address: Nibble,
    pub ram_control: RamControl,
}

/// The machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct Machine {
    pub a: Register,
    pub b: Register,
    pub out: Register,
    pub pc: ProgramCounter,
    pub mar: MemoryAddressRegister,
    pub ir: InstructionRegister,
    pub ram: Ram,
    pub control: ControlUnit,
    alu: Alu,
    inputs: Inputs,
    state: MachineState,
    /// Clock pulses since power-on or the last reset.
    cycles: u64,
}

impl Machine {
    /// Power on: every register, counter and RAM cell is zero.
    pub fn new() -> Self {
        Self {
            a: Register::new(RegisterKind::A),
            b: Register::new(RegisterKind::B),
            out: Register::new(RegisterKind::Output),
            pc: ProgramCounter::new(),
            mar: MemoryAddressRegister::new(),
            ir: InstructionRegister::new(),
            ram: Ram::new(),
            control: ControlUnit::new(),
            alu: Alu::new(),
            inputs: Inputs::default(),
            state: MachineState::Running,
            cycles: 0,
        }
    }

    // ------------------------------------------------------------------
    // Settle phase
    // ------------------------------------------------------------------

    /// Resolve the current micro-step without changing any state.
    pub fn settle(&self) -> Result<Settled, Fault> {
        let step = self.control.step();
        let opcode = self.ir.opcode();
        let ram_address = mux_2x4(self.mar.address(), self.inputs.program_address, self.inputs.program_mode);

        let word = if self.inputs.reset {
            ControlWord::NONE
        } else {
            self.control.control_word(opcode)?
        };

        let subtract = word.contains(ControlWord::ALU_SUB);
        let alu = self.alu.evaluate(self.a.unbuffered(), self.b.unbuffered(), subtract);
        let ram_control = RamControl {
            program_mode: self.inputs.program_mode,
            read_enable: word.contains(ControlWord::RAM_OUT),
            write_enable: word.contains(ControlWord::RAM_IN),
        };

        let bus = bus::resolve([
            (Driver::Ram, self.ram.bus_output(ram_address, ram_control)?),
            (Driver::InstructionRegister, self.ir.bus_output(word.contains(ControlWord::IR_OUT))),
            (self.a.kind().driver(), self.a.bus_output(word.contains(ControlWord::A_OUT))),
            (
                Driver::Alu,
                self.alu.bus_output(
                    self.a.unbuffered(),
                    self.b.unbuffered(),
                    subtract,
                    word.contains(ControlWord::ALU_OUT),
                ),
            ),
            (Driver::ProgramCounter, self.pc.bus_output(word.contains(ControlWord::PC_OUT))),
        ])?;

        Ok(Settled { step, opcode, word, bus, alu, ram_address, ram_control })
    }

    /// The control word for the current micro-step.
    pub fn control_word(&self) -> Result<ControlWord, CpuError> {
        Ok(self.settle().map_err(|f| self.fault(f))?.word)
    }

    // ------------------------------------------------------------------
    // Edge phase
    // ------------------------------------------------------------------

    /// One clock pulse. Returns the control word that was executed.
    pub fn clock(&mut self) -> Result<ControlWord, CpuError> {
        if self.state == MachineState::Faulted {
            return Err(CpuError::NotRunning(self.state));
        }
        if self.inputs.reset {
            // Reset dominates: nothing latches, nothing advances.
            return Ok(ControlWord::NONE);
        }

        let s = match self.settle() {
            Ok(s) => s,
            Err(f) => {
                let err = self.fault(f);
                event!(Level::ERROR, "{}", err);
                self.state = MachineState::Faulted;
                return Err(err);
            }
        };

        event!(
            Level::TRACE,
            cycle = self.cycles,
            step = s.step,
            opcode = %s.opcode,
            word = %s.word,
            bus = %s.bus,
            "clock"
        );

        let w = s.word;
        if let Err(e) = self.ram.clock(s.ram_address, s.ram_control, s.bus) {
            let err = self.fault(e.into());
            self.state = MachineState::Faulted;
            return Err(err);
        }
        self.mar.clock(w.contains(ControlWord::MAR_IN), s.bus);
        self.ir.clock(w.contains(ControlWord::IR_IN), s.bus);
        self.a.clock(w.contains(ControlWord::A_IN), s.bus);
        self.b.clock(w.contains(ControlWord::B_IN), s.bus);
        self.out.clock(w.contains(ControlWord::OUT_IN), s.bus);
        self.pc.clock(w.contains(ControlWord::PC_INC), w.contains(ControlWord::PC_JUMP), s.bus);
        self.control.clock(s.opcode, w, &s.alu);

        if w.contains(ControlWord::HALT) && self.state == MachineState::Running {
            event!(Level::INFO, cycle = self.cycles, "halted");
            self.state = MachineState::Halted;
        }
        self.cycles += 1;

        Ok(w)
    }

    /// Pulse the clock `n` times.
    pub fn advance_clock(&mut self, n: u64) -> Result<(), CpuError> {
        for _ in 0..n {
            self.clock()?;
        }
        Ok(())
    }

    /// Clock until the step counter returns to 0, i.e. one whole
    /// instruction. Returns the instruction byte that ran.
    pub fn step_instruction(&mut self) -> Result<u8, CpuError> {
        if self.inputs.reset {
            return Ok(self.ir.instruction());
        }
        loop {
            self.clock()?;
            if self.control.step() == 0 {
                return Ok(self.ir.instruction());
            }
        }
    }

    /// Run until HALT or error.
    ///
    /// Returns the number of clock pulses executed. A held reset executes
    /// nothing, so the run returns 0 immediately.
    pub fn run_until_halt(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let mut pulses = 0u64;

        while self.state == MachineState::Running && !self.inputs.reset && pulses < max_cycles {
            self.clock()?;
            pulses += 1;
        }

        Ok(pulses)
    }

    // ------------------------------------------------------------------
    // Driver interface
    // ------------------------------------------------------------------

    /// Pulse the reset line: raise, settle, lower.
    pub fn assert_reset(&mut self) {
        self.apply_reset();
        self.inputs.reset = false;
    }

    fn apply_reset(&mut self) {
        self.inputs.reset = true;
        self.a.reset();
        self.b.reset();
        self.out.reset();
        self.pc.reset();
        self.mar.reset();
        self.ir.reset();
        self.control.reset();
        self.state = MachineState::Running;
        self.cycles = 0;
        event!(Level::DEBUG, "reset");
    }

    /// Drive an input line. Reset takes effect immediately, without waiting
    /// for a clock edge.
    pub fn set_input(&mut self, input: Input) -> Result<(), CpuError> {
        match input {
            Input::Reset(true) => self.apply_reset(),
            Input::Reset(false) => self.inputs.reset = false,
            Input::ProgramMode(on) => self.inputs.program_mode = on,
            Input::ProgramAddress(a) => self.inputs.program_address = Nibble::try_new(a)?,
            Input::ProgramData(d) => self.inputs.program_data = d,
            Input::ProgramWrite(level) => {
                let rising = level && !self.inputs.program_write;
                self.inputs.program_write = level;
                if rising {
                    self.ram.program(
                        self.inputs.program_mode,
                        self.inputs.program_address,
                        self.inputs.program_data,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Sample an output line.
    pub fn read_output(&self, output: Output) -> Result<BusValue, CpuError> {
        let s = self.settle().map_err(|f| self.fault(f))?;
        let value = match output {
            Output::Bus => return Ok(s.bus),
            Output::Display => self.out.preview(s.word.contains(ControlWord::OUT_IN), s.bus),
            Output::RegisterA => self.a.preview(s.word.contains(ControlWord::A_IN), s.bus),
            Output::RegisterB => self.b.preview(s.word.contains(ControlWord::B_IN), s.bus),
            Output::Step => self.control.step(),
            Output::Halt => (self.state == MachineState::Halted) as u8,
            Output::ProgramCounter => self.pc.count().value(),
            Output::MemoryAddress => self.mar.address().value(),
            Output::Opcode => self.ir.opcode().value(),
            Output::Operand => self.ir.operand().value(),
            Output::Carry => self.control.flags().carry as u8,
            Output::Zero => self.control.flags().zero as u8,
            Output::Overflow => s.alu.overflow as u8,
        };
        Ok(BusValue::Driving(value))
    }

    // ------------------------------------------------------------------
    // Program loading
    // ------------------------------------------------------------------

    pub fn set_program_mode(&mut self, on: bool) {
        self.inputs.program_mode = on;
    }

    /// Store a byte through the programming path. Requires program mode.
    pub fn write_cell(&mut self, address: u8, value: u8) -> Result<(), CpuError> {
        let address = Nibble::try_new(address)?;
        self.ram.program(self.inputs.program_mode, address, value)?;
        Ok(())
    }

    /// Enter program mode, write `image` from address 0, leave program mode.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), CpuError> {
        if image.len() > RAM_SIZE {
            return Err(RamError::ImageTooLarge { size: image.len() }.into());
        }
        self.set_program_mode(true);
        for (addr, byte) in image.iter().enumerate() {
            self.write_cell(addr as u8, *byte)?;
        }
        self.set_program_mode(false);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn flags(&self) -> Flags {
        self.control.flags()
    }

    /// A serializable picture of the whole machine.
    pub fn snapshot(&self) -> Snapshot {
        let settled = self.settle().ok();
        Snapshot {
            cycles: self.cycles,
            state: self.state,
            step: self.control.step(),
            control_word: settled.map(|s| s.word.bits()),
            control_lines: settled.map(|s| s.word.to_string()),
            bus: settled.map(|s| s.bus).unwrap_or_default(),
            pc: self.pc.count().value(),
            mar: self.mar.address().value(),
            ir: self.ir.instruction(),
            a: self.a.unbuffered(),
            b: self.b.unbuffered(),
            out: self.out.unbuffered(),
            flags: self.control.flags(),
            ram: *self.ram.cells(),
        }
    }

    fn fault(&self, fault: Fault) -> CpuError {
        CpuError::Fault {
            cycle: self.cycles,
            step: self.control.step(),
            fault,
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Machine {{")?;
        writeln!(f, "  state: {:?}, cycles: {}", self.state, self.cycles)?;
        writeln!(f, "  step: {}, flags: {:?}", self.control.step(), self.control.flags())?;
        writeln!(f, "  PC: {}, MAR: {}, IR: {:08b}", self.pc.count(), self.mar.address(), self.ir.instruction())?;
        writeln!(f, "  {:?}", self.a)?;
        writeln!(f, "  {:?}", self.b)?;
        writeln!(f, "  {:?}", self.out)?;
        write!(f, "}}")
    }
}

/// A point-in-time picture of the machine, for display and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cycles: u64,
    pub state: MachineState,
    pub step: u8,
    /// `None` when the current step cannot settle.
    pub control_word: Option<u16>,
    pub control_lines: Option<String>,
    pub bus: BusValue,
    pub pc: u8,
    pub mar: u8,
    pub ir: u8,
    pub a: u8,
    pub b: u8,
    pub out: u8,
    pub flags: Flags,
    pub ram: [u8; RAM_SIZE],
}

/// A structural integrity violation detected while settling or latching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Bus(#[from] BusContention),

    #[error(transparent)]
    Ram(#[from] RamError),

    #[error(transparent)]
    Control(#[from] ControlError),
}

/// Errors surfaced to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("fault at cycle {cycle}, step {step}: {fault}")]
    Fault {
        cycle: u64,
        step: u8,
        #[source]
        fault: Fault,
    },

    #[error("machine is not running (state: {0:?})")]
    NotRunning(MachineState),

    #[error("programming error: {0}")]
    Program(#[from] RamError),

    #[error("invalid address: {0}")]
    Address(#[from] WidthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// LDA 9, ADD E, SUB D, OUT with data 16, 127, 64.
    fn demo_machine() -> Machine {
        let mut m = Machine::new();
        m.assert_reset();
        m.set_program_mode(true);
        for (addr, byte) in [
            (0x0, 0b0001_1001),
            (0x1, 0b0010_1110),
            (0x2, 0b0011_1101),
            (0x3, 0b1110_0000),
            (0x9, 16),
            (0xE, 127),
            (0xD, 64),
        ] {
            m.write_cell(addr, byte).unwrap();
        }
        m.set_program_mode(false);
        m
    }

    fn read(m: &Machine, o: Output) -> u8 {
        m.read_output(o).unwrap().driven().unwrap()
    }

    #[test]
    fn test_power_on_state() {
        let m = Machine::new();
        assert_eq!(read(&m, Output::Step), 0);
        assert_eq!(read(&m, Output::Display), 0);
        assert_eq!(m.ram.cells(), &[0; RAM_SIZE]);
        assert!(m.is_running());
    }

    #[test]
    fn test_full_program() {
        let mut m = demo_machine();
        m.advance_clock(4).unwrap(); // LDA
        assert_eq!(read(&m, Output::RegisterA), 16);
        m.advance_clock(5).unwrap(); // ADD
        assert_eq!(read(&m, Output::RegisterA), 143);
        m.advance_clock(5).unwrap(); // SUB
        assert_eq!(read(&m, Output::RegisterA), 79);
        m.advance_clock(3).unwrap(); // OUT

        assert_eq!(read(&m, Output::Display), 79);
        assert_eq!(m.read_output(Output::Display).unwrap().to_binstr(8), "01001111");
        assert_eq!(read(&m, Output::Step), 0);
        assert_eq!(read(&m, Output::Zero), 0);
        assert_eq!(read(&m, Output::Carry), 1, "143 - 64 does not borrow");
        assert_eq!(m.cycles(), 17);
    }

    #[test]
    fn test_fetch_drives_pc_onto_bus() {
        let m = demo_machine();
        assert_eq!(m.control_word().unwrap(), ControlWord::MAR_IN | ControlWord::PC_OUT);
        assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Driving(0));
    }

    #[test]
    fn test_write_cell_requires_program_mode() {
        let mut m = Machine::new();
        let err = m.write_cell(3, 42).unwrap_err();
        assert_eq!(err, CpuError::Program(RamError::ProgramModeDisabled));
        m.set_program_mode(true);
        assert!(matches!(m.write_cell(16, 1), Err(CpuError::Address(_))));
    }

    #[test]
    fn test_load_program_too_large() {
        let mut m = Machine::new();
        let err = m.load_program(&[0; RAM_SIZE + 1]).unwrap_err();
        assert_eq!(err, CpuError::Program(RamError::ImageTooLarge { size: RAM_SIZE + 1 }));
        assert_eq!(m.ram.cells(), &[0; RAM_SIZE]);
    }

    #[test]
    fn test_program_write_pulse() {
        let mut m = Machine::new();
        m.set_input(Input::ProgramMode(true)).unwrap();
        m.set_input(Input::ProgramAddress(0b1001)).unwrap();
        m.set_input(Input::ProgramData(0x5A)).unwrap();
        m.set_input(Input::ProgramWrite(true)).unwrap();
        m.set_input(Input::ProgramWrite(false)).unwrap();
        assert_eq!(m.ram.read(Nibble::new(9)), 0x5A);

        // Holding the button does not write again
        m.set_input(Input::ProgramData(0x11)).unwrap();
        m.set_input(Input::ProgramWrite(false)).unwrap();
        assert_eq!(m.ram.read(Nibble::new(9)), 0x5A);
    }

    #[test]
    fn test_held_reset_blocks_clock() {
        let mut m = demo_machine();
        m.advance_clock(6).unwrap();
        m.set_input(Input::Reset(true)).unwrap();
        assert_eq!(read(&m, Output::Step), 0);
        assert_eq!(read(&m, Output::RegisterA), 0);
        assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Floating);

        m.advance_clock(3).unwrap();
        assert_eq!(read(&m, Output::Step), 0);
        assert_eq!(read(&m, Output::ProgramCounter), 0);

        m.set_input(Input::Reset(false)).unwrap();
        m.advance_clock(1).unwrap();
        assert_eq!(read(&m, Output::Step), 1);
        // RAM survives reset
        assert_eq!(m.ram.read(Nibble::new(9)), 16);
    }

    #[test]
    fn test_run_returns_while_reset_held() {
        let mut m = Machine::new();
        m.load_program(&[0b1111_0000]).unwrap();
        m.set_input(Input::Reset(true)).unwrap();
        assert_eq!(m.run_until_halt(10).unwrap(), 0);
        assert!(m.is_running());

        m.set_input(Input::Reset(false)).unwrap();
        assert_eq!(m.run_until_halt(10).unwrap(), 3);
    }

    #[test]
    fn test_run_with_unbounded_budget() {
        let mut m = demo_machine();
        m.advance_clock(1).unwrap();
        m.set_program_mode(true);
        m.write_cell(4, 0b1111_0000).unwrap();
        m.set_program_mode(false);
        assert_eq!(m.run_until_halt(u64::MAX).unwrap(), 19);
        assert!(m.is_halted());
    }

    #[test]
    fn test_overflow_output() {
        let mut m = Machine::new();
        // LDA F, ADD F with 127 in F
        m.load_program(&[0x1F, 0x2F, 0xF0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 127]).unwrap();
        m.advance_clock(8).unwrap();
        assert_eq!(m.control_word().unwrap(), ControlWord::A_IN | ControlWord::ALU_OUT | ControlWord::FLAGS_IN);
        assert_eq!(read(&m, Output::Overflow), 1, "127 + 127 overflows");
        assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Driving(0b1111_1110));

        m.advance_clock(1).unwrap();
        assert_eq!(read(&m, Output::Overflow), 0, "-2 + 127 is in signed range");
    }

    #[test]
    fn test_held_reset_floats_register_outputs() {
        let mut m = demo_machine();
        m.advance_clock(16).unwrap();
        assert_eq!(m.control_word().unwrap(), ControlWord::A_OUT | ControlWord::OUT_IN);
        assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Driving(79));

        m.set_input(Input::Reset(true)).unwrap();
        assert_eq!(m.control_word().unwrap(), ControlWord::NONE);
        assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Floating);
        assert_eq!(read(&m, Output::Display), 0);
    }

    #[test]
    fn test_halt_latches() {
        let mut m = Machine::new();
        m.load_program(&[0b1111_0000]).unwrap();
        let pulses = m.run_until_halt(100).unwrap();
        assert_eq!(pulses, 3);
        assert!(m.is_halted());
        assert_eq!(read(&m, Output::Halt), 1);

        m.assert_reset();
        assert_eq!(read(&m, Output::Halt), 0);
        assert!(m.is_running());
    }

    #[test]
    fn test_step_instruction() {
        let mut m = demo_machine();
        assert_eq!(m.step_instruction().unwrap(), 0b0001_1001);
        assert_eq!(m.cycles(), 4);
        assert_eq!(m.step_instruction().unwrap(), 0b0010_1110);
        assert_eq!(m.cycles(), 9);
    }

    #[test]
    fn test_snapshot() {
        let m = demo_machine();
        let snap = m.snapshot();
        assert_eq!(snap.step, 0);
        assert_eq!(snap.control_lines.as_deref(), Some("MI|CO"));
        assert_eq!(snap.ram[0xE], 127);
    }
}
