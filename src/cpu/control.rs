//! Control unit and microcode.
//!
//! Every instruction runs as a sequence of micro-steps. Steps 0 and 1 are
//! the fetch cycle and are the same for every opcode:
//!
//! | Step | Lines            |
//! |------|------------------|
//! | 0    | MI, CO           |
//! | 1    | RO, II, CE       |
//!
//! From step 2 the opcode's microprogram runs for one to three steps, after
//! which the step counter returns to 0. The control word for a step is a
//! pure function of `(step, opcode, flags)`; the unit never drives the bus.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::alu::AluResult;
use crate::word::Nibble;

// ============================================================================
// Control word
// ============================================================================

/// The 16 control lines, most significant bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Line {
    Halt,
    MarIn,
    RamIn,
    RamOut,
    IrIn,
    IrOut,
    AIn,
    AOut,
    AluOut,
    AluSub,
    BIn,
    OutIn,
    PcInc,
    PcOut,
    PcJump,
    FlagsIn,
}

impl Line {
    /// Every line, in bit order from bit 15 down to bit 0.
    pub const ALL: [Line; 16] = [
        Line::Halt,
        Line::MarIn,
        Line::RamIn,
        Line::RamOut,
        Line::IrIn,
        Line::IrOut,
        Line::AIn,
        Line::AOut,
        Line::AluOut,
        Line::AluSub,
        Line::BIn,
        Line::OutIn,
        Line::PcInc,
        Line::PcOut,
        Line::PcJump,
        Line::FlagsIn,
    ];

    /// Bit position within the control word.
    pub const fn bit(self) -> u8 {
        15 - self as u8
    }

    /// The conventional two-letter mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Line::Halt => "HLT",
            Line::MarIn => "MI",
            Line::RamIn => "RI",
            Line::RamOut => "RO",
            Line::IrIn => "II",
            Line::IrOut => "IO",
            Line::AIn => "AI",
            Line::AOut => "AO",
            Line::AluOut => "EO",
            Line::AluSub => "SU",
            Line::BIn => "BI",
            Line::OutIn => "OI",
            Line::PcInc => "CE",
            Line::PcOut => "CO",
            Line::PcJump => "J",
            Line::FlagsIn => "FI",
        }
    }
}

/// A 16-bit control word. Bit 15 is HALT, bit 0 is FLAGS_IN.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControlWord(u16);

impl ControlWord {
    pub const NONE: ControlWord = ControlWord(0);

    pub const HALT: ControlWord = ControlWord::line(Line::Halt);
    pub const MAR_IN: ControlWord = ControlWord::line(Line::MarIn);
    pub const RAM_IN: ControlWord = ControlWord::line(Line::RamIn);
    pub const RAM_OUT: ControlWord = ControlWord::line(Line::RamOut);
    pub const IR_IN: ControlWord = ControlWord::line(Line::IrIn);
    pub const IR_OUT: ControlWord = ControlWord::line(Line::IrOut);
    pub const A_IN: ControlWord = ControlWord::line(Line::AIn);
    pub const A_OUT: ControlWord = ControlWord::line(Line::AOut);
    pub const ALU_OUT: ControlWord = ControlWord::line(Line::AluOut);
    pub const ALU_SUB: ControlWord = ControlWord::line(Line::AluSub);
    pub const B_IN: ControlWord = ControlWord::line(Line::BIn);
    pub const OUT_IN: ControlWord = ControlWord::line(Line::OutIn);
    pub const PC_INC: ControlWord = ControlWord::line(Line::PcInc);
    pub const PC_OUT: ControlWord = ControlWord::line(Line::PcOut);
    pub const PC_JUMP: ControlWord = ControlWord::line(Line::PcJump);
    pub const FLAGS_IN: ControlWord = ControlWord::line(Line::FlagsIn);

    /// A word with a single line asserted.
    pub const fn line(line: Line) -> Self {
        ControlWord(1 << line.bit())
    }

    pub const fn from_bits(bits: u16) -> Self {
        ControlWord(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Combine two words (const-friendly `|`).
    pub const fn with(self, other: ControlWord) -> Self {
        ControlWord(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: ControlWord) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_set(self, line: Line) -> bool {
        self.0 & (1 << line.bit()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The asserted lines, in bit order.
    pub fn lines(self) -> impl Iterator<Item = Line> {
        Line::ALL.into_iter().filter(move |l| self.is_set(*l))
    }

    /// Bit string grouped in nibbles, e.g. `0100_0000_0000_0100`.
    pub fn to_grouped_binary(self) -> String {
        let raw = format!("{:016b}", self.0);
        raw.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl std::ops::BitOr for ControlWord {
    type Output = ControlWord;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}

impl fmt::Debug for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlWord({} = {})", self.to_grouped_binary(), self)
    }
}

impl fmt::Display for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let names: Vec<&str> = self.lines().map(Line::mnemonic).collect();
        f.write_str(&names.join("|"))
    }
}

// ============================================================================
// Opcodes and flags
// ============================================================================

/// The defined instruction set. Opcodes 1001-1101 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0b0000,
    Lda = 0b0001,
    Add = 0b0010,
    Sub = 0b0011,
    Sta = 0b0100,
    Ldi = 0b0101,
    Jmp = 0b0110,
    Jc = 0b0111,
    Jz = 0b1000,
    Out = 0b1110,
    Hlt = 0b1111,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Nop,
        Opcode::Lda,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Sta,
        Opcode::Ldi,
        Opcode::Jmp,
        Opcode::Jc,
        Opcode::Jz,
        Opcode::Out,
        Opcode::Hlt,
    ];

    /// Decode a nibble; `None` for reserved opcodes.
    pub fn decode(nibble: Nibble) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| *op as u8 == nibble.value())
    }

    pub fn nibble(self) -> Nibble {
        Nibble::new(self as u8)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Lda => "LDA",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Sta => "STA",
            Opcode::Ldi => "LDI",
            Opcode::Jmp => "JMP",
            Opcode::Jc => "JC",
            Opcode::Jz => "JZ",
            Opcode::Out => "OUT",
            Opcode::Hlt => "HLT",
        }
    }

    /// Parse a mnemonic (case-insensitive).
    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        let upper = s.to_ascii_uppercase();
        Opcode::ALL.into_iter().find(|op| op.mnemonic() == upper)
    }

    /// Whether the low nibble of the instruction means anything.
    pub fn takes_operand(self) -> bool {
        !matches!(self, Opcode::Nop | Opcode::Out | Opcode::Hlt)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The latched condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    pub carry: bool,
    pub zero: bool,
}

impl Flags {
    pub fn from_alu(result: &AluResult) -> Self {
        Self { carry: result.carry, zero: result.zero }
    }
}

// ============================================================================
// Microcode table
// ============================================================================

/// One execute-step entry of a microprogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Micro {
    /// Assert these lines unconditionally.
    Always(ControlWord),
    /// Assert these lines only when the carry flag is set.
    IfCarry(ControlWord),
    /// Assert these lines only when the zero flag is set.
    IfZero(ControlWord),
}

impl Micro {
    const fn resolve(self, flags: Flags) -> ControlWord {
        match self {
            Micro::Always(w) => w,
            Micro::IfCarry(w) if flags.carry => w,
            Micro::IfZero(w) if flags.zero => w,
            Micro::IfCarry(_) | Micro::IfZero(_) => ControlWord::NONE,
        }
    }
}

/// Number of fetch steps preceding every instruction.
pub const FETCH_STEPS: u8 = 2;

/// The fetch cycle, shared by every opcode.
pub const FETCH: [ControlWord; FETCH_STEPS as usize] = [
    ControlWord::MAR_IN.with(ControlWord::PC_OUT),
    ControlWord::RAM_OUT.with(ControlWord::IR_IN).with(ControlWord::PC_INC),
];

const ADDRESS_TO_MAR: ControlWord = ControlWord::MAR_IN.with(ControlWord::IR_OUT);
const JUMP: ControlWord = ControlWord::IR_OUT.with(ControlWord::PC_JUMP);

const NOP: &[Micro] = &[Micro::Always(ControlWord::NONE)];
const LDA: &[Micro] = &[
    Micro::Always(ADDRESS_TO_MAR),
    Micro::Always(ControlWord::RAM_OUT.with(ControlWord::A_IN)),
];
const ADD: &[Micro] = &[
    Micro::Always(ADDRESS_TO_MAR),
    Micro::Always(ControlWord::RAM_OUT.with(ControlWord::B_IN)),
    Micro::Always(ControlWord::A_IN.with(ControlWord::ALU_OUT).with(ControlWord::FLAGS_IN)),
];
const SUB: &[Micro] = &[
    Micro::Always(ADDRESS_TO_MAR),
    Micro::Always(ControlWord::RAM_OUT.with(ControlWord::B_IN)),
    Micro::Always(
        ControlWord::A_IN
            .with(ControlWord::ALU_OUT)
            .with(ControlWord::ALU_SUB)
            .with(ControlWord::FLAGS_IN),
    ),
];
const STA: &[Micro] = &[
    Micro::Always(ADDRESS_TO_MAR),
    Micro::Always(ControlWord::RAM_IN.with(ControlWord::A_OUT)),
];
const LDI: &[Micro] = &[Micro::Always(ControlWord::IR_OUT.with(ControlWord::A_IN))];
const JMP: &[Micro] = &[Micro::Always(JUMP)];
const JC: &[Micro] = &[Micro::IfCarry(JUMP)];
const JZ: &[Micro] = &[Micro::IfZero(JUMP)];
const OUT: &[Micro] = &[Micro::Always(ControlWord::A_OUT.with(ControlWord::OUT_IN))];
const HLT: &[Micro] = &[Micro::Always(ControlWord::HALT)];

/// Execute microprograms indexed by opcode nibble. Reserved opcodes run NOP.
static MICROCODE: [&[Micro]; 16] = [
    NOP, // 0000 NOP
    LDA, // 0001 LDA
    ADD, // 0010 ADD
    SUB, // 0011 SUB
    STA, // 0100 STA
    LDI, // 0101 LDI
    JMP, // 0110 JMP
    JC,  // 0111 JC
    JZ,  // 1000 JZ
    NOP, // 1001 reserved
    NOP, // 1010 reserved
    NOP, // 1011 reserved
    NOP, // 1100 reserved
    NOP, // 1101 reserved
    OUT, // 1110 OUT
    HLT, // 1111 HLT
];

/// Total micro-steps (fetch plus execute) for an opcode.
pub fn instruction_length(opcode: Nibble) -> u8 {
    FETCH_STEPS + MICROCODE[usize::from(opcode)].len() as u8
}

/// Look up the control word for a micro-step.
pub fn lookup(step: u8, opcode: Nibble, flags: Flags) -> Result<ControlWord, ControlError> {
    if step < FETCH_STEPS {
        return Ok(FETCH[step as usize]);
    }
    MICROCODE[usize::from(opcode)]
        .get((step - FETCH_STEPS) as usize)
        .map(|m| m.resolve(flags))
        .ok_or(ControlError::InvalidOpcodeStep { opcode, step })
}

// ============================================================================
// Control unit
// ============================================================================

/// The sequencer: step counter plus the latched flags register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlUnit {
    step: u8,
    flags: Flags,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current micro-step (0-4).
    #[inline]
    pub fn step(&self) -> u8 {
        self.step
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Whether the current step is a fetch step.
    pub fn is_fetching(&self) -> bool {
        self.step < FETCH_STEPS
    }

    /// The control word for the current step, given the IR opcode.
    pub fn control_word(&self, opcode: Nibble) -> Result<ControlWord, ControlError> {
        lookup(self.step, opcode, self.flags)
    }

    /// Clock edge: latch the flags if FLAGS_IN is asserted and advance the
    /// step, wrapping to 0 after the opcode's final step.
    pub fn clock(&mut self, opcode: Nibble, word: ControlWord, alu: &AluResult) {
        if word.contains(ControlWord::FLAGS_IN) {
            self.flags = Flags::from_alu(alu);
        }
        let next = self.step + 1;
        self.step = if next >= instruction_length(opcode) { 0 } else { next };
    }

    /// Step back to 0 and clear the flags.
    pub fn reset(&mut self) {
        self.step = 0;
        self.flags = Flags::default();
    }
}

/// Errors raised by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("no micro-step {step} defined for opcode {opcode:?}")]
    InvalidOpcodeStep { opcode: Nibble, step: u8 },
}
