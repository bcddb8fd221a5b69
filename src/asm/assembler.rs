//! Two-pass assembler for SAP-1 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! START:          ; Define a label
//!     LDA X       ; Load from the cell labelled X
//!     ADD 0xE     ; Add the cell at address 14
//!     JC  START   ; Jump if carry
//!     OUT
//!     HLT
//!
//!     ORG 9       ; Set origin address
//! X:  DAT 16      ; Define a raw data byte
//! ```
//!
//! Numbers may be decimal, `0x` hex or `0b` binary. The result is always a
//! full 16-byte RAM image; cells nobody writes stay zero.

use crate::cpu::control::Opcode;
use crate::cpu::ram::RAM_SIZE;
use crate::word::{self, Nibble};
use super::Image;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code into a RAM image.
pub fn assemble(source: &str) -> Result<Image, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An operand before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Number(i64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Instruction(Opcode, Option<Operand>),
    Data(Operand),
}

/// One emitted cell, waiting for pass 2.
#[derive(Debug, Clone)]
struct Statement {
    line: usize,
    address: usize,
    item: Item,
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Cells in source order.
    statements: Vec<Statement>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            statements: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Image, AssemblerError> {
        // Pass 1: collect labels and statements
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve operands and encode
        let mut image = [0u8; RAM_SIZE];
        for stmt in &self.statements {
            image[stmt.address] = self.encode(stmt)?;
        }
        Ok(image)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }
        self.process_statement(line, line_num)
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mnemonic = parts[0].to_uppercase();
        if parts.len() > 2 {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("unexpected '{}'", parts[2]),
            });
        }
        let operand = parts.get(1).map(|s| parse_operand(s, line_num)).transpose()?;

        match mnemonic.as_str() {
            "ORG" => {
                let addr = match operand {
                    Some(Operand::Number(n)) => n,
                    _ => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: "ORG requires a numeric address".into(),
                        })
                    }
                };
                self.current_addr = check_range(addr, Nibble::MAX, line_num)? as usize;
            }

            "DAT" | "DATA" => {
                let value = operand.ok_or_else(|| AssemblerError::SyntaxError {
                    line: line_num,
                    message: "DAT requires a value".into(),
                })?;
                self.emit(Item::Data(value), line_num)?;
            }

            _ => {
                let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;
                match (opcode.takes_operand(), &operand) {
                    (true, None) => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: format!("{} requires an operand", opcode),
                        })
                    }
                    (false, Some(_)) => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: format!("{} takes no operand", opcode),
                        })
                    }
                    _ => {}
                }
                self.emit(Item::Instruction(opcode, operand), line_num)?;
            }
        }

        Ok(())
    }

    fn emit(&mut self, item: Item, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr >= RAM_SIZE {
            return Err(AssemblerError::ImageOverflow { line: line_num });
        }
        self.statements.push(Statement { line: line_num, address: self.current_addr, item });
        self.current_addr += 1;
        Ok(())
    }

    fn resolve(&self, operand: &Operand, line_num: usize) -> Result<i64, AssemblerError> {
        match operand {
            Operand::Number(n) => Ok(*n),
            Operand::Label(label) => self
                .symbols
                .get(label)
                .map(|addr| *addr as i64)
                .ok_or_else(|| AssemblerError::UndefinedLabel { line: line_num, label: label.clone() }),
        }
    }

    fn encode(&self, stmt: &Statement) -> Result<u8, AssemblerError> {
        match &stmt.item {
            Item::Data(value) => {
                let value = self.resolve(value, stmt.line)?;
                check_range(value, u8::MAX, stmt.line)
            }
            Item::Instruction(opcode, operand) => {
                let operand = match operand {
                    Some(op) => check_range(self.resolve(op, stmt.line)?, Nibble::MAX, stmt.line)?,
                    None => 0,
                };
                Ok(word::join(opcode.nibble(), Nibble::new(operand)))
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_range(value: i64, max: u8, line_num: usize) -> Result<u8, AssemblerError> {
    if (0..=i64::from(max)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AssemblerError::ValueOutOfRange { line: line_num, value, max })
    }
}

/// Parse a numeric literal or a label reference.
fn parse_operand(operand: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    let invalid = |kind: &str| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid {} literal '{}'", kind, operand),
    };

    let lower = operand.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(&hex.replace('_', ""), 16)
            .map(Operand::Number)
            .map_err(|_| invalid("hex"));
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return i64::from_str_radix(&bin.replace('_', ""), 2)
            .map(Operand::Number)
            .map_err(|_| invalid("binary"));
    }
    if operand.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return operand.parse::<i64>().map(Operand::Number).map_err(|_| invalid("decimal"));
    }

    let label = operand.to_uppercase();
    if !is_identifier(&label) {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid operand '{}'", operand),
        });
    }
    Ok(Operand::Label(label))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value} (max {max})")]
    ValueOutOfRange { line: usize, value: i64, max: u8 },

    #[error("program does not fit in {} cells (line {line})", RAM_SIZE)]
    ImageOverflow { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_demo() {
        let source = r#"
            ; LDA 9, ADD E, SUB D, OUT
            LDA 9
            ADD 0xE
            SUB 0b1101
            OUT

            ORG 9
            DAT 16
            ORG 0xD
            DAT 64
            DAT 127
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(&image[..4], &[0x19, 0x2E, 0x3D, 0xE0]);
        assert_eq!(image[9], 16);
        assert_eq!(image[0xD], 64);
        assert_eq!(image[0xE], 127);
        assert_eq!(image[4], 0);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            LDA x
            JZ  end
            JMP start
        end: HLT
        x:  DAT 0
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(&image[..5], &[0x14, 0x83, 0x60, 0xF0, 0x00]);
    }

    #[test]
    fn test_unknown_mnemonic() {
        let err = assemble("LDA 1\nMUL 2").unwrap_err();
        assert_eq!(err, AssemblerError::UnknownMnemonic { line: 2, mnemonic: "MUL".into() });
    }

    #[test]
    fn test_operand_rules() {
        assert!(matches!(assemble("LDA 16"), Err(AssemblerError::ValueOutOfRange { value: 16, .. })));
        assert!(matches!(assemble("DAT 256"), Err(AssemblerError::ValueOutOfRange { max: 255, .. })));
        assert!(matches!(assemble("DAT -1"), Err(AssemblerError::ValueOutOfRange { .. })));
        assert!(matches!(assemble("ADD"), Err(AssemblerError::SyntaxError { line: 1, .. })));
        assert!(matches!(assemble("HLT 3"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("LDA 0xZZ"), Err(AssemblerError::SyntaxError { .. })));
    }

    #[test]
    fn test_label_errors() {
        assert_eq!(
            assemble("JMP nowhere").unwrap_err(),
            AssemblerError::UndefinedLabel { line: 1, label: "NOWHERE".into() }
        );
        assert_eq!(
            assemble("a: NOP\nA: NOP").unwrap_err(),
            AssemblerError::DuplicateLabel { line: 2, label: "A".into() }
        );
    }

    #[test]
    fn test_overflow() {
        let source = "NOP\n".repeat(RAM_SIZE + 1);
        assert_eq!(
            assemble(&source).unwrap_err(),
            AssemblerError::ImageOverflow { line: RAM_SIZE + 1 }
        );
        assert!(assemble(&"NOP\n".repeat(RAM_SIZE)).is_ok());
    }
}
