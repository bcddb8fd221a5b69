//! Program image file format.
//!
//! A simple text format, one RAM cell per line:
//! - `A: 00011001` places a byte at a hex address
//! - a bare value (`00011001`, `0x19`) goes to the next address
//! - values are 8-bit binary (underscores allowed) or `0x` hex
//! - lines starting with `;` are comments, blank lines are ignored

use crate::cpu::ram::RAM_SIZE;
use super::Image;
use std::path::Path;
use std::io::{BufRead, BufReader, Write};
use thiserror::Error;

/// Parse image text.
pub fn parse_image(text: &str) -> Result<Image, ImageError> {
    parse_lines(text.lines().map(|l| Ok(l.to_string())))
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);
    parse_lines(reader.lines().map(|l| l.map_err(|e| ImageError::IoError(e.to_string()))))
}

fn parse_lines<I>(lines: I) -> Result<Image, ImageError>
where
    I: IntoIterator<Item = Result<String, ImageError>>,
{
    let mut image = [0u8; RAM_SIZE];
    let mut next_addr = 0usize;

    for (line_num, line_result) in lines.into_iter().enumerate() {
        let line = line_result?;
        let line_num = line_num + 1;
        let content = match line.find(';') {
            Some(idx) => &line[..idx],
            None => &line[..],
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let value_str = match content.split_once(':') {
            Some((addr, value)) => {
                let addr = addr.trim();
                let addr = addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")).unwrap_or(addr);
                next_addr = usize::from_str_radix(addr, 16).map_err(|_| ImageError::ParseError {
                    line: line_num,
                    message: format!("invalid address '{}'", addr),
                })?;
                value.trim()
            }
            None => content,
        };

        if next_addr >= RAM_SIZE {
            return Err(ImageError::AddressOutOfRange { line: line_num, address: next_addr });
        }
        image[next_addr] = parse_byte(value_str).ok_or_else(|| ImageError::ParseError {
            line: line_num,
            message: format!("expected 8-bit binary or 0x hex, found '{}'", value_str),
        })?;
        next_addr += 1;
    }

    Ok(image)
}

fn parse_byte(s: &str) -> Option<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u8::from_str_radix(hex, 16).ok();
    }
    let bits: String = s.chars().filter(|c| *c != '_').collect();
    if bits.len() != 8 {
        return None;
    }
    u8::from_str_radix(&bits, 2).ok()
}

/// Render an image in the file format.
pub fn format_image(image: &[u8]) -> String {
    let mut out = String::new();
    out.push_str("; SAP-1 program image\n");
    out.push_str(&format!("; {} cells\n\n", image.len()));
    for (addr, byte) in image.iter().enumerate() {
        out.push_str(&format!("{:X}: {:08b}\n", addr, byte));
    }
    out
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &[u8]) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(format_image(image).as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("address {address:#x} out of range on line {line}")]
    AddressOutOfRange { line: usize, address: usize },
}
