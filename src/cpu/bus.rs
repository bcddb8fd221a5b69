//! The shared 8-bit tri-state bus.
//!
//! Components never write into the bus directly. Each one reports what it
//! presents this cycle (a byte, or nothing), and [`resolve`] turns that set
//! of contributions into the single value every listener samples.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The state of a tri-stated line group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusValue {
    /// Actively driven with a byte.
    Driving(u8),
    /// Not driven by anyone (high impedance).
    #[default]
    Floating,
}

impl BusValue {
    /// Gate a value: driven when `enabled`, floating otherwise.
    #[inline]
    pub fn gated(enabled: bool, value: u8) -> Self {
        if enabled {
            BusValue::Driving(value)
        } else {
            BusValue::Floating
        }
    }

    /// The driven byte, if any.
    #[inline]
    pub fn driven(self) -> Option<u8> {
        match self {
            BusValue::Driving(v) => Some(v),
            BusValue::Floating => None,
        }
    }

    /// Render as a bit string of `width` characters, `z` for floating lines.
    pub fn to_binstr(self, width: usize) -> String {
        match self {
            BusValue::Driving(v) => format!("{:0width$b}", v, width = width),
            BusValue::Floating => "z".repeat(width),
        }
    }
}

impl fmt::Display for BusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusValue::Driving(v) => write!(f, "{:08b}", v),
            BusValue::Floating => write!(f, "zzzzzzzz"),
        }
    }
}

/// Every component that can place a value on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Driver {
    Ram,
    InstructionRegister,
    RegisterA,
    RegisterB,
    Output,
    Alu,
    ProgramCounter,
}

impl Driver {
    pub fn name(self) -> &'static str {
        match self {
            Driver::Ram => "RAM",
            Driver::InstructionRegister => "IR",
            Driver::RegisterA => "A",
            Driver::RegisterB => "B",
            Driver::Output => "OUT",
            Driver::Alu => "ALU",
            Driver::ProgramCounter => "PC",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Two or more components drove the bus in the same cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bus contention between {}", describe(.drivers))]
pub struct BusContention {
    /// Every component that was driving, with the value it drove.
    pub drivers: Vec<(Driver, u8)>,
}

fn describe(drivers: &[(Driver, u8)]) -> String {
    drivers
        .iter()
        .map(|(d, v)| format!("{}={:08b}", d, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the bus from every component's contribution for one settle phase.
///
/// Floating contributions are ignored. Exactly one driver yields its value;
/// none yields `Floating`; more than one is a contention fault.
pub fn resolve<I>(contributions: I) -> Result<BusValue, BusContention>
where
    I: IntoIterator<Item = (Driver, BusValue)>,
{
    let drivers: Vec<(Driver, u8)> = contributions
        .into_iter()
        .filter_map(|(d, v)| v.driven().map(|byte| (d, byte)))
        .collect();

    match drivers.as_slice() {
        [] => Ok(BusValue::Floating),
        [(_, value)] => Ok(BusValue::Driving(*value)),
        _ => Err(BusContention { drivers }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_drivers_floats() {
        assert_eq!(resolve(Vec::new()).unwrap(), BusValue::Floating);
        let quiet = [
            (Driver::Ram, BusValue::Floating),
            (Driver::Alu, BusValue::Floating),
        ];
        assert_eq!(resolve(quiet).unwrap(), BusValue::Floating);
    }

    #[test]
    fn test_single_driver_wins() {
        let bus = resolve([
            (Driver::Ram, BusValue::Floating),
            (Driver::ProgramCounter, BusValue::Driving(0b0011)),
        ])
        .unwrap();
        assert_eq!(bus, BusValue::Driving(3));
    }

    #[test]
    fn test_contention_names_every_driver() {
        let err = resolve([
            (Driver::Ram, BusValue::Driving(1)),
            (Driver::RegisterA, BusValue::Floating),
            (Driver::Alu, BusValue::Driving(1)),
        ])
        .unwrap_err();
        assert_eq!(err.drivers, vec![(Driver::Ram, 1), (Driver::Alu, 1)]);
        let msg = err.to_string();
        assert!(msg.contains("RAM"));
        assert!(msg.contains("ALU"));
    }

    #[test]
    fn test_binstr() {
        assert_eq!(BusValue::Floating.to_binstr(4), "zzzz");
        assert_eq!(BusValue::Driving(3).to_binstr(4), "0011");
        assert_eq!(BusValue::Driving(0x42).to_string(), "01000010");
    }
}
