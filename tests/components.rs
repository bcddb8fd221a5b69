//! Components wired together by hand, without the control unit.

use sap::cpu::alu::Alu;
use sap::cpu::bus::{self, BusValue, Driver};
use sap::cpu::counter::ProgramCounter;
use sap::cpu::mar::MemoryAddressRegister;
use sap::cpu::ram::{Ram, RamControl};
use sap::cpu::register::{Register, RegisterKind};
use sap::word::Nibble;

/// PC drives the bus every cycle, MAR loads it, PC increments.
#[test]
fn pc_and_mar() {
    let mut pc = ProgramCounter::new();
    let mut mar = MemoryAddressRegister::new();

    for _ in 0..4 {
        let bus = pc.bus_output(true);
        mar.clock(true, bus);
        pc.clock(true, false, bus);
    }

    // MAR is one cycle behind PC
    assert_eq!(pc.count().value(), 4);
    assert_eq!(mar.address().value(), 3);

    mar.reset();
    assert_eq!(mar.address(), Nibble::ZERO);
}

/// A into B through the bus, then the ALU sum back into A.
#[test]
fn registers_and_alu_share_the_bus() {
    let mut a = Register::new(RegisterKind::A);
    let mut b = Register::new(RegisterKind::B);
    let alu = Alu::new();

    a.clock(true, BusValue::Driving(22));

    // A out, B in
    let bus = bus::resolve([
        (Driver::RegisterA, a.bus_output(true)),
        (Driver::Alu, alu.bus_output(a.unbuffered(), b.unbuffered(), false, false)),
    ])
    .unwrap();
    b.clock(true, bus);
    assert_eq!(b.unbuffered(), 22);

    // ALU out, A in: A sees the pre-edge sum
    let bus = bus::resolve([
        (Driver::RegisterA, a.bus_output(false)),
        (Driver::Alu, alu.bus_output(a.unbuffered(), b.unbuffered(), false, true)),
    ])
    .unwrap();
    assert_eq!(a.preview(true, bus), 44);
    a.clock(true, bus);
    assert_eq!(a.unbuffered(), 44);
}

#[test]
fn two_drivers_contend() {
    let a = Register::new(RegisterKind::A);
    let pc = ProgramCounter::new();
    let err = bus::resolve([
        (Driver::RegisterA, a.bus_output(true)),
        (Driver::ProgramCounter, pc.bus_output(true)),
    ])
    .unwrap_err();
    assert_eq!(err.drivers, vec![(Driver::RegisterA, 0), (Driver::ProgramCounter, 0)]);
    assert!(err.to_string().contains("PC"));
}

/// RAM stores through MAR addressing and reads back onto the bus.
#[test]
fn mar_addresses_ram() {
    let mut mar = MemoryAddressRegister::new();
    let mut ram = Ram::new();

    mar.clock(true, BusValue::Driving(0b0010));
    ram.clock(mar.address(), RamControl::runtime(false, true), BusValue::Driving(0b1100_1100)).unwrap();

    mar.clock(true, BusValue::Driving(0b0011));
    assert_eq!(ram.bus_output(mar.address(), RamControl::runtime(true, false)).unwrap(), BusValue::Driving(0));

    mar.clock(true, BusValue::Driving(0b0010));
    assert_eq!(
        ram.bus_output(mar.address(), RamControl::runtime(true, false)).unwrap(),
        BusValue::Driving(0b1100_1100)
    );
}
