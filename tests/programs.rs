//! End-to-end programs driven through the machine's external lines.

use sap::cpu::machine::Fault;
use sap::cpu::{ControlError, ControlWord};
use sap::{assemble, BusValue, CpuError, Input, Machine, MachineState, Output};

/// Program RAM the way a front panel would: address, data, write pulse.
fn program_via_switches(m: &mut Machine, cells: &[(u8, u8)]) {
    m.set_input(Input::ProgramMode(true)).unwrap();
    for &(addr, data) in cells {
        m.set_input(Input::ProgramAddress(addr)).unwrap();
        m.set_input(Input::ProgramData(data)).unwrap();
        m.set_input(Input::ProgramWrite(true)).unwrap();
        m.set_input(Input::ProgramWrite(false)).unwrap();
    }
    m.set_input(Input::ProgramMode(false)).unwrap();
}

fn out(m: &Machine, o: Output) -> u8 {
    m.read_output(o).unwrap().driven().unwrap()
}

fn run_source(source: &str) -> Machine {
    let image = assemble(source).unwrap();
    let mut m = Machine::new();
    m.assert_reset();
    m.load_program(&image).unwrap();
    m.run_until_halt(10_000).unwrap();
    assert!(m.is_halted(), "program did not halt");
    m
}

#[test]
fn demo_program_displays_79() {
    let mut m = Machine::new();
    m.set_input(Input::Reset(true)).unwrap();
    m.set_input(Input::Reset(false)).unwrap();
    program_via_switches(&mut m, &[
        (0x0, 0b0001_1001), // LDA 9
        (0x1, 0b0010_1110), // ADD E
        (0x2, 0b0011_1101), // SUB D
        (0x3, 0b1110_0000), // OUT
        (0x9, 16),
        (0xE, 127),
        (0xD, 64),
    ]);

    m.advance_clock(17).unwrap();

    assert_eq!(m.read_output(Output::Display).unwrap().to_binstr(8), "01001111");
    assert_eq!(out(&m, Output::Step), 0);
    assert_eq!(out(&m, Output::Zero), 0);
    assert_eq!(out(&m, Output::Carry), 1);
}

#[test]
fn display_shows_incoming_value_during_out_step() {
    let mut m = Machine::new();
    m.load_program(&[0x19, 0x2E, 0x3D, 0xE0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 64, 127, 0]).unwrap();
    m.advance_clock(16).unwrap();

    assert_eq!(m.control_word().unwrap(), ControlWord::A_OUT | ControlWord::OUT_IN);
    assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Driving(79));
    assert_eq!(out(&m, Output::Display), 79, "unbuffered output follows the bus");
    assert_eq!(m.out.unbuffered(), 0, "nothing latched before the edge");
}

#[test]
fn mar_lags_pc_by_one_clock() {
    let mut m = Machine::new();
    // NOPs everywhere: fetch loads MAR from PC, then PC increments
    m.advance_clock(1).unwrap();
    assert_eq!((out(&m, Output::ProgramCounter), out(&m, Output::MemoryAddress)), (0, 0));
    m.advance_clock(1).unwrap();
    assert_eq!((out(&m, Output::ProgramCounter), out(&m, Output::MemoryAddress)), (1, 0));
    m.advance_clock(2).unwrap();
    assert_eq!((out(&m, Output::ProgramCounter), out(&m, Output::MemoryAddress)), (1, 1));
}

#[test]
fn bus_floats_when_nothing_drives_it() {
    let mut m = Machine::new();
    m.advance_clock(2).unwrap(); // NOP execute step
    assert_eq!(m.control_word().unwrap(), ControlWord::NONE);
    assert_eq!(m.read_output(Output::Bus).unwrap(), BusValue::Floating);
}

#[test]
fn ldi_sta_lda_round_trip() {
    let m = run_source("
        LDI 7
        STA 15
        LDI 0
        LDA 15
        OUT
        HLT
    ");
    assert_eq!(m.out.unbuffered(), 7);
    assert_eq!(m.ram.cells()[15], 7);
}

#[test]
fn jc_follows_carry() {
    let program = |big: u8| format!("
              LDA big
              ADD one
              JC  yes
              LDI 1
              OUT
              HLT
        yes:  LDI 2
              OUT
              HLT
        big:  DAT {}
        one:  DAT 1
    ", big);

    assert_eq!(run_source(&program(255)).out.unbuffered(), 2, "255 + 1 carries");
    assert_eq!(run_source(&program(1)).out.unbuffered(), 1, "1 + 1 does not");
}

#[test]
fn jz_follows_zero() {
    let program = |start: u8| format!("
              LDA n
              SUB one
              JZ  yes
              LDI 1
              OUT
              HLT
        yes:  LDI 2
              OUT
              HLT
        n:    DAT {}
        one:  DAT 1
    ", start);

    assert_eq!(run_source(&program(1)).out.unbuffered(), 2);
    assert_eq!(run_source(&program(5)).out.unbuffered(), 1);
}

#[test]
fn multiply_by_repeated_addition() {
    let m = run_source("
        loop: LDA prod
              ADD x
              STA prod
              LDA cnt
              SUB one
              STA cnt
              JZ  end
              JMP loop
        end:  LDA prod
              OUT
              HLT
        one:  DAT 1
        x:    DAT 3
        cnt:  DAT 4
        prod: DAT 0
    ");
    assert_eq!(m.out.unbuffered(), 12);
}

#[test]
fn clock_is_honoured_after_halt() {
    let mut m = Machine::new();
    m.load_program(&[0xF0, 0x00]).unwrap();
    assert_eq!(m.run_until_halt(100).unwrap(), 3);
    assert_eq!(m.run_until_halt(100).unwrap(), 0);

    m.advance_clock(2).unwrap();
    assert_eq!(out(&m, Output::ProgramCounter), 2);
    assert_eq!(out(&m, Output::Halt), 1);
}

#[test]
fn reset_mid_instruction_keeps_ram() {
    let mut m = Machine::new();
    m.load_program(&[0x19, 0, 0, 0, 0, 0, 0, 0, 0, 42]).unwrap();
    m.advance_clock(3).unwrap();
    assert_eq!(out(&m, Output::Step), 3);

    m.assert_reset();
    assert_eq!(out(&m, Output::Step), 0);
    assert_eq!(out(&m, Output::ProgramCounter), 0);
    assert_eq!(out(&m, Output::Opcode), 0);
    assert_eq!(m.cycles(), 0);
    assert_eq!(m.ram.cells()[9], 42);

    m.advance_clock(4).unwrap();
    assert_eq!(out(&m, Output::RegisterA), 42);
}

#[test]
fn fault_stops_the_machine_until_reset() {
    let m = Machine::new();
    let mut state = serde_json::to_value(&m).unwrap();
    state["control"]["step"] = 9.into();
    let mut m: Machine = serde_json::from_value(state).unwrap();

    let err = m.clock().unwrap_err();
    assert!(matches!(
        err,
        CpuError::Fault { cycle: 0, step: 9, fault: Fault::Control(ControlError::InvalidOpcodeStep { step: 9, .. }) }
    ));
    assert_eq!(m.state(), MachineState::Faulted);
    assert_eq!(m.clock().unwrap_err(), CpuError::NotRunning(MachineState::Faulted));

    m.assert_reset();
    assert!(m.clock().is_ok());
}

#[test]
fn snapshot_serializes() {
    let m = run_source("LDI 3\nOUT\nHLT");
    let json = serde_json::to_value(m.snapshot()).unwrap();
    assert_eq!(json["out"], 3);
    assert_eq!(json["state"], "Halted");
}
