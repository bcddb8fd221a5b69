//! Debugger application state and logic.

use crate::Machine;
use crate::asm::Image;
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::ram::RAM_SIZE;
use crate::word::Nibble;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Original program, for reloading.
    pub program: Image,
    /// Breakpoints (by PC value, checked at instruction boundaries).
    pub breakpoints: HashSet<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Image) -> Self {
        let mut app = Self {
            machine: Machine::new(),
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
        };
        app.reload();
        app.status = "Ready. Press 'c' to clock, 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    /// One clock pulse.
    pub fn clock(&mut self) {
        if !self.machine.is_running() {
            self.status = format!("Machine stopped: {:?}", self.machine.state());
            self.running = false;
            return;
        }

        let step = self.machine.control.step();
        match self.machine.clock() {
            Ok(word) => self.status = format!("T{}: {}", step, word),
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run to the end of the current instruction.
    pub fn step(&mut self) {
        if !self.machine.is_running() {
            self.status = format!("Machine stopped: {:?}", self.machine.state());
            self.running = false;
            return;
        }

        let pc = self.machine.pc.count();
        match self.machine.step_instruction() {
            Ok(byte) => {
                self.status = format!("PC={}: {}", pc, disassemble_instruction(byte));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        // Leave a breakpoint we are already sitting on
        if self.at_breakpoint() {
            self.step();
        }
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.machine.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.machine.cycles());
            return;
        }

        if self.at_breakpoint() {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", self.machine.pc.count());
            return;
        }

        self.step();
    }

    fn at_breakpoint(&self) -> bool {
        self.machine.control.step() == 0 && self.breakpoints.contains(&self.machine.pc.count().value())
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.pc.count().value();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:X}", pc);
        }
    }

    /// Pulse reset. RAM keeps its contents.
    pub fn reset(&mut self) {
        self.machine.assert_reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Reset and write the loaded program back into RAM.
    pub fn reload(&mut self) {
        self.machine.assert_reset();
        self.running = false;
        self.status = match self.machine.load_program(&self.program) {
            Ok(()) => "Program reloaded.".into(),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Disassembly of every RAM cell: (address, byte, text, is PC).
    pub fn get_listing(&self) -> Vec<(u8, u8, String, bool)> {
        let pc = self.machine.pc.count();
        Nibble::all()
            .take(RAM_SIZE)
            .map(|addr| {
                let byte = self.machine.ram.read(addr);
                (addr.value(), byte, disassemble_instruction(byte), addr == pc)
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Image) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('c') => {
                            app.running = false;
                            app.clock();
                        }
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char('l') => app.reload(),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
