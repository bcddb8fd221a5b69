//! SAP-1 Emulator - CLI Entry Point
//!
//! Commands:
//! - `sap-emu run <program>` - Run an image or ASM file until HLT
//! - `sap-emu debug <program>` - Interactive debugger
//! - `sap-emu asm <source>` - Assemble to a program image
//! - `sap-emu disasm <image>` - Disassemble a program image
//! - `sap-emu microcode` - Print the control-word table
//! - `sap-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "sap-emu")]
#[command(version = "0.1.0")]
#[command(about = "A cycle-accurate emulator of the SAP-1 8-bit computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the image or ASM file to execute
        program: String,
        /// Maximum number of clock pulses to run
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Log every micro-step
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the image or ASM file to debug
        program: String,
    },
    /// Assemble source to a program image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a program image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
    /// Print the control word of every opcode and step
    Microcode,
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Some(Commands::Run { trace: true, .. }));
    if let Err(e) = init_logging(trace) {
        eprintln!("❌ Failed to configure logging: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace: _, json }) => {
            run_program(&program, max_cycles, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Microcode) => {
            print_microcode();
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("SAP-1 Emulator v0.1.0");
            println!("A Simple-As-Possible 8-bit computer emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Install the subscriber. `RUST_LOG` selects what gets printed unless
/// `--trace` asks for every micro-step.
fn init_logging(trace: bool) -> Result<(), tracing_subscriber::filter::ParseError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = if trace {
        tracing_subscriber::EnvFilter::try_new("sap=trace")?
    } else {
        match tracing_subscriber::EnvFilter::try_from_default_env() {
            Ok(layer) => layer,
            Err(_) => tracing_subscriber::EnvFilter::try_new("warn")?,
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

/// Load a program: `.asm` files are assembled, anything else is read as an
/// image file.
fn load_program_file(path: &str) -> sap::asm::Image {
    use sap::{assemble, load_image};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(image) => {
                println!("📝 Assembled {}", path);
                image
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("📂 Loaded {}", path);
                image
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, max_cycles: u64, json: bool) {
    use sap::Machine;

    let image = load_program_file(path);

    let mut machine = Machine::new();
    machine.assert_reset();
    if let Err(e) = machine.load_program(&image) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    let result = machine.run_until_halt(max_cycles);

    if json {
        match serde_json::to_string_pretty(&machine.snapshot()) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let snap = machine.snapshot();
        println!();
        println!("━━━ Result ━━━");
        println!("Cycles:  {}", snap.cycles);
        println!("State:   {:?}", snap.state);
        println!("Display: {} ({:08b})", snap.out, snap.out);
        println!("A:       {} ({:08b})", snap.a, snap.a);
        println!("B:       {} ({:08b})", snap.b, snap.b);
        println!("PC:      {:X}", snap.pc);
        println!("Flags:   C={} Z={}", snap.flags.carry as u8, snap.flags.zero as u8);
    }

    if let Err(e) = result {
        eprintln!("❌ CPU error: {}", e);
        std::process::exit(1);
    }
    if !machine.is_halted() {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use sap::tui::run_debugger;

    let image = load_program_file(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(image) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ The debugger requires the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use sap::{assemble, save_image};

    let out_path = output.unwrap_or_else(|| {
        source_path.replace(".asm", ".img")
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let image = match assemble(&source) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = save_image(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    use sap::{disassemble, load_image};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&image));
}

fn print_microcode() {
    use sap::cpu::control::{instruction_length, lookup, Flags, Opcode};

    let flag_sets = [
        Flags { carry: false, zero: false },
        Flags { carry: true, zero: false },
        Flags { carry: false, zero: true },
    ];

    println!("━━━ Microcode ━━━");
    for opcode in Opcode::ALL {
        let nibble = opcode.nibble();
        println!();
        println!("{} ({:04b})", opcode, nibble.value());
        for step in 0..instruction_length(nibble) {
            let mut seen = Vec::new();
            for flags in flag_sets {
                let word = match lookup(step, nibble, flags) {
                    Ok(w) => w,
                    Err(e) => {
                        eprintln!("❌ {}", e);
                        std::process::exit(1);
                    }
                };
                if seen.contains(&word) {
                    continue;
                }
                let condition = match (seen.is_empty(), flags.carry, flags.zero) {
                    (true, _, _) => String::new(),
                    (false, true, _) => " [C=1]".to_string(),
                    (false, _, true) => " [Z=1]".to_string(),
                    _ => String::new(),
                };
                println!("  T{}  {:04X}  {}{}", step, word.bits(), word, condition);
                seen.push(word);
            }
        }
    }
}

fn run_self_test() {
    use sap::{assemble, Machine, Output};
    use sap::cpu::alu;

    println!("━━━ SAP-1 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: Adder/subtractor
    print!("ALU add and subtract... ");
    let ok = alu::compute(22, 42, false).value == 64
        && alu::compute(34, 30, true).value == 4
        && alu::compute(29, 56, true).value == 0xE5;
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 2: The demonstration program
    print!("LDA/ADD/SUB/OUT displays 79 after 17 pulses... ");
    let mut m = Machine::new();
    m.assert_reset();
    let image = [0x19, 0x2E, 0x3D, 0xE0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 64, 127, 0];
    let display = m.load_program(&image)
        .and_then(|_| m.advance_clock(17))
        .and_then(|_| m.read_output(Output::Display));
    match display.map(|v| v.driven()) {
        Ok(Some(79)) => { println!("✓"); passed += 1; }
        other => { println!("✗ (got {:?})", other); failed += 1; }
    }

    // Test 3: HLT
    print!("HLT stops the run... ");
    let mut m = Machine::new();
    let halted = m.load_program(&[0xF0])
        .and_then(|_| m.run_until_halt(100));
    if matches!(halted, Ok(3)) && m.is_halted() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 4: Countdown loop with STA and JZ
    print!("Countdown loop terminates... ");
    let source = "
        loop: LDA n
              SUB one
              STA n
              OUT
              JZ  done
              JMP loop
        done: HLT
        one:  DAT 1
        n:    DAT 5
    ";
    let mut m = Machine::new();
    let result = assemble(source)
        .map_err(|e| e.to_string())
        .and_then(|img| m.load_program(&img).map_err(|e| e.to_string()))
        .and_then(|_| m.run_until_halt(1000).map_err(|e| e.to_string()));
    if result.is_ok() && m.is_halted() && m.out.unbuffered() == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ ({:?})", result);
        failed += 1;
    }

    // Test 5: Programming requires program mode
    print!("RAM programming requires program mode... ");
    let mut m = Machine::new();
    if m.write_cell(0, 1).is_err() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
