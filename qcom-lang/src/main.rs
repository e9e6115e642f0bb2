use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use qcom_lang::constants::ENTRY_POINT;
use qcom_lang::image;
use qcom_lang::runtime::disasm;
use qcom_lang::runtime::input::{self, Button};
use qcom_lang::runtime::machine::{Machine, Signal};

#[derive(Parser)]
#[command(name = "qcom")]
#[command(about = "Run a QCOM image headless")]
struct Args {
    /// Image produced by qas
    rom: PathBuf,

    /// Stop after this many instructions even if BRK was not reached
    #[arg(long)]
    max_steps: Option<u64>,

    /// Raw byte presented on the input port every tick
    #[arg(long, value_parser = parse_byte, default_value = "0")]
    input: u8,

    /// Buttons held for the whole run, combined with --input
    #[arg(long, value_delimiter = ',')]
    press: Vec<Button>,

    /// Print the framebuffer every time the program executes SHW
    #[arg(long)]
    frames: bool,

    /// Print a disassembly of the image instead of running it
    #[arg(long)]
    disasm: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("'{s}' is not a byte: {e}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let rom = image::load(&args.rom)?;

    if args.disasm {
        print!("{}", disasm::listing(&rom, ENTRY_POINT, rom.len()));
        return Ok(());
    }

    let buttons = args.input | input::mask(&args.press);
    let mut machine = Machine::new(&rom);
    let steps = machine
        .run(buttons, args.max_steps, |machine, signal| match signal {
            Signal::Display(value) => println!("display: {value:08b}"),
            Signal::Output { port, value } => println!("out {port:02X}: {value:02X}"),
            Signal::ShowFrame if args.frames => print!("{}", machine.frame().to_ascii()),
            Signal::Clear(value) if args.frames => println!("clear: {value:02X}"),
            _ => {}
        })
        .with_context(|| format!("running {}", args.rom.display()))?;

    if machine.is_stalled() {
        log::warn!(
            "ran off the end of memory at {:04X} after {steps} steps",
            machine.pc
        );
    } else if !machine.is_halted() {
        log::warn!("stopped after {steps} steps without reaching BRK");
    }
    println!("{machine}");

    Ok(())
}
