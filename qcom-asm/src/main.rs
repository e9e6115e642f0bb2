use clap::Parser as CParser;
use log::LevelFilter;
use std::path::PathBuf;

use qcom_lang::constants::{ENTRY_POINT, IMAGE_EXTENSION};
use qcom_lang::runtime::disasm;

#[derive(CParser)]
#[command(name = "qas")]
#[command(about = "QCOM assembler")]
struct Args {
    input: PathBuf,

    /// Defaults to the input path with a .qcom extension
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the label table and a disassembly of the result
    #[arg(long)]
    listing: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(IMAGE_EXTENSION));

    let compiled = qcom_asm::compile_file(&args.input, &output)?;
    let bytes = &compiled.image;

    if args.listing {
        let mut labels = compiled.labels.iter().collect::<Vec<_>>();
        labels.sort_by_key(|(_, address)| **address);
        for (name, address) in labels {
            println!("{address:04X}  {name}");
        }
        print!("{}", disasm::listing(bytes, ENTRY_POINT, bytes.len()));
    }

    println!("Assembled image written to {}", output.display());
    println!("Image size: {} bytes", bytes.len());

    Ok(())
}
