pub mod assembler;
pub mod layout;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, bail};

use qcom_lang::constants::IMAGE_EXTENSION;
use qcom_lang::image;

use assembler::Assembler;
use parser::ParseResult;

/// Assemble source text into an image, zero header included.
pub fn assemble(src: &str) -> ParseResult<Vec<u8>> {
    Assembler::new().assemble(src)
}

/// Result of [`compile_file`]
#[derive(Debug, Clone)]
pub struct Compiled {
    pub image: Vec<u8>,
    pub labels: HashMap<String, usize>,
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (fs::canonicalize(a), fs::canonicalize(b)),
            (Ok(a), Ok(b)) if a == b
        )
}

/// Assemble the file at `input` and write the image to `output`.
///
/// `output` must carry the image extension and must not be the source itself. Nothing is
/// written unless the whole source assembles.
pub fn compile_file(input: &Path, output: &Path) -> anyhow::Result<Compiled> {
    if output.extension().is_none_or(|ext| ext != IMAGE_EXTENSION) {
        bail!(
            "output file must have a .{IMAGE_EXTENSION} extension: {}",
            output.display()
        );
    }
    if same_file(input, output) {
        bail!("output would overwrite the source: {}", output.display());
    }

    let src = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let mut assembler = Assembler::new();
    let bytes = assembler
        .assemble(&src)
        .with_context(|| format!("failed to assemble {}", input.display()))?;

    image::store(output, &bytes)?;

    Ok(Compiled {
        image: bytes,
        labels: assembler.labels().clone(),
    })
}
