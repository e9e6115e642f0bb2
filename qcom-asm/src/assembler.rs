//! Assembler for QCOM images
//!
//! Image assembler.
//!
//! Takes the AST from the parser, binds labels to absolute addresses and emits the image.
//! Pass one runs the emission order over instruction shapes alone to find where every label
//! lands. Pass two encodes each instruction with labels resolved and flattens the same order
//! into bytes behind the zero header.

use std::collections::HashMap;

use log::{debug, info};

use qcom_lang::constants::{FLAGS_REGISTER, HEADER_SIZE};
use qcom_lang::isa::Op;

use super::layout::{self, PRELUDE_LEN, Slot, Unit};
use super::parser::{
    Ast, ErrorKind, Instruction, Node, Operand, ParseError, ParseResult, Parser,
};

/// Encoded instruction, split the way the emitter interleaves it
#[derive(Debug, Clone, Default)]
struct Encoded {
    prelude: Vec<u8>,
    body: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    // Label name (with its `#`) to absolute image address
    labels: HashMap<String, usize>,
}

/// Clear the page nibble of R7, then set it to the page of `address`. The zero flag bit is
/// left alone.
fn page_setup(address: usize) -> [u8; PRELUDE_LEN] {
    let page = ((address >> 8) & 0x0F) as u8;
    let flags = FLAGS_REGISTER as u8;
    [
        Op::AND_REG_IMM as u8,
        flags,
        0x0F,
        Op::OR_REG_IMM as u8,
        flags,
        page << 4,
    ]
}

fn instructions(ast: &Ast) -> impl Iterator<Item = &Instruction> {
    ast.iter().filter_map(|node| match node {
        Node::Instruction(instruction) => Some(instruction),
        Node::Label { .. } => None,
    })
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels bound by the last call to [`Assembler::assemble`]
    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    pub fn assemble(&mut self, src: &str) -> ParseResult<Vec<u8>> {
        let ast = Parser::new(src).parse()?;

        let slots = instructions(&ast)
            .map(|instruction| Slot {
                prelude_len: PRELUDE_LEN * instruction.label_count(),
                body_len: 1 + instruction.operands.len(),
                conditional: instruction.is_conditional_jump(),
            })
            .collect::<Vec<_>>();
        let units = layout::schedule(&slots);

        // Pass 1: bind labels
        self.bind_labels(&ast, &slots, &units)?;

        // Pass 2: encode and emit
        let encoded = instructions(&ast)
            .map(|instruction| self.encode(instruction))
            .collect::<ParseResult<Vec<_>>>()?;

        let mut image = vec![0; HEADER_SIZE];
        for unit in units {
            match unit {
                Unit::Prelude(i) => image.extend_from_slice(&encoded[i].prelude),
                Unit::Body(i) => image.extend_from_slice(&encoded[i].body),
            }
        }

        info!(
            "assembled {} instructions into {} bytes",
            slots.len(),
            image.len()
        );
        Ok(image)
    }

    fn bind_labels(&mut self, ast: &Ast, slots: &[Slot], units: &[Unit]) -> ParseResult<()> {
        let (first, total) = layout::first_offsets(slots, units);
        self.labels.clear();

        // Index of the instruction following the current node
        let mut next = 0;
        for node in ast {
            match node {
                Node::Instruction(_) => next += 1,
                Node::Label { line, name } => {
                    let address = HEADER_SIZE + first.get(next).copied().unwrap_or(total);
                    if self.labels.insert(name.clone(), address).is_some() {
                        return Err(ParseError {
                            line: *line,
                            text: name.clone(),
                            kind: ErrorKind::DuplicateLabel(name.clone()),
                        });
                    }

                    debug!("label {name} -> {address:04X}");
                }
            }
        }

        Ok(())
    }

    fn encode(&self, instruction: &Instruction) -> ParseResult<Encoded> {
        let mut encoded = Encoded {
            body: vec![instruction.entry.opcode()],
            ..Default::default()
        };

        for operand in &instruction.operands {
            let byte = match operand {
                Operand::Register(index) => *index,
                Operand::Immediate(value) | Operand::Address(value) => *value,
                Operand::Label(name) => {
                    let address = *self.labels.get(name).ok_or_else(|| {
                        instruction.error(ErrorKind::UndefinedLabel(name.clone()))
                    })?;

                    encoded.prelude.extend_from_slice(&page_setup(address));
                    (address & 0xFF) as u8
                }
            };

            encoded.body.push(byte);
        }

        Ok(encoded)
    }
}
