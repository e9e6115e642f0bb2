//! Assembler for QCOM images
//!
//! Parser for the assembly syntax
//!
//! Every non-blank line is a comment, a label definition or a single instruction of the form
//! `MNEMONIC [operand[, operand]]`. Operands are checked against the opcode table here, so
//! everything past the parser only deals with encodable instructions.

use qcom_lang::isa::{self, Entry, IsaError, OperandKind};

use super::lexer::{self, Lexer, Line, Token, TokenKind};

// --------------------------------------------
// AST definition

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(u8),
    Immediate(u8),
    Address(u8),
    /// Lowered to an immediate offset plus a page setup prelude
    Label(String),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Register(_) => OperandKind::Register,
            Operand::Immediate(_) | Operand::Label(_) => OperandKind::Immediate,
            Operand::Address(_) => OperandKind::Address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub line: usize,
    pub text: String,
    pub entry: &'static Entry,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn label_count(&self) -> usize {
        self.operands
            .iter()
            .filter(|op| matches!(op, Operand::Label(_)))
            .count()
    }

    /// `JIF` and `JNI` get their page setup hoisted above the previous instruction.
    pub fn is_conditional_jump(&self) -> bool {
        matches!(self.entry.mnemonic, "JIF" | "JNI")
    }

    pub fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            text: self.text.clone(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Label { line: usize, name: String },
    Instruction(Instruction),
}

pub type Ast = Vec<Node>;

// --------------------------------------------
// Parsing

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind} ('{text}')")]
pub struct ParseError {
    /// 1-based source line
    pub line: usize,
    pub text: String,
    pub kind: ErrorKind,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error(transparent)]
    UnsupportedOperands(#[from] IsaError),

    #[error("invalid operand '{0}'")]
    InvalidOperand(String),

    #[error("invalid number format '{0}'")]
    InvalidNumber(String),

    #[error("undefined label reference '{0}'")]
    UndefinedLabel(String),

    #[error("label '{0}' is already defined")]
    DuplicateLabel(String),

    #[error("operand value {0} is out of 8-bit range")]
    OutOfRange(i64),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse `$`-less numeric text: `0x` hex, `0b` binary, otherwise decimal.
fn parse_number(digits: &str) -> Result<u8, ErrorKind> {
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse()
    }
    .map_err(|_| ErrorKind::InvalidNumber(digits.to_string()))?;

    u8::try_from(value).map_err(|_| ErrorKind::OutOfRange(value))
}

fn parse_operand(token: &Token) -> Result<Operand, ErrorKind> {
    match token.kind {
        TokenKind::Register(index) => Ok(Operand::Register(index)),
        TokenKind::LabelRef => Ok(Operand::Label(token.literal.clone())),
        TokenKind::Immediate => parse_number(&token.literal[1..]).map(Operand::Immediate),
        TokenKind::Address => parse_number(&token.literal).map(Operand::Address),
        TokenKind::Word => Err(ErrorKind::InvalidOperand(token.literal.clone())),
    }
}

#[derive(Debug, Clone)]
pub struct Parser<'p> {
    pub src: &'p str,
    pub ast: Ast,
}

impl<'p> Parser<'p> {
    pub fn new(src: &'p str) -> Self {
        Self {
            src,
            ast: Vec::new(),
        }
    }

    fn parse_instruction(&self, line: usize, text: &str) -> ParseResult<Instruction> {
        let error = |kind| ParseError {
            line,
            text: text.to_string(),
            kind,
        };

        let mut tokens = Lexer::new(text).lex().into_iter();
        let mnemonic = tokens.next().map(|t| t.literal).unwrap_or_default();
        if !isa::is_mnemonic(&mnemonic) {
            return Err(error(ErrorKind::UnknownMnemonic(mnemonic)));
        }

        let operands = tokens
            .map(|token| parse_operand(&token))
            .collect::<Result<Vec<_>, _>>()
            .map_err(error)?;

        let kinds = operands.iter().map(Operand::kind).collect::<Vec<_>>();
        let entry = isa::encode(&mnemonic, &kinds).map_err(|e| error(e.into()))?;

        Ok(Instruction {
            line,
            text: text.to_string(),
            entry,
            operands,
        })
    }

    pub fn parse(&mut self) -> ParseResult<Ast> {
        for (index, raw) in self.src.lines().enumerate() {
            let line = index + 1;
            match lexer::classify(raw) {
                Line::Blank | Line::Comment => {}
                Line::Label(name) => self.ast.push(Node::Label {
                    line,
                    name: name.to_string(),
                }),
                Line::Instruction(text) => {
                    let instruction = self.parse_instruction(line, text)?;
                    self.ast.push(Node::Instruction(instruction));
                }
            }
        }

        Ok(std::mem::take(&mut self.ast))
    }
}
