//! Assembler for QCOM images
//!
//! Lexer for the assembly syntax. Source is strictly line oriented: [`classify`] sorts a raw
//! line into blank, comment, label definition or instruction, and [`Lexer`] splits an
//! instruction line into tokens.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'s> {
    Blank,
    Comment,
    /// `#1`, `#_start`. The name is the whole trimmed line.
    Label(&'s str),
    Instruction(&'s str),
}

/// Drop everything from the first `/` on and trim what is left.
pub fn strip_comment(line: &str) -> &str {
    line.split_once('/').map_or(line, |(code, _)| code).trim()
}

pub fn classify(line: &str) -> Line<'_> {
    let code = strip_comment(line);
    if code.is_empty() {
        return Line::Blank;
    }

    match code.strip_prefix('#') {
        // `#` then a letter is a comment, `#` then anything else defines a label
        Some(rest) => match rest.chars().next() {
            Some(c) if !c.is_alphabetic() => Line::Label(code),
            _ => Line::Comment,
        },
        None => Line::Instruction(code),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Register(u8), // R0..R7
    Immediate,    // $42, $0x2A, $0b101010
    Address,      // 42, 0x2A, 0b101010
    LabelRef,     // #name

    /// Mnemonics, and anything that is not a valid operand
    Word,
}

#[derive(Debug, Clone)]
pub struct Lexer<'l> {
    pub src: &'l str,
    pub pos: usize,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_address_literal(word: &str) -> bool {
    let (digits, radix) = if let Some(hex) = word.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = word.strip_prefix("0b") {
        (bin, 2)
    } else {
        (word, 10)
    };

    !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
}

fn register_index(word: &str) -> Option<u8> {
    match word.as_bytes() {
        [b'R', n @ b'0'..=b'7'] => Some(n - b'0'),
        _ => None,
    }
}

impl Token {
    fn new(word: &str) -> Self {
        let kind = if let Some(index) = register_index(word) {
            TokenKind::Register(index)
        } else if word
            .strip_prefix('#')
            .is_some_and(|name| !name.is_empty() && name.chars().all(is_word_char))
        {
            TokenKind::LabelRef
        } else if word.starts_with('$') {
            TokenKind::Immediate
        } else if is_address_literal(word) {
            TokenKind::Address
        } else {
            TokenKind::Word
        };

        Token {
            kind,
            literal: word.to_string(),
        }
    }
}

impl<'l> Lexer<'l> {
    pub fn new(src: &'l str) -> Self {
        Lexer { src, pos: 0 }
    }

    /// Peek at the next character without consuming it.
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    /// Peek, advance and return the peeked character.
    fn advance(&mut self) -> Option<char> {
        let peeked = self.peek()?;
        self.pos += peeked.len_utf8();
        Some(peeked)
    }

    fn eat_separators(&mut self) {
        while self.peek().is_some_and(is_separator) {
            self.advance();
        }
    }

    fn lex_word(&mut self) -> &'l str {
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_separator(c)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            self.eat_separators();
            if self.peek().is_none() {
                break;
            }

            tokens.push(Token::new(self.lex_word()));
        }

        tokens
    }
}
