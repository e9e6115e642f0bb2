//! The QCOM instruction set
//!
//! Every instruction is a one byte opcode followed by zero to two operand bytes. This table
//! is the wire contract of the toolchain: the assembler encodes through it, the machine and
//! the disassembler decode through it. Opcode values are persisted in images and must not
//! be renumbered.

use std::fmt;

use OperandKind::{Address as Addr, Immediate as Imm, Register as Reg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// `R0`..`R7`. Only the low three bits of the byte are significant.
    Register,
    /// `$42`, or a label reference lowered to its page offset.
    Immediate,
    /// `0x42`. Always paged through R7 when executed, never used raw.
    Address,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Register => write!(f, "register"),
            OperandKind::Immediate => write!(f, "immediate"),
            OperandKind::Address => write!(f, "address"),
        }
    }
}

/// One row of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub mnemonic: &'static str,
    pub operands: &'static [OperandKind],
    pub op: Op,
}

impl Entry {
    pub fn opcode(&self) -> u8 {
        self.op as u8
    }

    /// Number of operand bytes following the opcode
    pub fn arity(&self) -> usize {
        self.operands.len()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IsaError {
    #[error("unknown opcode ${0:02X}")]
    UnknownOpcode(u8),

    #[error("{mnemonic} does not take ({})", format_kinds(.kinds))]
    UnsupportedCombination {
        mnemonic: String,
        kinds: Vec<OperandKind>,
    },
}

fn format_kinds(kinds: &[OperandKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

macro_rules! instruction_set {
    ($($op:ident = $code:literal, $mnemonic:literal ($($kind:ident),*);)*) => {
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum Op {
            $($op = $code,)*
        }

        /// Every instruction the machine executes, in opcode order.
        pub static TABLE: &[Entry] = &[
            $(Entry { mnemonic: $mnemonic, operands: &[$($kind),*], op: Op::$op },)*
        ];

        impl Op {
            pub fn entry(self) -> &'static Entry {
                match self {
                    $(Op::$op => &Entry { mnemonic: $mnemonic, operands: &[$($kind),*], op: Op::$op },)*
                }
            }
        }

        impl TryFrom<u8> for Op {
            type Error = IsaError;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                match byte {
                    $($code => Ok(Op::$op),)*
                    _ => Err(IsaError::UnknownOpcode(byte)),
                }
            }
        }
    };
}

instruction_set! {
    // Display
    DIS_IMM = 0x01, "DIS" (Imm);
    DIS_REG = 0x02, "DIS" (Reg);
    DIS_ADDR = 0x03, "DIS" (Addr);

    // Ports
    IN_REG = 0x04, "IN" (Reg);
    OUT_IMM_IMM = 0x05, "OUT" (Imm, Imm);
    OUT_IMM_REG = 0x06, "OUT" (Imm, Reg);
    OUT_IMM_ADDR = 0x07, "OUT" (Imm, Addr);

    BRK = 0x0F, "BRK" ();

    // Moves
    MOV_REG_IMM = 0x10, "MOV" (Reg, Imm);
    MOV_ADDR_REG = 0x11, "MOV" (Addr, Reg);
    MOV_REG_ADDR = 0x12, "MOV" (Reg, Addr);
    MOV_REG_REG = 0x13, "MOV" (Reg, Reg);

    // Screen
    SHW = 0x14, "SHW" ();
    CLS_IMM = 0x15, "CLS" (Imm);

    // Shifts and rotates
    SBL_REG = 0x18, "SBL" (Reg);
    SBL_ADDR = 0x19, "SBL" (Addr);
    SBR_REG = 0x1A, "SBR" (Reg);
    SBR_ADDR = 0x1B, "SBR" (Addr);
    RBL_REG = 0x1C, "RBL" (Reg);
    RBL_ADDR = 0x1D, "RBL" (Addr);
    RBR_REG = 0x1E, "RBR" (Reg);
    RBR_ADDR = 0x1F, "RBR" (Addr);

    // Logic
    AND_REG_IMM = 0x20, "AND" (Reg, Imm);
    AND_ADDR_REG = 0x21, "AND" (Addr, Reg);
    AND_REG_ADDR = 0x22, "AND" (Reg, Addr);
    AND_REG_REG = 0x23, "AND" (Reg, Reg);
    OR_REG_IMM = 0x24, "OR" (Reg, Imm);
    OR_ADDR_REG = 0x25, "OR" (Addr, Reg);
    OR_REG_ADDR = 0x26, "OR" (Reg, Addr);
    OR_REG_REG = 0x27, "OR" (Reg, Reg);
    XOR_REG_IMM = 0x28, "XOR" (Reg, Imm);
    XOR_ADDR_REG = 0x29, "XOR" (Addr, Reg);
    XOR_REG_ADDR = 0x2A, "XOR" (Reg, Addr);
    XOR_REG_REG = 0x2B, "XOR" (Reg, Reg);
    NOT_REG = 0x2C, "NOT" (Reg);
    NOT_ADDR = 0x2D, "NOT" (Addr);

    // Arithmetic
    ADD_REG_IMM = 0x30, "ADD" (Reg, Imm);
    ADD_ADDR_REG = 0x31, "ADD" (Addr, Reg);
    ADD_REG_ADDR = 0x32, "ADD" (Reg, Addr);
    ADD_REG_REG = 0x33, "ADD" (Reg, Reg);
    SUB_REG_IMM = 0x34, "SUB" (Reg, Imm);
    SUB_ADDR_REG = 0x35, "SUB" (Addr, Reg);
    SUB_REG_ADDR = 0x36, "SUB" (Reg, Addr);
    SUB_REG_REG = 0x37, "SUB" (Reg, Reg);
    INC_REG = 0x38, "INC" (Reg);
    INC_ADDR = 0x39, "INC" (Addr);
    DEC_REG = 0x3A, "DEC" (Reg);
    DEC_ADDR = 0x3B, "DEC" (Addr);

    // Jumping
    JMP_IMM = 0x40, "JMP" (Imm);
    JMP_REG = 0x41, "JMP" (Reg);
    JIF_IMM_IMM = 0x42, "JIF" (Imm, Imm);
    JIF_IMM_REG = 0x43, "JIF" (Imm, Reg);
    JNI_IMM_IMM = 0x44, "JNI" (Imm, Imm);
    JNI_IMM_REG = 0x45, "JNI" (Imm, Reg);

    // Move into indirect location
    MIL_REG_IMM = 0x50, "MIL" (Reg, Imm);
    MIL_REG_REG = 0x51, "MIL" (Reg, Reg);
    MIL_REG_ADDR = 0x52, "MIL" (Reg, Addr);
    MIL_ADDR_REG = 0x53, "MIL" (Addr, Reg);

    // Move from indirect location
    MFI_REG_REG = 0x54, "MFI" (Reg, Reg);
    MFI_REG_ADDR = 0x55, "MFI" (Reg, Addr);
    MFI_ADDR_REG = 0x56, "MFI" (Addr, Reg);
    MFI_ADDR_ADDR = 0x57, "MFI" (Addr, Addr);
}

/// Look up the opcode for a mnemonic and its operand signature.
///
/// Mnemonics are matched case-insensitively.
pub fn encode(mnemonic: &str, kinds: &[OperandKind]) -> Result<&'static Entry, IsaError> {
    TABLE
        .iter()
        .find(|e| e.mnemonic.eq_ignore_ascii_case(mnemonic) && e.operands == kinds)
        .ok_or_else(|| IsaError::UnsupportedCombination {
            mnemonic: mnemonic.to_ascii_uppercase(),
            kinds: kinds.to_vec(),
        })
}

/// Look up the operand layout of an opcode byte.
pub fn decode(opcode: u8) -> Result<&'static Entry, IsaError> {
    Op::try_from(opcode).map(Op::entry)
}

pub fn is_mnemonic(mnemonic: &str) -> bool {
    TABLE
        .iter()
        .any(|e| e.mnemonic.eq_ignore_ascii_case(mnemonic))
}

/// Register index named by a raw operand byte
#[inline]
pub fn register_index(byte: u8) -> usize {
    (byte & 0x07) as usize
}
