use std::fmt::Write;

use crate::isa::{self, Entry, OperandKind, register_index};

pub fn format_operand(kind: OperandKind, byte: u8) -> String {
    match kind {
        OperandKind::Register => format!("R{}", register_index(byte)),
        OperandKind::Immediate => format!("$0x{byte:02X}"),
        OperandKind::Address => format!("0x{byte:02X}"),
    }
}

/// Render an instruction in assembler syntax
pub fn format_instruction(entry: &Entry, operands: &[u8]) -> String {
    let operands = entry
        .operands
        .iter()
        .zip(operands)
        .map(|(&kind, &byte)| format_operand(kind, byte))
        .collect::<Vec<_>>();

    if operands.is_empty() {
        entry.mnemonic.to_string()
    } else {
        format!("{} {}", entry.mnemonic, operands.join(", "))
    }
}

/// Disassemble the instruction at `addr`, returning its text and size in bytes.
///
/// Bytes that are not opcodes come out as a one byte `db`, the same way the machine steps
/// over them. Operands cut off by the end of memory read as zero.
pub fn disasm_instruction(memory: &[u8], addr: usize) -> (String, usize) {
    let opcode = memory.get(addr).copied().unwrap_or(0);
    match isa::decode(opcode) {
        Ok(entry) => {
            let operands = (1..=entry.arity())
                .map(|i| memory.get(addr + i).copied().unwrap_or(0))
                .collect::<Vec<_>>();
            (format_instruction(entry, &operands), 1 + entry.arity())
        }
        Err(_) => (format!("db ${opcode:02X}"), 1),
    }
}

/// Listing of `[start, end)`, one instruction per line with its address and raw bytes
pub fn listing(memory: &[u8], start: usize, end: usize) -> String {
    let end = end.min(memory.len());
    let mut out = String::new();
    let mut addr = start;
    while addr < end {
        let (text, size) = disasm_instruction(memory, addr);
        let bytes = memory[addr..(addr + size).min(memory.len())]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");

        let _ = writeln!(out, "{addr:04X}: {bytes:<9} {text}");
        addr += size;
    }

    out
}
