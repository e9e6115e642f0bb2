//! Core of the QCOM toolchain
//!
//! QCOM is a tiny 8-bit machine with eight registers and paged memory. This crate owns
//! the opcode table both the engine and the assembler agree on, and the engine itself.

pub mod constants;
pub mod image;
pub mod isa;
pub mod runtime;
