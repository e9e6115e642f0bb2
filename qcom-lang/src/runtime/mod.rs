pub mod disasm;
pub mod display;
pub mod input;
pub mod machine;
