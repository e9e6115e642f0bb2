//! Core of the QCOM machine
//!
//! The machine owns its memory, eight 8-bit registers and the program counter. R7 doubles
//! as the status register: its upper nibble selects the memory page every address operand
//! is resolved through, and bit 0 is the zero flag. One call to [`Machine::step`] executes
//! exactly one instruction.

use std::fmt;

use log::{debug, info, warn};

use crate::constants::{ENTRY_POINT, FLAGS_REGISTER, INPUT_PORT, MIN_MEMORY, REGISTER_COUNT};
use crate::isa::{self, Op, register_index};
use crate::runtime::disasm;
use crate::runtime::display::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// Effect of one executed instruction that the host may want to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Nothing for the host to do
    Continue,
    /// `DIS` latched a new display value
    Display(u8),
    /// `OUT` wrote a value to a port
    Output { port: u8, value: u8 },
    /// `SHW`: present [`Machine::frame`]
    ShowFrame,
    /// `CLS` carries a color but does not touch memory
    Clear(u8),
    /// `BRK` was executed
    Halted,
    /// The byte at `at` is not an opcode. Execution continues at `at + 1`.
    UnknownOpcode { opcode: u8, at: usize },
    /// pc ran past the end of memory, the tick executed nothing
    Stalled,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("machine is halted")]
    MachineHalted,
}

/// Operand layout shared by `MOV` and the two-operand logic and arithmetic forms
#[derive(Debug, Clone, Copy)]
enum Form {
    RegImm,
    AddrReg,
    RegAddr,
    RegReg,
}

/// Target of a one-operand instruction
#[derive(Debug, Clone, Copy)]
enum Target {
    Reg,
    Addr,
}

#[derive(Debug, Clone)]
pub struct Machine {
    pub pc: usize,
    pub registers: [u8; REGISTER_COUNT],
    // Never shorter than MIN_MEMORY, effective addresses are taken modulo its length
    memory: Vec<u8>,
    pub display_value: u8,
    state: State,
}

impl Machine {
    /// Load an image at offset 0, padding memory with zeros up to [`MIN_MEMORY`].
    pub fn new(image: &[u8]) -> Self {
        let mut memory = image.to_vec();
        if memory.len() < MIN_MEMORY {
            memory.resize(MIN_MEMORY, 0);
        }

        Self {
            pc: ENTRY_POINT,
            registers: [0; REGISTER_COUNT],
            memory,
            display_value: 0,
            state: State::Running,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Writable view of memory. Its length is fixed at load time.
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// True once pc points past the last byte of memory
    pub fn is_stalled(&self) -> bool {
        self.pc >= self.memory.len()
    }

    /// Memory page selected by the upper nibble of R7
    pub fn page(&self) -> u8 {
        (self.registers[FLAGS_REGISTER] >> 4) & 0x0F
    }

    pub fn zero_flag(&self) -> bool {
        self.registers[FLAGS_REGISTER] & 0x01 != 0
    }

    /// Resolve an address operand through the current page.
    pub fn effective_address(&self, operand: u8) -> usize {
        (((self.page() as usize) << 8) | operand as usize) % self.memory.len()
    }

    /// Write the controller byte to the input port.
    pub fn set_input(&mut self, buttons: u8) {
        self.memory[INPUT_PORT] = buttons;
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame::new(self.display_value, &self.memory)
    }

    // Fetching
    // --------------------------------------

    /// Read the byte at pc and advance. Past the end of memory this reads 0 and pc stays put.
    fn fetch(&mut self) -> u8 {
        match self.memory.get(self.pc) {
            Some(&byte) => {
                self.pc += 1;
                byte
            }
            None => 0,
        }
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Signal, MachineError> {
        if self.is_halted() {
            return Err(MachineError::MachineHalted);
        }

        let at = self.pc;
        let opcode = self.fetch();
        let entry = match isa::decode(opcode) {
            Ok(entry) => entry,
            Err(e) => {
                // Operand bytes of the unknown instruction are not skipped
                warn!("{e} at {at:04X}");
                return Ok(Signal::UnknownOpcode { opcode, at });
            }
        };

        let mut operands = [0u8; 2];
        for slot in operands.iter_mut().take(entry.arity()) {
            *slot = self.fetch();
        }

        debug!(
            "{at:04X}  {}",
            disasm::format_instruction(entry, &operands[..entry.arity()])
        );

        Ok(self.execute(entry.op, operands))
    }

    /// One scheduling tick: latch the controller state, then step.
    ///
    /// Once pc has run off the end of memory the tick executes nothing and reports
    /// [`Signal::Stalled`].
    pub fn tick(&mut self, buttons: u8) -> Result<Signal, MachineError> {
        if self.is_halted() {
            return Err(MachineError::MachineHalted);
        }

        self.set_input(buttons);
        if self.is_stalled() {
            return Ok(Signal::Stalled);
        }

        self.step()
    }

    /// Tick until `BRK`, until pc runs off the end of memory or until `max_steps`
    /// instructions have run, reporting every signal.
    ///
    /// Returns the number of instructions executed.
    pub fn run<F>(
        &mut self,
        buttons: u8,
        max_steps: Option<u64>,
        mut on_signal: F,
    ) -> Result<u64, MachineError>
    where
        F: FnMut(&Machine, Signal),
    {
        let mut steps = 0;
        while !self.is_halted() && max_steps.is_none_or(|max| steps < max) {
            let signal = self.tick(buttons)?;
            if signal == Signal::Stalled {
                debug!("pc {:04X} is past the end of memory", self.pc);
                on_signal(self, signal);
                break;
            }

            steps += 1;
            on_signal(self, signal);
        }

        Ok(steps)
    }

    // Execution
    // --------------------------------------

    fn reg(&self, operand: u8) -> u8 {
        self.registers[register_index(operand)]
    }

    fn update_zero_flag(&mut self, value: u8) {
        if value == 0 {
            self.registers[FLAGS_REGISTER] |= 0x01;
        } else {
            self.registers[FLAGS_REGISTER] &= !0x01;
        }
    }

    // The flag is updated after the write, so a result stored into R7 loses its bit 0.
    fn store_reg(&mut self, operand: u8, value: u8) {
        self.registers[register_index(operand)] = value;
        self.update_zero_flag(value);
    }

    fn store_mem(&mut self, address: usize, value: u8) {
        self.memory[address] = value;
        self.update_zero_flag(value);
    }

    /// Memory byte behind an address operand
    fn load(&self, operand: u8) -> u8 {
        self.memory[self.effective_address(operand)]
    }

    /// Memory byte behind the pointer stored at an address operand
    fn load_indirect(&self, operand: u8) -> u8 {
        self.load(self.load(operand))
    }

    fn binary(&mut self, form: Form, [a, b]: [u8; 2], f: impl Fn(u8, u8) -> u8) {
        match form {
            Form::RegImm => self.store_reg(a, f(self.reg(a), b)),
            Form::AddrReg => {
                let address = self.effective_address(a);
                let value = f(self.memory[address], self.reg(b));
                self.store_mem(address, value);
            }
            Form::RegAddr => self.store_reg(a, f(self.reg(a), self.load(b))),
            Form::RegReg => self.store_reg(a, f(self.reg(a), self.reg(b))),
        }
    }

    fn unary(&mut self, target: Target, a: u8, f: impl Fn(u8) -> u8) {
        match target {
            Target::Reg => self.store_reg(a, f(self.reg(a))),
            Target::Addr => {
                let address = self.effective_address(a);
                let value = f(self.memory[address]);
                self.store_mem(address, value);
            }
        }
    }

    fn jump(&mut self, target: usize) {
        if target < self.memory.len() {
            self.pc = target;
        }
    }

    fn jump_if(&mut self, condition: u8, on_zero: bool, target: usize) {
        let enabled = condition & 0x01 != 0;
        let taken = enabled && self.zero_flag() == on_zero;
        debug!(
            "branch enabled={enabled} zf={} -> {}",
            self.zero_flag(),
            if taken { "taken" } else { "not taken" }
        );

        if taken {
            self.jump(target);
        }
    }

    fn execute(&mut self, op: Op, operands: [u8; 2]) -> Signal {
        let [a, b] = operands;
        let mov = |_: u8, src: u8| src;

        match op {
            // Display
            Op::DIS_IMM => self.display_value = a,
            Op::DIS_REG => self.display_value = self.reg(a),
            Op::DIS_ADDR => self.display_value = self.load(a),

            // Ports
            Op::IN_REG => self.store_reg(a, self.memory[INPUT_PORT]),
            Op::OUT_IMM_IMM => return Signal::Output { port: a, value: b },
            Op::OUT_IMM_REG => {
                return Signal::Output {
                    port: a,
                    value: self.reg(b),
                };
            }
            Op::OUT_IMM_ADDR => {
                return Signal::Output {
                    port: a,
                    value: self.load(b),
                };
            }

            Op::BRK => {
                info!("halted at {:04X}", self.pc.saturating_sub(1));
                self.state = State::Halted;
                return Signal::Halted;
            }

            // Moves
            Op::MOV_REG_IMM => self.binary(Form::RegImm, operands, mov),
            Op::MOV_ADDR_REG => self.binary(Form::AddrReg, operands, mov),
            Op::MOV_REG_ADDR => self.binary(Form::RegAddr, operands, mov),
            Op::MOV_REG_REG => self.binary(Form::RegReg, operands, mov),

            // Screen
            Op::SHW => return Signal::ShowFrame,
            Op::CLS_IMM => return Signal::Clear(a),

            // Shifts and rotates
            Op::SBL_REG => self.unary(Target::Reg, a, |v| v << 1),
            Op::SBL_ADDR => self.unary(Target::Addr, a, |v| v << 1),
            Op::SBR_REG => self.unary(Target::Reg, a, |v| v >> 1),
            Op::SBR_ADDR => self.unary(Target::Addr, a, |v| v >> 1),
            Op::RBL_REG => self.unary(Target::Reg, a, |v| v.rotate_left(1)),
            Op::RBL_ADDR => self.unary(Target::Addr, a, |v| v.rotate_left(1)),
            Op::RBR_REG => self.unary(Target::Reg, a, |v| v.rotate_right(1)),
            Op::RBR_ADDR => self.unary(Target::Addr, a, |v| v.rotate_right(1)),

            // Logic
            Op::AND_REG_IMM => self.binary(Form::RegImm, operands, |x, y| x & y),
            Op::AND_ADDR_REG => self.binary(Form::AddrReg, operands, |x, y| x & y),
            Op::AND_REG_ADDR => self.binary(Form::RegAddr, operands, |x, y| x & y),
            Op::AND_REG_REG => self.binary(Form::RegReg, operands, |x, y| x & y),
            Op::OR_REG_IMM => self.binary(Form::RegImm, operands, |x, y| x | y),
            Op::OR_ADDR_REG => self.binary(Form::AddrReg, operands, |x, y| x | y),
            Op::OR_REG_ADDR => self.binary(Form::RegAddr, operands, |x, y| x | y),
            Op::OR_REG_REG => self.binary(Form::RegReg, operands, |x, y| x | y),
            Op::XOR_REG_IMM => self.binary(Form::RegImm, operands, |x, y| x ^ y),
            Op::XOR_ADDR_REG => self.binary(Form::AddrReg, operands, |x, y| x ^ y),
            Op::XOR_REG_ADDR => self.binary(Form::RegAddr, operands, |x, y| x ^ y),
            Op::XOR_REG_REG => self.binary(Form::RegReg, operands, |x, y| x ^ y),
            Op::NOT_REG => self.unary(Target::Reg, a, |v| !v),
            Op::NOT_ADDR => self.unary(Target::Addr, a, |v| !v),

            // Arithmetic
            Op::ADD_REG_IMM => self.binary(Form::RegImm, operands, u8::wrapping_add),
            Op::ADD_ADDR_REG => self.binary(Form::AddrReg, operands, u8::wrapping_add),
            Op::ADD_REG_ADDR => self.binary(Form::RegAddr, operands, u8::wrapping_add),
            Op::ADD_REG_REG => self.binary(Form::RegReg, operands, u8::wrapping_add),
            Op::SUB_REG_IMM => self.binary(Form::RegImm, operands, u8::wrapping_sub),
            Op::SUB_ADDR_REG => self.binary(Form::AddrReg, operands, u8::wrapping_sub),
            Op::SUB_REG_ADDR => self.binary(Form::RegAddr, operands, u8::wrapping_sub),
            Op::SUB_REG_REG => self.binary(Form::RegReg, operands, u8::wrapping_sub),
            Op::INC_REG => self.unary(Target::Reg, a, |v| v.wrapping_add(1)),
            Op::INC_ADDR => self.unary(Target::Addr, a, |v| v.wrapping_add(1)),
            Op::DEC_REG => self.unary(Target::Reg, a, |v| v.wrapping_sub(1)),
            Op::DEC_ADDR => self.unary(Target::Addr, a, |v| v.wrapping_sub(1)),

            // Jumping. Register targets are raw except for JNI, which pages them.
            Op::JMP_IMM => self.jump(self.effective_address(a)),
            Op::JMP_REG => self.jump(self.reg(a) as usize),
            Op::JIF_IMM_IMM => self.jump_if(a, true, self.effective_address(b)),
            Op::JIF_IMM_REG => self.jump_if(a, true, self.reg(b) as usize),
            Op::JNI_IMM_IMM => self.jump_if(a, false, self.effective_address(b)),
            Op::JNI_IMM_REG => self.jump_if(a, false, self.effective_address(self.reg(b))),

            // Move into indirect location. Except for the all-address form the zero flag
            // follows the pointer register, not the stored byte.
            Op::MIL_REG_IMM => {
                let address = self.effective_address(self.reg(a));
                self.memory[address] = b;
                self.update_zero_flag(self.reg(a));
            }
            Op::MIL_REG_REG => {
                let address = self.effective_address(self.reg(a));
                self.memory[address] = self.reg(b);
                self.update_zero_flag(self.reg(a));
            }
            Op::MIL_REG_ADDR => {
                let address = self.effective_address(self.reg(a));
                self.memory[address] = self.load(b);
                self.update_zero_flag(self.reg(a));
            }
            Op::MIL_ADDR_REG => {
                let address = self.effective_address(self.load(a));
                self.store_mem(address, self.reg(b));
            }

            // Move from indirect location
            Op::MFI_REG_REG => self.store_reg(a, self.load(self.reg(b))),
            Op::MFI_REG_ADDR => self.store_reg(a, self.load_indirect(b)),
            Op::MFI_ADDR_REG => {
                let address = self.effective_address(a);
                self.store_mem(address, self.load(self.reg(b)));
            }
            Op::MFI_ADDR_ADDR => {
                let address = self.effective_address(a);
                self.store_mem(address, self.load_indirect(b));
            }
        }

        match op {
            Op::DIS_IMM | Op::DIS_REG | Op::DIS_ADDR => Signal::Display(self.display_value),
            _ => Signal::Continue,
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc: {:04X}", self.pc)?;
        for (i, value) in self.registers.iter().enumerate() {
            write!(f, "  R{i}: {value:02X}")?;
        }
        write!(
            f,
            "  page: {:X}  zf: {}  dis: {:02X}",
            self.page(),
            self.zero_flag() as u8,
            self.display_value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HEADER_SIZE;

    /// Header followed by `code`
    fn machine_with(code: &[u8]) -> Machine {
        let mut image = vec![0; HEADER_SIZE];
        image.extend_from_slice(code);
        Machine::new(&image)
    }

    fn run_to_halt(mach: &mut Machine) {
        let steps = mach.run(0, Some(1000), |_, _| {}).unwrap();
        assert!(mach.is_halted(), "not halted after {steps} steps");
    }

    #[test]
    fn machine_initialization() {
        let mach = Machine::new(&[1, 2, 3]);
        assert_eq!(mach.pc, 0x90);
        assert_eq!(mach.memory.len(), 256);
        assert_eq!(&mach.memory[..4], &[1, 2, 3, 0]);
        assert_eq!(mach.registers, [0; 8]);
        assert_eq!(mach.state(), State::Running);
    }

    #[test]
    fn large_image_grows_memory() {
        let mach = Machine::new(&vec![0xAA; 0x300]);
        assert_eq!(mach.memory.len(), 0x300);
    }

    #[test]
    fn machine_run_add() {
        let mut mach = machine_with(&[0x10, 0x00, 0x05, 0x30, 0x00, 0x03, 0x0F]);
        run_to_halt(&mut mach);

        assert_eq!(mach.registers[0], 8);
        assert!(!mach.zero_flag());
        assert_eq!(mach.step(), Err(MachineError::MachineHalted));
    }

    #[test]
    fn padding_byte_is_unknown_opcode() {
        let mut mach = Machine::new(&[0; 10]);
        mach.pc = 10;

        assert_eq!(
            mach.step(),
            Ok(Signal::UnknownOpcode {
                opcode: 0x00,
                at: 10
            })
        );
        assert_eq!(mach.pc, 11);
        assert!(!mach.is_halted());
    }

    #[test]
    fn unknown_opcode_does_not_skip_operands() {
        // 0x46 was PSH in older assemblers, its operand byte 0x0F must run as BRK
        let mut mach = machine_with(&[0x46, 0x0F]);
        assert!(matches!(
            mach.step(),
            Ok(Signal::UnknownOpcode { opcode: 0x46, .. })
        ));
        assert_eq!(mach.step(), Ok(Signal::Halted));
    }

    #[test]
    fn fetch_past_end_reads_zero() {
        let mut mach = Machine::new(&[]);
        mach.pc = 256;
        assert!(matches!(
            mach.step(),
            Ok(Signal::UnknownOpcode { opcode: 0, at: 256 })
        ));
        assert_eq!(mach.pc, 256);
    }

    #[test]
    fn operands_past_end_read_zero() {
        let mut image = vec![0; 255];
        image.push(0x10); // MOV R?, $? with nothing after it
        let mut mach = Machine::new(&image);
        mach.pc = 255;
        mach.registers[0] = 9;

        mach.step().unwrap();
        assert_eq!(mach.registers[0], 0);
        assert!(mach.zero_flag());
        assert_eq!(mach.pc, 256);
    }

    #[test]
    fn register_operand_uses_low_bits() {
        let mut mach = machine_with(&[0x10, 0xF9, 0x2A]);
        mach.step().unwrap();
        assert_eq!(mach.registers[1], 0x2A);
    }

    #[test]
    fn display_variants() {
        let mut mach = machine_with(&[0x01, 0x11, 0x02, 0x03, 0x03, 0x40]);
        mach.registers[3] = 0x22;
        mach.memory[0x40] = 0x33;

        assert_eq!(mach.step(), Ok(Signal::Display(0x11)));
        assert_eq!(mach.step(), Ok(Signal::Display(0x22)));
        assert_eq!(mach.step(), Ok(Signal::Display(0x33)));
        assert_eq!(mach.display_value, 0x33);
    }

    #[test]
    fn input_reads_port() {
        let mut mach = machine_with(&[0x04, 0x02, 0x04, 0x02]);
        assert_eq!(mach.tick(0b1000_0001), Ok(Signal::Continue));
        assert_eq!(mach.registers[2], 0b1000_0001);
        assert!(!mach.zero_flag());

        mach.tick(0).unwrap();
        assert_eq!(mach.registers[2], 0);
        assert!(mach.zero_flag());
    }

    #[test]
    fn output_variants() {
        let mut mach = machine_with(&[0x05, 0x01, 0x07, 0x06, 0x02, 0x04, 0x07, 0x03, 0x50]);
        mach.registers[4] = 0x44;
        mach.memory[0x50] = 0x55;

        assert_eq!(mach.step(), Ok(Signal::Output { port: 1, value: 7 }));
        assert_eq!(
            mach.step(),
            Ok(Signal::Output {
                port: 2,
                value: 0x44
            })
        );
        assert_eq!(
            mach.step(),
            Ok(Signal::Output {
                port: 3,
                value: 0x55
            })
        );
    }

    #[test]
    fn mov_forms() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x10, 0x01, 0x2A, // MOV R1, $42
            0x11, 0x20, 0x01, // MOV 0x20, R1
            0x12, 0x02, 0x20, // MOV R2, 0x20
            0x13, 0x03, 0x02, // MOV R3, R2
        ]);
        for _ in 0..4 {
            mach.step().unwrap();
        }

        assert_eq!(mach.registers[1], 42);
        assert_eq!(mach.memory[0x20], 42);
        assert_eq!(mach.registers[2], 42);
        assert_eq!(mach.registers[3], 42);
    }

    #[test]
    fn mov_zero_sets_flag() {
        let mut mach = machine_with(&[0x10, 0x00, 0x00, 0x10, 0x00, 0x01]);
        mach.step().unwrap();
        assert!(mach.zero_flag());
        mach.step().unwrap();
        assert!(!mach.zero_flag());
    }

    #[test]
    fn shifts_and_rotates() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x18, 0x00, // SBL R0
            0x1A, 0x01, // SBR R1
            0x1C, 0x02, // RBL R2
            0x1E, 0x03, // RBR R3
            0x19, 0x30, // SBL 0x30
            0x1D, 0x31, // RBL 0x31
        ]);
        mach.registers[0] = 0x81;
        mach.registers[1] = 0x01;
        mach.registers[2] = 0x81;
        mach.registers[3] = 0x01;
        mach.memory[0x30] = 0x80;
        mach.memory[0x31] = 0x80;

        mach.step().unwrap();
        assert_eq!(mach.registers[0], 0x02);
        mach.step().unwrap();
        assert_eq!(mach.registers[1], 0x00);
        assert!(mach.zero_flag());
        mach.step().unwrap();
        assert_eq!(mach.registers[2], 0x03);
        mach.step().unwrap();
        assert_eq!(mach.registers[3], 0x80);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x30], 0x00);
        assert!(mach.zero_flag());
        mach.step().unwrap();
        assert_eq!(mach.memory[0x31], 0x01);
        assert!(!mach.zero_flag());
    }

    #[test]
    fn logic_forms() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x20, 0x00, 0x0F, // AND R0, $0x0F
            0x27, 0x01, 0x00, // OR R1, R0
            0x29, 0x40, 0x01, // XOR 0x40, R1
            0x2C, 0x02,       // NOT R2
            0x2D, 0x41,       // NOT 0x41
        ]);
        mach.registers[0] = 0xF3;
        mach.registers[1] = 0x30;
        mach.memory[0x40] = 0xFF;
        mach.memory[0x41] = 0xFF;

        mach.step().unwrap();
        assert_eq!(mach.registers[0], 0x03);
        mach.step().unwrap();
        assert_eq!(mach.registers[1], 0x33);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x40], 0xCC);
        mach.step().unwrap();
        assert_eq!(mach.registers[2], 0xFF);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x41], 0x00);
        assert!(mach.zero_flag());
    }

    #[test]
    fn arithmetic_wraps() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x30, 0x00, 0x01, // ADD R0, $1
            0x34, 0x01, 0x01, // SUB R1, $1
            0x35, 0x40, 0x02, // SUB 0x40, R2
            0x3A, 0x03,       // DEC R3
            0x39, 0x41,       // INC 0x41
        ]);
        mach.registers[0] = 0xFF;
        mach.registers[1] = 0x00;
        mach.registers[2] = 0x05;
        mach.memory[0x40] = 0x05;
        mach.registers[3] = 0x01;
        mach.memory[0x41] = 0xFF;

        mach.step().unwrap();
        assert_eq!(mach.registers[0], 0x00);
        assert!(mach.zero_flag());
        mach.step().unwrap();
        assert_eq!(mach.registers[1], 0xFF);
        assert!(!mach.zero_flag());
        mach.step().unwrap();
        assert_eq!(mach.memory[0x40], 0x00);
        assert!(mach.zero_flag());
        mach.step().unwrap();
        assert_eq!(mach.registers[3], 0x00);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x41], 0x00);
    }

    #[test]
    fn result_in_r7_loses_bit_zero_to_flag() {
        // OR R7, $0x11: the stored 0x11 is non-zero so bit 0 is cleared again
        let mut mach = machine_with(&[0x24, 0x07, 0x11]);
        mach.step().unwrap();
        assert_eq!(mach.registers[7], 0x10);
        assert_eq!(mach.page(), 1);
    }

    #[test]
    fn silent_instructions_keep_flag() {
        for code in [
            &[0x01, 0x00][..],       // DIS $0
            &[0x02, 0x00][..],       // DIS R0
            &[0x03, 0x00][..],       // DIS 0x00
            &[0x05, 0x00, 0x00][..], // OUT $0, $0
            &[0x06, 0x00, 0x00][..], // OUT $0, R0
            &[0x07, 0x00, 0x00][..], // OUT $0, 0x00
            &[0x14][..],             // SHW
            &[0x15, 0x00][..],       // CLS $0
            &[0x40, 0x00][..],       // JMP $0
            &[0x41, 0x00][..],       // JMP R0
            &[0x42, 0x01, 0x00][..], // JIF $1, $0
            &[0x42, 0x00, 0x00][..], // JIF $0, $0
            &[0x43, 0x01, 0x00][..], // JIF $1, R0
            &[0x44, 0x01, 0x00][..], // JNI $1, $0
            &[0x44, 0x00, 0x00][..], // JNI $0, $0
            &[0x45, 0x01, 0x00][..], // JNI $1, R0
            &[0x0F][..],             // BRK
        ] {
            for flag in [0x00, 0x01] {
                let mut mach = machine_with(code);
                mach.registers[7] = flag;
                mach.step().unwrap();
                assert_eq!(mach.registers[7] & 0x01, flag, "opcode {:02X}", code[0]);
            }
        }
    }

    #[test]
    fn paged_addressing() {
        let mut mach = Machine::new(&vec![0; 0x300]);
        mach.registers[7] = 0x20;
        assert_eq!(mach.effective_address(0x10), 0x210);

        mach.registers[7] = 0x30;
        assert_eq!(mach.effective_address(0x10), 0x010);
    }

    #[test]
    fn screen_signals() {
        let mut mach = machine_with(&[0x14, 0x15, 0xE0]);
        mach.memory[0] = 0xFF;
        assert_eq!(mach.step(), Ok(Signal::ShowFrame));
        assert_eq!(mach.step(), Ok(Signal::Clear(0xE0)));
        assert_eq!(mach.memory[0], 0xFF);
    }

    #[test]
    fn jump_immediate_is_paged() {
        let mut mach = Machine::new(&vec![0; 0x200]);
        mach.memory[0x90] = 0x40;
        mach.memory[0x91] = 0x20;
        mach.registers[7] = 0x10;

        mach.step().unwrap();
        assert_eq!(mach.pc, 0x120);
    }

    #[test]
    fn jump_register_is_raw() {
        let mut mach = Machine::new(&vec![0; 0x200]);
        mach.memory[0x90] = 0x41;
        mach.memory[0x91] = 0x02;
        mach.registers[2] = 0xA0;
        mach.registers[7] = 0x10;

        mach.step().unwrap();
        assert_eq!(mach.pc, 0xA0);
    }

    #[test]
    fn conditional_jumps() {
        // JIF $1, 0xA0
        let mut mach = machine_with(&[0x42, 0x01, 0xA0]);
        mach.step().unwrap();
        assert_eq!(mach.pc, 0x93);

        let mut mach = machine_with(&[0x42, 0x01, 0xA0]);
        mach.registers[7] = 0x01;
        mach.step().unwrap();
        assert_eq!(mach.pc, 0xA0);

        // Disabled condition is never taken
        let mut mach = machine_with(&[0x42, 0x00, 0xA0]);
        mach.registers[7] = 0x01;
        mach.step().unwrap();
        assert_eq!(mach.pc, 0x93);

        // JNI $1, 0xA0
        let mut mach = machine_with(&[0x44, 0x01, 0xA0]);
        mach.step().unwrap();
        assert_eq!(mach.pc, 0xA0);

        let mut mach = machine_with(&[0x44, 0x03, 0xA0]);
        mach.registers[7] = 0x01;
        mach.step().unwrap();
        assert_eq!(mach.pc, 0x93);
    }

    #[test]
    fn register_conditional_jumps_page_differently() {
        let mut image = vec![0; 0x200];
        image[0x90..0x93].copy_from_slice(&[0x43, 0x01, 0x02]);

        // JIF $1, R2 ignores the page
        let mut mach = Machine::new(&image);
        mach.registers[2] = 0x30;
        mach.registers[7] = 0x11;
        mach.step().unwrap();
        assert_eq!(mach.pc, 0x30);

        // JNI $1, R2 goes through it
        image[0x90] = 0x45;
        let mut mach = Machine::new(&image);
        mach.registers[2] = 0x30;
        mach.registers[7] = 0x10;
        mach.step().unwrap();
        assert_eq!(mach.pc, 0x130);
    }

    #[test]
    fn mil_flag_follows_pointer_register() {
        // MIL R1, $0
        let mut mach = machine_with(&[0x50, 0x01, 0x00]);
        mach.registers[1] = 0x40;
        mach.memory[0x40] = 0x99;
        mach.step().unwrap();

        assert_eq!(mach.memory[0x40], 0x00);
        assert!(!mach.zero_flag());
    }

    #[test]
    fn mil_forms() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x51, 0x01, 0x02, // MIL R1, R2
            0x52, 0x03, 0x60, // MIL R3, 0x60
            0x53, 0x61, 0x02, // MIL 0x61, R2
        ]);
        mach.registers[1] = 0x40;
        mach.registers[2] = 0x77;
        mach.registers[3] = 0x00;
        mach.memory[0x60] = 0x66;
        mach.memory[0x61] = 0x50;

        mach.step().unwrap();
        assert_eq!(mach.memory[0x40], 0x77);
        assert!(!mach.zero_flag());

        mach.step().unwrap();
        assert_eq!(mach.memory[0x00], 0x66);
        // R3 is zero even though 0x66 was stored
        assert!(mach.zero_flag());

        mach.step().unwrap();
        assert_eq!(mach.memory[0x50], 0x77);
        assert!(!mach.zero_flag());
    }

    #[test]
    fn mfi_forms() {
        #[rustfmt::skip]
        let mut mach = machine_with(&[
            0x54, 0x00, 0x01, // MFI R0, R1
            0x55, 0x02, 0x60, // MFI R2, 0x60
            0x56, 0x62, 0x01, // MFI 0x62, R1
            0x57, 0x63, 0x60, // MFI 0x63, 0x60
        ]);
        mach.registers[1] = 0x40;
        mach.memory[0x40] = 0x11;
        mach.memory[0x60] = 0x41;
        mach.memory[0x41] = 0x22;

        mach.step().unwrap();
        assert_eq!(mach.registers[0], 0x11);
        mach.step().unwrap();
        assert_eq!(mach.registers[2], 0x22);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x62], 0x11);
        mach.step().unwrap();
        assert_eq!(mach.memory[0x63], 0x22);
    }

    #[test]
    fn mfi_sets_flag_from_value() {
        let mut mach = machine_with(&[0x54, 0x00, 0x01]);
        mach.registers[0] = 5;
        mach.registers[1] = 0x40;
        mach.step().unwrap();

        assert_eq!(mach.registers[0], 0);
        assert!(mach.zero_flag());
    }

    #[test]
    fn run_respects_step_budget() {
        // JMP 0x90 forever
        let mut mach = machine_with(&[0x40, 0x90]);
        let mut signals = 0;
        let steps = mach.run(0, Some(25), |_, _| signals += 1).unwrap();

        assert_eq!(steps, 25);
        assert_eq!(signals, 25);
        assert!(!mach.is_halted());
    }

    #[test]
    fn run_stops_when_pc_leaves_memory() {
        // MOV R0, $1 with no BRK: the zero padding runs as unknown opcodes up to 0x100
        let mut mach = machine_with(&[0x10, 0x00, 0x01]);
        let mut last = None;
        let steps = mach.run(0, None, |_, signal| last = Some(signal)).unwrap();

        assert_eq!(steps, 1 + (0x100 - 0x93));
        assert_eq!(last, Some(Signal::Stalled));
        assert_eq!(mach.pc, 0x100);
        assert!(mach.is_stalled());
        assert!(!mach.is_halted());
        assert_eq!(mach.registers[0], 1);
    }

    #[test]
    fn stalled_tick_executes_nothing() {
        let mut mach = Machine::new(&[]);
        mach.pc = 0x100;
        let before = mach.registers;

        assert_eq!(mach.tick(0x42), Ok(Signal::Stalled));
        assert_eq!(mach.tick(0x42), Ok(Signal::Stalled));
        assert_eq!(mach.pc, 0x100);
        assert_eq!(mach.registers, before);
        assert_eq!(mach.memory()[0x80], 0x42);
    }

    #[test]
    fn memory_view_keeps_its_length() {
        let mut mach = Machine::new(&[]);
        mach.memory_mut()[0x10] = 0xAB;

        assert_eq!(mach.memory().len(), 0x100);
        assert_eq!(mach.memory()[0x10], 0xAB);
        assert_eq!(mach.effective_address(0xFF), 0xFF);
    }

    #[test]
    fn dump_ctx() {
        let mut mach = machine_with(&[]);
        mach.registers[7] = 0x31;
        let dump = mach.to_string();
        assert!(dump.starts_with("pc: 0090"));
        assert!(dump.contains("page: 3  zf: 1"));
    }
}
