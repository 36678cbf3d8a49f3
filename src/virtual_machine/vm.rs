//! Core virtual machine implementation.
//!
//! The VM executes fixed-width bytecode slots over eight unsigned 16-bit
//! registers and a word-addressed data memory. All arithmetic wraps, and
//! division by zero yields zero, so a well-formed program can never fault.
//! Jumps only go forward, which bounds every run by the program length.
//!
//! Execution can pause on `in`: [`VM::run`] returns [`Halt::Suspended`] and
//! the host continues with [`VM::resume`] once it has a value.

mod memory;
mod registers;
mod sensors;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{OperandKind, Reg};
use crate::virtual_machine::program::{SLOT_WIDTH, check_operand};
use memory::Memory;
use registers::Registers;

pub use registers::REGISTER_COUNT;
pub use sensors::{NoSensors, Sensors};

/// Default data memory size in words.
pub const DEFAULT_MEMORY_SIZE: usize = 100;

/// Why a call to [`VM::run`] or [`VM::resume`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The cursor reached the end of the program.
    Completed,
    /// An `in` instruction is waiting for a value.
    ///
    /// `query` is the value of the instruction's first register, `register`
    /// is where the resume value will be stored and `cursor` is the word
    /// offset execution continues from.
    Suspended {
        register: u8,
        query: u16,
        cursor: usize,
    },
}

/// What the dispatch loop does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Suspend { query: u16, register: Reg },
}

/// Dispatches an instruction to its handler, decoding and checking operands.
///
/// Handlers are listed as `Variant => handler(field: Kind, ...)`. A leading
/// `output;` or `sensors;` passes the output buffer or the host sensors
/// before the operands.
macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        code = $code:ident,
        at = $at:ident,
        output = $output:ident,
        sensors = $sensors:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    exec_vm!(@call $vm, $code, $at, $output, $sensors, $handler, $args)
                }
            ),*
        }
    }};

    // Handler writing to the output buffer
    (@call $vm:ident, $code:ident, $at:ident, $output:ident, $sensors:ident, $handler:ident,
        (output; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        let mut word = $at;
        $( word += 1; let $field = exec_vm!(@read $code, word, $at, $kind)?; )*
        $vm.$handler($output, $( $field ),*)
    }};

    // Handler calling into the host
    (@call $vm:ident, $code:ident, $at:ident, $output:ident, $sensors:ident, $handler:ident,
        (sensors; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        let mut word = $at;
        $( word += 1; let $field = exec_vm!(@read $code, word, $at, $kind)?; )*
        $vm.$handler($sensors, $( $field ),*)
    }};

    // Pure register/memory handler
    (@call $vm:ident, $code:ident, $at:ident, $output:ident, $sensors:ident, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        let mut word = $at;
        $( word += 1; let $field = exec_vm!(@read $code, word, $at, $kind)?; )*
        $vm.$handler($( $field ),*)
    }};

    // Register index, bounds-checked
    (@read $code:ident, $word:ident, $at:ident, Reg) => {{
        let index = $code[$word];
        Reg::new(index, REGISTER_COUNT).ok_or(VMError::InvalidRegisterIndex { index, offset: $at })
    }};

    // Raw 16-bit immediate
    (@read $code:ident, $word:ident, $at:ident, Imm) => {{
        Ok::<u16, VMError>($code[$word])
    }};

    // Forward, slot-aligned jump target
    (@read $code:ident, $word:ident, $at:ident, Target) => {{
        let target = $code[$word];
        check_operand(OperandKind::Target, target, $at).map(|()| target as usize)
    }};
}

/// Bytecode virtual machine.
///
/// Owns the register file and data memory. Code, output and sensors are
/// supplied per call, so one VM can evaluate many programs and test cases.
pub struct VM {
    /// Register file (8 registers).
    registers: Registers,
    /// Word-addressed data memory.
    memory: Memory,
    /// Word offset of the next slot to execute.
    cursor: usize,
    /// Destination register of a pending `in`.
    pending: Option<Reg>,
    /// Instructions dispatched since the last reset.
    steps: u64,
}

impl Default for VM {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl VM {
    /// Creates a VM with zeroed registers and `memory_size` words of memory.
    pub fn new(memory_size: usize) -> Self {
        Self {
            registers: Registers::new(),
            memory: Memory::new(memory_size),
            cursor: 0,
            pending: None,
            steps: 0,
        }
    }

    /// Executes `code[..length]` from word offset `cursor`.
    ///
    /// Runs until the cursor reaches `length` or an `in` suspends. A cursor at
    /// or past `length` completes immediately. Echoed values are appended to
    /// `output` in execution order.
    pub fn run<S: Sensors + ?Sized>(
        &mut self,
        code: &[u16],
        length: usize,
        cursor: usize,
        output: &mut Vec<u16>,
        sensors: &mut S,
    ) -> Result<Halt, VMError> {
        if self.pending.is_some() {
            return Err(VMError::AlreadySuspended(self.cursor));
        }
        self.execute(code, length, cursor, output, sensors)
    }

    /// Stores `value` into the pending `in` destination and continues
    /// from where execution stopped.
    pub fn resume<S: Sensors + ?Sized>(
        &mut self,
        code: &[u16],
        length: usize,
        value: u16,
        output: &mut Vec<u16>,
        sensors: &mut S,
    ) -> Result<Halt, VMError> {
        let register = self.pending.take().ok_or(VMError::NotSuspended)?;
        self.registers.set(register, value);
        self.execute(code, length, self.cursor, output, sensors)
    }

    fn execute<S: Sensors + ?Sized>(
        &mut self,
        code: &[u16],
        length: usize,
        cursor: usize,
        output: &mut Vec<u16>,
        sensors: &mut S,
    ) -> Result<Halt, VMError> {
        if length % SLOT_WIDTH != 0 || length > code.len() {
            return Err(VMError::InvalidLength {
                length,
                capacity: code.len(),
            });
        }
        if cursor % SLOT_WIDTH != 0 {
            return Err(VMError::MisalignedCursor(cursor));
        }

        self.cursor = cursor;
        while self.cursor < length {
            let at = self.cursor;
            let opcode = code[at];
            let instr = Instruction::try_from(opcode)
                .map_err(|_| VMError::InvalidInstruction { opcode, offset: at })?;
            self.steps += 1;

            match self.exec(instr, code, at, output, sensors)? {
                Flow::Next => self.cursor = at + SLOT_WIDTH,
                Flow::Jump(target) => self.cursor = target,
                Flow::Suspend { query, register } => {
                    self.cursor = at + SLOT_WIDTH;
                    self.pending = Some(register);
                    return Ok(Halt::Suspended {
                        register: register.index() as u8,
                        query,
                        cursor: self.cursor,
                    });
                }
            }
        }
        Ok(Halt::Completed)
    }

    /// Copy of the register file.
    pub fn registers(&self) -> [u16; REGISTER_COUNT] {
        self.registers.snapshot()
    }

    /// Sets a register from the host, e.g. to seed a test.
    pub fn set_register(&mut self, index: u8, value: u16) -> Result<(), VMError> {
        let reg = Reg::new(index as u16, REGISTER_COUNT).ok_or(VMError::InvalidRegisterIndex {
            index: index as u16,
            offset: self.cursor,
        })?;
        self.registers.set(reg, value);
        Ok(())
    }

    pub fn memory(&self) -> &[u16] {
        self.memory.as_slice()
    }

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    /// Zeroes memory and copies `input` to its start.
    pub fn load_input(&mut self, input: &[u16]) {
        self.memory.load(input);
    }

    /// Word offset of the next slot to execute.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }

    /// Instructions dispatched since the last [`reset`](VM::reset).
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Zeroes registers and memory and drops any pending `in`.
    pub fn reset(&mut self) {
        self.registers.clear();
        self.memory.clear();
        self.cursor = 0;
        self.pending = None;
        self.steps = 0;
    }

    /// Executes a single instruction.
    fn exec<S: Sensors + ?Sized>(
        &mut self,
        instruction: Instruction,
        code: &[u16],
        at: usize,
        output: &mut Vec<u16>,
        sensors: &mut S,
    ) -> Result<Flow, VMError> {
        exec_vm! {
            vm = self,
            code = code,
            at = at,
            output = output,
            sensors = sensors,
            instr = instruction,
            {
                // Immediate / move
                Set => op_set(value: Imm, dst: Reg),
                Move => op_move(src: Reg, dst: Reg),
                // Arithmetic
                Inc => op_inc(dst: Reg),
                Dec => op_dec(dst: Reg),
                Add => op_add(src: Reg, dst: Reg),
                Sub => op_sub(src: Reg, dst: Reg),
                Mul => op_mul(src: Reg, dst: Reg),
                Div => op_div(src: Reg, dst: Reg),
                Rem => op_rem(src: Reg, dst: Reg),
                // Memory
                Read => op_read(addr: Reg, dst: Reg),
                Write => op_write(addr: Reg, src: Reg),
                // Control flow
                Jump => op_jump(target: Target),
                JumpG => op_jumpg(lhs: Reg, rhs: Reg, target: Target),
                JumpL => op_jumpl(lhs: Reg, rhs: Reg, target: Target),
                JumpE => op_jumpe(lhs: Reg, rhs: Reg, target: Target),
                JumpZ => op_jumpz(reg: Reg, target: Target),
                JumpN => op_jumpn(reg: Reg, target: Target),
                // Output
                Echo => op_echo(output; src: Reg),
                // Bitwise
                Or => op_or(src: Reg, dst: Reg),
                And => op_and(src: Reg, dst: Reg),
                Xor => op_xor(src: Reg, dst: Reg),
                Not => op_not(src: Reg, dst: Reg),
                Shl => op_shl(src: Reg, dst: Reg),
                Shr => op_shr(src: Reg, dst: Reg),
                // Sensors
                In => op_in(query: Reg, dst: Reg),
                Out => op_out(sensors; a: Reg, b: Reg, dst: Reg),
                Step => op_step(sensors; a: Reg, b: Reg, dst: Reg),
                Eat => op_eat(sensors; a: Reg, b: Reg, dst: Reg),
                Clone => op_clone(sensors; a: Reg, b: Reg, dst: Reg),
            }
        }
    }

    /// `dst = f(dst, src)`
    fn binary(
        &mut self,
        src: Reg,
        dst: Reg,
        f: impl FnOnce(u16, u16) -> u16,
    ) -> Result<Flow, VMError> {
        let rhs = self.registers.get(src);
        self.registers.update(dst, |lhs| f(lhs, rhs));
        Ok(Flow::Next)
    }

    fn branch(cond: bool, target: usize) -> Result<Flow, VMError> {
        Ok(if cond { Flow::Jump(target) } else { Flow::Next })
    }

    fn op_set(&mut self, value: u16, dst: Reg) -> Result<Flow, VMError> {
        self.registers.set(dst, value);
        Ok(Flow::Next)
    }

    fn op_move(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        let v = self.registers.get(src);
        self.registers.set(dst, v);
        Ok(Flow::Next)
    }

    fn op_inc(&mut self, dst: Reg) -> Result<Flow, VMError> {
        self.registers.update(dst, |v| v.wrapping_add(1));
        Ok(Flow::Next)
    }

    fn op_dec(&mut self, dst: Reg) -> Result<Flow, VMError> {
        self.registers.update(dst, |v| v.wrapping_sub(1));
        Ok(Flow::Next)
    }

    fn op_add(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, u16::wrapping_add)
    }

    fn op_sub(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, u16::wrapping_sub)
    }

    fn op_mul(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, u16::wrapping_mul)
    }

    fn op_div(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| a.checked_div(b).unwrap_or(0))
    }

    fn op_rem(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| a.checked_rem(b).unwrap_or(0))
    }

    fn op_read(&mut self, addr: Reg, dst: Reg) -> Result<Flow, VMError> {
        let v = self.memory.read(self.registers.get(addr));
        self.registers.set(dst, v);
        Ok(Flow::Next)
    }

    fn op_write(&mut self, addr: Reg, src: Reg) -> Result<Flow, VMError> {
        self.memory
            .write(self.registers.get(addr), self.registers.get(src));
        Ok(Flow::Next)
    }

    fn op_jump(&mut self, target: usize) -> Result<Flow, VMError> {
        Self::branch(true, target)
    }

    fn op_jumpg(&mut self, lhs: Reg, rhs: Reg, target: usize) -> Result<Flow, VMError> {
        Self::branch(self.registers.get(lhs) > self.registers.get(rhs), target)
    }

    fn op_jumpl(&mut self, lhs: Reg, rhs: Reg, target: usize) -> Result<Flow, VMError> {
        Self::branch(self.registers.get(lhs) < self.registers.get(rhs), target)
    }

    fn op_jumpe(&mut self, lhs: Reg, rhs: Reg, target: usize) -> Result<Flow, VMError> {
        Self::branch(self.registers.get(lhs) == self.registers.get(rhs), target)
    }

    fn op_jumpz(&mut self, reg: Reg, target: usize) -> Result<Flow, VMError> {
        Self::branch(self.registers.get(reg) == 0, target)
    }

    fn op_jumpn(&mut self, reg: Reg, target: usize) -> Result<Flow, VMError> {
        Self::branch(self.registers.get(reg) != 0, target)
    }

    fn op_echo(&mut self, output: &mut Vec<u16>, src: Reg) -> Result<Flow, VMError> {
        output.push(self.registers.get(src));
        Ok(Flow::Next)
    }

    fn op_or(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| a | b)
    }

    fn op_and(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| a & b)
    }

    fn op_xor(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| a ^ b)
    }

    fn op_not(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |_, b| !b)
    }

    // Shift amounts are taken mod 32 and the result truncated to 16 bits,
    // so shifting by 16..=31 clears the register.
    fn op_shl(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| ((a as u32) << (b & 31)) as u16)
    }

    fn op_shr(&mut self, src: Reg, dst: Reg) -> Result<Flow, VMError> {
        self.binary(src, dst, |a, b| ((a as u32) >> (b & 31)) as u16)
    }

    fn op_in(&mut self, query: Reg, dst: Reg) -> Result<Flow, VMError> {
        Ok(Flow::Suspend {
            query: self.registers.get(query),
            register: dst,
        })
    }

    /// Hands `(a, b)` to a sensor hook and stores its reply, if any, in `dst`.
    fn sense(
        &mut self,
        a: Reg,
        b: Reg,
        dst: Reg,
        hook: impl FnOnce(u16, u16) -> Option<u16>,
    ) -> Result<Flow, VMError> {
        if let Some(v) = hook(self.registers.get(a), self.registers.get(b)) {
            self.registers.set(dst, v);
        }
        Ok(Flow::Next)
    }

    fn op_out<S: Sensors + ?Sized>(
        &mut self,
        sensors: &mut S,
        a: Reg,
        b: Reg,
        dst: Reg,
    ) -> Result<Flow, VMError> {
        self.sense(a, b, dst, |x, y| sensors.on_out(x, y))
    }

    fn op_step<S: Sensors + ?Sized>(
        &mut self,
        sensors: &mut S,
        a: Reg,
        b: Reg,
        dst: Reg,
    ) -> Result<Flow, VMError> {
        self.sense(a, b, dst, |x, y| sensors.on_step(x, y))
    }

    fn op_eat<S: Sensors + ?Sized>(
        &mut self,
        sensors: &mut S,
        a: Reg,
        b: Reg,
        dst: Reg,
    ) -> Result<Flow, VMError> {
        self.sense(a, b, dst, |x, y| sensors.on_eat(x, y))
    }

    fn op_clone<S: Sensors + ?Sized>(
        &mut self,
        sensors: &mut S,
        a: Reg,
        b: Reg,
        dst: Reg,
    ) -> Result<Flow, VMError> {
        self.sense(a, b, dst, |x, y| sensors.on_clone(x, y))
    }
}
