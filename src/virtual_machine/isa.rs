//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction list and invokes a callback macro for code
//! generation, so the VM, the assembler and the mutator all derive from a
//! single table.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u16>` for decoding the opcode word of a slot
//! - Per-instruction operand layouts used by the mutator and disassembler
//!
//! # Bytecode Format
//!
//! Every instruction occupies one slot of four 16-bit words:
//! `opcode, arg1, arg2, arg3`. Unused trailing arguments are zero.
//! Argument order is always source first, destination last: `move r1, r2`
//! copies `r1` into `r2`.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::OperandKind;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Immediate / move
            // =========================
            /// set imm, rd ; rd = imm
            Set = 0, "set" => [value: Imm, dst: Reg],
            /// move rs, rd ; rd = rs
            Move = 1, "move" => [src: Reg, dst: Reg],
            // =========================
            // Arithmetic (wrapping, unsigned)
            // =========================
            /// inc rd ; rd = rd + 1
            Inc = 2, "inc" => [dst: Reg],
            /// dec rd ; rd = rd - 1
            Dec = 3, "dec" => [dst: Reg],
            /// add rs, rd ; rd = rd + rs
            Add = 4, "add" => [src: Reg, dst: Reg],
            /// sub rs, rd ; rd = rd - rs
            Sub = 5, "sub" => [src: Reg, dst: Reg],
            // =========================
            // Memory (indirect)
            // =========================
            /// read ra, rd ; rd = mem[ra]
            Read = 6, "read" => [addr: Reg, dst: Reg],
            /// write ra, rs ; mem[ra] = rs
            Write = 7, "write" => [addr: Reg, src: Reg],
            // =========================
            // Control flow (forward only)
            // =========================
            /// jump l ; goto l
            Jump = 8, "jump" => [target: Target],
            /// jumpg ra, rb, l ; if ra > rb goto l
            JumpG = 9, "jumpg" => [lhs: Reg, rhs: Reg, target: Target],
            /// jumpl ra, rb, l ; if ra < rb goto l
            JumpL = 10, "jumpl" => [lhs: Reg, rhs: Reg, target: Target],
            /// jumpe ra, rb, l ; if ra == rb goto l
            JumpE = 11, "jumpe" => [lhs: Reg, rhs: Reg, target: Target],
            /// jumpz ra, l ; if ra == 0 goto l
            JumpZ = 12, "jumpz" => [reg: Reg, target: Target],
            /// jumpn ra, l ; if ra != 0 goto l
            JumpN = 13, "jumpn" => [reg: Reg, target: Target],
            // =========================
            // Output
            // =========================
            /// echo rs ; output <- rs
            Echo = 14, "echo" => [src: Reg],
            // =========================
            // Bitwise
            // =========================
            /// or rs, rd ; rd = rd | rs
            Or = 15, "or" => [src: Reg, dst: Reg],
            /// and rs, rd ; rd = rd & rs
            And = 16, "and" => [src: Reg, dst: Reg],
            /// xor rs, rd ; rd = rd ^ rs
            Xor = 17, "xor" => [src: Reg, dst: Reg],
            /// not rs, rd ; rd = !rs
            Not = 18, "not" => [src: Reg, dst: Reg],
            /// mul rs, rd ; rd = rd * rs
            Mul = 19, "mul" => [src: Reg, dst: Reg],
            /// div rs, rd ; rd = rd / rs (0 when rs == 0)
            Div = 20, "div" => [src: Reg, dst: Reg],
            /// rem rs, rd ; rd = rd % rs (0 when rs == 0)
            Rem = 21, "rem" => [src: Reg, dst: Reg],
            /// shl rs, rd ; rd = rd << (rs & 31)
            Shl = 22, "shl" => [src: Reg, dst: Reg],
            /// shr rs, rd ; rd = rd >> (rs & 31)
            Shr = 23, "shr" => [src: Reg, dst: Reg],
            // =========================
            // Sensors
            // =========================
            /// in rq, rd ; suspend with query rq, resume value -> rd
            In = 24, "in" => [query: Reg, dst: Reg],
            /// out ra, rb, rd ; host out(ra, rb) -> rd
            Out = 25, "out" => [a: Reg, b: Reg, dst: Reg],
            /// step ra, rb, rd ; host step(ra, rb) -> rd
            Step = 26, "step" => [a: Reg, b: Reg, dst: Reg],
            /// eat ra, rb, rd ; host eat(ra, rb) -> rd
            Eat = 27, "eat" => [a: Reg, b: Reg, dst: Reg],
            /// clone ra, rb, rd ; host clone(ra, rb) -> rd
            Clone = 28, "clone" => [a: Reg, b: Reg, dst: Reg],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u16> for Instruction {
            type Error = VMError;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Number of opcodes the mutator draws from.
            pub const COUNT: usize = Self::ALL.len();

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Operand kinds of `arg1..`, in slot order.
            pub const fn operands(&self) -> &'static [OperandKind] {
                match self {
                    $( Instruction::$name => &[ $( OperandKind::$kind ),* ], )*
                }
            }

            /// Looks an instruction up by mnemonic (case-insensitive).
            pub fn from_mnemonic(name: &str) -> Option<Instruction> {
                $(
                    if name.eq_ignore_ascii_case($mnemonic) {
                        return Some(Instruction::$name);
                    }
                )*
                None
            }
        }
    };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// True for instructions that carry a jump target.
    pub fn is_jump(&self) -> bool {
        self.operands().contains(&OperandKind::Target)
    }
}
