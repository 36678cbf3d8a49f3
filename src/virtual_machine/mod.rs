//! Register-based bytecode virtual machine for evolved programs.
//!
//! The VM executes programs produced by the mutator (or the assembler) and is
//! used by the search driver to score candidates against test cases.
//!
//! # Architecture
//!
//! - **Registers**: 8 unsigned 16-bit registers, wrapping arithmetic
//! - **Memory**: word-addressed, indexed through registers modulo its size
//! - **Instruction format**: fixed 4-word slots `opcode, arg1, arg2, arg3`
//! - **Execution model**: forward-only jumps, so every run terminates; `in`
//!   suspends execution until the host resumes it with a value
//!
//! # Program model
//!
//! - [`program::Program`]: growable code buffer plus its valid length
//! - [`program::ProgramImage`]: portable, versioned form of a program
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing and disassembly
//! - [`errors`]: Assembly and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Operand kinds and validated register indices
//! - [`program`]: Program storage, validation and images
//! - [`vm`]: Core virtual machine implementation

pub mod assembler;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod vm;
