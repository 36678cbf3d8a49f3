use crate::types::encoding::DecodeError;
use evo_derive::Error;

/// Errors that can occur during VM execution, program validation or assembly.
///
/// Arithmetic never fails: wraparound, division by zero and oversized shifts
/// all have defined results. Only structurally broken programs and misuse of
/// the suspend/resume protocol surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Unknown opcode encountered in bytecode.
    #[error("invalid instruction {opcode} at word {offset}")]
    InvalidInstruction { opcode: u16, offset: usize },
    /// Register argument outside the register file.
    #[error("register index {index} out of bounds at word {offset}")]
    InvalidRegisterIndex { index: u16, offset: usize },
    /// Jump target at or before the jump itself.
    #[error("jump at word {offset} targets word {target}, which is not after it")]
    BackwardJump { target: u16, offset: usize },
    /// Jump target that does not land on a slot boundary.
    #[error("jump at word {offset} targets word {target}, which is not a slot boundary")]
    MisalignedJump { target: u16, offset: usize },
    /// Program length is not a whole number of slots within the code buffer.
    #[error("program length {length} is invalid for a code buffer of {capacity} words")]
    InvalidLength { length: usize, capacity: usize },
    /// Start cursor does not land on a slot boundary.
    #[error("cursor {0} is not a slot boundary")]
    MisalignedCursor(usize),
    /// `resume` called while no input is pending.
    #[error("resume called but the vm is not suspended")]
    NotSuspended,
    /// `run` called while an input is still pending.
    #[error("vm is suspended at word {0}, resume it first")]
    AlreadySuspended(usize),
    /// Unrecognized instruction mnemonic during assembly.
    #[error("invalid instruction name: {0}")]
    InvalidInstructionName(String),
    /// Wrong number of operands for an instruction.
    #[error("{instruction} takes {expected} operands, got {actual}")]
    ArityMismatch {
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Expected a register operand (e.g., `r0`) but got something else.
    #[error("expected register, got {0}")]
    ExpectedRegister(String),
    /// Immediate operand is not a 16-bit unsigned number.
    #[error("invalid immediate {0}")]
    InvalidImmediate(String),
    /// Label defined twice.
    #[error("duplicate label {0}")]
    DuplicateLabel(String),
    /// Jump to a label that is never defined.
    #[error("undefined label {0}")]
    UndefinedLabel(String),
    /// Assembly error with line number context.
    #[error("line {line}: {source}")]
    AssemblyError { line: usize, source: String },
    /// Failed to decode a program image.
    #[error("decoding error: {0}")]
    DecodeError(String),
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        VMError::DecodeError(err.to_string())
    }
}
