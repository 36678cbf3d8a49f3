//! Program storage and serialization.
//!
//! [`Program`] is the growable code buffer the mutator edits in place: a flat
//! word array whose capacity doubles on demand, plus the count of words that
//! currently form the program. [`ProgramImage`] is its portable form.

use crate::types::encoding::{Decode, Encode};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{OperandKind, Reg};
use crate::virtual_machine::vm::REGISTER_COUNT;
use evo_derive::BinaryCodec;

/// Words per instruction slot: opcode plus three arguments.
pub const SLOT_WIDTH: usize = 4;

/// Longest program whose every slot boundary, including the end, fits in a
/// 16-bit jump target.
pub const MAX_LENGTH: usize = u16::MAX as usize + 1 - SLOT_WIDTH;

/// Slots allocated for a fresh program.
const INITIAL_SLOTS: usize = 16;

/// Magic bytes identifying a serialized program image.
const MAGIC: &[u8; 6] = b"EVO_PG";

/// Current image format version.
const CURRENT_VERSION: Version = Version::new(0, 3, 0);

/// Semantic version for image format compatibility.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Growable code buffer.
///
/// Words in `[0, len)` form the program. Words past `len` are spare capacity
/// and are always zero until the buffer grows into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    words: Vec<u16>,
    len: usize,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// Empty program with room for a handful of slots.
    pub fn new() -> Self {
        Self {
            words: vec![0; INITIAL_SLOTS * SLOT_WIDTH],
            len: 0,
        }
    }

    /// Builds a program from raw words, validating every slot.
    pub fn from_words(words: &[u16]) -> Result<Self, VMError> {
        let mut program = Self::new();
        while program.words.len() < words.len() {
            program.grow();
        }
        program.words[..words.len()].copy_from_slice(words);
        program.len = words.len();
        program.validate()?;
        Ok(program)
    }

    /// Whole code buffer, including spare capacity.
    pub fn code(&self) -> &[u16] {
        &self.words
    }

    /// Words that form the program.
    pub fn words(&self) -> &[u16] {
        &self.words[..self.len]
    }

    /// Program length in words.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of instruction slots in the program.
    pub fn slots(&self) -> usize {
        self.len / SLOT_WIDTH
    }

    /// Capacity of the code buffer in words.
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Returns the four words of the slot starting at word offset `at`.
    pub fn slot(&self, at: usize) -> Option<[u16; SLOT_WIDTH]> {
        let words = self.words.get(at..at + SLOT_WIDTH)?;
        let mut slot = [0; SLOT_WIDTH];
        slot.copy_from_slice(words);
        Some(slot)
    }

    /// Overwrites the slot at `at`, growing the buffer if it lies past capacity.
    pub(crate) fn write_slot(&mut self, at: usize, slot: [u16; SLOT_WIDTH]) {
        while at + SLOT_WIDTH > self.words.len() {
            self.grow();
        }
        self.words[at..at + SLOT_WIDTH].copy_from_slice(&slot);
    }

    /// Sets the program length. Words beyond the new length are left in place
    /// for the caller to clear.
    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len % SLOT_WIDTH == 0 && len <= self.words.len());
        self.len = len;
    }

    /// Doubles the capacity of the code buffer.
    fn grow(&mut self) {
        let capacity = self.words.len().max(SLOT_WIDTH);
        self.words.resize(capacity * 2, 0);
    }

    /// Checks every slot: known opcode, register indices in range, and jump
    /// targets that are slot-aligned and strictly forward.
    pub fn validate(&self) -> Result<(), VMError> {
        validate_code(&self.words, self.len)
    }

    /// Snapshot of the program in portable form.
    pub fn image(&self) -> ProgramImage {
        ProgramImage {
            words: self.words().to_vec(),
            length: self.len as u32,
        }
    }

    /// Renders the program as assembly text.
    pub fn disassemble(&self) -> Result<String, VMError> {
        crate::virtual_machine::assembler::disassemble(&self.words, self.len)
    }
}

/// Validates `code[..length]` without executing it.
pub fn validate_code(code: &[u16], length: usize) -> Result<(), VMError> {
    if length % SLOT_WIDTH != 0 || length > code.len() {
        return Err(VMError::InvalidLength {
            length,
            capacity: code.len(),
        });
    }
    for at in (0..length).step_by(SLOT_WIDTH) {
        decode_slot(code, at)?;
    }
    Ok(())
}

/// Decodes the opcode at `at` and checks its arguments.
///
/// `at + SLOT_WIDTH` must not exceed `code.len()`.
pub(crate) fn decode_slot(code: &[u16], at: usize) -> Result<Instruction, VMError> {
    let opcode = code[at];
    let instr = Instruction::try_from(opcode)
        .map_err(|_| VMError::InvalidInstruction { opcode, offset: at })?;
    for (i, kind) in instr.operands().iter().enumerate() {
        check_operand(*kind, code[at + 1 + i], at)?;
    }
    Ok(instr)
}

/// Checks a single argument word against its kind.
pub(crate) fn check_operand(kind: OperandKind, word: u16, at: usize) -> Result<(), VMError> {
    match kind {
        OperandKind::Imm => Ok(()),
        OperandKind::Reg => Reg::new(word, REGISTER_COUNT)
            .map(|_| ())
            .ok_or(VMError::InvalidRegisterIndex {
                index: word,
                offset: at,
            }),
        OperandKind::Target => {
            if word as usize % SLOT_WIDTH != 0 {
                Err(VMError::MisalignedJump {
                    target: word,
                    offset: at,
                })
            } else if word as usize <= at {
                Err(VMError::BackwardJump {
                    target: word,
                    offset: at,
                })
            } else {
                Ok(())
            }
        }
    }
}

/// Portable program: the words that form it plus their count.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct ProgramImage {
    pub words: Vec<u16>,
    pub length: u32,
}

impl ProgramImage {
    /// Serializes the image to a portable binary format.
    ///
    /// The output includes a magic header and version for compatibility checking.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.encode(&mut out);
        out
    }

    /// Deserializes an image from its binary representation.
    ///
    /// Validates the magic header and version, rejecting images from other
    /// format versions.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, VMError> {
        if input.len() < MAGIC.len() {
            return Err(VMError::DecodeError("truncated".to_string()));
        }

        if &<[u8; 6]>::decode(&mut input)? != MAGIC {
            return Err(VMError::DecodeError("bad magic".to_string()));
        }

        if Version::decode(&mut input)? != CURRENT_VERSION {
            return Err(VMError::DecodeError("unsupported version".to_string()));
        }

        let image = ProgramImage::decode(&mut input)?;
        if !input.is_empty() {
            return Err(VMError::DecodeError("trailing bytes".to_string()));
        }
        validate_code(&image.words, image.length as usize)?;
        Ok(image)
    }

    /// Rebuilds a validated [`Program`].
    pub fn to_program(&self) -> Result<Program, VMError> {
        let length = self.length as usize;
        if length > self.words.len() {
            return Err(VMError::InvalidLength {
                length,
                capacity: self.words.len(),
            });
        }
        Program::from_words(&self.words[..length])
    }

    /// SHA3-256 over the words that form the program, as lowercase hex.
    ///
    /// Two images with the same program share a fingerprint regardless of
    /// spare words carried past `length`.
    pub fn fingerprint(&self) -> String {
        let length = (self.length as usize).min(self.words.len());
        let words = self.words[..length].to_vec();
        words
            .digest()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_program_is_empty() {
        let p = Program::new();
        assert!(p.is_empty());
        assert_eq!(p.capacity(), INITIAL_SLOTS * SLOT_WIDTH);
        assert!(p.code().iter().all(|w| *w == 0));
    }

    #[test]
    fn write_slot_doubles_capacity() {
        let mut p = Program::new();
        let at = INITIAL_SLOTS * SLOT_WIDTH;
        p.write_slot(at, [14, 0, 0, 0]);
        assert_eq!(p.capacity(), INITIAL_SLOTS * SLOT_WIDTH * 2);
        assert_eq!(p.slot(at), Some([14, 0, 0, 0]));
    }

    #[test]
    fn from_words_rejects_backward_jump() {
        assert_eq!(
            Program::from_words(&[14, 0, 0, 0, 8, 4, 0, 0]),
            Err(VMError::BackwardJump {
                target: 4,
                offset: 4
            })
        );
    }

    #[test]
    fn from_words_rejects_misaligned_jump() {
        assert_eq!(
            Program::from_words(&[8, 6, 0, 0]),
            Err(VMError::MisalignedJump {
                target: 6,
                offset: 0
            })
        );
    }

    #[test]
    fn from_words_rejects_bad_register() {
        assert_eq!(
            Program::from_words(&[1, 0, 8, 0]),
            Err(VMError::InvalidRegisterIndex {
                index: 8,
                offset: 0
            })
        );
    }

    #[test]
    fn from_words_rejects_partial_slot() {
        assert!(matches!(
            Program::from_words(&[14, 0, 0]),
            Err(VMError::InvalidLength { length: 3, .. })
        ));
    }

    #[test]
    fn jump_past_end_is_valid() {
        let p = Program::from_words(&[8, 400, 0, 0]).unwrap();
        assert_eq!(p.slots(), 1);
    }

    #[test]
    fn image_roundtrip() {
        let p = Program::from_words(&[0, 7, 1, 0, 14, 1, 0, 0]).unwrap();
        let bytes = p.image().to_bytes();
        let image = ProgramImage::from_bytes(&bytes).unwrap();
        assert_eq!(image.to_program().unwrap().words(), p.words());
    }

    #[test]
    fn image_rejects_bad_magic() {
        let mut bytes = Program::new().image().to_bytes();
        bytes[0] = b'X';
        assert_eq!(
            ProgramImage::from_bytes(&bytes),
            Err(VMError::DecodeError("bad magic".to_string()))
        );
    }

    #[test]
    fn image_rejects_trailing_bytes() {
        let mut bytes = Program::new().image().to_bytes();
        bytes.push(0);
        assert!(ProgramImage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn image_rejects_invalid_program() {
        let image = ProgramImage {
            words: vec![8, 0, 0, 0],
            length: 4,
        };
        assert_eq!(
            ProgramImage::from_bytes(&image.to_bytes()),
            Err(VMError::BackwardJump {
                target: 0,
                offset: 0
            })
        );
    }

    #[test]
    fn image_rejects_length_past_words() {
        let image = ProgramImage {
            words: vec![14, 0, 0, 0],
            length: 8,
        };
        assert!(matches!(
            image.to_program(),
            Err(VMError::InvalidLength { length: 8, .. })
        ));
    }

    #[test]
    fn fingerprint_ignores_spare_words() {
        let a = ProgramImage {
            words: vec![14, 0, 0, 0],
            length: 4,
        };
        let b = ProgramImage {
            words: vec![14, 0, 0, 0, 3, 3, 3, 3],
            length: 4,
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), Program::new().image().fingerprint());
    }
}
