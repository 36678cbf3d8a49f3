use std::fmt;

/// How an argument word of a slot is interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// Register index, must be below [`REGISTER_COUNT`](crate::virtual_machine::vm::REGISTER_COUNT).
    Reg,
    /// Raw 16-bit value.
    Imm,
    /// Word offset of a later slot.
    Target,
}

/// Validated register index.
///
/// Only produced after a bounds check, so indexing the register file with it
/// cannot go out of range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg(u8);

impl Reg {
    pub fn new(index: u16, count: usize) -> Option<Reg> {
        ((index as usize) < count).then_some(Reg(index as u8))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A decoded argument, used for disassembly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(u16),
    Imm(u16),
    Target(u16),
}

impl Operand {
    pub fn decode(kind: OperandKind, word: u16) -> Operand {
        match kind {
            OperandKind::Reg => Operand::Reg(word),
            OperandKind::Imm => Operand::Imm(word),
            OperandKind::Target => Operand::Target(word),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "r{r}"),
            Operand::Imm(v) => write!(f, "{v}"),
            // Targets are shown as slot indices.
            Operand::Target(t) => write!(f, "l{}", t / 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_bounds() {
        assert_eq!(Reg::new(7, 8).map(Reg::index), Some(7));
        assert_eq!(Reg::new(8, 8), None);
        assert_eq!(Reg::new(0xFFFF, 8), None);
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::Reg(3).to_string(), "r3");
        assert_eq!(Operand::Imm(65535).to_string(), "65535");
        assert_eq!(Operand::Target(12).to_string(), "l3");
    }
}
