use crate::virtual_machine::operand::Reg;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Register file: eight unsigned 16-bit registers, all zero on reset.
///
/// Indexed with [`Reg`], which is only produced after a bounds check, so
/// access cannot fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct Registers {
    regs: [u16; REGISTER_COUNT],
}

impl Registers {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn get(&self, reg: Reg) -> u16 {
        self.regs[reg.index()]
    }

    pub(super) fn set(&mut self, reg: Reg, value: u16) {
        self.regs[reg.index()] = value;
    }

    /// Applies `f` to the current value of `reg` and stores the result.
    pub(super) fn update(&mut self, reg: Reg, f: impl FnOnce(u16) -> u16) {
        let slot = &mut self.regs[reg.index()];
        *slot = f(*slot);
    }

    pub(super) fn snapshot(&self) -> [u16; REGISTER_COUNT] {
        self.regs
    }

    pub(super) fn clear(&mut self) {
        self.regs = [0; REGISTER_COUNT];
    }
}
