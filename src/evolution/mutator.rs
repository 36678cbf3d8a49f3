//! Random program edits with one level of undo.
//!
//! Every edit writes exactly one slot: either a new instruction appended at
//! the end or a replacement for an existing one. Generated jumps always
//! target a slot strictly after their own, so mutated programs cannot loop.

use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::OperandKind;
use crate::virtual_machine::program::{MAX_LENGTH, Program, SLOT_WIDTH};
use crate::virtual_machine::vm::REGISTER_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// State needed to revert the last edit.
#[derive(Clone, Copy, Debug)]
struct Undo {
    at: usize,
    previous: [u16; SLOT_WIDTH],
    length: usize,
}

/// Owns the program under search and edits it in place.
///
/// The mutator is the only writer of the program, so its length is the
/// length every evaluation runs with.
pub struct Mutator<R: Rng = StdRng> {
    program: Program,
    rng: R,
    speed: u32,
    undo: Option<Undo>,
}

/// Deterministic RNG for `Some(seed)`, entropy-seeded otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl Mutator<StdRng> {
    /// Mutator over an empty program.
    pub fn new(speed: u32, seed: Option<u64>) -> Self {
        Self::with_rng(Program::new(), seeded_rng(seed), speed)
    }
}

impl<R: Rng> Mutator<R> {
    pub fn with_rng(program: Program, rng: R, speed: u32) -> Self {
        Self {
            program,
            rng,
            speed: speed.max(1),
            undo: None,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    /// Current program length in words.
    pub fn length(&self) -> usize {
        self.program.len()
    }

    /// Applies one random edit and returns the word offset of the slot it wrote.
    ///
    /// Appends with probability `1 / (length * speed)` with `length` in words.
    /// Always appends to an empty program and never once it reaches
    /// [`MAX_LENGTH`]. Otherwise overwrites a uniformly chosen slot. Register operands are drawn from
    /// `0..register_count`, clamped to `1..=8`.
    pub fn mutate(&mut self, register_count: u8) -> usize {
        let length = self.program.len();
        let slots = length / SLOT_WIDTH;
        let append = slots == 0
            || (length + SLOT_WIDTH <= MAX_LENGTH
                && self.rng.gen_range(0..length as u64 * self.speed as u64) == 0);

        let (at, new_length) = if append {
            (length, length + SLOT_WIDTH)
        } else {
            (self.rng.gen_range(0..slots) * SLOT_WIDTH, length)
        };

        self.undo = Some(Undo {
            at,
            previous: self.program.slot(at).unwrap_or([0; SLOT_WIDTH]),
            length,
        });

        let registers = register_count.clamp(1, REGISTER_COUNT as u8) as u16;
        let slot = self.random_instruction(at, new_length, registers);
        self.program.write_slot(at, slot);
        self.program.set_len(new_length);
        at
    }

    /// Reverts the most recent [`mutate`](Mutator::mutate).
    ///
    /// Only one edit is remembered; returns `false` if there is nothing to undo.
    pub fn rollback(&mut self) -> bool {
        let Some(undo) = self.undo.take() else {
            return false;
        };
        self.program.write_slot(undo.at, undo.previous);
        self.program.set_len(undo.length);
        true
    }

    /// Forgets the pending undo, e.g. after accepting an edit.
    pub fn commit(&mut self) {
        self.undo = None;
    }

    /// Random instruction for the slot at `at` in a program of `length` words.
    fn random_instruction(
        &mut self,
        at: usize,
        length: usize,
        registers: u16,
    ) -> [u16; SLOT_WIDTH] {
        // Last slot boundary a jump from `at` may reach.
        let end = length.min(MAX_LENGTH);
        let instr = loop {
            let instr = Instruction::ALL[self.rng.gen_range(0..Instruction::COUNT)];
            if !instr.is_jump() || at + SLOT_WIDTH <= end {
                break instr;
            }
        };

        let mut slot = [instr as u16, 0, 0, 0];
        for (i, kind) in instr.operands().iter().enumerate() {
            slot[i + 1] = match kind {
                OperandKind::Reg => self.rng.gen_range(0..registers),
                OperandKind::Imm => self.rng.gen_range(0..=u16::MAX),
                OperandKind::Target => {
                    let steps = self.rng.gen_range(1..=(end - at) / SLOT_WIDTH);
                    (at + steps * SLOT_WIDTH) as u16
                }
            };
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::vm::{Halt, NoSensors, VM};

    fn seeded(seed: u64) -> Mutator {
        Mutator::new(1, Some(seed))
    }

    #[test]
    fn first_edit_appends() {
        let mut m = seeded(1);
        assert_eq!(m.mutate(8), 0);
        assert_eq!(m.length(), SLOT_WIDTH);
    }

    /// Counts appends over `trials` mutate+rollback rounds on a 16-slot program.
    fn appends_at_64_words(speed: u32, trials: u32) -> u32 {
        let program = Program::from_words(&[0; 16 * SLOT_WIDTH]).unwrap();
        let mut m = Mutator::with_rng(program, seeded_rng(Some(12)), speed);
        let mut appends = 0;
        for _ in 0..trials {
            if m.mutate(8) == 16 * SLOT_WIDTH {
                appends += 1;
            }
            assert!(m.rollback());
        }
        appends
    }

    #[test]
    fn append_rate_follows_length_in_words() {
        // Expected 40_000 / 64 = 625 appends; 1 / slots would give ~2_500.
        let appends = appends_at_64_words(1, 40_000);
        assert!((500..=750).contains(&appends), "appends = {appends}");
    }

    #[test]
    fn mutation_speed_divides_append_rate() {
        // Expected 40_000 / 128 = 312.
        let appends = appends_at_64_words(2, 40_000);
        assert!((220..=410).contains(&appends), "appends = {appends}");
    }

    #[test]
    fn exactly_one_slot_changes() {
        let mut m = seeded(2);
        for _ in 0..20 {
            m.mutate(8);
        }
        for _ in 0..500 {
            let before = m.program().code().to_vec();
            let at = m.mutate(8);
            let after = m.program().code();
            for (i, (a, b)) in before.iter().zip(after).enumerate() {
                if a != b {
                    assert!((at..at + SLOT_WIDTH).contains(&i));
                }
            }
        }
    }

    #[test]
    fn jumps_always_target_later_slots() {
        let mut m = seeded(3);
        for _ in 0..5_000 {
            m.mutate(8);
            let p = m.program();
            for at in (0..p.len()).step_by(SLOT_WIDTH) {
                let Some(slot) = p.slot(at) else { continue };
                let instr = Instruction::try_from(slot[0]).unwrap();
                if instr.is_jump() {
                    let target = slot[instr.operands().len()] as usize;
                    assert!(target > at, "jump at {at} targets {target}");
                    assert_eq!(target % SLOT_WIDTH, 0);
                    assert!(target <= p.len());
                }
            }
            assert_eq!(p.validate(), Ok(()));
        }
    }

    #[test]
    fn mutated_programs_terminate_within_length() {
        let mut m = seeded(4);
        let mut vm = VM::default();
        for _ in 0..2_000 {
            m.mutate(8);
            let p = m.program();
            vm.reset();
            let mut out = Vec::new();
            let mut halt = vm
                .run(p.code(), p.len(), 0, &mut out, &mut NoSensors)
                .unwrap();
            let mut steps = vm.steps();
            while let Halt::Suspended { .. } = halt {
                halt = vm
                    .resume(p.code(), p.len(), 0, &mut out, &mut NoSensors)
                    .unwrap();
                steps = vm.steps();
            }
            assert!(steps as usize <= p.slots());
        }
    }

    #[test]
    fn rollback_restores_exact_words() {
        let mut m = seeded(5);
        for i in 0..2_000 {
            let words = m.program().words().to_vec();
            let code = m.program().code().to_vec();
            m.mutate(8);
            assert!(m.rollback());
            assert_eq!(m.program().words(), words.as_slice());
            assert_eq!(&m.program().code()[..code.len()], code.as_slice());
            // Keep every third edit so the program keeps changing shape.
            if i % 3 == 0 {
                m.mutate(8);
            }
        }
    }

    #[test]
    fn rollback_is_one_level() {
        let mut m = seeded(6);
        assert!(!m.rollback());
        m.mutate(8);
        assert!(m.rollback());
        assert!(!m.rollback());
        assert!(m.program().is_empty());
    }

    #[test]
    fn commit_forgets_undo() {
        let mut m = seeded(7);
        m.mutate(8);
        m.commit();
        assert!(!m.rollback());
        assert_eq!(m.length(), SLOT_WIDTH);
    }

    #[test]
    fn buffer_grows_by_doubling() {
        let mut m = seeded(8);
        let initial = m.program().capacity();
        while m.length() <= initial {
            m.mutate(8);
        }
        assert_eq!(m.program().capacity(), initial * 2);
        assert!(m.program().code()[m.length()..].iter().all(|w| *w == 0));
    }

    #[test]
    fn register_operands_respect_register_count() {
        let mut m = seeded(9);
        for _ in 0..3_000 {
            m.mutate(2);
        }
        let p = m.program();
        for at in (0..p.len()).step_by(SLOT_WIDTH) {
            let slot = p.slot(at).unwrap();
            let instr = Instruction::try_from(slot[0]).unwrap();
            for (i, kind) in instr.operands().iter().enumerate() {
                if *kind == OperandKind::Reg {
                    assert!(slot[i + 1] < 2);
                }
            }
        }
    }

    #[test]
    fn zero_register_count_is_clamped() {
        let mut m = seeded(10);
        for _ in 0..200 {
            m.mutate(0);
        }
        assert_eq!(m.program().validate(), Ok(()));
    }

    #[test]
    fn same_seed_same_program() {
        let mut a = seeded(11);
        let mut b = seeded(11);
        for _ in 0..300 {
            assert_eq!(a.mutate(8), b.mutate(8));
        }
        assert_eq!(a.program(), b.program());
    }
}
