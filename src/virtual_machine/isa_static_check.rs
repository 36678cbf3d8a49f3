//! Guards the instruction table against accidental edits.
//!
//! Opcode numbers are persisted in program images, so renumbering, renaming
//! or changing an operand layout must be a deliberate act that also updates
//! `EXPECTED_ISA_HASH`.

#[cfg(test)]
mod tests {
    use crate::virtual_machine::isa::Instruction;
    use std::collections::HashSet;

    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_ISA_HASH: u64 = 178299697547108834;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    macro_rules! hash_isa {
        (
            $( $(#[$doc:meta])* $name:ident = $opcode:literal, $mnemonic:literal => [ $( $field:ident : $kind:ident ),* $(,)? ] ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &[Instruction::$name as u8]);
                h = fnv1a64(h, $mnemonic.as_bytes());
                $( h = fnv1a64(h, stringify!($kind).as_bytes()); )*
            )*
            h
        }};
    }

    fn current_isa_hash() -> u64 {
        crate::for_each_instruction!(hash_isa)
    }

    #[test]
    #[ignore]
    fn print_isa_hash() {
        println!("ISA_HASH={}", current_isa_hash());
    }

    #[test]
    fn isa_hash_unchanged() {
        assert_eq!(current_isa_hash(), EXPECTED_ISA_HASH);
    }

    #[test]
    fn opcodes_are_contiguous() {
        for (i, instr) in Instruction::ALL.iter().enumerate() {
            assert_eq!(*instr as usize, i, "{} out of place", instr.mnemonic());
            assert_eq!(Instruction::try_from(i as u16).ok(), Some(*instr));
        }
    }

    #[test]
    fn mnemonics_are_unique() {
        let names: HashSet<_> = Instruction::ALL.iter().map(|i| i.mnemonic()).collect();
        assert_eq!(names.len(), Instruction::COUNT);
    }

    #[test]
    fn operands_fit_in_a_slot() {
        for instr in Instruction::ALL {
            assert!(!instr.operands().is_empty());
            assert!(instr.operands().len() <= 3, "{}", instr.mnemonic());
        }
    }
}
