//! Test utilities shared across modules.

#[cfg(test)]
pub mod utils {
    use crate::virtual_machine::assembler::assemble_source;
    use crate::virtual_machine::program::Program;
    use crate::virtual_machine::vm::{DEFAULT_MEMORY_SIZE, Halt, NoSensors, VM};

    /// Assembles `source`, panicking on assembly errors.
    pub fn program(source: &str) -> Program {
        assemble_source(source).expect("assembly failed")
    }

    /// Runs `source` to completion on a fresh VM with `input` loaded into memory.
    ///
    /// Any `in` is answered with 0. Returns the VM and the echoed output.
    pub fn run_source(source: &str, input: &[u16]) -> (VM, Vec<u16>) {
        let p = program(source);
        let mut vm = VM::new(DEFAULT_MEMORY_SIZE);
        vm.load_input(input);
        let mut output = Vec::new();
        let mut halt = vm
            .run(p.code(), p.len(), 0, &mut output, &mut NoSensors)
            .expect("vm run failed");
        while let Halt::Suspended { .. } = halt {
            halt = vm
                .resume(p.code(), p.len(), 0, &mut output, &mut NoSensors)
                .expect("vm resume failed");
        }
        (vm, output)
    }

    /// Register `reg` after running `source` with no input.
    pub fn run_and_get(source: &str, reg: usize) -> u16 {
        run_source(source, &[]).0.registers()[reg]
    }
}
