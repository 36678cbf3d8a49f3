//! Evo library.
//!
//! Evolves small bytecode programs that map memory inputs to expected output
//! streams: a resumable register VM, a mutator that only produces
//! terminating programs, and a hill-climbing search driver.

pub mod evolution;
pub mod types;
pub mod utils;
pub mod virtual_machine;

#[cfg(test)]
mod test_utils;
