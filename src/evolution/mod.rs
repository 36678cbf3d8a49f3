//! Program search.
//!
//! - [`config`]: search tunables and environment overrides
//! - [`fitness`]: test cases and the similarity/containment scores
//! - [`mutator`]: random single-slot edits with undo
//! - [`driver`]: curriculum hill climbing in bounded chunks

pub mod config;
pub mod driver;
pub mod fitness;
pub mod mutator;
