//! Serialization primitives.
//!
//! - `encoding`: deterministic little-endian `Encode`/`Decode` traits used to
//!   persist program images and curricula.

pub mod encoding;
