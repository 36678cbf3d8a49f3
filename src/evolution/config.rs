//! Search configuration.
//!
//! Defaults match the classic setup: 100 words of memory, all eight
//! registers, mutation speed 1 and 50 000 attempts per chunk.

use crate::virtual_machine::vm::{DEFAULT_MEMORY_SIZE, REGISTER_COUNT};
use evo_derive::Error;
use std::str::FromStr;

pub const ENV_MEMORY_SIZE: &str = "EVO_MEMORY_SIZE";
pub const ENV_REGISTERS: &str = "EVO_REGISTERS";
pub const ENV_MUTATION_SPEED: &str = "EVO_MUTATION_SPEED";
pub const ENV_CHUNK_SIZE: &str = "EVO_CHUNK_SIZE";
pub const ENV_SEED: &str = "EVO_SEED";

/// Errors produced while reading configuration overrides.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Unparsable { key: &'static str, value: String },
    #[error("{key}: {value} is out of range")]
    OutOfRange { key: &'static str, value: String },
}

/// Tunables for a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvoConfig {
    /// Data memory size in words.
    pub memory_size: usize,
    /// Registers the mutator may reference, `1..=8`.
    pub register_count: u8,
    /// Damps the append probability `1 / (length * speed)`, `length` in words.
    pub mutation_speed: u32,
    /// Mutation attempts per [`Driver::step_chunk`](crate::evolution::driver::Driver::step_chunk).
    pub chunk_size: u32,
    /// RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EvoConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            register_count: REGISTER_COUNT as u8,
            mutation_speed: 1,
            chunk_size: 50_000,
            seed: None,
        }
    }
}

impl EvoConfig {
    /// Defaults overridden by `EVO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `EVO_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, ENV_MEMORY_SIZE)? {
            config.memory_size = v;
        }
        if let Some(v) = parse_var::<u8>(&lookup, ENV_REGISTERS)? {
            if v == 0 || v as usize > REGISTER_COUNT {
                return Err(ConfigError::OutOfRange {
                    key: ENV_REGISTERS,
                    value: v.to_string(),
                });
            }
            config.register_count = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_MUTATION_SPEED)? {
            if v == 0 {
                return Err(ConfigError::OutOfRange {
                    key: ENV_MUTATION_SPEED,
                    value: v.to_string(),
                });
            }
            config.mutation_speed = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_CHUNK_SIZE)? {
            config.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_SEED)? {
            config.seed = Some(v);
        }

        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Register count clamped to `1..=8`.
    pub fn registers(&self) -> u8 {
        self.register_count.clamp(1, REGISTER_COUNT as u8)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Unparsable { key, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = EvoConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EvoConfig::default());
        assert_eq!(config.memory_size, 100);
        assert_eq!(config.register_count, 8);
        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn overrides() {
        let config = EvoConfig::from_lookup(lookup(&[
            (ENV_MEMORY_SIZE, "16"),
            (ENV_REGISTERS, "4"),
            (ENV_MUTATION_SPEED, "3"),
            (ENV_CHUNK_SIZE, "1000"),
            (ENV_SEED, " 42 "),
        ]))
        .unwrap();
        assert_eq!(config.memory_size, 16);
        assert_eq!(config.register_count, 4);
        assert_eq!(config.mutation_speed, 3);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn unparsable_value() {
        assert_eq!(
            EvoConfig::from_lookup(lookup(&[(ENV_CHUNK_SIZE, "lots")])),
            Err(ConfigError::Unparsable {
                key: ENV_CHUNK_SIZE,
                value: "lots".to_string()
            })
        );
    }

    #[test]
    fn register_count_out_of_range() {
        assert!(matches!(
            EvoConfig::from_lookup(lookup(&[(ENV_REGISTERS, "9")])),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            EvoConfig::from_lookup(lookup(&[(ENV_REGISTERS, "0")])),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn registers_are_clamped() {
        let mut config = EvoConfig::default();
        config.register_count = 0;
        assert_eq!(config.registers(), 1);
        config.register_count = 200;
        assert_eq!(config.registers(), 8);
    }

    #[test]
    fn error_message_names_the_key() {
        let err = ConfigError::Unparsable {
            key: ENV_SEED,
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "EVO_SEED: cannot parse \"x\"");
    }
}
