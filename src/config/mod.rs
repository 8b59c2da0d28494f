//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. Config file (synthetics-ci.toml, or a JSON file)
//! 3. Environment (DATADOG_* variables)
//! 4. CLI flags

mod cli;
mod defaults;
mod effective;
mod env;
mod merge;

pub use cli::{parse_variables_from_cli, CliOverrides};
pub use defaults::{BuiltinDefaults, DEFAULT_CONFIG_FILE};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, RunConfig};
pub use env::env_layer;
pub use merge::{deep_merge, merge_layers};
