//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML config file and falls
//! back to defaults on first run, when no file exists yet.

pub mod config;
