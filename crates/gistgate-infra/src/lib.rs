//! Infrastructure layer for gistgate.
//!
//! Implements the ports defined in `gistgate-core`: a reqwest-backed HTTP
//! transport, one adapter per AI backend, and credential stores (TOML file,
//! environment, chain). Also loads `config.toml` and resolves the data
//! directory.

pub mod config;
pub mod credentials;
pub mod filesystem;
pub mod http;
pub mod llm;
