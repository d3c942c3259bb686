//! Shared domain types for gistgate.
//!
//! Provider identifiers, credentials, request options, conversation messages,
//! configuration, and the error taxonomy shared by every other crate.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod credential;
pub mod error;
pub mod llm;
