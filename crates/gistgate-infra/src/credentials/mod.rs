//! Credential store implementations.
//!
//! - `file`: TOML file under the data directory (read/write)
//! - `env`: environment variables (read-only, highest priority)
//! - `chain`: first-match-wins composition of the above

pub mod chain;
pub mod env;
pub mod file;

pub use chain::{ChainCredentialStore, build_credential_chain};
pub use env::EnvCredentialStore;
pub use file::FileCredentialStore;
