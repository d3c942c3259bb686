//! Provider-agnostic gateway logic for gistgate.
//!
//! This crate defines the ports (credential store, HTTP transport, provider
//! adapter) that `gistgate-infra` implements, plus the pieces that need no
//! I/O of their own: the credential rotation ledger, the streaming decoder,
//! and the gateway facade that ties rotation and fallback together.

pub mod credentials;
pub mod gateway;
pub mod llm;
