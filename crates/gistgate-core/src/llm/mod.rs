//! Provider abstractions for gistgate.
//!
//! - `ProviderAdapter`: RPITIT trait each backend implements
//! - `BoxProviderAdapter`: object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: id -> adapter lookup
//! - `HttpTransport` / `ProgressSink`: ports the adapters talk through
//! - `streaming`: incremental SSE decoding with the partial-output rule

pub mod box_provider;
pub mod conversation;
pub mod exchange;
pub mod provider;
pub mod registry;
pub mod sink;
pub mod streaming;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
