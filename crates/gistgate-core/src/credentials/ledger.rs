//! Per-provider round-robin credential selection with cooldown.
//!
//! The ledger never fails: a provider with no keys yields an empty
//! credential, and a provider whose keys are all cooling down still yields
//! one. Whether a key actually works is decided by the HTTP attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use gistgate_types::credential::Credential;
use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

use super::clock::{Clock, SystemClock};
use super::{CredentialLayer, CredentialStore, EXTRA_KEYS, PRIMARY_KEY};

/// Rotation bookkeeping for one provider.
///
/// Lives for the process session. Never persisted and never reset
/// implicitly; only [`CredentialLedger::reset`] clears it.
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    pub current_index: usize,
    pub failed_keys: HashMap<Credential, DateTime<Utc>>,
    pub success_count: u64,
}

/// Rotation state for every provider, owned by whoever composes the gateway.
///
/// Concurrent requests against the same provider may race on
/// `current_index`; the only effect is a slightly uneven rotation.
#[derive(Debug, Default)]
pub struct RotationStore {
    states: DashMap<ProviderId, RotationState>,
}

impl RotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a provider's state, if it has been touched.
    pub fn get(&self, provider: ProviderId) -> Option<RotationState> {
        self.states.get(&provider).map(|s| s.clone())
    }
}

/// Operator-configurable bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub failed_key_cooldown: Duration,
    pub max_switch_count: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            failed_key_cooldown: Duration::from_secs(300),
            max_switch_count: 3,
        }
    }
}

/// A key that is currently excluded from selection.
#[derive(Debug, Clone, Serialize)]
pub struct CoolingKey {
    pub masked: String,
    pub remaining_secs: u64,
}

/// Read-only view of a provider's rotation, for `keys list`.
#[derive(Debug, Clone, Serialize)]
pub struct RotationSnapshot {
    pub provider: ProviderId,
    pub keys: Vec<String>,
    pub current_index: Option<usize>,
    pub success_count: u64,
    pub cooling_down: Vec<CoolingKey>,
}

/// Chooses which credential to present for a provider.
pub struct CredentialLedger {
    store: Arc<dyn CredentialStore>,
    rotation: Arc<RotationStore>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl CredentialLedger {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        rotation: Arc<RotationStore>,
        settings: LedgerSettings,
    ) -> Self {
        Self::with_clock(store, rotation, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CredentialStore>,
        rotation: Arc<RotationStore>,
        settings: LedgerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            rotation,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn failed_key_cooldown(&self) -> Duration {
        self.settings.failed_key_cooldown
    }

    pub fn max_switch_count(&self) -> u32 {
        self.settings.max_switch_count
    }

    /// Primary keys first, then extra keys, each in store priority order.
    ///
    /// De-duplicated by exact string match; blank entries are skipped. Read
    /// from the store on every call. Store errors are logged and treated as
    /// "no keys".
    pub fn get_all_keys(&self, provider: ProviderId) -> Vec<Credential> {
        let layers = self.store.layers(provider).unwrap_or_else(|e| {
            log_store_error(provider, &e);
            Vec::new()
        });

        let primaries = layers.iter().filter_map(|l| l.primary.as_deref());
        let extras = layers.iter().flat_map(|l| l.extra.iter().map(String::as_str));

        let mut keys: Vec<Credential> = Vec::new();
        for raw in primaries.chain(extras) {
            if raw.trim().is_empty() {
                continue;
            }
            let key = Credential::new(raw);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// The key to use for the next request.
    ///
    /// Scans once around the ring from the current index and snaps the index
    /// onto the first usable key. With every key cooling down, the key at the
    /// current index is returned anyway.
    pub fn get_current_key(&self, provider: ProviderId) -> Credential {
        let keys = self.get_all_keys(provider);
        if keys.is_empty() {
            return Credential::empty();
        }
        let now = self.clock.now();
        let mut state = self.rotation.states.entry(provider).or_default();
        let start = state.current_index % keys.len();
        state.current_index = start;

        for offset in 0..keys.len() {
            let index = (start + offset) % keys.len();
            if self.is_usable(&state, &keys[index], now) {
                state.current_index = index;
                return keys[index].clone();
            }
        }
        tracing::debug!(provider = %provider, "all keys cooling down, using current key");
        keys[start].clone()
    }

    /// Equal-weight round robin after a successful response.
    pub fn advance_to_next_key(&self, provider: ProviderId) {
        let count = self.get_all_keys(provider).len();
        if count <= 1 {
            return;
        }
        let mut state = self.rotation.states.entry(provider).or_default();
        state.current_index = (state.current_index + 1) % count;
        state.success_count += 1;
    }

    /// Mark the current key failed and move to the next usable one.
    ///
    /// Returns `false`, leaving the index where it was, when every other key
    /// is still cooling down.
    pub fn rotate_to_next_key(&self, provider: ProviderId) -> bool {
        let keys = self.get_all_keys(provider);
        if keys.is_empty() {
            return false;
        }
        let now = self.clock.now();
        let mut state = self.rotation.states.entry(provider).or_default();
        let failed = state.current_index % keys.len();
        state.current_index = failed;
        state.failed_keys.insert(keys[failed].clone(), now);

        for offset in 1..keys.len() {
            let index = (failed + offset) % keys.len();
            if self.is_usable(&state, &keys[index], now) {
                tracing::warn!(
                    provider = %provider,
                    failed = %keys[failed],
                    next = %keys[index],
                    "rotating to next credential"
                );
                state.current_index = index;
                return true;
            }
        }
        tracing::warn!(provider = %provider, failed = %keys[failed], "no usable credential to rotate to");
        false
    }

    /// Explicit operator reset of a provider's rotation state.
    pub fn reset(&self, provider: ProviderId) {
        self.rotation.states.remove(&provider);
    }

    pub fn snapshot(&self, provider: ProviderId) -> RotationSnapshot {
        let keys = self.get_all_keys(provider);
        let state = self.rotation.get(provider).unwrap_or_default();
        let now = self.clock.now();
        let cooldown = self.cooldown_delta();

        let cooling_down = keys
            .iter()
            .filter_map(|key| {
                let failed_at = state.failed_keys.get(key)?;
                let elapsed = now.signed_duration_since(*failed_at);
                if elapsed > cooldown {
                    return None;
                }
                Some(CoolingKey {
                    masked: key.masked(),
                    remaining_secs: (cooldown - elapsed).num_seconds().max(0) as u64,
                })
            })
            .collect();

        RotationSnapshot {
            provider,
            current_index: (!keys.is_empty()).then(|| state.current_index % keys.len()),
            keys: keys.iter().map(Credential::masked).collect(),
            success_count: state.success_count,
            cooling_down,
        }
    }

    /// Add a key to the first writable store: as its primary key when it
    /// has none, else appended to its extra keys. Returns `false` if the key
    /// is already configured anywhere.
    pub fn add_key(&self, provider: ProviderId, key: &str) -> Result<bool, CredentialStoreError> {
        let key = key.trim();
        if key.is_empty() || self.get_all_keys(provider).iter().any(|k| k.expose() == key) {
            return Ok(false);
        }
        let target = writable_layer(self.store.layers(provider)?)?;
        if target.primary.as_deref().is_none_or(|p| p.trim().is_empty()) {
            self.store.set_string(provider, PRIMARY_KEY, key)?;
        } else {
            let mut extra = target.extra;
            extra.push(key.to_string());
            self.store.set_list(provider, EXTRA_KEYS, &extra)?;
        }
        Ok(true)
    }

    /// Remove every key ending in `suffix` from the first writable store.
    /// Returns how many were removed.
    ///
    /// Removing the primary key promotes the first remaining extra key of
    /// the same store. Keys that only a read-only store holds cannot be
    /// removed and yield [`CredentialStoreError::ReadOnly`].
    pub fn remove_key(
        &self,
        provider: ProviderId,
        suffix: &str,
    ) -> Result<usize, CredentialStoreError> {
        if suffix.is_empty() {
            return Ok(0);
        }
        let layers = self.store.layers(provider)?;
        let read_only_source = layers
            .iter()
            .filter(|l| !l.writable)
            .find(|l| l.primary.iter().chain(&l.extra).any(|k| k.ends_with(suffix)))
            .map(|l| l.source.clone());

        let target = match writable_layer(layers) {
            Ok(target) => target,
            Err(err) if read_only_source.is_some() => return Err(err),
            Err(_) => return Ok(0),
        };

        let mut extra = target.extra;
        let before = extra.len();
        extra.retain(|k| !k.ends_with(suffix));
        let mut removed = before - extra.len();

        if let Some(primary) = target.primary
            && !primary.is_empty()
            && primary.ends_with(suffix)
        {
            removed += 1;
            let promoted = if extra.is_empty() {
                String::new()
            } else {
                extra.remove(0)
            };
            self.store.set_string(provider, PRIMARY_KEY, &promoted)?;
        }
        if removed > 0 {
            self.store.set_list(provider, EXTRA_KEYS, &extra)?;
        }

        if let Some(source) = read_only_source {
            if removed == 0 {
                return Err(CredentialStoreError::ReadOnly);
            }
            tracing::warn!(
                provider = %provider,
                source = %source,
                "a matching key comes from a read-only store and stays in rotation"
            );
        }
        Ok(removed)
    }

    fn is_usable(&self, state: &RotationState, key: &Credential, now: DateTime<Utc>) -> bool {
        match state.failed_keys.get(key) {
            None => true,
            Some(failed_at) => now.signed_duration_since(*failed_at) > self.cooldown_delta(),
        }
    }

    fn cooldown_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.settings.failed_key_cooldown)
            .unwrap_or(chrono::Duration::MAX)
    }
}

fn log_store_error(provider: ProviderId, err: &CredentialStoreError) {
    tracing::warn!(provider = %provider, error = %err, "failed to read credential store");
}

fn writable_layer(layers: Vec<CredentialLayer>) -> Result<CredentialLayer, CredentialStoreError> {
    layers
        .into_iter()
        .find(|l| l.writable)
        .ok_or(CredentialStoreError::ReadOnly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ManualClock, MemoryCredentialStore};

    const P: ProviderId = ProviderId::OpenAi;

    fn ledger_with(primary: &str, extra: &[&str]) -> (CredentialLedger, Arc<ManualClock>) {
        let store = Arc::new(MemoryCredentialStore::with_keys(P, primary, extra));
        let clock = Arc::new(ManualClock::default());
        let ledger = CredentialLedger::with_clock(
            store,
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
            clock.clone(),
        );
        (ledger, clock)
    }

    fn keys(ledger: &CredentialLedger) -> Vec<String> {
        ledger
            .get_all_keys(P)
            .iter()
            .map(|k| k.expose().to_string())
            .collect()
    }

    #[test]
    fn test_get_all_keys_primary_first_and_deduplicated() {
        let (ledger, _) = ledger_with("A", &["B", "A", "C", "B", " "]);
        assert_eq!(keys(&ledger), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_get_all_keys_matches_exactly() {
        let (ledger, _) = ledger_with("A", &[" A", "A"]);
        assert_eq!(keys(&ledger), vec!["A", " A"]);
    }

    #[test]
    fn test_get_all_keys_without_primary() {
        let (ledger, _) = ledger_with("", &["B", "C"]);
        assert_eq!(keys(&ledger), vec!["B", "C"]);
    }

    #[test]
    fn test_no_keys_yields_empty_credential() {
        let ledger = CredentialLedger::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        assert!(ledger.get_current_key(P).is_empty());
        assert!(!ledger.rotate_to_next_key(P));
        ledger.advance_to_next_key(P);
        assert_eq!(ledger.snapshot(P).current_index, None);
    }

    #[test]
    fn test_keys_are_reread_on_every_call() {
        let store = Arc::new(MemoryCredentialStore::with_keys(P, "A", &[]));
        let ledger = CredentialLedger::new(
            store.clone(),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        assert_eq!(ledger.get_all_keys(P).len(), 1);
        store
            .set_list(P, EXTRA_KEYS, &["B".to_string()])
            .unwrap();
        assert_eq!(ledger.get_all_keys(P).len(), 2);
    }

    #[test]
    fn test_advance_cycles_back_to_start() {
        for n in 2..6 {
            let extra: Vec<String> = (1..n).map(|i| format!("k{i}")).collect();
            let extra_refs: Vec<&str> = extra.iter().map(String::as_str).collect();
            let (ledger, _) = ledger_with("k0", &extra_refs);
            for _ in 0..n {
                ledger.advance_to_next_key(P);
            }
            let state = ledger.rotation.get(P).unwrap();
            assert_eq!(state.current_index, 0, "n = {n}");
            assert_eq!(state.success_count, n as u64);
        }
    }

    #[test]
    fn test_advance_single_key_is_noop() {
        let (ledger, _) = ledger_with("A", &[]);
        ledger.advance_to_next_key(P);
        assert!(ledger.rotation.get(P).is_none());
        assert_eq!(ledger.get_current_key(P).expose(), "A");
    }

    #[test]
    fn test_rotation_scenario_three_keys() {
        let (ledger, _) = ledger_with("A", &["B", "C"]);
        assert_eq!(ledger.get_current_key(P).expose(), "A");

        assert!(ledger.rotate_to_next_key(P));
        assert_eq!(ledger.get_current_key(P).expose(), "B");

        assert!(ledger.rotate_to_next_key(P));
        assert_eq!(ledger.get_current_key(P).expose(), "C");

        assert!(!ledger.rotate_to_next_key(P));
        assert_eq!(ledger.rotation.get(P).unwrap().current_index, 2);
        assert_eq!(ledger.get_current_key(P).expose(), "C");
    }

    #[test]
    fn test_rotate_single_key_returns_false() {
        let (ledger, _) = ledger_with("A", &[]);
        assert!(!ledger.rotate_to_next_key(P));
        assert_eq!(ledger.get_current_key(P).expose(), "A");
    }

    #[test]
    fn test_cooldown_expiry_makes_key_eligible_again() {
        let (ledger, clock) = ledger_with("A", &["B"]);
        assert!(ledger.rotate_to_next_key(P)); // A failed, now on B
        assert!(!ledger.rotate_to_next_key(P)); // B failed, A still cooling
        assert_eq!(ledger.get_current_key(P).expose(), "B");

        // Exactly at the cooldown boundary the key is still excluded.
        clock.advance(Duration::from_secs(300));
        assert!(!ledger.rotate_to_next_key(P));

        clock.advance(Duration::from_secs(1));
        assert_eq!(ledger.get_current_key(P).expose(), "A");
    }

    #[test]
    fn test_get_current_key_snaps_to_usable_key() {
        let (ledger, _) = ledger_with("A", &["B", "C"]);
        assert!(ledger.rotate_to_next_key(P)); // A failed, index 1
        ledger.advance_to_next_key(P); // index 2
        ledger.advance_to_next_key(P); // index 0 -> A, cooling
        assert_eq!(ledger.get_current_key(P).expose(), "B");
        assert_eq!(ledger.rotation.get(P).unwrap().current_index, 1);
    }

    #[test]
    fn test_index_stays_in_range_when_keys_shrink() {
        let store = Arc::new(MemoryCredentialStore::with_keys(P, "A", &["B", "C"]));
        let ledger = CredentialLedger::new(
            store.clone(),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        ledger.advance_to_next_key(P);
        ledger.advance_to_next_key(P);
        store.set_list(P, EXTRA_KEYS, &[]).unwrap();
        assert_eq!(ledger.get_current_key(P).expose(), "A");
        assert_eq!(ledger.snapshot(P).current_index, Some(0));
    }

    #[test]
    fn test_reset_clears_state() {
        let (ledger, _) = ledger_with("A", &["B"]);
        assert!(ledger.rotate_to_next_key(P));
        ledger.reset(P);
        assert!(ledger.rotation.get(P).is_none());
        assert_eq!(ledger.get_current_key(P).expose(), "A");
    }

    #[test]
    fn test_snapshot_reports_cooldowns() {
        let (ledger, clock) = ledger_with("sk-aaaa1111", &["sk-bbbb2222"]);
        assert!(ledger.rotate_to_next_key(P));
        clock.advance(Duration::from_secs(100));
        let snapshot = ledger.snapshot(P);
        assert_eq!(snapshot.keys, vec!["****1111", "****2222"]);
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.cooling_down.len(), 1);
        assert_eq!(snapshot.cooling_down[0].masked, "****1111");
        assert_eq!(snapshot.cooling_down[0].remaining_secs, 200);
    }

    #[test]
    fn test_states_are_isolated_per_provider() {
        let store = Arc::new(MemoryCredentialStore::with_keys(P, "A", &["B"]));
        store
            .set_string(ProviderId::Anthropic, PRIMARY_KEY, "X")
            .unwrap();
        store
            .set_list(ProviderId::Anthropic, EXTRA_KEYS, &["Y".to_string()])
            .unwrap();
        let ledger = CredentialLedger::new(
            store,
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        ledger.advance_to_next_key(P);
        assert_eq!(ledger.get_current_key(P).expose(), "B");
        assert_eq!(ledger.get_current_key(ProviderId::Anthropic).expose(), "X");
    }

    #[test]
    fn test_add_key_fills_primary_then_extra() {
        let ledger = CredentialLedger::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        assert!(ledger.add_key(P, "A").unwrap());
        assert!(ledger.add_key(P, "B").unwrap());
        assert!(!ledger.add_key(P, "B").unwrap());
        assert!(!ledger.add_key(P, "  ").unwrap());
        assert_eq!(keys(&ledger), vec!["A", "B"]);
        assert_eq!(
            ledger.store().get_string(P, PRIMARY_KEY).unwrap().as_deref(),
            Some("A")
        );
    }

    #[test]
    fn test_remove_primary_promotes_extra() {
        let (ledger, _) = ledger_with("sk-1111", &["sk-2222", "sk-3333"]);
        assert_eq!(ledger.remove_key(P, "1111").unwrap(), 1);
        assert_eq!(keys(&ledger), vec!["sk-2222", "sk-3333"]);
        assert_eq!(ledger.remove_key(P, "3333").unwrap(), 1);
        assert_eq!(keys(&ledger), vec!["sk-2222"]);
        assert_eq!(ledger.remove_key(P, "9999").unwrap(), 0);
    }

    /// Read-only layer in front of a writable one, like environment > file.
    struct Layered {
        env: MemoryCredentialStore,
        file: MemoryCredentialStore,
    }

    impl CredentialStore for Layered {
        fn name(&self) -> &str {
            "layered"
        }

        fn get_string(
            &self,
            provider: ProviderId,
            name: &str,
        ) -> Result<Option<String>, CredentialStoreError> {
            match self.env.get_string(provider, name)? {
                Some(v) => Ok(Some(v)),
                None => self.file.get_string(provider, name),
            }
        }

        fn get_list(
            &self,
            provider: ProviderId,
            name: &str,
        ) -> Result<Vec<String>, CredentialStoreError> {
            self.file.get_list(provider, name)
        }

        fn set_string(
            &self,
            provider: ProviderId,
            name: &str,
            value: &str,
        ) -> Result<(), CredentialStoreError> {
            self.file.set_string(provider, name, value)
        }

        fn set_list(
            &self,
            provider: ProviderId,
            name: &str,
            values: &[String],
        ) -> Result<(), CredentialStoreError> {
            self.file.set_list(provider, name, values)
        }

        fn layers(&self, provider: ProviderId) -> Result<Vec<CredentialLayer>, CredentialStoreError> {
            let mut env = self.env.layers(provider)?;
            env[0].writable = false;
            env.extend(self.file.layers(provider)?);
            Ok(env)
        }
    }

    fn layered(env_primary: &str, file_primary: &str, file_extra: &[&str]) -> CredentialLedger {
        let env = MemoryCredentialStore::new();
        env.set_string(P, PRIMARY_KEY, env_primary).unwrap();
        let store = Layered {
            env,
            file: MemoryCredentialStore::with_keys(P, file_primary, file_extra),
        };
        CredentialLedger::new(
            Arc::new(store),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        )
    }

    #[test]
    fn test_primary_keys_of_every_layer_are_in_rotation() {
        let ledger = layered("sk-env-1111", "sk-file-0000", &["sk-a-2222"]);
        assert_eq!(keys(&ledger), vec!["sk-env-1111", "sk-file-0000", "sk-a-2222"]);
    }

    #[test]
    fn test_remove_read_only_key_is_rejected_and_keeps_writable_keys() {
        let ledger = layered("sk-env-1111", "", &["sk-a-2222", "sk-b-3333"]);
        assert!(matches!(
            ledger.remove_key(P, "1111"),
            Err(CredentialStoreError::ReadOnly)
        ));
        assert_eq!(keys(&ledger), vec!["sk-env-1111", "sk-a-2222", "sk-b-3333"]);

        assert_eq!(ledger.remove_key(P, "2222").unwrap(), 1);
        assert_eq!(keys(&ledger), vec!["sk-env-1111", "sk-b-3333"]);
    }

    #[test]
    fn test_add_key_targets_writable_layer() {
        let ledger = layered("sk-env-1111", "", &[]);
        assert!(ledger.add_key(P, "sk-new-4444").unwrap());
        assert!(!ledger.add_key(P, "sk-env-1111").unwrap());
        assert_eq!(keys(&ledger), vec!["sk-env-1111", "sk-new-4444"]);
    }
}
