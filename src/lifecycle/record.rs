//! Module records and the registry that holds them.
//!
//! The registry is owned by the watcher task. Nothing else holds a mutable
//! reference to it; other components see copies via [`Registry::snapshot`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// File modification time, in nanoseconds since the UNIX epoch.
pub type Timestamp = u64;

/// Convert a filesystem time to a [`Timestamp`]. Pre-epoch times clamp to 0.
pub fn timestamp_of(time: SystemTime) -> Timestamp {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Read-only copy of a [`Registry`], in identifier order.
pub type RegistrySnapshot = Vec<ModuleRecord>;

/// Where a module stands after the last loader call made for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Observed but no loader call has completed yet.
    Unloaded,
    Loaded,
    /// The last load or reload failed. Retried only when the source changes.
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        })
    }
}

/// Lifecycle record for one module identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub identifier: String,
    pub source_path: PathBuf,
    /// Timestamp seen on the last pass that acted on this module.
    pub last_observed: Timestamp,
    pub state: LoadState,
}

impl ModuleRecord {
    pub fn new(identifier: impl Into<String>, source_path: PathBuf, last_observed: Timestamp) -> Self {
        Self {
            identifier: identifier.into(),
            source_path,
            last_observed,
            state: LoadState::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }
}

/// Identifier → record table, iterated in identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    records: BTreeMap<String, ModuleRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&ModuleRecord> {
        self.records.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.records.contains_key(identifier)
    }

    /// Insert or replace the record for `record.identifier`.
    pub fn upsert(&mut self, record: ModuleRecord) {
        self.records.insert(record.identifier.clone(), record);
    }

    /// Create the record if missing and return it for mutation.
    pub fn entry(&mut self, identifier: &str, source_path: PathBuf, observed: Timestamp) -> &mut ModuleRecord {
        self.records
            .entry(identifier.to_string())
            .or_insert_with(|| ModuleRecord::new(identifier, source_path, observed))
    }

    pub fn remove(&mut self, identifier: &str) -> Option<ModuleRecord> {
        self.records.remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.values()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn loaded_count(&self) -> usize {
        self.records.values().filter(|r| r.is_loaded()).count()
    }

    /// Copy of every record, in identifier order.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.records.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timestamp_of_epoch_offsets() {
        let t = UNIX_EPOCH + Duration::from_secs(2);
        assert_eq!(timestamp_of(t), 2_000_000_000);
        assert_eq!(timestamp_of(UNIX_EPOCH), 0);
    }

    #[test]
    fn one_record_per_identifier() {
        let mut registry = Registry::new();
        registry.upsert(ModuleRecord::new("cogs.a", PathBuf::from("a.toml"), 1));
        registry.upsert(ModuleRecord::new("cogs.a", PathBuf::from("a.toml"), 2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("cogs.a").map(|r| r.last_observed), Some(2));
    }

    #[test]
    fn entry_keeps_existing_record() {
        let mut registry = Registry::new();
        registry.entry("cogs.a", PathBuf::from("a.toml"), 1).state = LoadState::Loaded;
        let record = registry.entry("cogs.a", PathBuf::from("a.toml"), 5);
        assert_eq!(record.last_observed, 1);
        assert!(record.is_loaded());
    }

    #[test]
    fn iteration_is_sorted_by_identifier() {
        let mut registry = Registry::new();
        for id in ["cogs.zeta", "cogs.alpha", "cogs.mid"] {
            registry.upsert(ModuleRecord::new(id, PathBuf::new(), 0));
        }
        let ids: Vec<_> = registry.identifiers().collect();
        assert_eq!(ids, vec!["cogs.alpha", "cogs.mid", "cogs.zeta"]);
    }

    #[test]
    fn loaded_count_ignores_failed() {
        let mut registry = Registry::new();
        registry.entry("cogs.a", PathBuf::new(), 1).state = LoadState::Loaded;
        registry.entry("cogs.b", PathBuf::new(), 1).state = LoadState::Failed;
        assert_eq!(registry.loaded_count(), 1);
    }
}
