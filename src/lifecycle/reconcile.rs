//! Diffing a scan against the registry and applying the result.
//!
//! ## Ordering
//!
//! Within one apply: added, then modified, then removed. Each identifier is
//! handled on its own; a failure is logged, recorded as
//! [`LoadState::Failed`] and never stops the rest of the batch.
//!
//! ## Retry suppression
//!
//! `last_observed` advances on every load attempt, successful or not, so a
//! broken module is retried only once its file timestamp moves again.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::record::{LoadState, Registry};
use super::scanner::{ScanEntry, Snapshot};
use crate::error::{LoadError, SyncError, UnloadError};
use crate::loader::ExtensionLoader;
use crate::publish::CommandSynchronizer;

/// Identifiers classified by [`diff`]. Each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

/// Classify every identifier in `previous` and `current`.
///
/// `modified` requires a strictly newer timestamp; equal timestamps are
/// unchanged, which makes a second diff against the same scan empty.
pub fn diff(previous: &Registry, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (id, entry) in current {
        match previous.get(id) {
            None => changes.added.push(id.clone()),
            Some(record) if entry.timestamp > record.last_observed => {
                changes.modified.push(id.clone())
            }
            Some(_) => {}
        }
    }

    changes.removed = previous
        .identifiers()
        .filter(|id| !current.contains_key(*id))
        .map(str::to_string)
        .collect();

    changes
}

/// Loader operation attempted for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Load,
    Reload,
    Unload,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Reload => "reload",
            Self::Unload => "unload",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one identifier during apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded,
    Reloaded,
    /// Unloaded and its record deleted.
    Unloaded,
    /// Record deleted without an unload call (it was not loaded).
    Removed,
    /// The loader call failed. For `Op::Unload` the record is still deleted.
    Failed { op: Op, code: &'static str },
}

/// Per-identifier outcomes of one apply, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl ApplyReport {
    /// Whether apply acted on at least one identifier.
    pub fn touched(&self) -> bool {
        !self.outcomes.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed { .. }))
            .count()
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|(i, _)| i == id).map(|(_, o)| o)
    }

    fn push(&mut self, id: &str, outcome: Outcome) {
        self.outcomes.push((id.to_string(), outcome));
    }
}

/// Result of the sync step of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing changed, so nothing was published.
    Skipped,
    Published,
    Failed(&'static str),
}

/// Everything one reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub changes: ChangeSet,
    pub applied: ApplyReport,
    pub sync: SyncOutcome,
}

/// Drives loader and synchronizer calls for a diff.
#[derive(Clone)]
pub struct Reconciler {
    loader: Arc<dyn ExtensionLoader>,
    synchronizer: Arc<dyn CommandSynchronizer>,
    call_timeout: Option<Duration>,
}

impl Reconciler {
    pub fn new(loader: Arc<dyn ExtensionLoader>, synchronizer: Arc<dyn CommandSynchronizer>) -> Self {
        Self {
            loader,
            synchronizer,
            call_timeout: None,
        }
    }

    /// Bound every loader and sync call. `None` waits indefinitely.
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    async fn bounded<E>(
        &self,
        call: impl Future<Output = Result<(), E>>,
        on_timeout: impl FnOnce(Duration) -> E,
    ) -> Result<(), E> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(on_timeout(limit))),
            None => call.await,
        }
    }

    /// Apply a change set. Never fails as a whole.
    pub async fn apply(&self, registry: &mut Registry, changes: &ChangeSet, current: &Snapshot) -> ApplyReport {
        let mut report = ApplyReport::default();

        for id in &changes.added {
            let Some(entry) = current.get(id) else { continue };
            let result = self.bounded(self.loader.load(id), LoadError::Timeout).await;
            record_load(registry, &mut report, id, entry, Op::Load, result);
        }

        for id in &changes.modified {
            let Some(entry) = current.get(id) else { continue };
            let was_loaded = registry.get(id).is_some_and(|r| r.is_loaded());
            let (op, result) = if was_loaded {
                (Op::Reload, self.bounded(self.loader.reload(id), LoadError::Timeout).await)
            } else {
                (Op::Load, self.bounded(self.loader.load(id), LoadError::Timeout).await)
            };
            record_load(registry, &mut report, id, entry, op, result);
        }

        for id in &changes.removed {
            let Some(record) = registry.remove(id) else { continue };
            if !record.is_loaded() {
                debug!(module = %id, state = %record.state, "Dropped record of vanished module");
                report.push(id, Outcome::Removed);
                continue;
            }
            let result = self.bounded(self.loader.unload(id), UnloadError::Timeout).await;
            match result {
                Ok(()) => {
                    crate::metrics::record_transition(Op::Unload.as_str(), "ok");
                    report.push(id, Outcome::Unloaded);
                }
                Err(e) => {
                    warn!(module = %id, op = "unload", code = e.error_code(), error = %e, "Module unload failed; record removed anyway");
                    crate::metrics::record_transition(Op::Unload.as_str(), e.error_code());
                    report.push(
                        id,
                        Outcome::Failed {
                            op: Op::Unload,
                            code: e.error_code(),
                        },
                    );
                }
            }
        }

        report
    }

    /// Publish the command surface once. Failures are logged, never raised.
    pub async fn sync(&self) -> SyncOutcome {
        let result = self
            .bounded(self.synchronizer.sync(), SyncError::Timeout)
            .await;
        match result {
            Ok(()) => {
                crate::metrics::record_sync("ok");
                SyncOutcome::Published
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Command sync failed; registry unchanged");
                crate::metrics::record_sync(e.error_code());
                SyncOutcome::Failed(e.error_code())
            }
        }
    }

    /// One full pass: diff, apply, then a single sync if anything was touched.
    pub async fn reconcile(&self, registry: &mut Registry, current: &Snapshot) -> CycleReport {
        let changes = diff(registry, current);
        if changes.is_empty() {
            return CycleReport {
                changes,
                applied: ApplyReport::default(),
                sync: SyncOutcome::Skipped,
            };
        }

        info!(
            added = changes.added.len(),
            modified = changes.modified.len(),
            removed = changes.removed.len(),
            "Module changes detected"
        );
        let applied = self.apply(registry, &changes, current).await;
        let sync = if applied.touched() {
            self.sync().await
        } else {
            SyncOutcome::Skipped
        };

        CycleReport {
            changes,
            applied,
            sync,
        }
    }
}

fn record_load(
    registry: &mut Registry,
    report: &mut ApplyReport,
    id: &str,
    entry: &ScanEntry,
    op: Op,
    result: Result<(), LoadError>,
) {
    let record = registry.entry(id, entry.path.clone(), entry.timestamp);
    record.source_path = entry.path.clone();
    record.last_observed = entry.timestamp;

    match result {
        Ok(()) => {
            record.state = LoadState::Loaded;
            crate::metrics::record_transition(op.as_str(), "ok");
            report.push(
                id,
                if op == Op::Reload {
                    Outcome::Reloaded
                } else {
                    Outcome::Loaded
                },
            );
        }
        Err(e) => {
            record.state = LoadState::Failed;
            warn!(module = %id, op = %op, code = e.error_code(), error = %e, "Module failed; will retry when its file changes");
            crate::metrics::record_transition(op.as_str(), e.error_code());
            report.push(
                id,
                Outcome::Failed {
                    op,
                    code: e.error_code(),
                },
            );
        }
    }
}
