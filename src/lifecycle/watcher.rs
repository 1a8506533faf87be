//! The background polling loop.
//!
//! One task owns the [`Registry`] and repeats scan → reconcile → sleep until
//! cancelled. Cancellation is observed only at the top of the loop and while
//! sleeping, so a cycle that has started always finishes its apply and sync.

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::reconcile::{CycleReport, Reconciler, SyncOutcome};
use super::record::{Registry, RegistrySnapshot};
use super::scanner::{DirectoryScanner, Snapshot};

/// Read-only requests answered by the loop between cycles.
#[derive(Debug)]
pub enum Query {
    /// Copy of every record, in identifier order.
    Snapshot(oneshot::Sender<RegistrySnapshot>),
}

pub struct WatcherLoop {
    scanner: DirectoryScanner,
    reconciler: Reconciler,
    registry: Registry,
    interval: Duration,
    cancel: watch::Receiver<bool>,
    queries: mpsc::Receiver<Query>,
    queries_open: bool,
}

impl WatcherLoop {
    pub fn new(
        scanner: DirectoryScanner,
        reconciler: Reconciler,
        registry: Registry,
        interval: Duration,
        cancel: watch::Receiver<bool>,
        queries: mpsc::Receiver<Query>,
    ) -> Self {
        Self {
            scanner,
            reconciler,
            registry,
            interval,
            cancel,
            queries,
            queries_open: true,
        }
    }

    /// A set flag or a dropped sender both mean stop.
    fn cancelled(&self) -> bool {
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    /// Run until cancelled and hand back the final registry.
    pub async fn run(mut self) -> Registry {
        info!(
            directory = %self.scanner.directory().display(),
            interval_ms = self.interval.as_millis() as u64,
            modules = self.registry.len(),
            "Module watcher started"
        );

        loop {
            if self.cancelled() {
                break;
            }
            self.cycle().await;
            if !self.sleep().await {
                break;
            }
        }

        info!(modules = self.registry.len(), "Module watcher stopped");
        self.registry
    }

    /// One scan and reconciliation pass.
    pub async fn cycle(&mut self) -> CycleReport {
        let started = Instant::now();

        let snapshot = match self.scanner.scan() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Module scan failed; treating directory as empty");
                crate::metrics::record_scan_failure();
                Snapshot::new()
            }
        };

        let report = self.reconciler.reconcile(&mut self.registry, &snapshot).await;
        if report.applied.touched() {
            info!(
                changes = report.changes.len(),
                failures = report.applied.failures(),
                published = report.sync == SyncOutcome::Published,
                loaded = self.registry.loaded_count(),
                "Reconciliation cycle applied"
            );
        }

        crate::metrics::record_cycle(started.elapsed().as_secs_f64());
        crate::metrics::set_loaded_modules(self.registry.loaded_count());
        report
    }

    /// Sleep one interval, answering queries. Returns `false` on cancellation.
    async fn sleep(&mut self) -> bool {
        let timer = tokio::time::sleep(self.interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return true,
                changed = self.cancel.changed() => {
                    if changed.is_err() || *self.cancel.borrow() {
                        debug!("Cancellation received while sleeping");
                        return false;
                    }
                }
                query = self.queries.recv(), if self.queries_open => match query {
                    Some(query) => self.answer(query),
                    None => self.queries_open = false,
                },
            }
        }
    }

    fn answer(&self, query: Query) {
        match query {
            Query::Snapshot(reply) => {
                // The requester may have given up waiting.
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }
}
