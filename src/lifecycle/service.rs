//! Startup and shutdown of the module lifecycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use super::reconcile::{Reconciler, diff};
use super::record::{Registry, RegistrySnapshot};
use super::scanner::{DirectoryScanner, ModuleLayout, Snapshot};
use super::watcher::{Query, WatcherLoop};
use crate::error::{ScanError, StartupError};
use crate::loader::ExtensionLoader;
use crate::publish::CommandSynchronizer;

/// Queries queued while the watcher is mid-cycle.
const QUERY_BACKLOG: usize = 16;

/// Timing knobs for [`ModuleHost::startup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOptions {
    /// Sleep between watcher cycles. Must be non-zero.
    pub poll_interval: Duration,
    /// Bound on each loader and sync call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            call_timeout: None,
        }
    }
}

/// Owns the running watcher task.
///
/// Dropping the host without calling [`ModuleHost::shutdown`] still signals
/// the watcher to stop, but nothing waits for it.
pub struct ModuleHost {
    cancel_tx: watch::Sender<bool>,
    query_tx: mpsc::Sender<Query>,
    task: JoinHandle<Registry>,
}

impl ModuleHost {
    /// Load every module found in `layout.directory`, publish once, and start
    /// watching for changes.
    ///
    /// Individual module failures are logged and recorded; only invalid
    /// options make startup fail.
    pub async fn startup(
        layout: ModuleLayout,
        loader: Arc<dyn ExtensionLoader>,
        synchronizer: Arc<dyn CommandSynchronizer>,
        options: HostOptions,
    ) -> Result<Self, StartupError> {
        if options.poll_interval.is_zero() {
            return Err(StartupError::InvalidInterval);
        }

        let scanner = DirectoryScanner::new(layout);
        let reconciler =
            Reconciler::new(loader, synchronizer).with_call_timeout(options.call_timeout);

        let snapshot = match scanner.scan() {
            Ok(snapshot) => snapshot,
            Err(ScanError::Unavailable { path, source }) => {
                warn!(directory = %path.display(), error = %source, "No module directory; starting with no modules");
                Snapshot::new()
            }
        };

        let mut registry = Registry::new();
        let changes = diff(&registry, &snapshot);
        let applied = reconciler.apply(&mut registry, &changes, &snapshot).await;
        // Always publish once so the consumer sees the startup command set.
        reconciler.sync().await;

        info!(
            discovered = snapshot.len(),
            loaded = registry.loaded_count(),
            failed = applied.failures(),
            "Initial module load complete"
        );
        crate::metrics::set_loaded_modules(registry.loaded_count());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (query_tx, query_rx) = mpsc::channel(QUERY_BACKLOG);
        let watcher = WatcherLoop::new(
            scanner,
            reconciler,
            registry,
            options.poll_interval,
            cancel_rx,
            query_rx,
        );
        let task = tokio::spawn(watcher.run());

        Ok(Self {
            cancel_tx,
            query_tx,
            task,
        })
    }

    /// Copy of the registry, taken between watcher cycles.
    ///
    /// Waits for an in-progress cycle to finish. Returns `None` once the
    /// watcher has stopped.
    pub async fn snapshot(&self) -> Option<RegistrySnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.query_tx.send(Query::Snapshot(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Whether the watcher task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal cancellation and wait for the watcher to exit.
    ///
    /// A cycle already under way completes first. Returns the final registry.
    pub async fn shutdown(mut self) -> Result<Registry, JoinError> {
        let _ = self.cancel_tx.send(true);
        let registry = (&mut self.task).await?;
        info!(modules = registry.len(), "Module host shut down");
        Ok(registry)
    }
}

impl Drop for ModuleHost {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}
