//! Lifecycle Module - Hot Loading of Command Modules.
//!
//! Keeps the set of loaded modules in step with a directory of module files.
//! [`ModuleHost`] performs the initial load and owns the [`WatcherLoop`] task,
//! which scans the directory, diffs the result against the [`Registry`] and
//! applies loads, reloads and unloads one module at a time.

pub mod reconcile;
pub mod record;
pub mod scanner;
pub mod service;
pub mod watcher;

pub use reconcile::{
    ApplyReport, ChangeSet, CycleReport, Op, Outcome, Reconciler, SyncOutcome, diff,
};
pub use record::{LoadState, ModuleRecord, Registry, RegistrySnapshot, Timestamp, timestamp_of};
pub use scanner::{DirectoryScanner, ModuleLayout, ScanEntry, Snapshot};
pub use service::{HostOptions, ModuleHost};
pub use watcher::{Query, WatcherLoop};
