//! Integration test common infrastructure.
//!
//! Provides a scripted loader and a counting synchronizer that record every
//! call the lifecycle makes, plus helpers for writing module files with
//! fixed modification times.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::Notify;
use tuffy::error::{LoadError, ModuleError, SyncError, UnloadError};
use tuffy::lifecycle::{ScanEntry, Snapshot};
use tuffy::loader::ExtensionLoader;
use tuffy::publish::CommandSynchronizer;

/// One loader call, as `("load" | "reload" | "unload", identifier)`.
pub type Call = (&'static str, String);

/// Loader that records calls and fails on request.
#[derive(Default)]
pub struct ScriptedLoader {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    failing_unload: Mutex<HashSet<String>>,
    gate: Mutex<Option<Gate>>,
}

/// Holds one load or reload of an identifier until released.
#[derive(Clone)]
pub struct Gate {
    pub id: String,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ScriptedLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Make load and reload of `id` fail until [`ScriptedLoader::heal`].
    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().remove(id);
    }

    pub fn fail_unload(&self, id: &str) {
        self.failing_unload.lock().insert(id.to_string());
    }

    /// Block the next load or reload of `id` until the gate is released.
    pub fn gate(&self, id: &str) -> Gate {
        let gate = Gate {
            id: id.to_string(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    async fn attempt(&self, op: &'static str, id: &str) -> Result<(), LoadError> {
        self.calls.lock().push((op, id.to_string()));

        let gate = {
            let mut slot = self.gate.lock();
            if slot.as_ref().is_some_and(|g| g.id == id) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.lock().contains(id) {
            return Err(ModuleError::new(format!("{id} is broken")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ExtensionLoader for ScriptedLoader {
    async fn load(&self, id: &str) -> Result<(), LoadError> {
        self.attempt("load", id).await
    }

    async fn reload(&self, id: &str) -> Result<(), LoadError> {
        self.attempt("reload", id).await
    }

    async fn unload(&self, id: &str) -> Result<(), UnloadError> {
        self.calls.lock().push(("unload", id.to_string()));
        if self.failing_unload.lock().contains(id) {
            return Err(ModuleError::new(format!("{id} refused to unload")).into());
        }
        Ok(())
    }
}

/// Synchronizer that counts calls.
#[derive(Default)]
pub struct CountingSync {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandSynchronizer for CountingSync {
    async fn sync(&self) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Publish("consumer unavailable".to_string()));
        }
        Ok(())
    }
}

pub fn call(op: &'static str, id: &str) -> Call {
    (op, id.to_string())
}

/// Snapshot from `(identifier, timestamp)` pairs.
pub fn snapshot(entries: &[(&str, u64)]) -> Snapshot {
    entries
        .iter()
        .map(|(id, ts)| {
            let stem = id.rsplit('.').next().unwrap_or(id);
            (
                id.to_string(),
                ScanEntry {
                    path: PathBuf::from(format!("cogs/{stem}.toml")),
                    timestamp: *ts,
                },
            )
        })
        .collect()
}

/// Write `<dir>/<stem>.toml` with its modification time pinned to `secs`
/// after the epoch.
///
/// The file is staged under another name and renamed into place, so a
/// concurrent scan sees either the old file or the finished new one.
pub fn write_module(dir: &Path, stem: &str, contents: &str, secs: u64) -> PathBuf {
    let path = dir.join(format!("{stem}.toml"));
    let staged = dir.join(format!("{stem}.staged"));
    std::fs::write(&staged, contents).unwrap();
    touch(&staged, secs);
    std::fs::rename(&staged, &path).unwrap();
    path
}

pub fn touch(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Poll `check` every few milliseconds until it holds or `limit` passes.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
