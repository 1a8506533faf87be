//! Extension loading.
//!
//! [`ExtensionLoader`] is the seam the reconciler drives. [`CatalogLoader`]
//! is the production implementation: it reads a module file, resolves its
//! entry point in the [`Catalog`], and keeps the live instance in a
//! [`LoadedModules`] set shared with the command publisher.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{LoadError, UnloadError};
use crate::lifecycle::ModuleLayout;
use crate::modules::{Catalog, Command, CommandModule, ModuleSettings};

/// Performs load, reload and unload for a module identifier.
///
/// Calls are independent and fallible. Unloading a module that is not
/// loaded succeeds without doing anything.
#[async_trait]
pub trait ExtensionLoader: Send + Sync {
    async fn load(&self, id: &str) -> Result<(), LoadError>;

    async fn reload(&self, id: &str) -> Result<(), LoadError>;

    async fn unload(&self, id: &str) -> Result<(), UnloadError>;
}

/// Parsed contents of a module file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Catalog entry point. Defaults to the file stem.
    pub entry: Option<String>,
    #[serde(default)]
    pub settings: toml::Table,
}

/// Identifier → live module instance.
#[derive(Clone, Default)]
pub struct LoadedModules {
    inner: Arc<Mutex<BTreeMap<String, Arc<dyn CommandModule>>>>,
}

impl LoadedModules {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: &str, module: Arc<dyn CommandModule>) -> Option<Arc<dyn CommandModule>> {
        self.inner.lock().insert(id.to_string(), module)
    }

    fn take(&self, id: &str) -> Option<Arc<dyn CommandModule>> {
        self.inner.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Commands of every live module as `(module id, command)`, in module order.
    pub fn commands(&self) -> Vec<(String, Arc<dyn Command>)> {
        let modules: Vec<_> = self
            .inner
            .lock()
            .iter()
            .map(|(id, m)| (id.clone(), Arc::clone(m)))
            .collect();
        modules
            .into_iter()
            .flat_map(|(id, m)| m.commands().into_iter().map(move |c| (id.clone(), c)))
            .collect()
    }
}

/// Loads modules from files in a [`ModuleLayout`] via a compile-time [`Catalog`].
pub struct CatalogLoader {
    layout: ModuleLayout,
    catalog: Catalog,
    live: LoadedModules,
}

impl CatalogLoader {
    pub fn new(layout: ModuleLayout, catalog: Catalog, live: LoadedModules) -> Self {
        Self {
            layout,
            catalog,
            live,
        }
    }

    /// Read, resolve and construct a module without publishing it.
    async fn instantiate(&self, id: &str) -> Result<Arc<dyn CommandModule>, LoadError> {
        let (Some(stem), Some(path)) = (self.layout.stem_of(id), self.layout.path_for(id)) else {
            return Err(LoadError::ForeignIdentifier(id.to_string()));
        };

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::Missing(path));
            }
            Err(source) => return Err(LoadError::Io { path, source }),
        };
        let manifest: ModuleManifest =
            toml::from_str(&text).map_err(|source| LoadError::Manifest {
                path: path.clone(),
                source,
            })?;

        let entry = manifest.entry.as_deref().unwrap_or(stem);
        let factory = self
            .catalog
            .get(entry)
            .ok_or_else(|| LoadError::UnknownEntry(entry.to_string()))?;

        let module: Arc<dyn CommandModule> =
            Arc::from(factory(&ModuleSettings::new(id, manifest.settings))?);
        module.setup().await?;
        debug!(module = %id, entry = %entry, "Module instantiated");
        Ok(module)
    }

    async fn teardown(id: &str, module: Arc<dyn CommandModule>) -> Result<(), UnloadError> {
        module.teardown().await.map_err(|e| {
            warn!(module = %id, error = %e, "Module teardown failed");
            UnloadError::from(e)
        })
    }
}

#[async_trait]
impl ExtensionLoader for CatalogLoader {
    async fn load(&self, id: &str) -> Result<(), LoadError> {
        let module = self.instantiate(id).await?;
        if let Some(previous) = self.live.insert(id, module) {
            // A stale instance can only exist if an earlier unload was skipped.
            let _ = Self::teardown(id, previous).await;
        }
        info!(module = %id, "Loaded module");
        Ok(())
    }

    /// Tear down the old instance, then load the new one. If the new one
    /// fails the module is left unloaded.
    async fn reload(&self, id: &str) -> Result<(), LoadError> {
        if let Some(previous) = self.live.take(id) {
            let _ = Self::teardown(id, previous).await;
        }
        let module = self.instantiate(id).await?;
        self.live.insert(id, module);
        info!(module = %id, "Reloaded module");
        Ok(())
    }

    async fn unload(&self, id: &str) -> Result<(), UnloadError> {
        let Some(module) = self.live.take(id) else {
            debug!(module = %id, "Unload of module that is not loaded");
            return Ok(());
        };
        Self::teardown(id, module).await?;
        info!(module = %id, "Unloaded module");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn loader(dir: &std::path::Path) -> (CatalogLoader, LoadedModules) {
        let live = LoadedModules::new();
        let loader = CatalogLoader::new(ModuleLayout::new(dir), Catalog::builtin(), live.clone());
        (loader, live)
    }

    #[tokio::test]
    async fn entry_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ping.toml"), "").unwrap();
        let (loader, live) = loader(dir.path());

        loader.load("cogs.ping").await.unwrap();
        assert!(live.contains("cogs.ping"));
        let names: Vec<_> = live.commands().iter().map(|(_, c)| c.name().to_string()).collect();
        assert_eq!(names, vec!["ping"]);
    }

    #[tokio::test]
    async fn explicit_entry_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("greeter.toml"),
            "entry = 'hello'\n[settings]\ngreeting = 'Hi'\n",
        )
        .unwrap();
        let (loader, live) = loader(dir.path());

        loader.load("cogs.greeter").await.unwrap();
        assert_eq!(live.identifiers(), vec!["cogs.greeter"]);
    }

    #[tokio::test]
    async fn failure_kinds() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mystery.toml"), "").unwrap();
        fs::write(dir.path().join("broken.toml"), "entry = [").unwrap();
        fs::write(dir.path().join("typo.toml"), "entyr = 'calc'").unwrap();
        fs::write(dir.path().join("shouty.toml"), "entry = 'hello'\n[settings]\ngreeting = ''").unwrap();
        let (loader, live) = loader(dir.path());

        assert!(matches!(loader.load("cogs.mystery").await, Err(LoadError::UnknownEntry(e)) if e == "mystery"));
        assert!(matches!(loader.load("cogs.broken").await, Err(LoadError::Manifest { .. })));
        assert!(matches!(loader.load("cogs.typo").await, Err(LoadError::Manifest { .. })));
        assert!(matches!(loader.load("cogs.shouty").await, Err(LoadError::Setup(_))));
        assert!(matches!(loader.load("cogs.absent").await, Err(LoadError::Missing(_))));
        assert!(matches!(loader.load("other.calc").await, Err(LoadError::ForeignIdentifier(_))));
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn failed_reload_leaves_module_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.toml");
        fs::write(&path, "").unwrap();
        let (loader, live) = loader(dir.path());

        loader.load("cogs.calc").await.unwrap();
        fs::write(&path, "entry = 'nope'").unwrap();
        assert!(loader.reload("cogs.calc").await.is_err());
        assert!(!live.contains("cogs.calc"));
    }

    #[tokio::test]
    async fn unload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("calc.toml"), "").unwrap();
        let (loader, live) = loader(dir.path());

        loader.load("cogs.calc").await.unwrap();
        loader.unload("cogs.calc").await.unwrap();
        loader.unload("cogs.calc").await.unwrap();
        loader.unload("cogs.never").await.unwrap();
        assert!(live.is_empty());
    }
}
