//! Publishing the command surface.
//!
//! The reconciler calls [`CommandSynchronizer::sync`] once per cycle that
//! changed something. [`TableSync`] rebuilds the [`CommandTable`] that
//! gateway connections dispatch from; readers always see a complete table,
//! either the previous one or the new one.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::loader::LoadedModules;
use crate::modules::Command;

/// Publishes the currently registered commands to their consumer.
#[async_trait]
pub trait CommandSynchronizer: Send + Sync {
    /// Publish the current command set. Safe to call repeatedly.
    async fn sync(&self) -> Result<(), SyncError>;
}

type Table = BTreeMap<String, Arc<dyn Command>>;

/// Command name → command, shared between the publisher and the gateway.
#[derive(Clone, Default)]
pub struct CommandTable {
    current: Arc<RwLock<Arc<Table>>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.current.read().get(name).cloned()
    }

    /// Published command names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.current.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    fn replace(&self, table: Table) {
        *self.current.write() = Arc::new(table);
    }
}

/// Publishes the commands of every loaded module into a [`CommandTable`].
pub struct TableSync {
    modules: LoadedModules,
    table: CommandTable,
}

impl TableSync {
    pub fn new(modules: LoadedModules, table: CommandTable) -> Self {
        Self { modules, table }
    }
}

#[async_trait]
impl CommandSynchronizer for TableSync {
    async fn sync(&self) -> Result<(), SyncError> {
        let mut table = Table::new();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();

        for (module, command) in self.modules.commands() {
            let name = command.name().to_ascii_lowercase();
            if let Some(owner) = owners.get(&name) {
                // Modules are visited in identifier order, so the first owner wins.
                warn!(command = %name, module = %module, owner = %owner, "Duplicate command name, keeping first");
                continue;
            }
            owners.insert(name.clone(), module);
            table.insert(name, command);
        }

        let count = table.len();
        self.table.replace(table);
        info!(commands = count, "Published command table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ModuleLayout;
    use crate::loader::{CatalogLoader, ExtensionLoader};
    use crate::modules::Catalog;
    use std::fs;

    #[tokio::test]
    async fn publishes_only_loaded_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("calc.toml"), "").unwrap();
        fs::write(dir.path().join("hello.toml"), "").unwrap();
        fs::write(dir.path().join("hello2.toml"), "entry = 'hello'").unwrap();

        let live = LoadedModules::new();
        let table = CommandTable::new();
        let loader = CatalogLoader::new(ModuleLayout::new(dir.path()), Catalog::builtin(), live.clone());
        let sync = TableSync::new(live, table.clone());

        sync.sync().await.unwrap();
        assert!(table.is_empty());

        loader.load("cogs.calc").await.unwrap();
        loader.load("cogs.hello").await.unwrap();
        loader.load("cogs.hello2").await.unwrap();
        assert!(table.is_empty(), "nothing is visible before sync");

        sync.sync().await.unwrap();
        assert_eq!(table.names(), vec!["calc", "hello"]);

        loader.unload("cogs.calc").await.unwrap();
        sync.sync().await.unwrap();
        assert_eq!(table.names(), vec!["hello"]);
        assert!(table.get("calc").is_none());
    }
}
