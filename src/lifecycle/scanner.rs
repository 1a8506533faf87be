//! Directory scanning for module files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record::{Timestamp, timestamp_of};
use crate::error::ScanError;

/// Naming rules shared by the scanner and the loader.
///
/// A file `<directory>/<stem>.<extension>` whose name does not start with
/// `reserved_prefix` is the module `<namespace>.<stem>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    pub directory: PathBuf,
    pub namespace: String,
    pub extension: String,
    pub reserved_prefix: String,
}

impl ModuleLayout {
    /// Layout with the default naming rules (`cogs.<stem>`, `*.toml`, `__` reserved).
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            namespace: "cogs".to_string(),
            extension: "toml".to_string(),
            reserved_prefix: "__".to_string(),
        }
    }

    /// Identifier for a file name, or `None` if the name is not a module.
    pub fn identifier_for(&self, file_name: &str) -> Option<String> {
        if !self.reserved_prefix.is_empty() && file_name.starts_with(&self.reserved_prefix) {
            return None;
        }
        let stem = file_name.strip_suffix(&self.extension)?.strip_suffix('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.namespace, stem))
    }

    /// File stem for an identifier in this namespace.
    pub fn stem_of<'a>(&self, identifier: &'a str) -> Option<&'a str> {
        identifier
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix('.')
            .filter(|stem| !stem.is_empty())
    }

    /// Source path for an identifier in this namespace.
    pub fn path_for(&self, identifier: &str) -> Option<PathBuf> {
        let stem = self.stem_of(identifier)?;
        Some(self.directory.join(format!("{stem}.{}", self.extension)))
    }
}

/// One module file seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub timestamp: Timestamp,
}

/// Result of one scan: identifier → entry.
pub type Snapshot = BTreeMap<String, ScanEntry>;

/// Lists module files in the watched directory.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    layout: ModuleLayout,
}

impl DirectoryScanner {
    pub fn new(layout: ModuleLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub fn directory(&self) -> &Path {
        &self.layout.directory
    }

    /// List every module file and its modification time.
    ///
    /// Fails only when the directory itself cannot be read. Entries whose
    /// metadata disappears mid-scan are skipped.
    pub fn scan(&self) -> Result<Snapshot, ScanError> {
        let dir = &self.layout.directory;
        let unavailable = |source| ScanError::Unavailable {
            path: dir.clone(),
            source,
        };

        let mut snapshot = Snapshot::new();
        for entry in std::fs::read_dir(dir).map_err(unavailable)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let file_name = entry.file_name();
            let Some(identifier) = file_name.to_str().and_then(|n| self.layout.identifier_for(n))
            else {
                continue;
            };

            let path = entry.path();
            // Follow symlinks so a linked module file counts as a file.
            let metadata = match std::fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping module file without metadata");
                    continue;
                }
            };
            let timestamp = match metadata.modified() {
                Ok(t) => timestamp_of(t),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping module file without mtime");
                    continue;
                }
            };

            snapshot.insert(identifier, ScanEntry { path, timestamp });
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn identifier_rules() {
        let layout = ModuleLayout::new("cogs");
        assert_eq!(layout.identifier_for("hello.toml").as_deref(), Some("cogs.hello"));
        assert_eq!(layout.identifier_for("__init__.toml"), None);
        assert_eq!(layout.identifier_for("notes.txt"), None);
        assert_eq!(layout.identifier_for("hellotoml"), None);
        assert_eq!(layout.identifier_for(".toml"), None);
    }

    #[test]
    fn path_round_trips_through_identifier() {
        let layout = ModuleLayout::new("/srv/cogs");
        assert_eq!(
            layout.path_for("cogs.calc"),
            Some(PathBuf::from("/srv/cogs/calc.toml"))
        );
        assert_eq!(layout.path_for("other.calc"), None);
        assert_eq!(layout.path_for("cogs."), None);
        assert_eq!(layout.path_for("cogsx.calc"), None);
    }

    #[test]
    fn scan_filters_candidates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.toml"), "").unwrap();
        fs::write(dir.path().join("ping.toml"), "").unwrap();
        fs::write(dir.path().join("__shared.toml"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::create_dir(dir.path().join("nested.toml")).unwrap();

        let scanner = DirectoryScanner::new(ModuleLayout::new(dir.path()));
        let snapshot = scanner.scan().unwrap();
        let ids: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(ids, vec!["cogs.hello", "cogs.ping"]);
        assert_eq!(snapshot["cogs.hello"].path, dir.path().join("hello.toml"));
        assert!(snapshot["cogs.hello"].timestamp > 0);
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = DirectoryScanner::new(ModuleLayout::new(dir.path().join("gone")));
        assert!(matches!(scanner.scan(), Err(ScanError::Unavailable { .. })));
    }
}
