//! The on-disk package registry.
//!
//! One file per package, filename = package name, contents = the serialized
//! record. The store also knows the build-cache folder so that deleting a
//! record can drop the matching per-version cache subfolder.

use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::Package;

pub struct PackageStore<'a, R: Runtime> {
    runtime: &'a R,
    registry_dir: PathBuf,
    cache_dir: PathBuf,
}

impl<'a, R: Runtime> PackageStore<'a, R> {
    /// Create a store over `registry_dir`, with `cache_dir` pointing at the
    /// build-cache folder the external build tool populates.
    pub fn new(runtime: &'a R, registry_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            runtime,
            registry_dir,
            cache_dir,
        }
    }

    /// The record file for a given package name.
    ///
    /// Returns: `<registry_dir>/<name>`
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.registry_dir.join(name)
    }

    /// Check whether a record with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.runtime.exists(&self.record_path(name))
    }

    /// Enumerate every currently valid record, in directory order.
    ///
    /// Listing is defined as "all currently valid records": files that do not
    /// deserialize as a package are skipped with a debug log, never an error.
    /// A missing registry folder lists as empty.
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Package>> {
        if !self.runtime.exists(&self.registry_dir) {
            return Ok(vec![]);
        }

        let entries = match self.runtime.read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to enumerate registry {:?}: {}", self.registry_dir, e);
                return Ok(vec![]);
            }
        };

        let mut packages = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.read_record(&entry) {
                Ok(package) => packages.push(package),
                Err(e) => {
                    debug!("Skipping unreadable registry entry {:?}: {}", entry, e);
                }
            }
        }
        Ok(packages)
    }

    /// Read and deserialize one record.
    #[tracing::instrument(skip(self))]
    pub fn get(&self, name: &str) -> Result<Package> {
        self.read_record(&self.record_path(name)).map_err(|e| {
            debug!("Failed to read package '{}': {}", name, e);
            Error::PackageFileUnreadable(name.to_string())
        })
    }

    /// Serialize and write (create-or-replace) the record file.
    #[tracing::instrument(skip(self, package))]
    pub fn save(&self, package: &Package) -> Result<()> {
        self.save_inner(package).map_err(|e| {
            debug!("Failed to save package '{}': {}", package.name, e);
            Error::PackageFileNotSaved(package.name.clone())
        })
    }

    /// Delete a record and best-effort delete its matching build-cache
    /// subfolder. Returns the deleted record.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, name: &str) -> Result<Package> {
        let record_path = self.record_path(name);
        if !self.runtime.exists(&record_path) {
            return Err(Error::UnknownPackage(name.to_string()));
        }

        let package = self.get(name)?;

        self.runtime.remove_file(&record_path).map_err(|e| {
            debug!("Failed to remove record file for '{}': {}", name, e);
            Error::PackageNotRemoved(name.to_string())
        })?;

        self.remove_cache_folder(&package)?;

        Ok(package)
    }

    fn read_record(&self, path: &Path) -> anyhow::Result<Package> {
        let content = self.runtime.read_to_string(path)?;
        let package: Package = serde_json::from_str(&content)?;
        Ok(package)
    }

    fn save_inner(&self, package: &Package) -> anyhow::Result<()> {
        if !self.runtime.exists(&self.registry_dir) {
            self.runtime.create_dir_all(&self.registry_dir)?;
        }
        let content = serde_json::to_string_pretty(package)?;
        self.runtime
            .write(&self.record_path(&package.name), content.as_bytes())
    }

    /// Remove the first build-cache subfolder whose name matches
    /// `<name>-<major_version>` as a case-insensitive prefix.
    fn remove_cache_folder(&self, package: &Package) -> Result<()> {
        if !self.runtime.exists(&self.cache_dir) {
            return Ok(());
        }

        let entries = match self.runtime.read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to enumerate build cache {:?}: {}", self.cache_dir, e);
                return Ok(());
            }
        };

        let prefix = format!("{}-{}", package.name, package.major_version).to_lowercase();
        let matched = entries.into_iter().find(|entry| {
            entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().starts_with(&prefix))
        });

        if let Some(folder) = matched {
            debug!("Removing build cache folder {:?}", folder);
            self.runtime.remove_dir_all(&folder).map_err(|e| {
                debug!("Failed to remove cache folder {:?}: {}", folder, e);
                Error::PackageNotRemoved(package.name.clone())
            })?;
        }

        Ok(())
    }
}
