//! Orchestration of registry operations.
//!
//! `PackageManager` composes the store, the version resolver, and the
//! manifest generator, and translates every failure into the typed taxonomy
//! in [`crate::error`]. Mutating operations regenerate the manifest; read
//! operations regenerate lazily through the generator when artifacts are
//! missing.

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::{BuildInvoker, ManifestGenerator};
use crate::package::{Location, Package, PackageStore};
use crate::resolver::VersionResolver;
use crate::runtime::Runtime;

pub struct PackageManager<'a, R: Runtime, B: BuildInvoker> {
    runtime: &'a R,
    store: PackageStore<'a, R>,
    resolver: VersionResolver<'a, R>,
    generator: ManifestGenerator<'a, R, B>,
}

impl<'a, R: Runtime, B: BuildInvoker> PackageManager<'a, R, B> {
    /// Wire up a manager over an explicit registry folder and generated-output
    /// folder. The folders are threaded through every component; nothing here
    /// relies on ambient process state.
    pub fn new(runtime: &'a R, registry_dir: PathBuf, generated_dir: PathBuf, invoker: B) -> Self {
        let generator = ManifestGenerator::new(runtime, generated_dir, invoker);
        let store = PackageStore::new(runtime, registry_dir, generator.cache_dir());
        Self {
            runtime,
            store,
            resolver: VersionResolver::new(runtime),
            generator,
        }
    }

    /// Add a package: derive its name, resolve its latest major version (one
    /// version-control round trip), persist it, and regenerate the manifest.
    ///
    /// With `skip_if_already_added`, an existing record is returned untouched
    /// instead of failing with [`Error::PackageAlreadyAdded`]; no resolution
    /// or regeneration happens in that case.
    #[tracing::instrument(skip(self))]
    pub fn add(&self, location: &Location, skip_if_already_added: bool) -> Result<Package> {
        let name = location.name();

        if self.store.contains(&name) {
            if skip_if_already_added {
                debug!("Package '{}' already added, skipping", name);
                return self.store.get(&name);
            }
            return Err(Error::PackageAlreadyAdded(name));
        }

        let major_version = self.resolver.resolve_latest_major_version(location)?;
        let package = Package::new(location, major_version);
        info!("Adding package {} at major version {}", package.name, major_version);

        self.store.save(&package)?;
        self.generator.regenerate(&self.store)?;

        Ok(package)
    }

    /// Bulk-import package locations from a newline-delimited file. Blank
    /// lines are skipped; any non-blank line that is not a valid location
    /// fails the whole import with [`Error::MalformedPackageList`]. Valid
    /// lines are added with skip-if-present semantics, so re-importing the
    /// same file is idempotent.
    #[tracing::instrument(skip(self))]
    pub fn add_all_from(&self, list_file: &Path) -> Result<Vec<Package>> {
        let content = self.runtime.read_to_string(list_file).map_err(|e| {
            debug!("Failed to read package list {:?}: {}", list_file, e);
            Error::MalformedPackageList(list_file.to_path_buf())
        })?;

        let mut added = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let location: Location = line.parse().map_err(|e| {
                debug!("Invalid location '{}' in {:?}: {}", line, list_file, e);
                Error::MalformedPackageList(list_file.to_path_buf())
            })?;
            added.push(self.add(&location, true)?);
        }
        Ok(added)
    }

    /// Remove a package and its matching build-cache subfolder.
    ///
    /// The manifest is deliberately not regenerated here: until the next
    /// mutating or manifest-reading call, the generated manifest may still
    /// list the removed package.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, name: &str) -> Result<Package> {
        let package = self.store.delete(name)?;
        info!("Removed package {}", package.name);
        Ok(package)
    }

    /// Resolve every stored package and persist any strictly greater major
    /// version, then regenerate the manifest once for the whole pass.
    ///
    /// A resolution or write failure aborts the pass; bumps already persisted
    /// stay persisted (no rollback).
    #[tracing::instrument(skip(self))]
    pub fn update_all_to_latest_major(&self) -> Result<()> {
        for package in self.store.list()? {
            let latest = self
                .resolver
                .resolve_latest_major_version(&package.location())?;

            if latest > package.major_version {
                info!(
                    "Updating {} from major version {} to {}",
                    package.name, package.major_version, latest
                );
                self.store.save(&Package {
                    major_version: latest,
                    ..package
                })?;
            }
        }

        self.generator.regenerate(&self.store)
    }

    /// All currently valid records, in registry enumeration order.
    pub fn list(&self) -> Result<Vec<Package>> {
        self.store.list()
    }

    /// The manifest text with the aggregate target renamed to `script_name`.
    pub fn manifest_for_script(&self, script_name: &str) -> Result<String> {
        self.generator.manifest_for_script(script_name, &self.store)
    }

    /// Symlink the shared build cache into `dest`.
    pub fn expose_build_cache(&self, dest: &Path) -> Result<()> {
        self.generator.expose_build_cache(dest, &self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CACHE_FOLDER, MANIFEST_FILE, MockBuildInvoker};
    use crate::runtime::MockRuntime;
    use crate::test_utils::{test_generated_dir, test_registry_dir};
    use mockall::predicate::eq;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// An in-memory registry backing a MockRuntime, so manager tests can
    /// observe store state across calls instead of scripting every read.
    #[derive(Clone, Default)]
    struct FakeRegistry {
        files: Arc<Mutex<HashMap<String, String>>>,
    }

    impl FakeRegistry {
        fn wire(&self, runtime: &mut MockRuntime) {
            let files = self.files.clone();
            runtime
                .expect_exists()
                .withf(|p| p.starts_with(test_registry_dir()))
                .returning(move |p| {
                    p == test_registry_dir()
                        || files.lock().unwrap().contains_key(file_name(p).as_str())
                });

            let files = self.files.clone();
            runtime
                .expect_read_dir()
                .with(eq(test_registry_dir()))
                .returning(move |p| {
                    let mut names: Vec<String> =
                        files.lock().unwrap().keys().cloned().collect();
                    names.sort();
                    Ok(names.iter().map(|n| p.join(n)).collect())
                });

            let files = self.files.clone();
            runtime
                .expect_read_to_string()
                .withf(|p| p.starts_with(test_registry_dir()))
                .returning(move |p| {
                    files
                        .lock()
                        .unwrap()
                        .get(file_name(p).as_str())
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no such file"))
                });

            let files = self.files.clone();
            runtime
                .expect_write()
                .withf(|p, _| p.starts_with(test_registry_dir()))
                .returning(move |p, contents| {
                    files
                        .lock()
                        .unwrap()
                        .insert(file_name(p), String::from_utf8(contents.to_vec()).unwrap());
                    Ok(())
                });

            let files = self.files.clone();
            runtime
                .expect_remove_file()
                .withf(|p| p.starts_with(test_registry_dir()))
                .returning(move |p| {
                    files.lock().unwrap().remove(file_name(p).as_str());
                    Ok(())
                });
        }

        fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }

        fn get(&self, name: &str) -> Option<Package> {
            self.files
                .lock()
                .unwrap()
                .get(name)
                .map(|content| serde_json::from_str(content).unwrap())
        }
    }

    fn file_name(p: &Path) -> String {
        p.file_name().unwrap().to_str().unwrap().to_string()
    }

    /// Generated-folder expectations shared by tests that regenerate.
    fn wire_generated_dir(runtime: &mut MockRuntime) {
        runtime
            .expect_exists()
            .with(eq(test_generated_dir()))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(test_generated_dir().join(CACHE_FOLDER)))
            .returning(|_| true);
        runtime
            .expect_write()
            .withf(|p, _| p == test_generated_dir().join(MANIFEST_FILE))
            .returning(|_, _| Ok(()));
    }

    fn manager<'a>(
        runtime: &'a MockRuntime,
        invoker: MockBuildInvoker,
    ) -> PackageManager<'a, MockRuntime, MockBuildInvoker> {
        PackageManager::new(runtime, test_registry_dir(), test_generated_dir(), invoker)
    }

    fn expect_remote_tags(runtime: &mut MockRuntime, url: &str, output: &str) {
        let command = format!("git ls-remote --tags {}", url);
        let output = output.to_string();
        runtime
            .expect_run_command()
            .withf(move |c| c == command)
            .returning(move |_| Ok(output.clone()));
    }

    #[test]
    fn test_add_resolves_saves_and_regenerates() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        expect_remote_tags(
            &mut runtime,
            "https://example.com/foo.git",
            "aaa\trefs/tags/1.0.0\nbbb\trefs/tags/2.1.0\n",
        );

        let mut invoker = MockBuildInvoker::new();
        invoker.expect_update_packages().times(1).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        let package = manager
            .add(&"https://example.com/foo.git".parse().unwrap(), false)
            .unwrap();

        assert_eq!(package.name, "foo");
        assert_eq!(package.major_version, 2);
        assert_eq!(
            registry.get("foo").unwrap(),
            Package {
                name: "foo".into(),
                url: "https://example.com/foo.git".into(),
                major_version: 2,
            }
        );
    }

    #[test]
    fn test_add_twice_fails_and_leaves_store_unchanged() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        expect_remote_tags(
            &mut runtime,
            "https://example.com/foo.git",
            "aaa\trefs/tags/2.1.0\n",
        );

        let mut invoker = MockBuildInvoker::new();
        invoker.expect_update_packages().times(1).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        let location: Location = "https://example.com/foo.git".parse().unwrap();
        manager.add(&location, false).unwrap();

        let before = registry.names();
        assert_eq!(
            manager.add(&location, false),
            Err(Error::PackageAlreadyAdded("foo".into()))
        );
        assert_eq!(registry.names(), before);
    }

    #[test]
    fn test_add_with_skip_is_idempotent_and_cheap() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        expect_remote_tags(
            &mut runtime,
            "https://example.com/foo.git",
            "aaa\trefs/tags/2.1.0\n",
        );

        let mut invoker = MockBuildInvoker::new();
        // Exactly one regeneration: the skipped second add must not rebuild.
        invoker.expect_update_packages().times(1).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        let location: Location = "https://example.com/foo.git".parse().unwrap();
        let first = manager.add(&location, true).unwrap();
        let state_after_first = registry.get("foo").unwrap();

        let second = manager.add(&location, true).unwrap();
        assert_eq!(second, first);
        assert_eq!(registry.get("foo").unwrap(), state_after_first);
    }

    #[test]
    fn test_add_all_from_skips_blanks_and_duplicates() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        expect_remote_tags(
            &mut runtime,
            "https://example.com/a.git",
            "aaa\trefs/tags/1.0.0\n",
        );
        runtime
            .expect_read_to_string()
            .with(eq(Path::new("/tmp/packages.txt")))
            .returning(|_| Ok("\nhttps://example.com/a.git\nhttps://example.com/a.git\n".into()));

        let mut invoker = MockBuildInvoker::new();
        invoker.expect_update_packages().times(1).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        manager.add_all_from(Path::new("/tmp/packages.txt")).unwrap();

        assert_eq!(registry.names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_add_all_from_rejects_invalid_line() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        runtime
            .expect_read_to_string()
            .with(eq(Path::new("/tmp/packages.txt")))
            .returning(|_| Ok("not a location at all\n".into()));

        let manager = manager(&runtime, MockBuildInvoker::new());
        assert_eq!(
            manager.add_all_from(Path::new("/tmp/packages.txt")),
            Err(Error::MalformedPackageList("/tmp/packages.txt".into()))
        );
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_remove_unknown_package() {
        let registry = FakeRegistry::default();
        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);

        let manager = manager(&runtime, MockBuildInvoker::new());
        assert_eq!(
            manager.remove("ghost"),
            Err(Error::UnknownPackage("ghost".into()))
        );
    }

    #[test]
    fn test_remove_does_not_regenerate() {
        let registry = FakeRegistry::default();
        registry.files.lock().unwrap().insert(
            "foo".into(),
            serde_json::to_string(&Package {
                name: "foo".into(),
                url: "https://example.com/foo.git".into(),
                major_version: 2,
            })
            .unwrap(),
        );

        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        runtime
            .expect_exists()
            .with(eq(test_generated_dir().join(CACHE_FOLDER)))
            .returning(|_| false);

        // MockBuildInvoker with no expectations: any regeneration would panic.
        let manager = manager(&runtime, MockBuildInvoker::new());
        let removed = manager.remove("foo").unwrap();

        assert_eq!(removed.major_version, 2);
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_update_all_bumps_only_strictly_greater() {
        let registry = FakeRegistry::default();
        for (name, major) in [("a", 1u64), ("b", 3u64)] {
            registry.files.lock().unwrap().insert(
                name.into(),
                serde_json::to_string(&Package {
                    name: name.into(),
                    url: format!("https://example.com/{}.git", name),
                    major_version: major,
                })
                .unwrap(),
            );
        }

        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        // 'a' has a newer major upstream; 'b' reports an *older* tag, which
        // must never lower the stored version.
        expect_remote_tags(&mut runtime, "https://example.com/a.git", "x\trefs/tags/2.0.0\n");
        expect_remote_tags(&mut runtime, "https://example.com/b.git", "x\trefs/tags/1.0.0\n");

        let mut invoker = MockBuildInvoker::new();
        invoker.expect_update_packages().times(1).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        manager.update_all_to_latest_major().unwrap();

        assert_eq!(registry.get("a").unwrap().major_version, 2);
        assert_eq!(registry.get("b").unwrap().major_version, 3);
    }

    #[test]
    fn test_update_all_is_idempotent_without_new_tags() {
        let registry = FakeRegistry::default();
        registry.files.lock().unwrap().insert(
            "a".into(),
            serde_json::to_string(&Package {
                name: "a".into(),
                url: "https://example.com/a.git".into(),
                major_version: 2,
            })
            .unwrap(),
        );

        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        wire_generated_dir(&mut runtime);
        expect_remote_tags(&mut runtime, "https://example.com/a.git", "x\trefs/tags/2.4.0\n");

        let mut invoker = MockBuildInvoker::new();
        invoker.expect_update_packages().times(2).returning(|_| Ok(()));

        let manager = manager(&runtime, invoker);
        manager.update_all_to_latest_major().unwrap();
        let after_first = registry.get("a").unwrap();
        manager.update_all_to_latest_major().unwrap();

        assert_eq!(registry.get("a").unwrap(), after_first);
    }

    #[test]
    fn test_update_all_aborts_on_resolution_failure() {
        let registry = FakeRegistry::default();
        registry.files.lock().unwrap().insert(
            "a".into(),
            serde_json::to_string(&Package {
                name: "a".into(),
                url: "https://example.com/a.git".into(),
                major_version: 1,
            })
            .unwrap(),
        );

        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        runtime
            .expect_run_command()
            .returning(|_| Err(anyhow::anyhow!("network unreachable")));

        // No regeneration on abort.
        let manager = manager(&runtime, MockBuildInvoker::new());
        assert_eq!(
            manager.update_all_to_latest_major(),
            Err(Error::VersionResolutionFailed(
                "https://example.com/a.git".into()
            ))
        );
    }

    #[test]
    fn test_update_all_keeps_persisted_bumps_on_later_failure() {
        let registry = FakeRegistry::default();
        for name in ["a", "b"] {
            registry.files.lock().unwrap().insert(
                name.into(),
                serde_json::to_string(&Package {
                    name: name.into(),
                    url: format!("https://example.com/{}.git", name),
                    major_version: 1,
                })
                .unwrap(),
            );
        }

        let mut runtime = MockRuntime::new();
        registry.wire(&mut runtime);
        // Enumeration order is by name: 'a' resolves and is persisted before
        // 'b' fails to resolve and aborts the pass.
        expect_remote_tags(&mut runtime, "https://example.com/a.git", "x\trefs/tags/2.0.0\n");
        runtime
            .expect_run_command()
            .withf(|c| c == "git ls-remote --tags https://example.com/b.git")
            .returning(|_| Err(anyhow::anyhow!("network unreachable")));

        // No regeneration on abort.
        let manager = manager(&runtime, MockBuildInvoker::new());
        assert_eq!(
            manager.update_all_to_latest_major(),
            Err(Error::VersionResolutionFailed(
                "https://example.com/b.git".into()
            ))
        );

        // The bump for 'a' stays persisted; 'b' is untouched.
        assert_eq!(registry.get("a").unwrap().major_version, 2);
        assert_eq!(registry.get("b").unwrap().major_version, 1);
    }
}
