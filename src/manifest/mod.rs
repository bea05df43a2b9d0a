//! Generation of the aggregate build manifest.
//!
//! The generated-output folder owns two artifacts: the manifest file, which
//! declares every stored package as a dependency of a single reserved target,
//! and the build-cache subfolder the external build tool populates with
//! per-package-version checkouts. Reads of either artifact lazily regenerate
//! it when missing: attempt, regenerate once on absence, retry once.

mod invoker;

pub use invoker::{BuildInvoker, SwiftPackageManager};
#[cfg(test)]
pub use invoker::MockBuildInvoker;

use log::debug;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::package::{Package, PackageStore};
use crate::runtime::Runtime;

/// Fixed name of the generated manifest file.
pub const MANIFEST_FILE: &str = "Package.swift";

/// Reserved aggregate target name, substituted per script by
/// [`ManifestGenerator::manifest_for_script`].
pub const AGGREGATE_TARGET: &str = "SCRIPT_PACKAGES";

/// Name of the build-cache subfolder inside the generated-output folder.
pub const CACHE_FOLDER: &str = "Packages";

pub struct ManifestGenerator<'a, R: Runtime, B: BuildInvoker> {
    runtime: &'a R,
    generated_dir: PathBuf,
    invoker: B,
}

impl<'a, R: Runtime, B: BuildInvoker> ManifestGenerator<'a, R, B> {
    pub fn new(runtime: &'a R, generated_dir: PathBuf, invoker: B) -> Self {
        Self {
            runtime,
            generated_dir,
            invoker,
        }
    }

    /// Returns: `<generated_dir>/Package.swift`
    pub fn manifest_path(&self) -> PathBuf {
        self.generated_dir.join(MANIFEST_FILE)
    }

    /// Returns: `<generated_dir>/Packages`
    pub fn cache_dir(&self) -> PathBuf {
        self.generated_dir.join(CACHE_FOLDER)
    }

    /// Rewrite the manifest from the current store contents, have the build
    /// tool refresh its checkouts, and ensure the build-cache folder exists.
    /// Everything in this sequence collapses to [`Error::PackagesUpdateFailed`].
    #[tracing::instrument(skip(self, store))]
    pub fn regenerate(&self, store: &PackageStore<'_, R>) -> Result<()> {
        self.regenerate_inner(store).map_err(|e| {
            debug!("Manifest regeneration failed: {}", e);
            Error::PackagesUpdateFailed
        })
    }

    fn regenerate_inner(&self, store: &PackageStore<'_, R>) -> anyhow::Result<()> {
        let packages = store.list()?;
        debug!(
            "Regenerating manifest for {} package(s) in {:?}",
            packages.len(),
            self.generated_dir
        );

        if !self.runtime.exists(&self.generated_dir) {
            self.runtime.create_dir_all(&self.generated_dir)?;
        }

        let manifest = render_manifest(&packages);
        self.runtime
            .write(&self.manifest_path(), manifest.as_bytes())?;

        self.invoker.update_packages(&self.generated_dir)?;

        let cache_dir = self.cache_dir();
        if !self.runtime.exists(&cache_dir) {
            self.runtime.create_dir_all(&cache_dir)?;
        }

        Ok(())
    }

    /// The manifest text with the reserved aggregate target renamed to
    /// `script_name`, so each script gets an individually-named view of the
    /// same dependency set. Regenerates first if the manifest is absent.
    #[tracing::instrument(skip(self, store))]
    pub fn manifest_for_script(
        &self,
        script_name: &str,
        store: &PackageStore<'_, R>,
    ) -> Result<String> {
        let path = self.manifest_path();
        if !self.runtime.exists(&path) {
            self.regenerate(store)?;
        }

        let content = self.runtime.read_to_string(&path).map_err(|e| {
            debug!("Failed to read manifest {:?}: {}", path, e);
            Error::PackagesUpdateFailed
        })?;

        Ok(content.replace(AGGREGATE_TARGET, script_name))
    }

    /// Symlink the shared build-cache folder into `dest`, so script targets
    /// share one physical cache. A same-named entry already present in `dest`
    /// makes this a no-op. Regenerates first if the cache folder is absent.
    #[tracing::instrument(skip(self, store))]
    pub fn expose_build_cache(&self, dest: &Path, store: &PackageStore<'_, R>) -> Result<()> {
        let cache_dir = self.cache_dir();
        if !self.runtime.exists(&cache_dir) {
            self.regenerate(store)?;
        }

        let link = dest.join(CACHE_FOLDER);
        // exists() follows symlinks, so it misses a dangling link with the
        // same name; is_symlink() catches that case.
        if self.runtime.exists(&link) || self.runtime.is_symlink(&link) {
            debug!("{:?} already exists, leaving it alone", link);
            return Ok(());
        }

        self.runtime.symlink(&cache_dir, &link).map_err(|e| {
            debug!("Failed to symlink {:?} -> {:?}: {}", link, cache_dir, e);
            Error::PackagesUpdateFailed
        })
    }
}

/// Render the aggregate manifest, one dependency entry per record, in store
/// enumeration order.
fn render_manifest(packages: &[Package]) -> String {
    let mut manifest = String::from(
        "// swift-tools-version:5.5\n\
         import PackageDescription\n\
         \n\
         let package = Package(\n",
    );
    manifest.push_str(&format!("    name: \"{}\",\n", AGGREGATE_TARGET));
    manifest.push_str("    dependencies: [\n");
    for package in packages {
        manifest.push_str("        ");
        manifest.push_str(&package.dependency_entry());
        manifest.push('\n');
    }
    manifest.push_str("    ]\n)\n");
    manifest
}
