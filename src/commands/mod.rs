//! CLI command entry points.
//!
//! Each function wires a [`PackageManager`] over the resolved folder layout
//! and translates one subcommand into registry operations. Output formatting
//! lives here; the components below never print.

use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::manager::PackageManager;
use crate::manifest::SwiftPackageManager;
use crate::package::Location;
use crate::runtime::Runtime;

pub mod config;
mod paths;

use config::Config;

fn manager<'a, R: Runtime>(
    runtime: &'a R,
    config: Config,
) -> PackageManager<'a, R, SwiftPackageManager<'a, R>> {
    PackageManager::new(
        runtime,
        config.registry_dir,
        config.generated_dir,
        SwiftPackageManager::new(runtime),
    )
}

/// Add a package from a repository URL or local path
#[tracing::instrument(skip(runtime, root))]
pub fn add<R: Runtime>(runtime: R, location_str: &str, root: Option<PathBuf>) -> Result<()> {
    let location = location_str.parse::<Location>()?;
    let config = Config::new(&runtime, root)?;

    let package = manager(&runtime, config).add(&location, false)?;
    println!(
        "Added {} at major version {}",
        package.name, package.major_version
    );
    Ok(())
}

/// Bulk-import packages from a newline-delimited list file
#[tracing::instrument(skip(runtime, root))]
pub fn import<R: Runtime>(runtime: R, list_file: PathBuf, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(&runtime, root)?;

    let packages = manager(&runtime, config).add_all_from(&list_file)?;
    println!("Imported {} package(s) from {}", packages.len(), list_file.display());
    Ok(())
}

/// Remove a package
#[tracing::instrument(skip(runtime, root))]
pub fn remove<R: Runtime>(runtime: R, name: &str, yes: bool, root: Option<PathBuf>) -> Result<()> {
    debug!("Removing {} yes={}", name, yes);

    if !yes && !runtime.confirm(&format!("Remove package '{}'?", name))? {
        println!("Removal cancelled.");
        return Ok(());
    }

    let config = Config::new(&runtime, root)?;
    let package = manager(&runtime, config).remove(name)?;
    println!("Removed {}", package.name);
    Ok(())
}

/// Update all packages to their latest major versions
#[tracing::instrument(skip(runtime, root))]
pub fn update<R: Runtime>(runtime: R, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(&runtime, root)?;

    manager(&runtime, config).update_all_to_latest_major()?;
    println!("All packages updated.");
    Ok(())
}

/// List all added packages
#[tracing::instrument(skip(runtime, root))]
pub fn list<R: Runtime>(runtime: R, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(&runtime, root)?;

    let packages = manager(&runtime, config).list()?;
    if packages.is_empty() {
        println!("No packages added.");
        return Ok(());
    }

    debug!("Found {} package(s)", packages.len());
    for package in packages {
        println!("{} {} {}", package.name, package.major_version, package.url);
    }
    Ok(())
}

/// Print the manifest for a named script target
#[tracing::instrument(skip(runtime, root))]
pub fn manifest<R: Runtime>(runtime: R, script_name: &str, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(&runtime, root)?;

    let manifest = manager(&runtime, config).manifest_for_script(script_name)?;
    print!("{}", manifest);
    Ok(())
}

/// Expose the shared build cache inside a destination folder
#[tracing::instrument(skip(runtime, root))]
pub fn link<R: Runtime>(runtime: R, dest: PathBuf, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(&runtime, root)?;

    manager(&runtime, config).expose_build_cache(&dest)?;
    println!("Build cache exposed in {}", dest.display());
    Ok(())
}
