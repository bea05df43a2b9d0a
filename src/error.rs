//! The closed error taxonomy for registry operations.
//!
//! Every failure of a registry operation surfaces as exactly one of these
//! variants; underlying I/O or subprocess causes are logged at the mapping
//! site rather than chained. Nothing here retries.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Tag listing failed, produced no output, or the latest tag did not
    /// start with an integer major component.
    #[error(
        "Failed to resolve the latest major version for '{0}'. \
         Check that the location is a reachable git repository with at least one version tag."
    )]
    VersionResolutionFailed(String),

    /// A record with the derived name already exists in the registry.
    #[error("Package '{0}' has already been added. Remove it first if you want to re-add it.")]
    PackageAlreadyAdded(String),

    /// Writing the record file failed.
    #[error("Failed to save the package file for '{0}'. Check permissions on the registry folder.")]
    PackageFileNotSaved(String),

    /// The record file is missing or does not deserialize as a package.
    #[error("Failed to read the package file for '{0}'. The file may be missing or corrupt.")]
    PackageFileUnreadable(String),

    /// Manifest regeneration or the build tool invocation failed.
    #[error("Failed to update the package manifest. Run with RUST_LOG=debug for the underlying cause.")]
    PackagesUpdateFailed,

    /// No record with that name exists.
    #[error("Unknown package '{0}'. Use 'list' to see the packages currently added.")]
    UnknownPackage(String),

    /// Deleting the record file or its build-cache folder failed.
    #[error("Failed to remove package '{0}'. Check permissions on the registry and generated folders.")]
    PackageNotRemoved(String),

    /// A non-blank line in a bulk-import file is not a valid package location.
    #[error(
        "Malformed package list file '{}'. Each non-blank line must be a single \
         repository URL or local path.", .0.display()
    )]
    MalformedPackageList(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
