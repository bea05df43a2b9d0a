//! The external build tool seam.
//!
//! The registry only needs "refresh dependencies in this folder, succeed or
//! fail" from the build tool, so that is the whole trait. Tests substitute a
//! mock; production runs Swift Package Manager.

use anyhow::Result;
use std::path::Path;

use crate::runtime::Runtime;

#[cfg_attr(test, mockall::automock)]
pub trait BuildInvoker {
    /// Refresh the dependency checkouts for the manifest in `folder`.
    fn update_packages(&self, folder: &Path) -> Result<()>;
}

pub struct SwiftPackageManager<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> SwiftPackageManager<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime> BuildInvoker for SwiftPackageManager<'_, R> {
    #[tracing::instrument(skip(self))]
    fn update_packages(&self, folder: &Path) -> Result<()> {
        self.runtime.run_command_in("swift package update", folder)?;
        Ok(())
    }
}
