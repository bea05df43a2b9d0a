use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Get the default root directory holding the registry and generated folders
#[tracing::instrument(skip(runtime))]
pub fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".scriptdeps"))
    }
}

#[cfg(target_os = "macos")]
fn system_root() -> PathBuf {
    PathBuf::from("/opt/scriptdeps")
}

#[cfg(target_os = "windows")]
fn system_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\scriptdeps")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_root() -> PathBuf {
    PathBuf::from("/usr/local/scriptdeps")
}
