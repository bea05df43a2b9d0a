use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::runtime::Runtime;

use super::paths::default_root;

/// Name of the registry folder under the root.
pub const REGISTRY_FOLDER: &str = "registry";

/// Name of the generated-output folder under the root.
pub const GENERATED_FOLDER: &str = "generated";

/// Resolved folder layout for a single invocation. Both folders are threaded
/// explicitly into the components; nothing reads them from process state.
pub struct Config {
    pub registry_dir: PathBuf,
    pub generated_dir: PathBuf,
}

impl Config {
    pub fn new<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => default_root(runtime)?,
        };
        debug!("Using root: {:?}", root);

        Ok(Self {
            registry_dir: root.join(REGISTRY_FOLDER),
            generated_dir: root.join(GENERATED_FOLDER),
        })
    }
}
