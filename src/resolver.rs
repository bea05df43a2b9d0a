//! Latest-major-version resolution from git tag listings.
//!
//! "Latest" here is positional: the resolver takes the last line of the tag
//! listing, in whatever order git emits it, not a version-sorted maximum.
//! This mirrors the tool's default ordering convention rather than second-
//! guessing it.

use log::debug;
use std::path::Path;

use crate::error::{Error, Result};
use crate::package::Location;
use crate::runtime::Runtime;

pub struct VersionResolver<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> VersionResolver<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Resolve the latest major version for a package location.
    ///
    /// Exactly one subprocess per call, no retry. Fails if the tag listing
    /// cannot be produced, is empty, or the latest tag does not start with
    /// an integer dot-component.
    #[tracing::instrument(skip(self))]
    pub fn resolve_latest_major_version(&self, location: &Location) -> Result<u64> {
        let failed = || Error::VersionResolutionFailed(location.to_string());

        let tag = match location {
            Location::Remote(url) => {
                let output = self
                    .runtime
                    .run_command(&format!("git ls-remote --tags {}", url))
                    .map_err(|e| {
                        debug!("Tag listing for '{}' failed: {}", url, e);
                        failed()
                    })?;
                let line = output.lines().last().ok_or_else(failed)?;
                // ls-remote lines look like "<sha>\trefs/tags/<tag>"
                line.rsplit("refs/tags/").next().unwrap_or(line).to_string()
            }
            Location::Local(path) => {
                let output = self
                    .runtime
                    .run_command_in("git tag", Path::new(path))
                    .map_err(|e| {
                        debug!("Tag listing in '{}' failed: {}", path, e);
                        failed()
                    })?;
                output.lines().last().ok_or_else(failed)?.to_string()
            }
        };

        debug!("Latest tag for '{}': {}", location, tag);

        tag.trim()
            .split('.')
            .next()
            .and_then(|major| major.parse::<u64>().ok())
            .ok_or_else(failed)
    }
}
