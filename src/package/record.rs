use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A package source location.
///
/// Remote locations are git repository URLs ending in `.git`; anything else is
/// treated as a local path to a version-controlled checkout. The tag selects
/// both the version-resolution strategy and how the package name is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(String),
    Local(String),
}

impl Location {
    /// The package name derived from this location: the last path segment,
    /// with the `.git` suffix stripped for remote locations. Trailing
    /// separators are trimmed first, so a local path ending in a separator
    /// names the folder it points at.
    pub fn name(&self) -> String {
        let raw = match self {
            Location::Remote(url) => url.strip_suffix(".git").unwrap_or(url),
            Location::Local(path) => path,
        };
        raw.trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Location::Remote(url) => url,
            Location::Local(path) => path,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("Package location must not be empty");
        }
        if s.chars().any(char::is_whitespace) {
            bail!("Package location must not contain whitespace: '{}'", s);
        }

        let location = if s.ends_with(".git") {
            Location::Remote(s.to_string())
        } else {
            Location::Local(s.to_string())
        };

        if location.name().is_empty() {
            bail!("Cannot derive a package name from '{}'", s);
        }

        Ok(location)
    }
}

/// A tracked external dependency, stored one-file-per-package in the registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub url: String,
    pub major_version: u64,
}

impl Package {
    pub fn new(location: &Location, major_version: u64) -> Self {
        Package {
            name: location.name(),
            url: location.as_str().to_string(),
            major_version,
        }
    }

    /// Re-classify the stored url. Infallible: the url was validated when the
    /// package was added.
    pub fn location(&self) -> Location {
        if self.url.ends_with(".git") {
            Location::Remote(self.url.clone())
        } else {
            Location::Local(self.url.clone())
        }
    }

    /// The dependency descriptor line this package contributes to the
    /// generated manifest. The syntax is owned by the external build tool.
    pub fn dependency_entry(&self) -> String {
        format!(
            ".package(url: \"{}\", from: \"{}.0.0\"),",
            self.url, self.major_version
        )
    }
}
