//! Shared-library release versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rejected shared-library version string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid shared library version {value:?}: must be X, X.Y or X.Y.Z with numeric parts")]
pub struct VersionError {
    /// The offending string.
    pub value: String,
}

/// A shared-library release version of the form `X[.Y[.Z]]`.
///
/// Distinct from the soversion: the release version names the file on
/// disk, the soversion names the ABI embedded in the soname.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct LibraryVersion(String);

impl LibraryVersion {
    /// The full version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The major component, used as the default soversion.
    #[must_use]
    pub fn major(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl FromStr for LibraryVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let valid = (1..=3).contains(&parts.len())
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(VersionError {
                value: s.to_owned(),
            })
        }
    }
}

impl TryFrom<String> for LibraryVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LibraryVersion> for String {
    fn from(version: LibraryVersion) -> Self {
        version.0
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
