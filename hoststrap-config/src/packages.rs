//! Apt packages and repositories.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{Error, utils::validate_absolute_path};

/// The name of a Debian package.
///
/// Package names consist of lowercase letters, digits, `+`, `-` and `.`, are at least two
/// characters long and start with a letter or digit.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Creates a new [`PackageName`].
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid Debian package name.
    ///
    /// # Examples
    ///
    /// ```
    /// use hoststrap_config::PackageName;
    ///
    /// # fn main() -> testresult::TestResult {
    /// PackageName::new("postgresql-client-13".to_string())?;
    /// PackageName::new("g++".to_string())?;
    /// assert!(PackageName::new("caddy; reboot".to_string()).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(name: String) -> Result<Self, Error> {
        let valid_start = name
            .chars()
            .next()
            .is_some_and(|char| char.is_ascii_lowercase() || char.is_ascii_digit());
        let valid_chars = name.chars().all(|char| {
            char.is_ascii_lowercase()
                || char.is_ascii_digit()
                || char == '+'
                || char == '-'
                || char == '.'
        });

        if name.len() < 2 || !valid_start || !valid_chars {
            return Err(Error::InvalidPackageName { name });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

impl FromStr for PackageName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for PackageName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The registration of an apt repository.
///
/// The existence of the `marker` file (usually the sources list file the registration creates)
/// is the single source of truth for whether the repository has been set up.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct RepositorySource {
    #[garde(length(min = 1))]
    name: String,

    #[garde(custom(validate_absolute_path))]
    marker: PathBuf,

    /// Repository specifications passed to `apt-add-repository`.
    #[serde(default)]
    #[garde(skip)]
    sources: Vec<String>,

    /// Shell pipelines run as root, e.g. for importing signing keys.
    #[serde(default)]
    #[garde(skip)]
    shell_commands: Vec<String>,

    /// Packages required before the repository can be registered.
    #[serde(default)]
    #[garde(skip)]
    packages: Vec<PackageName>,
}

impl RepositorySource {
    /// Creates a new [`RepositorySource`].
    pub fn new(
        name: String,
        marker: PathBuf,
        sources: Vec<String>,
        shell_commands: Vec<String>,
        packages: Vec<PackageName>,
    ) -> Self {
        Self {
            name,
            marker,
            sources,
            shell_commands,
            packages,
        }
    }

    /// Returns the name of the repository.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the marker file of the repository.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Returns the repository specifications passed to `apt-add-repository`.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Returns the shell pipelines run as root to register the repository.
    pub fn shell_commands(&self) -> &[String] {
        &self.shell_commands
    }

    /// Returns the packages required before registering the repository.
    pub fn packages(&self) -> &[PackageName] {
        &self.packages
    }
}
