//! Shared directories and symlinks.

use std::path::{Path, PathBuf};

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{LoginName, utils::validate_absolute_path};

/// Validates that all paths are absolute.
#[allow(clippy::ptr_arg)]
fn validate_absolute_paths(paths: &Vec<PathBuf>, ctx: &()) -> garde::Result {
    paths
        .iter()
        .try_for_each(|path| validate_absolute_path(path, ctx))
}

/// Validates a symlink target: relative to the owner's home if an owner is set, absolute
/// otherwise.
fn validate_symlink_target(
    owner: &Option<LoginName>,
) -> impl FnOnce(&PathBuf, &()) -> garde::Result + '_ {
    move |target, ctx| match owner {
        Some(owner) if target.is_absolute() => Err(garde::Error::new(format!(
            "must be relative to the home of {owner}, but is {target:?}"
        ))),
        Some(_) => Ok(()),
        None => validate_absolute_path(target, ctx),
    }
}

/// Directories shared between services and a managed user.
///
/// The directories are handed over to `owner`, so that the user can add application
/// configuration without elevated privileges.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct SharedDirectories {
    #[garde(skip)]
    owner: LoginName,

    #[garde(custom(validate_absolute_paths))]
    paths: Vec<PathBuf>,
}

impl SharedDirectories {
    /// Creates a new [`SharedDirectories`].
    pub fn new(owner: LoginName, paths: Vec<PathBuf>) -> Self {
        Self { owner, paths }
    }

    /// Returns the login of the user owning the directories.
    pub fn owner(&self) -> &LoginName {
        &self.owner
    }

    /// Returns the shared directories.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// A symlink exposing a binary in a shared location.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct SymlinkSpec {
    /// The user in whose home `target` is located.
    #[serde(default)]
    #[garde(skip)]
    owner: Option<LoginName>,

    #[garde(custom(validate_symlink_target(&self.owner)))]
    target: PathBuf,

    #[garde(custom(validate_absolute_path))]
    link: PathBuf,
}

impl SymlinkSpec {
    /// Creates a new [`SymlinkSpec`].
    pub fn new(owner: Option<LoginName>, target: PathBuf, link: PathBuf) -> Self {
        Self {
            owner,
            target,
            link,
        }
    }

    /// Returns the user in whose home the target is located, if any.
    pub fn owner(&self) -> Option<&LoginName> {
        self.owner.as_ref()
    }

    /// Returns the target of the symlink.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the location of the symlink.
    pub fn link(&self) -> &Path {
        &self.link
    }
}
