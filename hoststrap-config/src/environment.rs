//! The per-user declarative environment (Nix and home-manager).

use std::path::{Path, PathBuf};

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{LoginName, utils::validate_absolute_path};

const DEFAULT_MARKER: &str = "/nix";
const DEFAULT_INSTALLER_URL: &str = "https://nixos.org/nix/install";
const DEFAULT_INSTALLER_ARGS: &[&str] = &["--daemon"];
const DEFAULT_HOME_MANAGER_CHANNEL: &str =
    "https://github.com/nix-community/home-manager/archive/master.tar.gz";

fn default_marker() -> PathBuf {
    PathBuf::from(DEFAULT_MARKER)
}

fn default_installer_url() -> String {
    DEFAULT_INSTALLER_URL.to_string()
}

fn default_installer_args() -> Vec<String> {
    DEFAULT_INSTALLER_ARGS
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

fn default_home_manager_channel() -> String {
    DEFAULT_HOME_MANAGER_CHANNEL.to_string()
}

/// Validates that a URL is fetched over HTTPS.
#[allow(clippy::ptr_arg)]
fn validate_https_url(url: &String, _: &()) -> garde::Result {
    if url.starts_with("https://")
        && url.len() > "https://".len()
        && !url
            .chars()
            .any(|char| char.is_whitespace() || char == '\'' || char == '"')
    {
        Ok(())
    } else {
        Err(garde::Error::new(format!("must be an https URL, but is {url:?}")))
    }
}

/// The installation of the Nix package manager and the home-manager setup of users.
///
/// The runtime is installed once per host by `owner`.
/// Users flagged with `environment = true` get home-manager installed and their home
/// configuration switched on every run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct EnvironmentSetup {
    #[garde(skip)]
    owner: LoginName,

    /// The directory whose presence signals that the runtime is installed.
    #[serde(default = "default_marker")]
    #[garde(custom(validate_absolute_path))]
    marker: PathBuf,

    #[serde(default = "default_installer_url")]
    #[garde(custom(validate_https_url))]
    installer_url: String,

    #[serde(default = "default_installer_args")]
    #[garde(skip)]
    installer_args: Vec<String>,

    #[serde(default = "default_home_manager_channel")]
    #[garde(custom(validate_https_url))]
    home_manager_channel: String,

    /// A script applying the home configuration, run in its own directory.
    ///
    /// Relative paths are relative to the directory of the host configuration file.
    #[serde(default)]
    #[garde(skip)]
    switch_script: Option<PathBuf>,
}

impl EnvironmentSetup {
    /// Creates a new [`EnvironmentSetup`] with default locations for `owner`.
    pub fn new(owner: LoginName) -> Self {
        Self {
            owner,
            marker: default_marker(),
            installer_url: default_installer_url(),
            installer_args: default_installer_args(),
            home_manager_channel: default_home_manager_channel(),
            switch_script: None,
        }
    }

    /// Sets the directory whose presence signals that the runtime is installed.
    pub fn with_marker(mut self, marker: PathBuf) -> Self {
        self.marker = marker;
        self
    }

    /// Sets the script applying the home configuration.
    pub fn with_switch_script(mut self, switch_script: PathBuf) -> Self {
        self.switch_script = Some(switch_script);
        self
    }

    /// Returns the login of the user installing the runtime.
    pub fn owner(&self) -> &LoginName {
        &self.owner
    }

    /// Returns the directory whose presence signals that the runtime is installed.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Returns the URL of the runtime installer.
    pub fn installer_url(&self) -> &str {
        &self.installer_url
    }

    /// Returns the arguments passed to the runtime installer.
    pub fn installer_args(&self) -> &[String] {
        &self.installer_args
    }

    /// Returns the URL of the home-manager channel.
    pub fn home_manager_channel(&self) -> &str {
        &self.home_manager_channel
    }

    /// Returns the script applying the home configuration, if any.
    pub fn switch_script(&self) -> Option<&Path> {
        self.switch_script.as_deref()
    }

    /// Resolves a relative switch script against `base_dir`.
    pub(crate) fn resolve_sources(&mut self, base_dir: &Path) {
        if let Some(script) = self.switch_script.as_mut()
            && script.is_relative()
        {
            *script = base_dir.join(&*script);
        }
    }
}
