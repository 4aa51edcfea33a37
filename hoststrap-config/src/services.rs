//! Services set up on a host.

use std::path::{Path, PathBuf};

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::utils::{validate_absolute_path, validate_optional_absolute_path};

/// The default location of the ZeroTier command-line client.
const DEFAULT_MESH_CLIENT: &str = "/usr/sbin/zerotier-cli";

/// The default shell pipeline installing the ZeroTier client.
const DEFAULT_MESH_INSTALLER: &str = "curl -s https://install.zerotier.com | bash";

/// The number of hex digits in a ZeroTier network ID.
const NETWORK_ID_LEN: usize = 16;

fn default_mesh_client() -> PathBuf {
    PathBuf::from(DEFAULT_MESH_CLIENT)
}

fn default_mesh_installer() -> String {
    DEFAULT_MESH_INSTALLER.to_string()
}

/// Validates a ZeroTier network ID.
#[allow(clippy::ptr_arg)]
fn validate_network_id(id: &String, _: &()) -> garde::Result {
    if id.len() == NETWORK_ID_LEN && id.chars().all(|char| char.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "must be {NETWORK_ID_LEN} hexadecimal digits, but is {id:?}"
        )))
    }
}

/// Validates the name of a systemd unit.
#[allow(clippy::ptr_arg)]
fn validate_unit_name(name: &String, _: &()) -> garde::Result {
    if !name.is_empty()
        && name
            .chars()
            .all(|char| char.is_ascii_alphanumeric() || ":-_.@".contains(char))
    {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "is not a valid systemd unit name: {name:?}"
        )))
    }
}

/// Validates that a config destination is set if and only if a config source is set.
fn validate_config_destination(
    source: &Option<PathBuf>,
) -> impl FnOnce(&Option<PathBuf>, &()) -> garde::Result + '_ {
    move |destination, ctx| {
        match (source, destination) {
            (Some(_), None) => {
                return Err(garde::Error::new(
                    "must be set if a config source is provided",
                ));
            }
            (None, Some(_)) => {
                return Err(garde::Error::new(
                    "must not be set if no config source is provided",
                ));
            }
            _ => {}
        }
        validate_optional_absolute_path(destination, ctx)
    }
}

/// Membership in a ZeroTier mesh network.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct MeshNetwork {
    #[garde(custom(validate_network_id))]
    network_id: String,

    /// The client binary, whose presence signals that the host has been set up.
    #[serde(default = "default_mesh_client")]
    #[garde(custom(validate_absolute_path))]
    client: PathBuf,

    /// The shell pipeline installing the client.
    #[serde(default = "default_mesh_installer")]
    #[garde(length(min = 1))]
    installer: String,
}

impl MeshNetwork {
    /// Creates a new [`MeshNetwork`] with the default client location and installer.
    pub fn new(network_id: String) -> Self {
        Self {
            network_id,
            client: default_mesh_client(),
            installer: default_mesh_installer(),
        }
    }

    /// Sets the location of the client binary.
    pub fn with_client(mut self, client: PathBuf) -> Self {
        self.client = client;
        self
    }

    /// Sets the shell pipeline installing the client.
    pub fn with_installer(mut self, installer: String) -> Self {
        self.installer = installer;
        self
    }

    /// Returns the ID of the network to join.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Returns the location of the client binary.
    pub fn client(&self) -> &Path {
        &self.client
    }

    /// Returns the shell pipeline installing the client.
    pub fn installer(&self) -> &str {
        &self.installer
    }
}

/// The one-time setup of a system service such as a reverse proxy or process manager.
///
/// Once the setup has completed, `marker` is written and the setup is never repeated.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct ServiceSetup {
    /// The systemd unit name of the service.
    #[garde(custom(validate_unit_name))]
    name: String,

    #[garde(custom(validate_absolute_path))]
    marker: PathBuf,

    /// A configuration file shipped alongside the host configuration.
    ///
    /// Relative paths are relative to the directory of the host configuration file.
    #[serde(default)]
    #[garde(skip)]
    config_source: Option<PathBuf>,

    #[serde(default)]
    #[garde(custom(validate_config_destination(&self.config_source)))]
    config_destination: Option<PathBuf>,

    /// A directory for per-application configuration snippets.
    #[serde(default)]
    #[garde(custom(validate_optional_absolute_path))]
    include_dir: Option<PathBuf>,

    /// Whether to enable and start the service.
    #[serde(default)]
    #[garde(skip)]
    enable: bool,
}

impl ServiceSetup {
    /// Creates a new [`ServiceSetup`] that only writes its marker.
    pub fn new(name: String, marker: PathBuf) -> Self {
        Self {
            name,
            marker,
            config_source: None,
            config_destination: None,
            include_dir: None,
            enable: false,
        }
    }

    /// Sets the configuration file to copy into place.
    pub fn with_config(mut self, source: PathBuf, destination: PathBuf) -> Self {
        self.config_source = Some(source);
        self.config_destination = Some(destination);
        self
    }

    /// Sets the directory for per-application configuration snippets.
    pub fn with_include_dir(mut self, include_dir: PathBuf) -> Self {
        self.include_dir = Some(include_dir);
        self
    }

    /// Sets whether to enable and start the service.
    pub fn with_enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    /// Returns the systemd unit name of the service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the "setup complete" marker file.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Returns the configuration file source and destination, if any.
    pub fn config(&self) -> Option<(&Path, &Path)> {
        match (&self.config_source, &self.config_destination) {
            (Some(source), Some(destination)) => Some((source.as_path(), destination.as_path())),
            _ => None,
        }
    }

    /// Returns the directory for per-application configuration snippets, if any.
    pub fn include_dir(&self) -> Option<&Path> {
        self.include_dir.as_deref()
    }

    /// Returns whether to enable and start the service.
    pub fn enable(&self) -> bool {
        self.enable
    }

    /// Resolves a relative config source against `base_dir`.
    pub(crate) fn resolve_sources(&mut self, base_dir: &Path) {
        if let Some(source) = self.config_source.as_mut()
            && source.is_relative()
        {
            *source = base_dir.join(&*source);
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("8056c2e21cb31b0c", true)]
    #[case("8056C2E21CB31B0C", true)]
    #[case("8056c2e21cb31b0", false)]
    #[case("8056c2e21cb31b0z", false)]
    #[case("", false)]
    fn mesh_network_id(#[case] id: &str, #[case] valid: bool) {
        assert_eq!(MeshNetwork::new(id.to_string()).validate().is_ok(), valid);
    }

    #[test]
    fn service_config_requires_destination() {
        let mut service = ServiceSetup::new(
            "caddy".to_string(),
            PathBuf::from("/etc/caddy/apps-setup-complete"),
        );
        service.config_source = Some(PathBuf::from("Caddyfile"));
        assert!(service.validate().is_err());

        let service = service.with_config(
            PathBuf::from("Caddyfile"),
            PathBuf::from("/etc/caddy/Caddyfile"),
        );
        assert!(service.validate().is_ok());
    }

    #[test]
    fn relative_config_source_is_resolved() {
        let mut service = ServiceSetup::new(
            "caddy".to_string(),
            PathBuf::from("/etc/caddy/apps-setup-complete"),
        )
        .with_config(
            PathBuf::from("Caddyfile"),
            PathBuf::from("/etc/caddy/Caddyfile"),
        );
        service.resolve_sources(Path::new("/srv/bootstrap"));
        assert_eq!(
            service.config(),
            Some((
                Path::new("/srv/bootstrap/Caddyfile"),
                Path::new("/etc/caddy/Caddyfile")
            ))
        );
    }
}
