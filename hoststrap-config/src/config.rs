//! The host configuration.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use garde::Validate;
use hoststrap_common::common::SUDOERS_DIR;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    EnvironmentSetup,
    Error,
    LoginName,
    MeshNetwork,
    PackageName,
    RepositorySource,
    ServiceSetup,
    SharedDirectories,
    SymlinkSpec,
    UserConfig,
    utils::{duplicates, validate_absolute_path},
};

/// The maximum length of a fully qualified hostname.
const HOSTNAME_MAX_LEN: usize = 253;

/// The maximum length of a single hostname label.
const HOSTNAME_LABEL_MAX_LEN: usize = 63;

/// Validates a hostname according to RFC 1123.
#[allow(clippy::ptr_arg)]
fn validate_hostname(hostname: &String, _: &()) -> garde::Result {
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= HOSTNAME_LABEL_MAX_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|char| char.is_ascii_alphanumeric() || char == '-')
    };

    if hostname.len() <= HOSTNAME_MAX_LEN && hostname.split('.').all(valid_label) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "is not a valid hostname: {hostname:?}"
        )))
    }
}

/// Validates that repository names are unique.
#[allow(clippy::ptr_arg)]
fn validate_repositories(repositories: &Vec<RepositorySource>, _: &()) -> garde::Result {
    let names: Vec<&str> = repositories.iter().map(RepositorySource::name).collect();
    match duplicates(&names) {
        Some(duplicates) => Err(garde::Error::new(format!(
            "contains the duplicate repository names {duplicates}"
        ))),
        None => Ok(()),
    }
}

/// Validates that service names are unique.
#[allow(clippy::ptr_arg)]
fn validate_services(services: &Vec<ServiceSetup>, _: &()) -> garde::Result {
    let names: Vec<&str> = services.iter().map(ServiceSetup::name).collect();
    match duplicates(&names) {
        Some(duplicates) => Err(garde::Error::new(format!(
            "contains the duplicate service names {duplicates}"
        ))),
        None => Ok(()),
    }
}

/// Validates the user list and all references to its logins.
///
/// Ensures that
/// - at least one user is configured
/// - logins are unique
/// - the owners of the environment, the shared directories and the symlinks are configured
///   users
/// - an environment setup exists if any user has a managed environment
fn validate_users<'a>(
    environment: &'a Option<EnvironmentSetup>,
    shared_directories: &'a Option<SharedDirectories>,
    symlinks: &'a [SymlinkSpec],
) -> impl FnOnce(&Vec<UserConfig>, &()) -> garde::Result + 'a {
    move |users, _| {
        if users.is_empty() {
            return Err(garde::Error::new("must contain at least one user"));
        }

        let logins: Vec<&LoginName> = users.iter().map(UserConfig::login).collect();
        let mut error_messages = Vec::new();

        if let Some(duplicates) = duplicates(logins.iter().copied()) {
            error_messages.push(format!("the duplicate logins {duplicates}"));
        }

        if environment.is_none()
            && let Some(user) = users.iter().find(|user| user.environment())
        {
            error_messages.push(format!(
                "the user \"{}\" with a managed environment, but no environment setup",
                user.login()
            ));
        }

        let references = environment
            .iter()
            .map(|environment| ("environment", environment.owner()))
            .chain(
                shared_directories
                    .iter()
                    .map(|shared| ("shared directories", shared.owner())),
            )
            .chain(
                symlinks
                    .iter()
                    .filter_map(|symlink| symlink.owner().map(|owner| ("symlink", owner))),
            );
        for (context, owner) in references {
            if !logins.contains(&owner) {
                error_messages.push(format!(
                    "the unknown user \"{owner}\" referenced as {context} owner"
                ));
            }
        }

        match error_messages.len() {
            0 => Ok(()),
            1 => Err(garde::Error::new(format!(
                "contains {}",
                error_messages.join("\n")
            ))),
            _ => Err(garde::Error::new(format!(
                "contains multiple issues:\n⤷ {}",
                error_messages.join("\n⤷ ")
            ))),
        }
    }
}

fn default_elevate() -> String {
    "sudo".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_apt() -> String {
    "apt-get".to_string()
}

fn default_apt_add_repository() -> String {
    "apt-add-repository".to_string()
}

fn default_adduser() -> String {
    "adduser".to_string()
}

fn default_hostnamectl() -> String {
    "hostnamectl".to_string()
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_dpkg_query() -> String {
    "dpkg-query".to_string()
}

fn default_sudoers_dir() -> PathBuf {
    PathBuf::from(SUDOERS_DIR)
}

fn default_nix_backup_cleanup() -> String {
    "find /etc -name '*.backup-before-nix' | xargs rm -rf".to_string()
}

/// The external tools used to act on the host.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct Tools {
    /// The privilege elevation wrapper, called as `<elevate> -u <login> <command>...`.
    #[serde(default = "default_elevate")]
    #[garde(length(min = 1))]
    pub elevate: String,

    /// The shell interpreting shell strings, called as `<shell> -c <string>`.
    #[serde(default = "default_shell")]
    #[garde(length(min = 1))]
    pub shell: String,

    /// The package manager front end.
    #[serde(default = "default_apt")]
    #[garde(length(min = 1))]
    pub apt: String,

    /// The tool registering apt repositories.
    #[serde(default = "default_apt_add_repository")]
    #[garde(length(min = 1))]
    pub apt_add_repository: String,

    /// The tool creating user accounts.
    #[serde(default = "default_adduser")]
    #[garde(length(min = 1))]
    pub adduser: String,

    /// The tool setting the hostname.
    #[serde(default = "default_hostnamectl")]
    #[garde(length(min = 1))]
    pub hostnamectl: String,

    /// The service manager.
    #[serde(default = "default_systemctl")]
    #[garde(length(min = 1))]
    pub systemctl: String,

    /// The tool querying the package database.
    #[serde(default = "default_dpkg_query")]
    #[garde(length(min = 1))]
    pub dpkg_query: String,

    /// The directory receiving per-user sudoers drop-ins.
    #[serde(default = "default_sudoers_dir")]
    #[garde(custom(validate_absolute_path))]
    pub sudoers_dir: PathBuf,

    /// The shell pipeline removing leftovers of previous runtime installations.
    #[serde(default = "default_nix_backup_cleanup")]
    #[garde(skip)]
    pub nix_backup_cleanup: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            elevate: default_elevate(),
            shell: default_shell(),
            apt: default_apt(),
            apt_add_repository: default_apt_add_repository(),
            adduser: default_adduser(),
            hostnamectl: default_hostnamectl(),
            systemctl: default_systemctl(),
            dpkg_query: default_dpkg_query(),
            sudoers_dir: default_sudoers_dir(),
            nix_backup_cleanup: default_nix_backup_cleanup(),
        }
    }
}

/// The desired state of a host.
///
/// A [`HostConfig`] is only ever handed out validated.
///
/// # Examples
///
/// ```
/// use std::path::Path;
///
/// use hoststrap_config::HostConfig;
///
/// # fn main() -> testresult::TestResult {
/// let config = HostConfig::from_toml_str(
///     r#"
/// hostname = "tulip"
/// packages = ["caddy", "rsync"]
///
/// [[users]]
/// login = "dev"
/// sudo = "passwordless"
/// "#,
///     Path::new("/srv/bootstrap"),
/// )?;
/// assert_eq!(config.hostname(), "tulip");
/// assert_eq!(config.users().len(), 1);
///
/// // hosts without users are rejected
/// assert!(HostConfig::from_toml_str("hostname = \"tulip\"", Path::new("/")).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct HostConfig {
    #[garde(custom(validate_hostname))]
    hostname: String,

    /// Packages installed before anything else, with a forced package index refresh.
    #[serde(default)]
    #[garde(skip)]
    early_packages: Vec<PackageName>,

    #[serde(default)]
    #[garde(skip)]
    packages: Vec<PackageName>,

    #[serde(default)]
    #[garde(dive, custom(validate_repositories))]
    repositories: Vec<RepositorySource>,

    #[serde(default)]
    #[garde(dive)]
    mesh: Option<MeshNetwork>,

    #[serde(default)]
    #[garde(dive, custom(validate_services))]
    services: Vec<ServiceSetup>,

    #[serde(default)]
    #[garde(dive, custom(validate_users(&self.environment, &self.shared_directories, &self.symlinks)))]
    users: Vec<UserConfig>,

    #[serde(default)]
    #[garde(dive)]
    environment: Option<EnvironmentSetup>,

    #[serde(default)]
    #[garde(dive)]
    shared_directories: Option<SharedDirectories>,

    #[serde(default)]
    #[garde(dive)]
    symlinks: Vec<SymlinkSpec>,

    #[serde(default)]
    #[garde(dive)]
    tools: Tools,
}

impl HostConfig {
    /// Creates a new [`HostConfig`] from a file.
    ///
    /// Relative source paths in the configuration are resolved against the directory of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if
    /// - the file can not be read
    /// - the file contents are not a valid TOML host configuration
    /// - the configuration is not valid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        info!("Reading host configuration from file {path:?}");

        let data = read_to_string(path).map_err(|source| Error::IoPath {
            path: path.to_path_buf(),
            context: "reading it to string",
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));
        let mut config: Self = toml::from_str(&data).map_err(|source| Error::TomlRead {
            path: path.to_path_buf(),
            context: "deserializing a host configuration",
            source: Box::new(source),
        })?;
        config.resolve_sources(base_dir);
        config.validate_config(&format!("validating the host configuration {path:?}"))?;

        Ok(config)
    }

    /// Creates a new [`HostConfig`] from a TOML string.
    ///
    /// Relative source paths in the configuration are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid TOML host configuration or if the configuration
    /// is not valid.
    pub fn from_toml_str(data: &str, base_dir: &Path) -> Result<Self, Error> {
        let mut config: Self = toml::from_str(data).map_err(|source| Error::TomlRead {
            path: base_dir.to_path_buf(),
            context: "deserializing a host configuration from a string",
            source: Box::new(source),
        })?;
        config.resolve_sources(base_dir);
        config.validate_config("validating a host configuration")?;

        Ok(config)
    }

    fn resolve_sources(&mut self, base_dir: &Path) {
        for service in self.services.iter_mut() {
            service.resolve_sources(base_dir);
        }
        if let Some(environment) = self.environment.as_mut() {
            environment.resolve_sources(base_dir);
        }
    }

    fn validate_config(&self, context: &str) -> Result<(), Error> {
        self.validate().map_err(|source| Error::Validation {
            context: context.to_string(),
            source,
        })
    }

    /// Returns the desired hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the packages installed before anything else.
    pub fn early_packages(&self) -> &[PackageName] {
        &self.early_packages
    }

    /// Returns the standalone package set.
    pub fn packages(&self) -> &[PackageName] {
        &self.packages
    }

    /// Returns the apt repositories to register.
    pub fn repositories(&self) -> &[RepositorySource] {
        &self.repositories
    }

    /// Returns the mesh network to join, if any.
    pub fn mesh(&self) -> Option<&MeshNetwork> {
        self.mesh.as_ref()
    }

    /// Returns the services to set up.
    pub fn services(&self) -> &[ServiceSetup] {
        &self.services
    }

    /// Returns the managed users.
    pub fn users(&self) -> &[UserConfig] {
        &self.users
    }

    /// Returns the per-user environment setup, if any.
    pub fn environment(&self) -> Option<&EnvironmentSetup> {
        self.environment.as_ref()
    }

    /// Returns the directories shared with a managed user, if any.
    pub fn shared_directories(&self) -> Option<&SharedDirectories> {
        self.shared_directories.as_ref()
    }

    /// Returns the symlinks to create.
    pub fn symlinks(&self) -> &[SymlinkSpec] {
        &self.symlinks
    }

    /// Returns the external tools used to act on the host.
    pub fn tools(&self) -> &Tools {
        &self.tools
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;
    use tempfile::NamedTempFile;
    use testresult::TestResult;

    use super::*;

    const FULL_CONFIG: &str = r#"
hostname = "tulip"
early_packages = ["etckeeper"]
packages = ["caddy", "supervisor", "rsync", "fish"]

[[repositories]]
name = "fish shell"
marker = "/etc/apt/sources.list.d/fish-shell-ubuntu-release-3-jammy.list"
sources = ["ppa:fish-shell/release-3"]

[[repositories]]
name = "caddy"
marker = "/etc/apt/sources.list.d/caddy-stable.list"
packages = ["debian-keyring", "debian-archive-keyring", "apt-transport-https"]
shell_commands = [
    "curl -1sLf 'https://dl.cloudsmith.io/public/caddy/stable/gpg.key' | gpg --dearmor > /usr/share/keyrings/caddy-stable-archive-keyring.gpg",
    "curl -1sLf 'https://dl.cloudsmith.io/public/caddy/stable/debian.deb.txt' | tee /etc/apt/sources.list.d/caddy-stable.list",
]

[mesh]
network_id = "8056c2e21cb31b0c"

[[services]]
name = "caddy"
marker = "/etc/caddy/apps-setup-complete"
config_source = "Caddyfile"
config_destination = "/etc/caddy/Caddyfile"
include_dir = "/etc/caddy/apps"
enable = true

[[services]]
name = "supervisor"
marker = "/etc/supervisor/apps-setup-complete"
config_source = "supervisord.conf"
config_destination = "/etc/supervisor/supervisord.conf"
include_dir = "/etc/supervisor/apps"

[[users]]
login = "dev"
authorized_keys = [
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm user@host",
]
sudo = "passwordless"
environment = true

[[users]]
login = "postgres"

[environment]
owner = "dev"
switch_script = "home-manager/switch.sh"

[shared_directories]
owner = "dev"
paths = ["/etc/caddy/apps", "/etc/supervisor/apps"]

[[symlinks]]
owner = "dev"
target = ".nix-profile/bin/java"
link = "/usr/local/bin/java"
"#;

    #[test]
    fn full_config_from_file() -> TestResult {
        let mut file = NamedTempFile::new()?;
        file.write_all(FULL_CONFIG.as_bytes())?;
        let config = HostConfig::from_file(file.path())?;
        let base_dir = file.path().parent().ok_or("temporary file without parent")?;

        assert_eq!(config.hostname(), "tulip");
        assert_eq!(config.early_packages().len(), 1);
        assert_eq!(config.repositories().len(), 2);
        assert_eq!(
            config.mesh().map(MeshNetwork::client),
            Some(Path::new("/usr/sbin/zerotier-cli"))
        );
        assert_eq!(
            config.services()[0].config(),
            Some((
                base_dir.join("Caddyfile").as_path(),
                Path::new("/etc/caddy/Caddyfile")
            ))
        );
        assert_eq!(
            config
                .environment()
                .and_then(EnvironmentSetup::switch_script),
            Some(base_dir.join("home-manager/switch.sh").as_path())
        );
        assert_eq!(config.environment().map(|env| env.marker()), Some(Path::new("/nix")));
        assert_eq!(config.tools(), &Tools::default());
        Ok(())
    }

    #[rstest]
    #[case::invalid_hostname("hostname = \"tulip_\"\n[[users]]\nlogin = \"dev\"\n")]
    #[case::label_starts_with_dash("hostname = \"-tulip\"\n[[users]]\nlogin = \"dev\"\n")]
    #[case::no_users("hostname = \"tulip\"\n")]
    #[case::duplicate_users("hostname = \"tulip\"\n[[users]]\nlogin = \"dev\"\n[[users]]\nlogin = \"dev\"\n")]
    #[case::unknown_environment_owner("hostname = \"tulip\"\n[[users]]\nlogin = \"dev\"\n[environment]\nowner = \"ops\"\n")]
    #[case::environment_user_without_setup("hostname = \"tulip\"\n[[users]]\nlogin = \"dev\"\nenvironment = true\n")]
    #[case::unknown_field("hostname = \"tulip\"\nfoo = 1\n[[users]]\nlogin = \"dev\"\n")]
    #[case::invalid_package("hostname = \"tulip\"\npackages = [\"Caddy\"]\n[[users]]\nlogin = \"dev\"\n")]
    #[case::duplicate_repositories("hostname = \"tulip\"\n[[repositories]]\nname = \"x\"\nmarker = \"/a\"\n[[repositories]]\nname = \"x\"\nmarker = \"/b\"\n[[users]]\nlogin = \"dev\"\n")]
    #[case::relative_sudoers_dir("hostname = \"tulip\"\n[tools]\nsudoers_dir = \"sudoers.d\"\n[[users]]\nlogin = \"dev\"\n")]
    fn invalid_config(#[case] data: &str) {
        assert!(HostConfig::from_toml_str(data, Path::new("/srv")).is_err());
    }

    #[rstest]
    #[case("tulip")]
    #[case("tulip.example.org")]
    #[case("host-1")]
    fn valid_hostname(#[case] hostname: &str) -> TestResult {
        let data = format!("hostname = \"{hostname}\"\n[[users]]\nlogin = \"dev\"\n");
        let config = HostConfig::from_toml_str(&data, Path::new("/srv"))?;
        assert_eq!(config.hostname(), hostname);
        Ok(())
    }
}
