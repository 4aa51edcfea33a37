//! Command line interface for `hoststrap`.

use std::{
    convert::Infallible,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::{Parser, crate_name};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use hoststrap_common::{
    common::SUDOERS_DIR,
    config::{
        CONFIG_FILE,
        DEFAULT_CONFIG_DIR,
        ETC_OVERRIDE_CONFIG_DIR,
        RUN_OVERRIDE_CONFIG_DIR,
        USR_LOCAL_OVERRIDE_CONFIG_DIR,
        get_config_file_or_default,
    },
};

/// The name of the executable.
pub const BIN_NAME: &str = crate_name!();

/// The location of a host configuration file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigPath(PathBuf);

impl ConfigPath {
    /// Creates a new [`ConfigPath`].
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }
}

impl AsRef<Path> for ConfigPath {
    fn as_ref(&self) -> &Path {
        self.0.as_path()
    }
}

impl Default for ConfigPath {
    /// Returns the default [`ConfigPath`].
    ///
    /// Uses [`get_config_file_or_default`] to find the first usable configuration file path, or the
    /// default if none is found.
    fn default() -> Self {
        Self(get_config_file_or_default())
    }
}

impl From<PathBuf> for ConfigPath {
    fn from(value: PathBuf) -> Self {
        Self(value)
    }
}

impl FromStr for ConfigPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(PathBuf::from(s)))
    }
}

/// Command line arguments for provisioning a host.
#[derive(Debug, Parser)]
#[command(
    about = "Idempotent bootstrapping of an Ubuntu host",
    name = BIN_NAME,
    long_about = format!("Idempotent bootstrapping of an Ubuntu host

NOTE: This command must be run as root!

This executable brings a single host into the state described by a central configuration file.
It sets the hostname, registers apt repositories, installs packages, joins a mesh network, sets up services,
creates user accounts with sudoers drop-ins below \"{SUDOERS_DIR}\" and SSH authorized_keys,
installs a per-user declarative environment and creates compatibility symlinks.

Every step first checks whether its desired state is already reached, so the command can be re-run safely.
If a step fails, the run stops. Fix the underlying problem and run the command again.

By default, one of the following configuration files is used if it exists, in the following order:

- \"{ETC_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

- \"{RUN_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

- \"{USR_LOCAL_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

If none of the above are found, the default location \"{DEFAULT_CONFIG_DIR}{CONFIG_FILE}\" is used.
Alternatively a custom configuration file location can be specified using the \"--config\"/ \"-c\" option."),
)]
pub struct Cli {
    /// The path to a custom configuration file.
    #[arg(
        env = "HOSTSTRAP_CONFIG",
        global = true,
        help = "The path to a custom configuration file",
        long_help = format!("The path to a custom configuration file

If specified, the custom configuration file is used instead of the default configuration file location.

If unspecified, one of the following configuration files is used if it exists, in the following order:

- \"{ETC_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

- \"{RUN_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

- \"{USR_LOCAL_OVERRIDE_CONFIG_DIR}{CONFIG_FILE}\"

If none of the above are found, the default location \"{DEFAULT_CONFIG_DIR}{CONFIG_FILE}\" is used.
"),
        long,
        short
    )]
    pub config: Option<ConfigPath>,

    /// Global log verbosity.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Whether to only print the name and version of the application.
    #[arg(
        global = true,
        help = "Return the name and version of the application",
        long,
        short = 'V'
    )]
    pub version: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["hoststrap"], None)]
    #[case(&["hoststrap", "--config", "/srv/host.toml"], Some("/srv/host.toml"))]
    #[case(&["hoststrap", "-c", "host.toml", "-vv"], Some("host.toml"))]
    fn parse_config_path(#[case] args: &[&str], #[case] expected: Option<&str>) -> TestResult {
        let cli = Cli::try_parse_from(args)?;
        assert_eq!(
            cli.config,
            expected.map(|path| ConfigPath::new(PathBuf::from(path)))
        );
        Ok(())
    }
}
