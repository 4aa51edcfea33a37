//! Default locations for hoststrap configuration files.
//!
//! # Examples
//!
//! ```
//! use hoststrap_common::config::{
//!     get_config_file,
//!     get_config_file_or_default,
//!     get_config_file_paths,
//!     get_default_config_file_path,
//! };
//!
//! // Get all configuration file paths, sorted by directory precedence.
//! println!("{:?}", get_config_file_paths());
//!
//! // Get the first config file found, according to directory precedence.
//! println!("{:?}", get_config_file());
//!
//! // Get the first config file found, or the default if none are found.
//! println!("{:?}", get_config_file_or_default());
//! assert!(get_default_config_file_path().ends_with("config.toml"));
//! ```

use std::path::PathBuf;

/// The default config directory below "/usr" for hoststrap.
pub const DEFAULT_CONFIG_DIR: &str = "/usr/share/hoststrap/";

/// The override config directory below "/etc" for hoststrap.
pub const ETC_OVERRIDE_CONFIG_DIR: &str = "/etc/hoststrap/";

/// The override config directory below "/run" for hoststrap.
pub const RUN_OVERRIDE_CONFIG_DIR: &str = "/run/hoststrap/";

/// The override config directory below "/usr/local" for hoststrap.
pub const USR_LOCAL_OVERRIDE_CONFIG_DIR: &str = "/usr/local/share/hoststrap/";

/// The filename of a hoststrap configuration file.
pub const CONFIG_FILE: &str = "config.toml";

/// Returns the first hoststrap configuration file available, or [`None`] if none found.
///
/// Considers files named `config.toml` in the following directories in descending priority:
/// - `/etc/hoststrap`
/// - `/run/hoststrap`
/// - `/usr/local/share/hoststrap`
/// - `/usr/share/hoststrap`
pub fn get_config_file() -> Option<PathBuf> {
    get_config_file_paths()
        .into_iter()
        .find(|file| file.is_file())
}

/// Returns the first hoststrap configuration file available, or the default if none found.
///
/// The default location is `/usr/share/hoststrap/config.toml`.
pub fn get_config_file_or_default() -> PathBuf {
    let Some(config) = get_config_file() else {
        return get_default_config_file_path();
    };
    config
}

/// Returns a list of all configuration file locations, sorted by precedence.
pub fn get_config_file_paths() -> Vec<PathBuf> {
    [
        ETC_OVERRIDE_CONFIG_DIR,
        RUN_OVERRIDE_CONFIG_DIR,
        USR_LOCAL_OVERRIDE_CONFIG_DIR,
        DEFAULT_CONFIG_DIR,
    ]
    .into_iter()
    .map(|dir| PathBuf::from([dir, CONFIG_FILE].concat()))
    .collect()
}

/// Returns the file path of the default configuration file below /usr.
pub fn get_default_config_file_path() -> PathBuf {
    PathBuf::from([DEFAULT_CONFIG_DIR, CONFIG_FILE].concat())
}
