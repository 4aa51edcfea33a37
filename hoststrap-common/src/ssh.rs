//! Defaults for SSH.
//!
//! # Examples
//!
//! ```
//! use hoststrap_common::ssh::{get_relative_authorized_keys_file, get_relative_ssh_dir};
//!
//! assert_eq!(get_relative_ssh_dir().to_str(), Some(".ssh"));
//! assert_eq!(
//!     get_relative_authorized_keys_file().to_str(),
//!     Some(".ssh/authorized_keys")
//! );
//! ```

use std::path::PathBuf;

/// The directory in a user's home containing SSH client and server files.
const SSH_DIR: &str = ".ssh";

/// The filename of a user's authorized_keys file.
const AUTHORIZED_KEYS_FILE: &str = "authorized_keys";

/// The file mode of a user's SSH directory.
pub const SSH_DIR_MODE: u32 = 0o700;

/// The file mode of a user's authorized_keys file.
pub const AUTHORIZED_KEYS_FILE_MODE: u32 = 0o600;

/// Returns the SSH directory relative to a user's home.
pub fn get_relative_ssh_dir() -> PathBuf {
    PathBuf::from(SSH_DIR)
}

/// Returns the authorized_keys file relative to a user's home.
pub fn get_relative_authorized_keys_file() -> PathBuf {
    get_relative_ssh_dir().join(AUTHORIZED_KEYS_FILE)
}
