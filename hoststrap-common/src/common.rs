//! Well-known system locations and file modes used while provisioning a host.

/// The directory below which sudoers drop-in files are located.
pub const SUDOERS_DIR: &str = "/etc/sudoers.d/";

/// The file mode of sudoers drop-in files.
///
/// `sudo` refuses drop-ins that are writable by anyone.
pub const SUDOERS_FILE_MODE: u32 = 0o440;

/// The file mode of ephemeral scripts written to a user's home.
pub const SCRIPT_FILE_MODE: u32 = 0o700;

/// The content written to "setup complete" marker files.
pub const MARKER_FILE_CONTENT: &str =
    "do nothing / noop marker file to show that apps have been setup\n";
