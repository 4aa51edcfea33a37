//! Error handling for hoststrap-config.

use std::path::PathBuf;

/// An error that may occur when reading or validating a host configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A string is not a valid authorized_keys entry.
    #[error("Invalid authorized_keys entry: {entry}")]
    InvalidAuthorizedKeyEntry {
        /// The offending entry.
        entry: String,
    },

    /// A string is not a valid login name.
    #[error(
        "Invalid login name {name:?}: must start with a lowercase letter or '_', contain only lowercase letters, digits, '_' or '-' and be at most 32 characters long"
    )]
    InvalidLoginName {
        /// The offending login name.
        name: String,
    },

    /// A string is not a valid Debian package name.
    #[error(
        "Invalid package name {name:?}: must be at least two characters of lowercase letters, digits, '+', '-' or '.', starting with a letter or digit"
    )]
    InvalidPackageName {
        /// The offending package name.
        name: String,
    },

    /// An I/O error occurred for a path.
    #[error("I/O error at {path} while {context}:\n{source}")]
    IoPath {
        /// The path at which the error occurred.
        path: PathBuf,

        /// The context in which the error occurred.
        ///
        /// This is meant to complete the sentence "I/O error at {path} while ".
        context: &'static str,

        /// The error source.
        source: std::io::Error,
    },

    /// A TOML file can not be deserialized.
    #[error("TOML read error for file {path} while {context}:\n{source}")]
    TomlRead {
        /// The path to a file that fails to read.
        path: PathBuf,

        /// The context in which the error occurs.
        ///
        /// This is meant to complete the sentence "TOML read error for file {path} while ".
        context: &'static str,

        /// The error source.
        source: Box<toml::de::Error>,
    },

    /// A configuration object is not valid.
    #[error("Validation error while {context}: {source}")]
    Validation {
        /// The context in which the error occurred.
        ///
        /// This is meant to complete the sentence "Validation error while ".
        context: String,

        /// The error source.
        source: garde::Report,
    },
}
