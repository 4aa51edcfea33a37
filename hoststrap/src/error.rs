//! Error and warning types of hoststrap.

use std::path::PathBuf;

/// An error that may occur while provisioning a host.
///
/// All errors are fatal for a provisioning run.
/// Errors wrapped in [`Error::Transient`] stem from actions fetching data over the network and
/// are likely to succeed when the run is repeated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A user account can not be looked up.
    #[error("Unable to look up the account of user {login}:\n{source}")]
    AccountLookup {
        /// The login of the account.
        login: String,

        /// The source error.
        source: nix::errno::Errno,
    },

    /// Applying permissions to a file or directory failed.
    #[error("Unable to apply permissions from mode {mode:o} to {path}:\n{source}")]
    ApplyPermissions {
        /// The path to a file for which permissions can not be applied.
        path: PathBuf,

        /// The file mode that should be applied for `path`.
        mode: u32,

        /// The source error.
        source: std::io::Error,
    },

    /// The ownership of a path can not be changed.
    #[error("Changing ownership of {path} to user {user} failed:\n{source}")]
    Chown {
        /// The path to a file for which ownership can not be changed.
        path: PathBuf,

        /// The user that should be the new owner of `path`.
        user: String,

        /// The source error.
        source: std::io::Error,
    },

    /// A command could not be executed.
    #[error("The command \"{command}\" could not be executed:\n{source}")]
    CommandExec {
        /// The command that could not be executed.
        command: String,

        /// The source error.
        source: std::io::Error,
    },

    /// A command exited unsuccessfully.
    #[error(
        "The command \"{command}\" (cwd={cwd}) failed {}",
        match exit_code {
            Some(code) => format!("with exit code {code}"),
            None => "after being terminated by a signal".to_string(),
        }
    )]
    CommandFailed {
        /// The command that failed.
        command: String,

        /// The working directory of `command`.
        cwd: PathBuf,

        /// The exit code of `command`, if it exited regularly.
        exit_code: Option<i32>,
    },

    /// A host configuration error.
    #[error("Host configuration error:\n{0}")]
    Config(#[from] hoststrap_config::Error),

    /// An executable that is supposed to be called, is not found.
    #[error("Unable to find executable \"{command}\":\n{source}")]
    ExecutableNotFound {
        /// The executable that could not be found.
        command: String,

        /// The source error.
        source: which::Error,
    },

    /// A user account does not exist.
    #[error("The user {login} does not exist")]
    IdentityNotFound {
        /// The login of the missing account.
        login: String,
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

        /// The source error.
        source: std::io::Error,
    },

    /// Logging can not be set up.
    #[error("Logging setup error:\n{0}")]
    Logging(#[from] hoststrap_common::logging::Error),

    /// The application is not run as root.
    #[error("This application must be run as root, but runs as {user}")]
    NotRoot {
        /// The user running the application.
        user: String,
    },

    /// The source of a copy operation does not exist.
    #[error("The file {path} can not be copied, because it does not exist")]
    SourceNotFound {
        /// The missing source file.
        path: PathBuf,
    },

    /// A failure that is likely to go away when the run is repeated.
    #[error("Transient failure while {context}:\n{source}")]
    Transient {
        /// The action that failed.
        ///
        /// This is meant to complete the sentence "Transient failure while ".
        context: &'static str,

        /// The error source.
        source: Box<Error>,
    },
}

impl Error {
    /// Returns whether repeating the run is likely to get past this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns a closure marking an error as [`Error::Transient`].
    pub(crate) fn transient(context: &'static str) -> impl FnOnce(Error) -> Error {
        move |source| Self::Transient {
            context,
            source: Box::new(source),
        }
    }
}

/// A recoverable condition that is reported, but does not stop a provisioning run.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Warning {
    /// The target of a symlink does not exist, so the symlink is not created.
    #[error("target path does not exist @ {} (symlink {})", target.display(), link.display())]
    MissingTarget {
        /// The path the symlink should point at.
        target: PathBuf,

        /// The location of the symlink.
        link: PathBuf,
    },

    /// A shared directory does not exist, so its ownership is not changed.
    #[error("shared directory does not exist @ {}", path.display())]
    MissingSharedDirectory {
        /// The missing directory.
        path: PathBuf,
    },

    /// A repository registration did not create the repository's marker file.
    #[error(
        "registering repository {repository} did not create {}, it will be registered again on the next run",
        marker.display()
    )]
    MarkerNotCreated {
        /// The name of the repository.
        repository: String,

        /// The marker file that is still missing.
        marker: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        Warning::MissingTarget {
            target: PathBuf::from("/home/dev/.nix-profile/bin/home-manager"),
            link: PathBuf::from("/usr/local/bin/home-manager"),
        },
        "target path does not exist @ /home/dev/.nix-profile/bin/home-manager (symlink /usr/local/bin/home-manager)"
    )]
    #[case(
        Warning::MissingSharedDirectory { path: PathBuf::from("/etc/caddy/apps") },
        "shared directory does not exist @ /etc/caddy/apps"
    )]
    #[case(
        Warning::MarkerNotCreated {
            repository: "caddy".to_string(),
            marker: PathBuf::from("/etc/apt/sources.list.d/caddy-stable.list"),
        },
        "registering repository caddy did not create /etc/apt/sources.list.d/caddy-stable.list, it will be registered again on the next run"
    )]
    fn warning_messages(#[case] warning: Warning, #[case] expected: &str) {
        assert_eq!(warning.to_string(), expected);
    }
}
