//! Access to the host being provisioned.
//!
//! All queries and side effects on the host go through the traits in this module, so that a
//! provisioning run can be exercised against a fake host.

use std::process::{Command, Stdio};

use hoststrap_config::{PackageName, Tools};
use log::trace;
use nix::unistd::{User, gethostname, geteuid};

use crate::{
    AccountDatabase,
    AccountRecord,
    CommandLine,
    Error,
    Invocation,
    ProcessOutput,
    ProcessRunner,
};

/// The package status reported by `dpkg-query` for installed packages.
const INSTALLED_STATUS: &str = "install ok installed";

/// The OS package database.
pub trait PackageDatabase {
    /// Returns whether `package` is installed.
    ///
    /// Unknown packages are reported as not installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the package database can not be queried.
    fn is_installed(&self, package: &PackageName) -> Result<bool, Error>;
}

/// The source of the current hostname.
pub trait HostnameSource {
    /// Returns the current hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname can not be retrieved.
    fn hostname(&self) -> Result<String, Error>;
}

/// A host that can be provisioned.
pub trait Host: AccountDatabase + PackageDatabase + HostnameSource + ProcessRunner {}

impl<T: AccountDatabase + PackageDatabase + HostnameSource + ProcessRunner + ?Sized> Host for T {}

/// The host the current process runs on.
#[derive(Clone, Debug)]
pub struct LocalHost {
    dpkg_query: String,
}

impl LocalHost {
    /// Creates a new [`LocalHost`] using the package database tool of `tools`.
    pub fn new(tools: &Tools) -> Self {
        Self {
            dpkg_query: tools.dpkg_query.clone(),
        }
    }
}

impl AccountDatabase for LocalHost {
    fn lookup_account(&self, login: &str) -> Result<Option<AccountRecord>, Error> {
        User::from_name(login)
            .map(|user| user.map(AccountRecord::from))
            .map_err(|source| Error::AccountLookup {
                login: login.to_string(),
                source,
            })
    }

    fn invoking_login(&self) -> Result<String, Error> {
        let euid = geteuid();
        match User::from_uid(euid) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(Error::IdentityNotFound {
                login: format!("uid {euid}"),
            }),
            Err(source) => Err(Error::AccountLookup {
                login: format!("uid {euid}"),
                source,
            }),
        }
    }
}

impl PackageDatabase for LocalHost {
    fn is_installed(&self, package: &PackageName) -> Result<bool, Error> {
        let command = CommandLine::new(&self.dpkg_query)
            .arg("-W")
            .arg("-f=${Status}")
            .arg(package.as_ref());
        let command_string = command.to_string();
        let executable = which::which(command.program()).map_err(|source| {
            Error::ExecutableNotFound {
                command: command.program().to_string_lossy().to_string(),
                source,
            }
        })?;

        let output = Command::new(executable)
            .args(command.get_args())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| Error::CommandExec {
                command: command_string,
                source,
            })?;
        let installed =
            output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == INSTALLED_STATUS;
        trace!("package {package} installed: {installed}");
        Ok(installed)
    }
}

impl HostnameSource for LocalHost {
    fn hostname(&self) -> Result<String, Error> {
        gethostname()
            .map(|name| name.to_string_lossy().to_string())
            .map_err(|source| Error::IoPath {
                path: "/proc/sys/kernel/hostname".into(),
                context: "retrieving the hostname",
                source: source.into(),
            })
    }
}

impl ProcessRunner for LocalHost {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, Error> {
        let command = invocation.command();
        let executable = which::which(command.program()).map_err(|source| {
            Error::ExecutableNotFound {
                command: command.program().to_string_lossy().to_string(),
                source,
            }
        })?;

        let mut child = Command::new(executable);
        child.args(command.get_args()).current_dir(invocation.cwd());
        let exec_error = |source| Error::CommandExec {
            command: command.to_string(),
            source,
        };

        if invocation.capture_output() {
            let output = child
                .stdin(Stdio::null())
                .stderr(Stdio::inherit())
                .output()
                .map_err(exec_error)?;
            Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: output.stdout,
            })
        } else {
            let status = child.status().map_err(exec_error)?;
            Ok(ProcessOutput {
                exit_code: status.code(),
                stdout: Vec::new(),
            })
        }
    }
}
