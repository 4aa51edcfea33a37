//! Utilities used for test setups.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    ffi::OsStr,
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use hoststrap::{
    AccountDatabase,
    AccountRecord,
    CommandLine,
    Error,
    HostnameSource,
    Invocation,
    PackageDatabase,
    ProcessOutput,
    ProcessRunner,
};
use hoststrap_config::{HostConfig, PackageName};
use nix::unistd::{getegid, geteuid};
use tempfile::{TempDir, tempdir};
use testresult::TestResult;

/// Full host configuration, with `@ROOT@` standing in for a scratch directory.
pub const HOST_CONFIG_FULL: &str = include_str!("../fixtures/host-full.toml");

/// The directory below which `adduser` places the homes of new accounts.
pub const HOME_BASE_DIR: &str = "/home/";

/// Login of the identity running the provisioning run.
const INVOKING_LOGIN: &str = "root";

/// Exit code of a download that is not available.
const DOWNLOAD_FAILED: i32 = 22;

/// Creates a [`HostConfig`] from `template`, replacing `@ROOT@` with `root`.
///
/// Relative paths in the configuration are resolved against `root`.
pub fn host_config(template: &str, root: &Path) -> TestResult<HostConfig> {
    let data = template.replace("@ROOT@", &root.to_string_lossy());
    Ok(HostConfig::from_toml_str(&data, root)?)
}

/// An in-memory host.
///
/// Account creation, package installation, hostname changes and service management are
/// simulated.
/// Downloads (`curl` shell pipelines) answer with a fixed payload.
/// All other commands are run for real as the current user, with privilege elevation
/// stripped.
/// Every account is mapped to the current user, so that ownership changes succeed.
#[derive(Debug)]
pub struct FakeHost {
    scratch: TempDir,
    home_base: PathBuf,
    create_homes: bool,
    accounts: RefCell<HashMap<String, AccountRecord>>,
    installed: RefCell<HashSet<String>>,
    hostname: RefCell<String>,
    download: Option<Vec<u8>>,
    failing: HashSet<String>,
    invocations: RefCell<Vec<Invocation>>,
}

impl FakeHost {
    /// Creates a new [`FakeHost`] with a scratch directory.
    ///
    /// Homes of new accounts are created below `<scratch>/home`.
    pub fn new() -> TestResult<Self> {
        let scratch = tempdir()?;
        let root_home = scratch.path().join(INVOKING_LOGIN);
        create_dir_all(&root_home)?;

        let host = Self {
            home_base: scratch.path().join("home"),
            create_homes: true,
            accounts: RefCell::default(),
            installed: RefCell::default(),
            hostname: RefCell::new("ubuntu".to_string()),
            download: None,
            failing: HashSet::new(),
            invocations: RefCell::default(),
            scratch,
        };
        host.add_account(INVOKING_LOGIN, root_home);
        Ok(host)
    }

    /// Places the homes of new accounts below `home_base`, without creating them.
    pub fn with_home_base(mut self, home_base: impl AsRef<Path>) -> Self {
        self.home_base = home_base.as_ref().to_path_buf();
        self.create_homes = false;
        self
    }

    /// Marks `packages` as installed.
    pub fn with_installed(self, packages: &[&str]) -> Self {
        self.installed
            .borrow_mut()
            .extend(packages.iter().map(|package| package.to_string()));
        self
    }

    /// Answers downloads with `payload`.
    pub fn with_download(mut self, payload: impl AsRef<[u8]>) -> Self {
        self.download = Some(payload.as_ref().to_vec());
        self
    }

    /// Lets every invocation of `program` exit with exit code 1.
    pub fn with_failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Returns the scratch directory.
    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Returns the current hostname.
    pub fn current_hostname(&self) -> String {
        self.hostname.borrow().clone()
    }

    /// Returns whether `package` is installed.
    pub fn has_package(&self, package: &str) -> bool {
        self.installed.borrow().contains(package)
    }

    /// Returns all recorded invocations.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the recorded command lines, with privilege elevation stripped.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.invocations
            .borrow()
            .iter()
            .map(|invocation| {
                unelevated(invocation.command())
                    .iter()
                    .map(|word| word.to_string_lossy().to_string())
                    .collect()
            })
            .collect()
    }

    /// Returns the recorded command lines whose program is called `program`.
    pub fn commands_of(&self, program: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|argv| argv.first().is_some_and(|first| file_name(first) == program))
            .collect()
    }

    /// Forgets all recorded invocations.
    pub fn clear_invocations(&self) {
        self.invocations.borrow_mut().clear();
    }

    fn add_account(&self, login: &str, home: PathBuf) {
        self.accounts.borrow_mut().insert(
            login.to_string(),
            AccountRecord {
                login: login.to_string(),
                uid: geteuid(),
                gid: getegid(),
                home,
            },
        );
    }

    fn simulate(&self, argv: &[&OsStr], invocation: &Invocation) -> Result<ProcessOutput, Error> {
        let success = ProcessOutput {
            exit_code: Some(0),
            stdout: Vec::new(),
        };
        let words: Vec<String> = argv
            .iter()
            .map(|word| word.to_string_lossy().to_string())
            .collect();
        let program = file_name(&words[0]);

        if self.failing.contains(program) {
            return Ok(ProcessOutput {
                exit_code: Some(1),
                stdout: Vec::new(),
            });
        }

        match program {
            "apt-get" => {
                if words.get(1).is_some_and(|command| command == "install") {
                    self.installed.borrow_mut().extend(
                        words[2..]
                            .iter()
                            .filter(|word| !word.starts_with('-'))
                            .cloned(),
                    );
                }
                Ok(success)
            }
            "adduser" => {
                if let Some(login) = words.last() {
                    let home = self.home_base.join(login);
                    if self.create_homes {
                        create_dir_all(&home).map_err(|source| Error::IoPath {
                            path: home.clone(),
                            context: "creating a home directory",
                            source,
                        })?;
                    }
                    self.add_account(login, home);
                }
                Ok(success)
            }
            "hostnamectl" => {
                if let Some(hostname) = words.get(2) {
                    *self.hostname.borrow_mut() = hostname.clone();
                }
                Ok(success)
            }
            "apt-add-repository" | "systemctl" | "zerotier-cli" => Ok(success),
            "sh" if words.get(2).is_some_and(|script| script.starts_with("curl ")) => {
                Ok(match &self.download {
                    Some(payload) => ProcessOutput {
                        exit_code: Some(0),
                        stdout: payload.clone(),
                    },
                    None => ProcessOutput {
                        exit_code: Some(DOWNLOAD_FAILED),
                        stdout: Vec::new(),
                    },
                })
            }
            script if script.starts_with("temp-script-install-home-manager-") => {
                let home = invocation.cwd().join(".nix-profile/bin");
                create_dir_all(&home)
                    .and_then(|()| write(home.join("home-manager"), "#!/bin/sh\n"))
                    .map_err(|source| Error::IoPath {
                        path: home.clone(),
                        context: "installing home-manager",
                        source,
                    })?;
                Ok(success)
            }
            script if script.starts_with("temp-script-home-manager-switch-") => Ok(success),
            _ => run_for_real(argv, invocation),
        }
    }
}

impl AccountDatabase for FakeHost {
    fn lookup_account(&self, login: &str) -> Result<Option<AccountRecord>, Error> {
        Ok(self.accounts.borrow().get(login).cloned())
    }

    fn invoking_login(&self) -> Result<String, Error> {
        Ok(INVOKING_LOGIN.to_string())
    }
}

impl PackageDatabase for FakeHost {
    fn is_installed(&self, package: &PackageName) -> Result<bool, Error> {
        Ok(self.installed.borrow().contains(package.as_ref()))
    }
}

impl HostnameSource for FakeHost {
    fn hostname(&self) -> Result<String, Error> {
        Ok(self.current_hostname())
    }
}

impl ProcessRunner for FakeHost {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, Error> {
        self.invocations.borrow_mut().push(invocation.clone());
        let argv = unelevated(invocation.command());
        self.simulate(&argv, invocation)
    }
}

/// Returns the command line without a leading `sudo -u <login>`.
fn unelevated(command: &CommandLine) -> Vec<&OsStr> {
    let argv: Vec<&OsStr> = command.argv().collect();
    if argv.first().is_some_and(|program| *program == "sudo")
        && argv.get(1).is_some_and(|flag| *flag == "-u")
        && argv.len() > 3
    {
        argv[3..].to_vec()
    } else {
        argv
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(path)
}

fn run_for_real(argv: &[&OsStr], invocation: &Invocation) -> Result<ProcessOutput, Error> {
    let exec_error = |source| Error::CommandExec {
        command: invocation.command().to_string(),
        source,
    };
    let mut command = Command::new(argv[0]);
    command.args(&argv[1..]).current_dir(invocation.cwd());

    if invocation.capture_output() {
        let output = command
            .stderr(Stdio::inherit())
            .output()
            .map_err(exec_error)?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
        })
    } else {
        let status = command.status().map_err(exec_error)?;
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: Vec::new(),
        })
    }
}
