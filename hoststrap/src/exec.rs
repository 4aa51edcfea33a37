//! Execution of commands on behalf of an [`Identity`].
//!
//! Every command runs either directly (if the target identity is the invoking identity) or
//! wrapped in a privilege elevation tool that switches to the target identity first.
//! Commands are echoed before they run and a non-zero exit code is always turned into
//! [`Error::CommandFailed`].

use std::{
    ffi::{OsStr, OsString},
    fmt::Display,
    path::{Path, PathBuf},
};

use hoststrap_config::Tools;
use log::{error, info};

use crate::{Error, Identity};

/// A program and its arguments.
///
/// Arguments are never interpreted by a shell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLine {
    /// Creates a new [`CommandLine`] for `program` without arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Returns the program.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Returns the arguments.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Returns the program followed by the arguments.
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }

    /// Returns this command line prefixed with `prefix`.
    fn wrapped_in(self, prefix: CommandLine) -> Self {
        let mut args = prefix.args;
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: prefix.program,
            args,
        }
    }
}

impl Display for CommandLine {
    /// Formats the command line the way a shell would need it quoted.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for word in self.argv() {
            if !first {
                write!(f, " ")?;
            }
            first = false;

            let word = word.to_string_lossy();
            if !word.is_empty()
                && word
                    .chars()
                    .all(|char| char.is_ascii_alphanumeric() || "-_./:=@+,%".contains(char))
            {
                write!(f, "{word}")?;
            } else {
                write!(f, "'{}'", word.replace('\'', r"'\''"))?;
            }
        }
        Ok(())
    }
}

/// A fully prepared command: a command line and the directory it runs in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    command: CommandLine,
    cwd: PathBuf,
    capture_output: bool,
}

impl Invocation {
    /// Creates a new [`Invocation`] of `command` in `cwd`.
    pub fn new(command: CommandLine, cwd: PathBuf) -> Self {
        Self {
            command,
            cwd,
            capture_output: false,
        }
    }

    /// Requests capturing of the command's stdout.
    pub fn capturing_output(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Returns the command line.
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Returns the working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Returns whether stdout of the command is captured.
    pub fn capture_output(&self) -> bool {
        self.capture_output
    }
}

/// The result of a finished child process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// The exit code, or [`None`] if the process was terminated by a signal.
    pub exit_code: Option<i32>,

    /// The captured stdout; empty if output was not captured.
    pub stdout: Vec<u8>,
}

impl ProcessOutput {
    /// Returns whether the process exited with exit code `0`.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns child processes and waits for them to finish.
pub trait ProcessRunner {
    /// Runs `invocation` to completion.
    ///
    /// A non-zero exit code is not an error at this level.
    ///
    /// # Errors
    ///
    /// Returns an error if the process can not be started.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, Error>;
}

/// Returns whether acting as `target` requires privilege elevation when running as `invoking`.
pub fn requires_elevation(invoking: &Identity, target: &Identity) -> bool {
    invoking.login() != target.login()
}

/// Runs commands on behalf of identities.
#[derive(Debug)]
pub struct Executor<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    invoking: Identity,
    elevate: String,
    shell: String,
}

impl<'a, R: ProcessRunner + ?Sized> Executor<'a, R> {
    /// Creates a new [`Executor`] for a process running as `invoking`.
    pub fn new(runner: &'a R, invoking: Identity, tools: &Tools) -> Self {
        Self {
            runner,
            invoking,
            elevate: tools.elevate.clone(),
            shell: tools.shell.clone(),
        }
    }

    /// Returns the identity running the current process.
    pub fn invoking(&self) -> &Identity {
        &self.invoking
    }

    /// Prepares `command` for running as `target` in `cwd` (default: the home of `target`).
    pub fn invocation(
        &self,
        target: &Identity,
        command: CommandLine,
        cwd: Option<&Path>,
    ) -> Invocation {
        let cwd = cwd.unwrap_or_else(|| target.home()).to_path_buf();
        let command = if requires_elevation(&self.invoking, target) {
            command.wrapped_in(CommandLine::new(&self.elevate).arg("-u").arg(target.login()))
        } else {
            command
        };
        Invocation::new(command, cwd)
    }

    /// Runs `command` as `target`.
    ///
    /// The command runs in `cwd` or, if unset, in the home of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if
    /// - the command can not be started
    /// - the command exits with a non-zero exit code ([`Error::CommandFailed`]), which is
    ///   always fatal for a provisioning run
    pub fn run(
        &self,
        target: &Identity,
        command: CommandLine,
        cwd: Option<&Path>,
    ) -> Result<(), Error> {
        let invocation = self.invocation(target, command, cwd);
        self.execute(&invocation).map(|_| ())
    }

    /// Runs `script` as `target` through the shell and returns its stdout.
    ///
    /// The script runs in `cwd` or, if unset, in the home of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell can not be started or exits with a non-zero exit code.
    /// Callers decide whether such a failure is fatal or [transient](Error::Transient).
    pub fn run_shell(
        &self,
        target: &Identity,
        script: &str,
        cwd: Option<&Path>,
    ) -> Result<Vec<u8>, Error> {
        let command = CommandLine::new(&self.shell).arg("-c").arg(script);
        let invocation = self.invocation(target, command, cwd).capturing_output();
        self.execute(&invocation).map(|output| output.stdout)
    }

    fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, Error> {
        info!(
            "exec - {}  cwd={}",
            invocation.command(),
            invocation.cwd().display()
        );
        let output = self.runner.run(invocation)?;
        if !output.success() {
            error!(
                "exec failed with exit code {}",
                output
                    .exit_code
                    .map_or_else(|| "none (terminated by signal)".to_string(), |code| code.to_string())
            );
            return Err(Error::CommandFailed {
                command: invocation.command().to_string(),
                cwd: invocation.cwd().to_path_buf(),
                exit_code: output.exit_code,
            });
        }
        Ok(output)
    }
}
