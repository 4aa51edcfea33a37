//! File operations that leave their results owned by an [`Identity`].
//!
//! Relative paths are resolved against the home directory of the identity.

use std::{
    fs::{Permissions, copy, read, set_permissions, write},
    os::unix::fs::{PermissionsExt, chown},
    path::{Path, PathBuf},
};

use hoststrap_common::ssh::{
    AUTHORIZED_KEYS_FILE_MODE,
    SSH_DIR_MODE,
    get_relative_authorized_keys_file,
    get_relative_ssh_dir,
};
use log::{debug, info};

use crate::{CommandLine, Error, Executor, Identity, ProcessRunner};

impl Identity {
    /// Resolves `path` against the home directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.home().join(path)
    }

    /// Returns whether `path`, resolved against the home directory, exists.
    pub fn path_exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve_path(path).exists()
    }
}

impl<R: ProcessRunner + ?Sized> Executor<'_, R> {
    /// Writes `content` to `path` and hands the file over to `target`.
    ///
    /// Missing parent directories are created as `target`.
    /// Returns the absolute path of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory can not be created, the file can not be written
    /// or its ownership can not be changed.
    pub fn write_file(
        &self,
        target: &Identity,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf, Error> {
        let path = target.resolve_path(path);
        if let Some(parent) = path.parent() {
            self.make_directories(target, parent)?;
        }
        write(&path, content).map_err(|source| Error::IoPath {
            path: path.clone(),
            context: "writing it",
            source,
        })?;
        self.set_owner(target, &path)?;
        Ok(path)
    }

    /// Writes `content` to `path`, hands the file over to `target` and applies `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Executor::write_file`] fails or the mode can not be applied.
    pub fn write_file_with_mode(
        &self,
        target: &Identity,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
        mode: u32,
    ) -> Result<PathBuf, Error> {
        let path = self.write_file(target, path, content)?;
        apply_mode(&path, mode)?;
        Ok(path)
    }

    /// Copies `source` to `destination` and hands the copy over to `target`.
    ///
    /// Missing parent directories of `destination` are created as `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if
    /// - `source` does not exist ([`Error::SourceNotFound`])
    /// - the parent directory of `destination` can not be created
    /// - the file can not be copied or its ownership can not be changed
    pub fn copy_file(
        &self,
        target: &Identity,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<PathBuf, Error> {
        let source = target.resolve_path(source);
        if !source.is_file() {
            return Err(Error::SourceNotFound { path: source });
        }
        let destination = target.resolve_path(destination);
        if let Some(parent) = destination.parent() {
            self.make_directories(target, parent)?;
        }

        info!(
            "copying {} to {}",
            source.display(),
            destination.display()
        );
        copy(&source, &destination).map_err(|source| Error::IoPath {
            path: destination.clone(),
            context: "copying a file to it",
            source,
        })?;
        self.set_owner(target, &destination)?;
        Ok(destination)
    }

    /// Creates `path` and all of its missing parents as `target`.
    ///
    /// Does nothing if `path` exists already.
    ///
    /// # Errors
    ///
    /// Returns an error if `mkdir` can not be run or fails.
    pub fn make_directories(&self, target: &Identity, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = target.resolve_path(path);
        if path.exists() {
            return Ok(path);
        }
        self.run(target, CommandLine::new("mkdir").arg("-p").arg(&path), None)?;
        Ok(path)
    }

    /// Makes `target` the owner of `path`.
    ///
    /// Only `path` itself is changed, not the contents of directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the ownership can not be changed.
    pub fn set_owner(&self, target: &Identity, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = target.resolve_path(path);
        chown(&path, Some(target.uid().as_raw()), Some(target.gid().as_raw())).map_err(
            |source| Error::Chown {
                path: path.clone(),
                user: target.login().to_string(),
                source,
            },
        )
    }

    /// Writes the authorized_keys file of `target`.
    ///
    /// The SSH directory (mode `700`) and the authorized_keys file (mode `600`) are owned by
    /// `target`.
    /// Returns whether the file has been written, which is only the case if it did not yet
    /// contain exactly the keys of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SSH directory or the authorized_keys file can not be set up.
    pub fn write_authorized_keys(&self, target: &Identity) -> Result<bool, Error> {
        let keys_file = target.resolve_path(get_relative_authorized_keys_file());
        let content = target
            .authorized_keys()
            .iter()
            .map(|key| format!("{key}\n"))
            .collect::<String>();

        if read(&keys_file).is_ok_and(|existing| existing == content.as_bytes()) {
            debug!("authorized_keys of {} are up to date", target.login());
            return Ok(false);
        }

        info!(
            "writing {} authorized key(s) for {}",
            target.authorized_keys().len(),
            target.login()
        );
        let ssh_dir = self.make_directories(target, get_relative_ssh_dir())?;
        apply_mode(&ssh_dir, SSH_DIR_MODE)?;
        self.write_file_with_mode(target, &keys_file, content, AUTHORIZED_KEYS_FILE_MODE)?;
        Ok(true)
    }
}

/// Applies the permission bits `mode` to `path`.
pub(crate) fn apply_mode(path: &Path, mode: u32) -> Result<(), Error> {
    set_permissions(path, Permissions::from_mode(mode)).map_err(|source| Error::ApplyPermissions {
        path: path.to_path_buf(),
        mode,
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        fs::{create_dir, metadata, read_to_string},
        os::unix::fs::MetadataExt,
        process::Command,
        str::FromStr,
    };

    use hoststrap_config::{AuthorizedKeyEntry, Tools};
    use nix::unistd::{getegid, geteuid};
    use rstest::{fixture, rstest};
    use tempfile::{TempDir, tempdir};
    use testresult::TestResult;

    use super::*;
    use crate::{AccountRecord, Invocation, ProcessOutput};

    /// Runs commands for real and records them.
    #[derive(Debug, Default)]
    struct RecordingRunner {
        invocations: RefCell<Vec<Invocation>>,
    }

    impl ProcessRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, Error> {
            self.invocations.borrow_mut().push(invocation.clone());
            let status = Command::new(invocation.command().program())
                .args(invocation.command().get_args())
                .current_dir(invocation.cwd())
                .status()
                .map_err(|source| Error::CommandExec {
                    command: invocation.command().to_string(),
                    source,
                })?;
            Ok(ProcessOutput {
                exit_code: status.code(),
                stdout: Vec::new(),
            })
        }
    }

    /// The current user, with a temporary home directory.
    #[fixture]
    fn home() -> TestResult<(TempDir, Identity)> {
        let dir = tempdir()?;
        let identity = Identity::new(
            AccountRecord {
                login: "current".to_string(),
                uid: geteuid(),
                gid: getegid(),
                home: dir.path().to_path_buf(),
            },
            vec![
                AuthorizedKeyEntry::from_str("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm user@host")?,
            ],
        );
        Ok((dir, identity))
    }

    fn assert_owned_by(path: &Path, identity: &Identity) -> TestResult {
        let meta = metadata(path)?;
        assert_eq!(meta.uid(), identity.uid().as_raw());
        assert_eq!(meta.gid(), identity.gid().as_raw());
        Ok(())
    }

    #[rstest]
    fn write_file_relative_to_home(home: TestResult<(TempDir, Identity)>) -> TestResult {
        let (_dir, identity) = home?;
        let runner = RecordingRunner::default();
        let executor = Executor::new(&runner, identity.clone(), &Tools::default());

        let path = executor.write_file(&identity, "config/app/settings.toml", "answer = 42\n")?;

        assert_eq!(path, identity.home().join("config/app/settings.toml"));
        assert_eq!(read_to_string(&path)?, "answer = 42\n");
        assert_owned_by(&path, &identity)?;
        assert_owned_by(&identity.home().join("config/app"), &identity)?;
        assert_eq!(runner.invocations.borrow().len(), 1);
        assert!(identity.path_exists("config/app/settings.toml"));
        Ok(())
    }

    #[rstest]
    fn make_directories_skips_existing(home: TestResult<(TempDir, Identity)>) -> TestResult {
        let (_dir, identity) = home?;
        let runner = RecordingRunner::default();
        let executor = Executor::new(&runner, identity.clone(), &Tools::default());
        create_dir(identity.home().join("existing"))?;

        executor.make_directories(&identity, "existing")?;
        assert!(runner.invocations.borrow().is_empty());

        let created = executor.make_directories(&identity, "a/b/c")?;
        assert!(created.is_dir());
        assert_eq!(runner.invocations.borrow().len(), 1);
        Ok(())
    }

    #[rstest]
    fn copy_file_requires_source(home: TestResult<(TempDir, Identity)>) -> TestResult {
        let (_dir, identity) = home?;
        let runner = RecordingRunner::default();
        let executor = Executor::new(&runner, identity.clone(), &Tools::default());

        let result = executor.copy_file(&identity, "missing.conf", "etc/app.conf");
        assert!(matches!(result, Err(Error::SourceNotFound { .. })));
        assert!(!identity.path_exists("etc"));

        write(identity.home().join("source.conf"), "listen 80\n")?;
        let copied = executor.copy_file(&identity, "source.conf", "etc/app.conf")?;
        assert_eq!(read_to_string(&copied)?, "listen 80\n");
        assert_owned_by(&copied, &identity)?;
        Ok(())
    }

    #[rstest]
    fn authorized_keys_are_written_once(home: TestResult<(TempDir, Identity)>) -> TestResult {
        let (_dir, identity) = home?;
        let runner = RecordingRunner::default();
        let executor = Executor::new(&runner, identity.clone(), &Tools::default());

        assert!(executor.write_authorized_keys(&identity)?);
        assert!(!executor.write_authorized_keys(&identity)?);

        let ssh_dir = identity.home().join(".ssh");
        let keys_file = ssh_dir.join("authorized_keys");
        assert_eq!(metadata(&ssh_dir)?.mode() & 0o7777, 0o700);
        assert_eq!(metadata(&keys_file)?.mode() & 0o7777, 0o600);
        assert_owned_by(&keys_file, &identity)?;
        assert_eq!(
            read_to_string(&keys_file)?,
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm user@host\n"
        );
        Ok(())
    }
}
