//! Ephemeral scripts run on behalf of an [`Identity`].

use std::{io::Write, path::Path};

use hoststrap_common::common::SCRIPT_FILE_MODE;
use log::{info, warn};

use crate::{CommandLine, Error, Executor, Identity, ProcessRunner, home::apply_mode};

impl<R: ProcessRunner + ?Sized> Executor<'_, R> {
    /// Runs `contents` as an executable script as `target`.
    ///
    /// The script is written to a uniquely named file (`temp-script-<name>-*.sh`) in the home of
    /// `target`, owned by `target` with mode `700`, and run with `args` in the home of `target`.
    /// The file is deleted afterwards, whether the script succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns an error if
    /// - the script file can not be created
    /// - the script can not be run or exits with a non-zero exit code
    ///
    /// An error of the script itself takes precedence over an error deleting the script file.
    pub fn run_script<I, S>(
        &self,
        target: &Identity,
        name: &str,
        contents: impl AsRef<[u8]>,
        args: I,
    ) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("temp-script-{name}-"))
            .suffix(".sh")
            .tempfile_in(target.home())
            .map_err(|source| Error::IoPath {
                path: target.home().to_path_buf(),
                context: "creating a script file in it",
                source,
            })?;
        file.write_all(contents.as_ref())
            .map_err(|source| Error::IoPath {
                path: file.path().to_path_buf(),
                context: "writing the script",
                source,
            })?;
        // The open handle must be gone before the script is executed.
        let script = file.into_temp_path();

        let result = self.prepare_script(target, &script).and_then(|()| {
            self.run(target, CommandLine::new(&*script).args(args), None)
        });

        info!("deleting -- {}", script.display());
        let path = script.to_path_buf();
        let cleanup = script.close().map_err(|source| Error::IoPath {
            path,
            context: "deleting the script",
            source,
        });

        match (result, cleanup) {
            (Err(error), Err(cleanup_error)) => {
                warn!("{cleanup_error}");
                Err(error)
            }
            (Err(error), Ok(())) => Err(error),
            (Ok(()), cleanup) => cleanup,
        }
    }

    fn prepare_script(&self, target: &Identity, script: &Path) -> Result<(), Error> {
        self.set_owner(target, script)?;
        apply_mode(script, SCRIPT_FILE_MODE)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{read_dir, read_to_string};

    use hoststrap_config::Tools;
    use nix::unistd::{getegid, geteuid};
    use tempfile::{TempDir, tempdir};
    use testresult::TestResult;

    use super::*;
    use crate::{AccountRecord, LocalHost};

    fn current_identity() -> TestResult<(TempDir, Identity)> {
        let dir = tempdir()?;
        let identity = Identity::new(
            AccountRecord {
                login: "current".to_string(),
                uid: geteuid(),
                gid: getegid(),
                home: dir.path().to_path_buf(),
            },
            Vec::new(),
        );
        Ok((dir, identity))
    }

    fn scripts_left(dir: &Path) -> TestResult<usize> {
        Ok(read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("temp-script-"))
            .count())
    }

    #[test]
    fn script_runs_with_arguments_and_is_removed() -> TestResult {
        let (dir, identity) = current_identity()?;
        let tools = Tools::default();
        let host = LocalHost::new(&tools);
        let executor = Executor::new(&host, identity.clone(), &tools);

        executor.run_script(
            &identity,
            "greeting",
            "#!/bin/sh\nprintf '%s %s' \"$1\" \"$(pwd)\" > out.txt\n",
            ["hello"],
        )?;

        assert_eq!(
            read_to_string(dir.path().join("out.txt"))?,
            format!("hello {}", dir.path().canonicalize()?.display())
        );
        assert_eq!(scripts_left(dir.path())?, 0);
        Ok(())
    }

    #[test]
    fn failing_script_is_removed() -> TestResult {
        let (dir, identity) = current_identity()?;
        let tools = Tools::default();
        let host = LocalHost::new(&tools);
        let executor = Executor::new(&host, identity.clone(), &tools);

        let result = executor.run_script(
            &identity,
            "broken",
            "#!/bin/sh\nexit 3\n",
            std::iter::empty::<&str>(),
        );

        assert!(matches!(
            result,
            Err(Error::CommandFailed {
                exit_code: Some(3),
                ..
            })
        ));
        assert_eq!(scripts_left(dir.path())?, 0);
        Ok(())
    }
}
