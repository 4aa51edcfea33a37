//! Logging utilities.

use log::{LevelFilter, Log};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use systemd_journal_logger::{JournalLog, connected_to_journal};

/// Logging setup error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Journal initialization error.
    #[error("Journal initialization error: {0}")]
    Journal(std::io::Error),

    /// Logger initialization error.
    #[error("Logger initialization error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// Sets up logging facilities.
///
/// Logs to the systemd journal if stderr is connected to it (e.g. when run from a unit) and to
/// the terminal otherwise.
/// Terminal output omits timestamps and module targets, so that the command echo reads like a
/// shell transcript.
///
/// # Errors
///
/// An error is returned if a logger has already been set.
pub fn setup_logging(max_level: impl Into<LevelFilter>) -> Result<(), Error> {
    let max_level = max_level.into();
    if connected_to_journal() {
        let log = JournalLog::new()
            .map_err(Error::Journal)?
            .with_extra_fields(vec![("VERSION", env!("CARGO_PKG_VERSION"))])
            .with_syslog_identifier("hoststrap".to_string());
        log::set_boxed_logger(Box::new(log) as Box<dyn Log>)?;
        log::set_max_level(max_level);
        return Ok(());
    }

    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(
        max_level,
        config,
        // simplelog needs to be explicitly instructed to always use stderr
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}
