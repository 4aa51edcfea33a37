//! Services such as the reverse proxy and the process manager.

use hoststrap_common::common::MARKER_FILE_CONTENT;
use hoststrap_config::ServiceSetup;
use log::info;

use crate::{CommandLine, Context, Error, Host, StepOutcome};

/// Sets up `service`, unless its marker file exists.
///
/// The marker file is written once the service has been set up completely.
///
/// # Errors
///
/// Returns an error if
/// - the config source does not exist ([`Error::SourceNotFound`])
/// - a directory or the marker file can not be written
/// - enabling the service fails
pub fn configure_service<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
    service: &ServiceSetup,
) -> Result<StepOutcome, Error> {
    if service.marker().exists() {
        info!(
            "service {} is already set up ({} exists)",
            service.name(),
            service.marker().display()
        );
        return Ok(StepOutcome::Skipped);
    }

    info!("setting up service {}", service.name());
    let root = ctx.root();
    if let Some((source, destination)) = service.config() {
        ctx.executor.copy_file(root, source, destination)?;
    }
    if let Some(include_dir) = service.include_dir() {
        ctx.executor.make_directories(root, include_dir)?;
    }
    if service.enable() {
        ctx.executor.run(
            root,
            CommandLine::new(&ctx.config.tools().systemctl)
                .arg("enable")
                .arg("--now")
                .arg(service.name()),
            None,
        )?;
    }
    ctx.executor
        .write_file(root, service.marker(), MARKER_FILE_CONTENT)?;
    Ok(StepOutcome::Applied)
}

/// Sets up all configured services.
///
/// # Errors
///
/// Returns the first error of [`configure_service`].
pub fn configure_services<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let mut outcome = StepOutcome::Skipped;
    for service in config.services() {
        outcome = outcome.merge(configure_service(ctx, service)?);
    }
    Ok(outcome)
}
