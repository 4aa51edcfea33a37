//! The hostname of the host.

use log::{debug, info};

use crate::{CommandLine, Context, Error, Host, StepOutcome};

/// Sets the hostname, unless the host already reports the desired one.
///
/// A hostname that can not be retrieved is considered different.
///
/// # Errors
///
/// Returns an error if setting the hostname fails.
pub fn set_hostname<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let desired = ctx.config.hostname();
    match ctx.host.hostname() {
        Ok(current) if current == desired => {
            info!("hostname is already {desired}");
            return Ok(StepOutcome::Skipped);
        }
        Ok(current) => debug!("hostname is {current}, but should be {desired}"),
        Err(error) => debug!("Treating hostname as different: {error}"),
    }

    ctx.executor.run(
        ctx.root(),
        CommandLine::new(&ctx.config.tools().hostnamectl)
            .arg("set-hostname")
            .arg(desired),
        None,
    )?;
    Ok(StepOutcome::Applied)
}
