//! Membership in a mesh network.

use log::info;

use crate::{CommandLine, Context, Error, Host, StepOutcome};

/// Installs the mesh network client and joins the configured network.
///
/// Nothing is done if no mesh network is configured or the client is present already.
/// A failing client installation is [transient](Error::Transient).
///
/// # Errors
///
/// Returns an error if installing the client or joining the network fails.
pub fn join_mesh<H: Host + ?Sized>(ctx: &mut Context<'_, H>) -> Result<StepOutcome, Error> {
    let Some(mesh) = ctx.config.mesh() else {
        return Ok(StepOutcome::Skipped);
    };
    if mesh.client().exists() {
        info!(
            "mesh network client is already installed at {}",
            mesh.client().display()
        );
        return Ok(StepOutcome::Skipped);
    }

    info!("installing the mesh network client");
    ctx.executor
        .run_shell(ctx.root(), mesh.installer(), None)
        .map_err(Error::transient("installing the mesh network client"))?;
    ctx.executor.run(
        ctx.root(),
        CommandLine::new(mesh.client())
            .arg("join")
            .arg(mesh.network_id()),
        None,
    )?;
    Ok(StepOutcome::Applied)
}
