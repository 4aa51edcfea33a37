//! The per-user declarative environment: the Nix runtime, home-manager and the home
//! configuration switch.

use std::path::Path;

use hoststrap_config::EnvironmentSetup;
use log::info;

use crate::{CommandLine, Context, Error, Host, Identity, StepOutcome};

/// The location of the home-manager binary, relative to a user's home.
const HOME_MANAGER_BIN: &str = ".nix-profile/bin/home-manager";

/// Returns the script adding the home-manager channel from `channel` and installing
/// home-manager.
fn home_manager_install_script(channel: &str) -> String {
    format!(
        r#"#!/bin/sh
set -e

/nix/var/nix/profiles/default/bin/nix-channel --add {channel} home-manager
/nix/var/nix/profiles/default/bin/nix-channel --update

export NIX_PATH="$HOME/.nix-defexpr/channels:/nix/var/nix/profiles/per-user/root/channels${{NIX_PATH:+:$NIX_PATH}}"

echo installing home manager
/nix/var/nix/profiles/default/bin/nix-shell '<home-manager>' -A install
"#
    )
}

/// The script applying the home configuration if no switch script is configured.
const HOME_MANAGER_SWITCH_SCRIPT: &str = r#"#!/bin/sh
set -e

export PATH="$PATH:$HOME/.nix-profile/bin:/nix/var/nix/profiles/default/bin"

home-manager switch -b backup
"#;

/// Installs the Nix runtime as the environment owner, unless the marker directory exists.
///
/// Leftovers of earlier installation attempts are removed first.
/// A failing download of the installer is [transient](Error::Transient).
///
/// # Errors
///
/// Returns an error if
/// - the environment owner is not a managed user created in this run
/// - cleaning up, downloading or running the installer fails
pub fn install_runtime<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let Some(environment) = config.environment() else {
        return Ok(StepOutcome::Skipped);
    };
    if environment.marker().exists() {
        info!(
            "nix is already installed ({} exists)",
            environment.marker().display()
        );
        return Ok(StepOutcome::Skipped);
    }

    let owner = ctx.managed_user(environment.owner())?;
    info!("installing nix as {}", owner.login());
    ctx.executor
        .run_shell(ctx.root(), &config.tools().nix_backup_cleanup, None)?;
    let installer = ctx
        .executor
        .run_shell(
            owner,
            &format!("curl -fsSL '{}'", environment.installer_url()),
            None,
        )
        .map_err(Error::transient("downloading the nix installer"))?;
    ctx.executor
        .run_script(owner, "nix-install", installer, environment.installer_args())?;
    Ok(StepOutcome::Applied)
}

/// Installs home-manager for `user`, unless it is installed already.
///
/// # Errors
///
/// Returns an error if the installation script fails.
pub fn install_home_manager<H: Host + ?Sized>(
    ctx: &Context<'_, H>,
    environment: &EnvironmentSetup,
    user: &Identity,
) -> Result<StepOutcome, Error> {
    if user.path_exists(HOME_MANAGER_BIN) {
        info!("home-manager is already installed for {}", user.login());
        return Ok(StepOutcome::Skipped);
    }

    ctx.executor.run_script(
        user,
        "install-home-manager",
        home_manager_install_script(environment.home_manager_channel()),
        std::iter::empty::<&str>(),
    )?;
    Ok(StepOutcome::Applied)
}

/// Applies the home configuration of `user`.
///
/// The configured switch script is run as `user` in the directory containing it.
/// Without a switch script, `home-manager switch` is run directly.
///
/// # Errors
///
/// Returns an error if
/// - the configured switch script does not exist ([`Error::SourceNotFound`])
/// - the switch fails
pub fn switch_home_configuration<H: Host + ?Sized>(
    ctx: &Context<'_, H>,
    environment: &EnvironmentSetup,
    user: &Identity,
) -> Result<StepOutcome, Error> {
    info!("applying the home configuration of {}", user.login());
    match environment.switch_script() {
        Some(script) => {
            if !script.is_file() {
                return Err(Error::SourceNotFound {
                    path: script.to_path_buf(),
                });
            }
            ctx.executor.run(
                user,
                CommandLine::new(&ctx.config.tools().shell).arg(script),
                Some(script.parent().unwrap_or(Path::new("/"))),
            )?;
        }
        None => {
            ctx.executor.run_script(
                user,
                "home-manager-switch",
                HOME_MANAGER_SWITCH_SCRIPT,
                std::iter::empty::<&str>(),
            )?;
        }
    }
    Ok(StepOutcome::Applied)
}

/// Installs home-manager and applies the home configuration for every user with a managed
/// environment.
///
/// # Errors
///
/// Returns an error if a user is not a managed user created in this run or if installing
/// home-manager or switching fails.
pub fn setup_user_environments<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let Some(environment) = config.environment() else {
        return Ok(StepOutcome::Skipped);
    };

    let mut outcome = StepOutcome::Skipped;
    for user in config.users().iter().filter(|user| user.environment()) {
        let identity = ctx.managed_user(user.login())?;
        outcome = outcome
            .merge(install_home_manager(ctx, environment, identity)?)
            .merge(switch_home_configuration(ctx, environment, identity)?);
    }
    Ok(outcome)
}
