//! Managed user accounts and their entitlements.

use std::fs::read;

use hoststrap_common::common::SUDOERS_FILE_MODE;
use hoststrap_config::UserConfig;
use log::{debug, info};

use crate::{
    CommandLine,
    Context,
    Error,
    Host,
    Identity,
    StepOutcome,
    identity::{account_exists, resolve_identity},
};

/// Creates the account of `user` unless it exists and grants its entitlements.
///
/// The sudoers drop-in and the authorized_keys file are only written if they differ from the
/// desired state.
/// Returns the identity of the account, whether it has been created in this run or not.
///
/// # Errors
///
/// Returns an error if
/// - the account can not be created or resolved
/// - the sudoers drop-in or the authorized_keys file can not be written
pub fn create_user<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
    user: &UserConfig,
) -> Result<(Identity, StepOutcome), Error> {
    let tools = ctx.config.tools();
    let login = user.login();
    let mut outcome = StepOutcome::Skipped;

    if account_exists(ctx.host, login.as_ref()) {
        info!("user {login} already exists");
    } else {
        info!("creating user {login}");
        ctx.executor.run(
            ctx.root(),
            CommandLine::new(&tools.adduser)
                .arg("--disabled-password")
                .arg("--gecos")
                .arg("")
                .arg(login.as_ref()),
            None,
        )?;
        outcome = StepOutcome::Applied;
    }
    let identity = resolve_identity(ctx.host, login.as_ref(), user.authorized_keys())?;

    if let Some(policy) = user.sudo() {
        let path = tools.sudoers_dir.join(login.as_ref());
        let rule = format!("{}\n", policy.sudoers_rule(login));
        if read(&path).is_ok_and(|existing| existing == rule.as_bytes()) {
            debug!("sudoers entry of {login} is up to date");
        } else {
            info!("writing sudoers entry {}", path.display());
            ctx.executor
                .write_file_with_mode(ctx.root(), &path, rule, SUDOERS_FILE_MODE)?;
            outcome = outcome.merge(StepOutcome::Applied);
        }
    }

    if !identity.authorized_keys().is_empty() && ctx.executor.write_authorized_keys(&identity)? {
        outcome = outcome.merge(StepOutcome::Applied);
    }

    Ok((identity, outcome))
}

/// Creates all managed users and remembers their identities for later steps.
///
/// # Errors
///
/// Returns the first error of [`create_user`].
pub fn create_users<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let mut outcome = StepOutcome::Skipped;
    for user in config.users() {
        let (identity, user_outcome) = create_user(ctx, user)?;
        ctx.users.retain(|known| known.login() != identity.login());
        ctx.users.push(identity);
        outcome = outcome.merge(user_outcome);
    }
    Ok(outcome)
}
