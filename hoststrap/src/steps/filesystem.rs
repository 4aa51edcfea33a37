//! Shared directories and compatibility symlinks.

use std::os::unix::fs::symlink;

use hoststrap_config::SymlinkSpec;
use log::info;

use crate::{Context, Error, Host, StepOutcome, Warning};

/// Hands the shared directories over to their owner.
///
/// Only the directories themselves are changed, not their contents.
/// Missing directories are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the owner is not a managed user created in this run or if the
/// ownership of a directory can not be changed.
pub fn fix_shared_directory_ownership<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let Some(shared) = config.shared_directories() else {
        return Ok(StepOutcome::Skipped);
    };

    let owner = ctx.managed_user(shared.owner())?;
    let mut outcome = StepOutcome::Skipped;
    for path in shared.paths() {
        if !path.is_dir() {
            outcome = outcome.merge(StepOutcome::warn(Warning::MissingSharedDirectory {
                path: path.clone(),
            }));
            continue;
        }
        info!("handing {} over to {}", path.display(), owner.login());
        ctx.executor.set_owner(owner, path)?;
        outcome = outcome.merge(StepOutcome::Applied);
    }
    Ok(outcome)
}

/// Creates the symlink described by `spec`, unless something exists at its location.
///
/// The symlink points at the canonical location of its target.
/// A missing target is skipped with a warning, so that the symlink is created by a later run.
///
/// # Errors
///
/// Returns an error if the owner of the target is not a managed user created in this run or
/// if the symlink or its parent directory can not be created.
pub fn create_symlink<H: Host + ?Sized>(
    ctx: &Context<'_, H>,
    spec: &SymlinkSpec,
) -> Result<StepOutcome, Error> {
    let target = match spec.owner() {
        Some(owner) => ctx.managed_user(owner)?.resolve_path(spec.target()),
        None => spec.target().to_path_buf(),
    };
    let link = spec.link();

    let Ok(canonical) = target.canonicalize() else {
        return Ok(StepOutcome::warn(Warning::MissingTarget {
            target,
            link: link.to_path_buf(),
        }));
    };
    if link.symlink_metadata().is_ok() {
        info!("{} already exists", link.display());
        return Ok(StepOutcome::Skipped);
    }

    if let Some(parent) = link.parent() {
        ctx.executor.make_directories(ctx.root(), parent)?;
    }
    info!("linking {} to {}", link.display(), canonical.display());
    symlink(&canonical, link).map_err(|source| Error::IoPath {
        path: link.to_path_buf(),
        context: "creating a symlink",
        source,
    })?;
    Ok(StepOutcome::Applied)
}

/// Creates all configured symlinks.
///
/// # Errors
///
/// Returns the first error of [`create_symlink`].
pub fn create_symlinks<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let mut outcome = StepOutcome::Skipped;
    for spec in config.symlinks() {
        outcome = outcome.merge(create_symlink(ctx, spec)?);
    }
    Ok(outcome)
}
