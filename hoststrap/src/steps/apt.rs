//! Package installation and apt repository registration.

use hoststrap_config::{PackageName, RepositorySource};
use log::{debug, info};

use crate::{CommandLine, Context, Error, Host, StepOutcome, Warning};

/// Returns the packages of `packages` that are not installed, without duplicates.
///
/// A package whose state can not be queried is considered missing.
pub fn missing_packages<H: Host + ?Sized>(
    host: &H,
    packages: &[PackageName],
) -> Vec<PackageName> {
    let mut missing: Vec<PackageName> = Vec::new();
    for package in packages {
        if missing.contains(package) {
            continue;
        }
        let installed = host.is_installed(package).unwrap_or_else(|error| {
            debug!("Treating package {package} as missing: {error}");
            false
        });
        if !installed {
            missing.push(package.clone());
        }
    }
    missing
}

/// Refreshes the package index if it is stale.
///
/// # Errors
///
/// Returns an error if the package index refresh fails.
pub fn refresh_package_index<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    if !ctx.package_index.is_stale() {
        debug!("package index is up to date");
        return Ok(StepOutcome::Skipped);
    }

    ctx.executor.run(
        ctx.root(),
        CommandLine::new(&ctx.config.tools().apt).arg("update"),
        None,
    )?;
    ctx.package_index.refreshed();
    Ok(StepOutcome::Applied)
}

/// Installs exactly those packages of `packages` that are not yet installed.
///
/// A stale package index is refreshed first.
///
/// # Errors
///
/// Returns an error if the package index refresh or the installation fails.
pub fn install_packages<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
    packages: &[PackageName],
) -> Result<StepOutcome, Error> {
    let missing = missing_packages(ctx.host, packages);
    if missing.is_empty() {
        if !packages.is_empty() {
            info!("packages already installed: {}", join(packages));
        }
        return Ok(StepOutcome::Skipped);
    }

    refresh_package_index(ctx)?;
    apt_install(ctx, &missing)?;
    Ok(StepOutcome::Applied)
}

/// Installs the prerequisites of a repository that are not yet installed.
///
/// The package index is used as is, so that a stale mark left by an earlier registration is
/// only consumed by the single refresh following all registrations.
///
/// # Errors
///
/// Returns an error if the installation fails.
pub fn install_prerequisites<H: Host + ?Sized>(
    ctx: &Context<'_, H>,
    repository: &RepositorySource,
) -> Result<StepOutcome, Error> {
    let missing = missing_packages(ctx.host, repository.packages());
    if missing.is_empty() {
        return Ok(StepOutcome::Skipped);
    }

    apt_install(ctx, &missing)?;
    Ok(StepOutcome::Applied)
}

fn apt_install<H: Host + ?Sized>(
    ctx: &Context<'_, H>,
    missing: &[PackageName],
) -> Result<(), Error> {
    info!("installing packages: {}", join(missing));
    ctx.executor.run(
        ctx.root(),
        CommandLine::new(&ctx.config.tools().apt)
            .arg("install")
            .arg("-y")
            .args(missing.iter().map(AsRef::<str>::as_ref)),
        None,
    )
}

/// Installs the packages needed before anything else, on a freshly refreshed package index.
///
/// # Errors
///
/// Returns an error if the package index refresh or the installation fails.
pub fn install_early_packages<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    if missing_packages(ctx.host, config.early_packages()).is_empty() {
        return Ok(StepOutcome::Skipped);
    }

    ctx.package_index.mark_stale();
    install_packages(ctx, config.early_packages())
}

/// Registers `repository` unless its marker file exists.
///
/// The prerequisite packages of the repository are installed first, without refreshing the
/// package index.
///
/// # Errors
///
/// Returns an error if a prerequisite can not be installed or a registration command fails.
pub fn register_repository<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
    repository: &RepositorySource,
) -> Result<StepOutcome, Error> {
    let prerequisites = install_prerequisites(ctx, repository)?;
    if repository.marker().exists() {
        info!(
            "repository {} is already registered ({} exists)",
            repository.name(),
            repository.marker().display()
        );
        return Ok(prerequisites);
    }

    info!("registering repository {}", repository.name());
    let tools = ctx.config.tools();
    for source in repository.sources() {
        ctx.executor.run(
            ctx.root(),
            CommandLine::new(&tools.apt_add_repository)
                .arg("-y")
                .arg(source),
            None,
        )?;
    }
    for command in repository.shell_commands() {
        ctx.executor.run_shell(ctx.root(), command, None)?;
    }
    ctx.package_index.mark_stale();

    if repository.marker().exists() {
        Ok(StepOutcome::Applied)
    } else {
        Ok(StepOutcome::warn(Warning::MarkerNotCreated {
            repository: repository.name().to_string(),
            marker: repository.marker().to_path_buf(),
        }))
    }
}

/// Registers all configured repositories.
///
/// # Errors
///
/// Returns the first error of [`register_repository`].
pub fn register_repositories<H: Host + ?Sized>(
    ctx: &mut Context<'_, H>,
) -> Result<StepOutcome, Error> {
    let config = ctx.config;
    let mut outcome = StepOutcome::Skipped;
    for repository in config.repositories() {
        outcome = outcome.merge(register_repository(ctx, repository)?);
    }
    Ok(outcome)
}

fn join(packages: &[PackageName]) -> String {
    packages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
