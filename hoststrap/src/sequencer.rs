//! The ordered provisioning run.

use hoststrap_config::{HostConfig, LoginName};
use log::{debug, info, warn};
use strum::Display;

use crate::{
    Error,
    Executor,
    Host,
    Identity,
    Warning,
    identity::invoking_identity,
    steps::{
        apt::{install_early_packages, install_packages, refresh_package_index, register_repositories},
        environment::{install_runtime, setup_user_environments},
        filesystem::{create_symlinks, fix_shared_directory_ownership},
        hostname::set_hostname,
        mesh::join_mesh,
        services::configure_services,
        users::create_users,
    },
};

/// The state of the package index of the host.
///
/// Any step changing repository metadata marks the index stale.
/// The index is refreshed before the next package installation, which clears the mark.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PackageIndex {
    stale: bool,
    refreshes: usize,
}

impl PackageIndex {
    /// Marks the index as in need of a refresh.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Returns whether the index needs a refresh.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns how often the index has been refreshed in this run.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// Records a refresh, which clears the stale mark.
    pub(crate) fn refreshed(&mut self) {
        self.stale = false;
        self.refreshes += 1;
    }
}

/// The steps of a provisioning run, in the order in which they are run.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum Step {
    /// Installs the packages needed before anything else.
    EarlyPackages,

    /// Sets the hostname.
    Hostname,

    /// Registers apt repositories.
    Repositories,

    /// Refreshes the package index if it is stale.
    PackageIndex,

    /// Installs the standalone package set.
    Packages,

    /// Joins the mesh network.
    Mesh,

    /// Configures services.
    Services,

    /// Creates user accounts and their entitlements.
    Users,

    /// Installs the per-user environment runtime and applies the home configurations.
    Environment,

    /// Hands shared directories over to their owner.
    SharedDirectories,

    /// Creates compatibility symlinks.
    Symlinks,
}

/// The outcome of a step.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum StepOutcome {
    /// The desired state was already reached, nothing has been changed.
    Skipped,

    /// The host has been changed to reach the desired state.
    Applied,

    /// The step could only partially reach the desired state.
    Warned(Vec<Warning>),
}

impl StepOutcome {
    /// Combines the outcomes of two parts of one step.
    ///
    /// Warnings take precedence over changes, changes over skips.
    pub fn merge(self, other: StepOutcome) -> StepOutcome {
        match (self, other) {
            (Self::Warned(mut first), Self::Warned(second)) => {
                first.extend(second);
                Self::Warned(first)
            }
            (Self::Warned(warnings), _) | (_, Self::Warned(warnings)) => Self::Warned(warnings),
            (Self::Applied, _) | (_, Self::Applied) => Self::Applied,
            (Self::Skipped, Self::Skipped) => Self::Skipped,
        }
    }

    /// Returns the outcome for a single warning.
    pub(crate) fn warn(warning: Warning) -> Self {
        warn!("{warning}");
        Self::Warned(vec![warning])
    }
}

/// The outcomes of all steps of a finished provisioning run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunReport {
    steps: Vec<(Step, StepOutcome)>,
    package_index_refreshes: usize,
}

impl RunReport {
    /// Returns the outcome of every step, in run order.
    pub fn steps(&self) -> &[(Step, StepOutcome)] {
        &self.steps
    }

    /// Returns the outcome of `step`.
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find_map(|(name, outcome)| (*name == step).then_some(outcome))
    }

    /// Returns all warnings raised during the run.
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.steps.iter().flat_map(|(_, outcome)| match outcome {
            StepOutcome::Warned(warnings) => warnings.as_slice(),
            _ => &[][..],
        })
    }

    /// Returns how often the package index has been refreshed.
    pub fn package_index_refreshes(&self) -> usize {
        self.package_index_refreshes
    }

    /// Returns whether the run changed the host.
    pub fn changed(&self) -> bool {
        self.steps
            .iter()
            .any(|(_, outcome)| !matches!(outcome, StepOutcome::Skipped))
    }

    fn record(&mut self, step: Step, outcome: StepOutcome) {
        debug!("step {step}: {outcome}");
        self.steps.push((step, outcome));
    }
}

/// The state threaded through all steps of a provisioning run.
#[derive(Debug)]
pub struct Context<'a, H: Host + ?Sized> {
    /// The desired state of the host.
    pub config: &'a HostConfig,

    /// The host being provisioned.
    pub host: &'a H,

    /// The executor running commands on the host.
    pub executor: Executor<'a, H>,

    /// The package index of the host.
    pub package_index: PackageIndex,

    /// The identities of the managed users, once created.
    pub users: Vec<Identity>,
}

impl<'a, H: Host + ?Sized> Context<'a, H> {
    /// Creates a new [`Context`] for provisioning `host` to reach `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity running the current process can not be resolved.
    pub fn new(config: &'a HostConfig, host: &'a H) -> Result<Self, Error> {
        let invoking = invoking_identity(host)?;
        Ok(Self {
            config,
            host,
            executor: Executor::new(host, invoking, config.tools()),
            package_index: PackageIndex::default(),
            users: Vec::new(),
        })
    }

    /// Returns the identity running the current process.
    ///
    /// Actions on system locations are carried out as this identity.
    pub fn root(&self) -> &Identity {
        self.executor.invoking()
    }

    /// Returns the identity of the managed user `login`.
    ///
    /// # Errors
    ///
    /// Returns an error if `login` has not been created as a managed user in this run.
    pub fn managed_user(&self, login: &LoginName) -> Result<&Identity, Error> {
        self.users
            .iter()
            .find(|identity| identity.login() == login.as_ref())
            .ok_or_else(|| Error::IdentityNotFound {
                login: login.to_string(),
            })
    }
}

/// Provisions `host` to reach the state described by `config`.
///
/// The steps of [`Step`] are run in order.
/// Each step first probes whether its desired state is already reached and only acts if it is
/// not, so that a run can be repeated safely.
///
/// # Errors
///
/// Returns the first error of any step, which ends the run.
/// No later step is run after an error.
pub fn provision<H: Host + ?Sized>(config: &HostConfig, host: &H) -> Result<RunReport, Error> {
    let mut ctx = Context::new(config, host)?;
    let mut report = RunReport::default();

    report.record(Step::EarlyPackages, install_early_packages(&mut ctx)?);
    report.record(Step::Hostname, set_hostname(&mut ctx)?);
    report.record(Step::Repositories, register_repositories(&mut ctx)?);
    report.record(Step::PackageIndex, refresh_package_index(&mut ctx)?);
    report.record(Step::Packages, install_packages(&mut ctx, config.packages())?);
    report.record(Step::Mesh, join_mesh(&mut ctx)?);
    report.record(Step::Services, configure_services(&mut ctx)?);
    report.record(Step::Users, create_users(&mut ctx)?);
    report.record(Step::Environment, {
        install_runtime(&mut ctx)?.merge(setup_user_environments(&mut ctx)?)
    });
    report.record(
        Step::SharedDirectories,
        fix_shared_directory_ownership(&mut ctx)?,
    );
    report.record(Step::Symlinks, create_symlinks(&mut ctx)?);
    report.package_index_refreshes = ctx.package_index.refreshes();

    info!("successfully completed");
    Ok(report)
}
