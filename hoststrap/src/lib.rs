#![doc = include_str!("../README.md")]

pub mod cli;
mod error;
mod exec;
mod home;
mod host;
mod identity;
mod script;
mod sequencer;
pub mod steps;

pub use error::{Error, Warning};
pub use exec::{CommandLine, Executor, Invocation, ProcessOutput, ProcessRunner, requires_elevation};
pub use host::{Host, HostnameSource, LocalHost, PackageDatabase};
pub use identity::{
    AccountDatabase,
    AccountRecord,
    Identity,
    account_exists,
    ensure_root,
    invoking_identity,
    resolve_identity,
};
pub use sequencer::{Context, PackageIndex, RunReport, Step, StepOutcome, provision};
