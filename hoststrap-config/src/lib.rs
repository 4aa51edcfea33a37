//! Configuration file handling for hosts provisioned by hoststrap.
//!
//! A [`HostConfig`] describes the desired state of a single host: its hostname, apt
//! repositories and packages, services, user accounts and their per-user environment.
//! It is read from a TOML file and validated as a whole before it is handed out.

mod config;
mod environment;
mod error;
mod filesystem;
mod packages;
mod services;
mod user;
mod utils;

pub use config::{HostConfig, Tools};
pub use environment::EnvironmentSetup;
pub use error::Error;
pub use filesystem::{SharedDirectories, SymlinkSpec};
pub use packages::{PackageName, RepositorySource};
pub use services::{MeshNetwork, ServiceSetup};
pub use user::{AuthorizedKeyEntry, LoginName, SudoPolicy, UserConfig};
