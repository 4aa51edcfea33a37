//! The provisioning steps.
//!
//! Every step probes whether its desired state is already reached and only acts if it is not.

pub mod apt;
pub mod environment;
pub mod filesystem;
pub mod hostname;
pub mod mesh;
pub mod services;
pub mod users;
