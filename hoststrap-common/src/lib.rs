//! Common components and data for hoststrap crates.

pub mod common;
pub mod config;
#[cfg(feature = "logging")]
pub mod logging;
pub mod ssh;
