//! cbuild library exports.
//!
//! The binary is a thin wrapper around these modules; integration tests
//! drive them directly with a fake toolchain.

pub mod bootstrap;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod freshness;
pub mod invocation;
pub mod process;
pub mod record;
pub mod timing;
pub mod unit;

pub use build::{Actions, BuildOutcome, BuildReport, Orchestrator};
pub use config::BuildConfig;
pub use error::{BuildError, Result};
