//! AIQA Common Library
//!
//! Configuration loading and validation, plus the outcome/report types shared
//! by the test runner and the command-line front end.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AiqaConfig, ConfigOverrides};
pub use error::{Error, Result};
pub use types::*;

/// AIQA version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
