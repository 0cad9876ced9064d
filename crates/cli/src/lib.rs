//! AIQA CLI
//!
//! Argument parsing and result rendering for the `aiqa` binary.

pub mod args;
pub mod output;
