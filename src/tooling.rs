//! CLI tooling layer.
//!
//! Thin command dispatch over the library API: the core's obligations to
//! this layer are the read methods (`to_hash`, `to_environment`,
//! `to_string_with`) and the filter-based write-back path used by the
//! secure/unsecure commands.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
