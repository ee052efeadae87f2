//! Match index daemon library exports.
//!
//! This crate provides the command-line front end for the match index.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Settings resolution, index startup and command execution
//! - `lock`: Advisory lock serializing invocations on one snapshot

pub mod cli;
pub mod commands;
pub mod lock;

pub use cli::{Cli, Commands};
pub use commands::{init_logging, open_index, record_source, resolve_settings, run_command};
pub use lock::SnapshotLock;
