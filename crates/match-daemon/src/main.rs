//! Match Index Daemon
//!
//! Command-line access to the persistent vector index.
//!
//! # Usage
//!
//! ```bash
//! match-daemon status
//! match-daemon upsert --id 42 --vector 0.1,0.2,0.3
//! match-daemon search --vector 0.1,0.2,0.3 -k 5
//! match-daemon remove --id 42
//! match-daemon --records records.jsonl rebuild
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/match-index/config.toml)
//! 3. Environment variables (MATCH_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use match_daemon::{init_logging, resolve_settings, run_command, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = resolve_settings(&cli)?;
    init_logging(&settings.log_level)?;

    let output = run_command(&settings, &cli.command)?;
    println!("{}", output);

    Ok(())
}
