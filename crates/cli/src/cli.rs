// SPDX-License-Identifier: MIT

//! Minimal CLI surface (spec §4.14, §6): `clap::Parser` derive, same
//! shape as the teacher's top-level `Cli` struct.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "runner", version, about = "Safe command runner")]
pub struct Cli {
    /// Path to the TOML config file describing the groups to run.
    #[arg(long)]
    pub config: PathBuf,

    /// Directory holding recorded SHA-256 hash-manifest entries.
    #[arg(long = "hash-dir")]
    pub hash_dir: Option<PathBuf>,

    /// Validate and verify everything, but never spawn a command.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Skip removal of ephemeral group working directories on exit.
    #[arg(long = "keep-temp-dirs")]
    pub keep_temp_dirs: bool,

    /// Default `tracing` filter directive; overridden by `RUST_LOG` if set.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Path to the structured log file (one of the always-on fan-out sinks).
    #[arg(long = "log-file", default_value = "/var/log/scr-runner/runner.log")]
    pub log_file: PathBuf,

    /// Suppress the stderr log sink (file and Slack sinks are unaffected).
    #[arg(long)]
    pub quiet: bool,
}
