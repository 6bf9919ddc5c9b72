// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{default_config_path, parse_assignment};

/// Command-line arguments for `scriptcast`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptcast",
    version,
    about = "Run a script definition and stream its (secret-masked) output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the script definition (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Parameter value as NAME=VALUE. Repeat a name to pass a list.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub params: Vec<(String, String)>,

    /// User id recorded as the owner of the execution.
    ///
    /// Defaults to `$USER`, or `local` when that is not set.
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Run under a pseudo-terminal even if the definition does not ask for
    /// one.
    #[arg(long)]
    pub pty: bool,

    /// Validate and print the (masked) command line, but don't run it.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTCAST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
