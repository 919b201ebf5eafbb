//! lualink - validate, evaluate and watch Lua configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lualink_lib::consts::APP_NAME;
use tracing_subscriber::EnvFilter;

mod cmd;

// Bridge lualink errors into anyhow (mlua errors are not Send + Sync).
pub(crate) fn map_lua_err<T>(result: lualink_lib::Result<T>) -> Result<T> {
    result.map_err(|e| anyhow::anyhow!("{}", e))
}

/// lualink - embedded Lua configuration tooling
#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a configuration file in a sandbox and report problems
    Check {
        /// Path to the configuration file (default: config.lua)
        #[arg(default_value = "config.lua")]
        config: PathBuf,
    },

    /// Evaluate a Lua expression and print the result as JSON
    Eval {
        /// Expression to evaluate
        expr: String,
    },

    /// Watch a configuration file and reload it on change
    Watch {
        /// Path to the configuration file (default: config.lua)
        #[arg(default_value = "config.lua")]
        config: PathBuf,

        /// Interval between change scans
        #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
        poll_interval: Duration,

        /// Settle window before a reload
        #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
        debounce: Duration,
    },

    /// Write a starter configuration file
    Init {
        /// Path to create (default: config.lua)
        #[arg(default_value = "config.lua")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => cmd::cmd_check(&config, cli.verbose),
        Commands::Eval { expr } => cmd::cmd_eval(&expr),
        Commands::Watch {
            config,
            poll_interval,
            debounce,
        } => cmd::cmd_watch(&config, poll_interval, debounce),
        Commands::Init { path } => cmd::cmd_init(&path),
    }
}
