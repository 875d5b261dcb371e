//! memrouted — the memroute daemon and routing CLI.
//!
//! Loads a `memroute.toml`, builds the configured scheduler and either
//! keeps it running (with periodic stats and log reopening) or answers a
//! single routing question and exits.
//!
//! # Usage
//!
//! ```text
//! memrouted run --config memroute.toml
//! memrouted route --config memroute.toml user:1 user:2
//! memrouted divide --config memroute.toml user:1 user:2 user:3
//! memrouted init --kind manual > memroute.toml
//! ```

mod daemon;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use memroute_core::{MemrouteConfig, SchedulerKind};

#[derive(Parser)]
#[command(name = "memrouted", about = "memroute key routing daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted.
    Run {
        /// Path to memroute.toml.
        #[arg(long, default_value = "memroute.toml")]
        config: PathBuf,

        /// Stats logging interval in seconds.
        #[arg(long, default_value = "60")]
        stats_interval: u64,
    },
    /// Print the preference-ordered hosts for each key as JSON.
    Route {
        #[arg(long, default_value = "memroute.toml")]
        config: PathBuf,

        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print how keys split into per-request groups as JSON.
    Divide {
        #[arg(long, default_value = "memroute.toml")]
        config: PathBuf,

        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print a starter memroute.toml.
    Init {
        /// Scheduler kind: mod, consistent, manual or auto.
        #[arg(long, default_value = "auto")]
        kind: SchedulerKind,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            stats_interval,
        } => daemon::run(&config, stats_interval).await,
        Command::Route { config, keys } => {
            let scheduler = query::load(&config)?;
            println!("{}", serde_json::to_string_pretty(&query::route(scheduler.as_ref(), &keys))?);
            Ok(())
        }
        Command::Divide { config, keys } => {
            let scheduler = query::load(&config)?;
            println!("{}", serde_json::to_string_pretty(&query::divide(scheduler.as_ref(), &keys))?);
            Ok(())
        }
        Command::Init { kind } => {
            print!("{}", MemrouteConfig::scaffold(kind).to_toml_string()?);
            Ok(())
        }
    }
}
