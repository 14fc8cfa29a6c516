//! simbatch CLI - reproducible batch simulation runs.
//!
//! Commands:
//! - `simbatch run` - Evaluate a model node for a range of batches
//! - `simbatch seeds` - Print the per-batch sub-seeds of a master seed

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ops::Range;
use tracing_subscriber::EnvFilter;

mod builtins;
mod commands;
mod model_file;

#[derive(Parser)]
#[command(name = "simbatch")]
#[command(about = "Reproducible batch simulation runs")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a model node for a range of batches
    Run {
        /// Path to the model file
        #[arg(short, long, default_value = "model.yaml")]
        model: String,

        /// Node to evaluate
        #[arg(short, long)]
        target: String,

        /// Batch indices, as `start..end` or a single index
        #[arg(short, long, default_value = "0..1", value_parser = parse_batches)]
        batches: Range<u64>,

        /// Master seed, overriding the model file
        #[arg(short, long, env = "SIMBATCH_SEED")]
        seed: Option<u64>,

        /// Items per batch, overriding the model file
        #[arg(long)]
        batch_size: Option<usize>,

        /// Output format (json or yaml)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Print the per-batch sub-seeds of a master seed
    Seeds {
        /// Master seed
        #[arg(short, long)]
        seed: u64,

        /// Number of batches the seed is derived for
        #[arg(long, default_value_t = simbatch_random::DEFAULT_MAX_BATCHES)]
        span: u64,

        /// Number of sub-seeds to print
        #[arg(short, long, default_value_t = 10)]
        count: u64,
    },
}

fn parse_batches(input: &str) -> Result<Range<u64>, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid batch index '{s}': {e}"))
    };
    match input.split_once("..") {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(format!("empty batch range: {input}"));
            }
            Ok(start..end)
        }
        None => {
            let index = parse(input)?;
            Ok(index..index + 1)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            model,
            target,
            batches,
            seed,
            batch_size,
            format,
        } => commands::run::run(&model, &target, batches, seed, batch_size, &format).await,
        Commands::Seeds { seed, span, count } => commands::seeds::run(seed, span, count),
    }
}
