//! CLI binary entry point for scd-merge

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use scd_merge::cli::commands::history::handle_check_history;
#[cfg(feature = "cli")]
use scd_merge::cli::commands::merge::{MergeArgs, handle_merge};
#[cfg(feature = "cli")]
use scd_merge::cli::commands::validate::handle_validate;
#[cfg(feature = "cli")]
use scd_merge::config::sample_config;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "scd-merge")]
#[command(about = "Merge source batches into slowly changing dimension tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Merge a source batch into a dimension snapshot
    Merge {
        /// Source batch (JSON array of records)
        #[arg(short, long)]
        source: PathBuf,
        /// Current dimension snapshot (JSON array of records); empty when omitted
        #[arg(short, long)]
        target: Option<PathBuf>,
        /// Merge date, YYYY-MM-DD
        #[arg(long)]
        as_of: String,
        /// Configuration file (default: ./scd-merge.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Column policy in YAML, replacing the configured policy
        #[arg(short, long)]
        policy: Option<PathBuf>,
        /// Output file for the merged snapshot (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the merge report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a column policy, optionally against a source batch
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        policy: Option<PathBuf>,
        /// Source batch to check against the policy
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
    /// Check effective intervals and current flags of a dimension snapshot
    CheckHistory {
        /// Dimension snapshot (JSON array of records)
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },
    /// Print a sample scd-merge.toml
    SampleConfig,
}

#[cfg(feature = "cli")]
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scd_merge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Merge {
            source,
            target,
            as_of,
            config,
            policy,
            output,
            report,
        } => {
            let args = MergeArgs {
                source,
                target,
                config,
                policy,
                as_of,
                output,
                report,
            };
            handle_merge(&args)
                .with_context(|| format!("merging {}", args.source.display()))?;
        }
        Commands::Validate {
            config,
            policy,
            source,
        } => {
            handle_validate(config.as_deref(), policy.as_deref(), source.as_deref())
                .context("validating policy")?;
        }
        Commands::CheckHistory {
            input,
            config,
            policy,
        } => {
            handle_check_history(&input, config.as_deref(), policy.as_deref())
                .with_context(|| format!("checking {}", input.display()))?;
        }
        Commands::SampleConfig => print!("{}", sample_config()),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
