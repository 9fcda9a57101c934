//! ferry - transfer local file trees to object storage
//!
//! This crate provides the main CLI application for ferry, including:
//! - One-shot transfer runs described by a TOML profile
//! - Profile validation without touching any backend
//! - Backend selection (S3, GCS, Azure, local directory)
//! - Cooperative cancellation on Ctrl-C

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferry_cloud::BlobObjectFactory;
use ferry_core::{Handler, Profile};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// ferry - declarative file-tree to object-storage transfers
///
/// Ferry walks the input roots of a transfer profile, derives a
/// destination key for every file, and uploads them under a bounded
/// concurrency budget. Large files go through a retryable multipart
/// protocol.
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about = "Transfer local file trees to object storage", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transfer described by a profile
    Run {
        /// Transfer profile (TOML)
        profile: PathBuf,

        /// Override the profile's worker concurrency bound
        #[arg(long)]
        max_uploads: Option<usize>,
    },

    /// Validate a profile without transferring anything
    Check {
        /// Transfer profile (TOML)
        profile: PathBuf,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match execute(cli.command).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            error!("{err:#}");
            process::exit(2);
        }
    }
}

async fn execute(command: Commands) -> Result<i32> {
    match command {
        Commands::Check { profile: path } => {
            let profile = Profile::from_file(&path)
                .with_context(|| format!("failed to load profile {}", path.display()))?;
            info!(
                bucket = %profile.bucket.name,
                files = profile.inputs.files.len(),
                directories = profile.inputs.directories.len(),
                "profile is valid"
            );
            Ok(0)
        }

        Commands::Run {
            profile: path,
            max_uploads,
        } => {
            let mut profile = Profile::from_file(&path)
                .with_context(|| format!("failed to load profile {}", path.display()))?;
            if let Some(max) = max_uploads {
                profile.options.max_uploads = max;
                profile.validate()?;
            }

            let cancel = CancellationToken::new();
            let operator = ferry_cloud::connect(&profile.bucket, &profile.options, cancel.clone())
                .context("failed to initialize the storage backend")?;
            let factory = Arc::new(BlobObjectFactory::from_profile(&profile));
            let handler = Handler::new(profile, operator, factory)?;

            // Ctrl-C stops new jobs and cancels in-flight multipart
            // lanes instead of abandoning them mid-transfer.
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, finishing in-flight jobs");
                    interrupt.cancel();
                }
            });

            let stats = handler.run(cancel).await?;
            println!("{}", stats.summary());
            Ok(if stats.failed > 0 { 1 } else { 0 })
        }
    }
}
