// Copyright 2026 fbevents Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fbevents::cli::{doctor, scrape_cmd};
use fbevents::replay::RetryOptions;
use fbevents::scrape::ScrapeOptions;
use fbevents::source::SourceKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fbevents",
    about = "fbevents — harvest public Facebook event listings via GraphQL capture-and-replay",
    version,
    after_help = "Run 'fbevents <command> --help' for details on each command."
)]
struct Cli {
    /// Emit records as JSON only (no spinner, no summary)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape event listings from a source
    Scrape {
        /// Source identifier: event id, group name, page name, or search terms
        source: String,
        /// What kind of source the identifier names
        #[arg(long, value_enum)]
        kind: SourceKind,
        /// Process each page's nodes without waiting for the previous batch
        #[arg(long)]
        concurrent: bool,
        /// HTTP retry budget per request
        #[arg(long, default_value = "3")]
        retries: u32,
        /// Per-attempt HTTP timeout in milliseconds
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,
        /// Delay between retry attempts in milliseconds
        #[arg(long, default_value = "1000")]
        retry_delay_ms: u64,
        /// Write the collected records to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let result = match cli.command {
        Commands::Scrape {
            source,
            kind,
            concurrent,
            retries,
            timeout_ms,
            retry_delay_ms,
            out,
        } => {
            let options = ScrapeOptions {
                retry: RetryOptions {
                    http_retries: retries.max(1),
                    http_timeout_ms: timeout_ms,
                    http_retry_delay_ms: retry_delay_ms,
                },
                concurrent,
            };
            scrape_cmd::run(&source, kind, options, out.as_deref(), cli.json, cli.quiet).await
        }
        Commands::Doctor => doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fbevents", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "fbevents=debug,info"
    } else {
        "fbevents=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
