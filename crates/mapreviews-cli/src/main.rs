// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! mapreviews: scrape Google Maps reviews by URL, search query or batch CSV.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use mapreviews::resolver::resolve;
use mapreviews::{Orchestrator, ScrapeConfig, ScrapeJob, TargetSpec};
use mapreviews_cli::output::{self, OutputFormat};
use mapreviews_cli::{doctor, input, run};

#[derive(Parser)]
#[command(
    name = "mapreviews",
    about = "Extract Google Maps reviews by URL, search query or batch CSV",
    version
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON config file (also read from MAPREVIEWS_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output file. Defaults to google_maps_reviews_<timestamp>.<ext>.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "csv", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Chromium executable.
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Browser profile (user-data) directory.
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long, global = true)]
    headful: bool,

    /// Seconds between place navigations (minimum 20).
    #[arg(long, global = true)]
    min_delay_secs: Option<u64>,

    /// Scroll attempt ceiling per place.
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Disable the progress bar.
    #[arg(short, long, global = true)]
    quiet: bool,
}

impl GlobalArgs {
    fn apply(&self, config: &mut ScrapeConfig) {
        if let Some(ref chrome) = self.chrome {
            config.browser.executable = Some(chrome.clone());
        }
        if let Some(ref dir) = self.profile_dir {
            config.browser.profile_dir = Some(dir.clone());
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(secs) = self.min_delay_secs {
            config.batch.min_delay_secs = secs;
        }
        if let Some(n) = self.max_attempts {
            config.loader.max_attempts = n;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one place by its Google Maps link.
    Url {
        url: String,
        /// Number of reviews wanted.
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Search for a place by name and address, then scrape it.
    Search {
        query: String,
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Scrape every row of a CSV file (URL column, or name/address columns).
    Batch {
        csv: PathBuf,
        /// Default count for rows without a count column.
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Print the canonical URL for an input without opening a browser.
    Resolve { input: String },

    /// Check that a browser can be found and the config is usable.
    Doctor,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   mapreviews completions bash > ~/.local/share/bash-completion/completions/mapreviews
    ///   mapreviews completions zsh > ~/.zfunc/_mapreviews
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.global.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ScrapeConfig::load(cli.global.config.as_deref())?;
    cli.global.apply(&mut config);
    let default_count = config.batch.default_count;

    let jobs = match cli.command {
        Commands::Url { url, count } => {
            vec![ScrapeJob::new(
                TargetSpec::Url(url),
                count.unwrap_or(default_count),
            )]
        }
        Commands::Search { query, count } => {
            vec![ScrapeJob::new(
                TargetSpec::Search(query),
                count.unwrap_or(default_count),
            )]
        }
        Commands::Batch { csv, count } => {
            let jobs = input::read_jobs(&csv, count.unwrap_or(default_count))
                .with_context(|| format!("reading {}", csv.display()))?;
            if jobs.is_empty() {
                bail!("{} has no rows", csv.display());
            }
            jobs
        }
        Commands::Resolve { input } => {
            let place = resolve(&TargetSpec::classify(&input), &config.resolver.language)?;
            println!("{}", place.canonical_url);
            if let Some(cid) = place.cid {
                eprintln!("cid: {cid}");
            }
            return Ok(());
        }
        Commands::Doctor => {
            if !doctor::run(&config) {
                std::process::exit(1);
            }
            return Ok(());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "mapreviews",
                &mut std::io::stdout(),
            );
            return Ok(());
        }
    };

    let path = cli
        .global
        .output
        .clone()
        .unwrap_or_else(|| output::default_path(cli.global.format, chrono::Local::now()));

    let orchestrator = Orchestrator::launch(config)
        .await
        .context("failed to launch Chromium (try `mapreviews doctor`)")?;

    let show_progress = !cli.global.quiet && std::io::stderr().is_terminal();
    let batch = run::run_interruptible(orchestrator, jobs, show_progress).await;

    output::write(&batch, cli.global.format, &path)?;
    for line in output::summary_lines(&batch) {
        eprintln!("{line}");
    }

    let summary = batch.summary();
    eprintln!(
        "{} reviews from {}/{} places written to {}",
        summary.reviews,
        summary.succeeded,
        summary.total,
        path.display()
    );

    if summary.succeeded == 0 {
        bail!("every job failed");
    }
    Ok(())
}
