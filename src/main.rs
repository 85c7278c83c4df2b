//! kb-harvester main entry point
//!
//! This is the command-line interface for the knowledge-base harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kb_harvester::config::{load_config_with_hash, Config, SourceKind};
use kb_harvester::output::{print_statistics, write_document};
use kb_harvester::run::{crawl_site, process_pdf_file, run_config, select_sources, RunOutcome};
use kb_harvester::Scope;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// kb-harvester: a scoped, adaptive content harvester
///
/// Crawls blog and documentation sections, escalating fetch strategies
/// when sites push back, and normalizes pages and PDF chapters into a
/// single JSON knowledge-base document.
#[derive(Parser, Debug)]
#[command(name = "kb-harvester")]
#[command(version)]
#[command(about = "A scoped, adaptive content harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every source in a configuration file
    Run {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Harvest only the named source (repeatable)
        #[arg(long = "source", value_name = "NAME")]
        sources: Vec<String>,

        /// Output path, overriding the configured one
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Crawl one site from a seed URL
    Crawl {
        #[arg(value_name = "URL")]
        url: String,

        /// Path prefix to stay under; inferred from the URL if absent
        #[arg(long)]
        scope: Option<String>,

        /// Configuration file for crawler and fetch settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        team_id: Option<String>,

        /// Page budget
        #[arg(long)]
        max_pages: Option<u32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split one PDF into chapter items
    Pdf {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        team_id: Option<String>,

        /// Author stamped on every chapter
        #[arg(long)]
        author: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file and show what would be harvested
    Check {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kb_harvester=info,warn"),
            1 => EnvFilter::new("kb_harvester=debug,info"),
            2 => EnvFilter::new("kb_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn dispatch(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Run {
            config,
            sources,
            output,
        } => {
            let mut config = load(&config)?;
            select_sources(&mut config, &sources)?;
            let output = output_path(output, &config);
            let outcome = run_config(config, interrupt_token()).await?;
            finish(outcome, &output)
        }
        Command::Crawl {
            url,
            scope,
            config,
            team_id,
            max_pages,
            output,
        } => {
            let mut config = load_optional(config.as_deref(), team_id)?;
            if max_pages.is_some() {
                config.crawler.max_pages = max_pages;
            }
            let output = output_path(output, &config);
            let outcome = crawl_site(config, &url, scope, interrupt_token()).await?;
            finish(outcome, &output)
        }
        Command::Pdf {
            file,
            config,
            team_id,
            author,
            output,
        } => {
            let config = load_optional(config.as_deref(), team_id)?;
            let output = output_path(output, &config);
            let outcome = process_pdf_file(config, &file, author, interrupt_token()).await?;
            finish(outcome, &output)
        }
        Command::Check { config } => {
            let config = load(&config)?;
            Ok(handle_check(&config))
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

fn load_optional(path: Option<&Path>, team_id: Option<String>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => load(path)?,
        None => Config::default(),
    };
    if let Some(team_id) = team_id {
        config.team_id = team_id;
    }
    Ok(config)
}

fn output_path(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.output.path))
}

/// Token cancelled on Ctrl-C; in-flight pages finish and the partial
/// document is still written
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            token.cancel();
        }
    });
    cancel
}

/// Writes the document, prints statistics, and picks the exit status
fn finish(outcome: RunOutcome, output: &Path) -> anyhow::Result<ExitCode> {
    write_document(&outcome.document, output)?;
    print_statistics(&outcome.summary);

    if outcome.has_config_errors() {
        for (name, error) in &outcome.config_errors {
            tracing::error!("Source '{}' could not run: {}", name, error);
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Handles `check`: shows the resolved plan without fetching anything
fn handle_check(config: &Config) -> ExitCode {
    println!("=== kb-harvester Plan ===\n");
    println!("Team: {}", config.team_id);

    println!("\nCrawler Configuration:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max depth: {}", display_limit(config.crawler.max_depth));
    println!("  Max pages per source: {}", display_limit(config.crawler.max_pages));
    println!(
        "  Max duration per source: {}",
        display_limit(config.crawler.max_duration_secs.map(|s| format!("{}s", s)))
    );
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Use sitemaps: {}", config.crawler.use_sitemaps);
    println!("  Use feeds: {}", config.crawler.use_feeds);

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Retry attempts per strategy: {}", config.fetch.retry_attempts);
    println!("  Minimum text chars: {}", config.fetch.min_text_chars);
    println!("  Browser rendering: {}", config.fetch.browser);
    println!("  User agent: {}", config.fetch.user_agent);

    println!("\nOutput: {}", config.output.path);

    println!("\nPlugins ({}):", config.plugins.len());
    for plugin in &config.plugins {
        println!("  - {} (content: {})", plugin.name, plugin.content_selector);
    }

    println!("\nSources ({}):", config.sources.len());
    let mut problems = 0;
    for source in &config.sources {
        match source.kind {
            SourceKind::Web => {
                let resolved = Url::parse(&source.origin)
                    .map_err(|e| e.to_string())
                    .and_then(|seed| {
                        Scope::resolve(&seed, source.scope_prefix.as_deref()).map_err(|e| e.to_string())
                    });
                match resolved {
                    Ok(scope) => println!(
                        "  ✓ {} [{}] {} (scope {}{})",
                        source.name,
                        source.content_type(),
                        source.origin,
                        scope.prefix(),
                        if source.crawl { "" } else { ", single page" }
                    ),
                    Err(e) => {
                        problems += 1;
                        println!("  ✗ {}: {}", source.name, e);
                    }
                }
            }
            SourceKind::Pdf => {
                if Path::new(&source.origin).is_file() {
                    println!("  ✓ {} [{}] {}", source.name, source.content_type(), source.origin);
                } else {
                    problems += 1;
                    println!("  ✗ {}: file not found: {}", source.name, source.origin);
                }
            }
        }
    }

    if problems > 0 {
        println!("\n✗ {} source(s) would fail", problems);
        ExitCode::FAILURE
    } else {
        println!("\n✓ Configuration is valid");
        ExitCode::SUCCESS
    }
}

fn display_limit<T: std::fmt::Display>(limit: Option<T>) -> String {
    limit.map_or_else(|| "unbounded".to_string(), |v| v.to_string())
}
