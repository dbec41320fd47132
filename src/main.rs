use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use vulnworker::{
    cache::Cache,
    config::Config,
    dbdiff::diff_dbs,
    output::{print_updates, OutputFormat},
    repo::GitRepository,
    store::{JsonFileStore, Store},
    triage::PkgsiteTriage,
    worker::{update_to_commit, CancelHandle, Cancellation, UpdateOptions},
};

/// Exit codes for scheduler integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const BLOCKED: u8 = 2;
    pub const INTERRUPTED: u8 = 130;
}

#[derive(Parser)]
#[command(name = "vulnworker")]
#[command(
    author,
    version,
    about = "Keep a vulnerability store in sync with an advisory repository"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the store to a commit of the advisory repository
    Update {
        /// Commit hash or revision (e.g. HEAD)
        commit: String,

        /// Repository path or URL
        #[arg(short, long)]
        repo: Option<String>,

        /// Store directory
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Base URL of the pkgsite instance used for triage
        #[arg(long)]
        pkgsite_url: Option<String>,

        /// Skip the consistency check against the update history
        #[arg(long)]
        force: bool,

        /// Cancel the update after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// List recent update attempts, newest first
    ListUpdates {
        /// Store directory
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Number of records to show (0 for all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Compare two exported databases
    Dbdiff {
        db_a: PathBuf,
        db_b: PathBuf,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the pkgsite lookup cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Update {
            commit,
            repo,
            store,
            pkgsite_url,
            force,
            timeout_secs,
        } => {
            let repo = repo
                .or_else(|| config.repo_location.clone())
                .ok_or_else(|| {
                    anyhow!(
                        "no repository given; pass --repo or set repo_location in {}",
                        Config::config_path().display()
                    )
                })?;
            let store = store.unwrap_or_else(|| config.store_path());
            let pkgsite_url = pkgsite_url.unwrap_or_else(|| config.pkgsite_url.clone());
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .or_else(|| config.update_timeout());

            run_update(&config, commit, repo, store, pkgsite_url, force, timeout).await
        }
        Commands::ListUpdates {
            store,
            limit,
            format,
        } => {
            let format = OutputFormat::from_str(&format).map_err(|e| anyhow!(e))?;
            let store = JsonFileStore::new(store.unwrap_or_else(|| config.store_path()));
            let records = store
                .list_commit_update_records(limit.unwrap_or(config.history_limit))
                .await?;
            print_updates(&records, format)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Dbdiff { db_a, db_b } => {
            print!("{}", diff_dbs(&db_a, &db_b)?);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::new();
            cache.clear()?;
            println!("Cache cleared.");
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_update(
    config: &Config,
    commit: String,
    repo_location: String,
    store_path: PathBuf,
    pkgsite_url: String,
    force: bool,
    timeout: Option<Duration>,
) -> Result<u8> {
    let progress = if std::io::stderr().is_terminal() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Opening {}...", repo_location));
        Some(pb)
    } else {
        None
    };

    let repo = GitRepository::clone_or_open(&repo_location).await?;
    info!(location = repo.location(), "repository opened");

    let store = JsonFileStore::new(store_path);
    let triage = PkgsiteTriage::new(pkgsite_url)
        .with_cache(Cache::with_ttl_hours(config.cache_ttl_hours));

    let (handle, mut cancel) = Cancellation::new();
    if let Some(timeout) = timeout {
        cancel = cancel.with_timeout(timeout);
    }
    tokio::spawn(watch_interrupts(handle));

    let options = UpdateOptions::default()
        .force(force)
        .concurrency(config.triage_concurrency)
        .cancel(cancel);

    if let Some(ref pb) = progress {
        pb.set_message(format!("Updating to {}...", commit));
    }

    let result = update_to_commit(&repo, &commit, &store, &triage, &options).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    match result {
        Ok(record) => {
            println!(
                "Updated to commit {} ({} advisories: {} added, {} modified)",
                record.commit_hash, record.num_processed, record.num_added, record.num_modified
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) if e.is_recoverable_with_force() => {
            eprintln!("{}", e);
            eprintln!("Re-run with --force to update anyway.");
            Ok(exit_codes::BLOCKED)
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancels the update on the first Ctrl-C and exits on the second, since
/// a blocking repository read can keep the update from stopping.
async fn watch_interrupts(handle: CancelHandle) {
    let interrupts = futures::stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
    });
    if handle.cancel_on(interrupts).await {
        warn!("second interrupt received, exiting");
        std::process::exit(exit_codes::INTERRUPTED.into());
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'vulnworker config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
