use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gitback::orphan::OrphanResult;
use gitback::remote::UpdateResult;
use gitback::{Backup, Config, ErrorLog, GitCli, Reporter, SyncResult};

#[derive(Parser)]
#[command(name = "gitback")]
#[command(about = "Utility to backup your git(Hub|Lab) accounts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load configuration from FILE
    #[arg(short, long, value_name = "FILE", default_value = "./config.yml", global = true)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append per-repository errors to FILE
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up all repositories the configured accounts can access
    #[command(alias = "b")]
    Backup,

    /// List what would be backed up and validate the configuration
    #[command(alias = "c")]
    Check,

    /// Point existing mirrors at their current clone URL
    #[command(alias = "u")]
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting gitback v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    debug!("Using config: {:?}", config);

    let mut backup = Backup::new(&config)?;

    match cli.command {
        Commands::Backup => cmd_backup(&mut backup, cli.log_file).await,
        Commands::Check => cmd_check(&mut backup, cli.log_file).await,
        Commands::Update => cmd_update(&mut backup, cli.log_file).await,
    }
}

/// Log at info, or debug with `--verbose`; `RUST_LOG` wins when set
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn reporter(log_file: Option<PathBuf>) -> Result<Reporter> {
    let error_log = log_file.map(|path| ErrorLog::open(&path)).transpose()?;
    Ok(Reporter::new(error_log))
}

/// Mirror every catalog repository and handle orphans
async fn cmd_backup(backup: &mut Backup, log_file: Option<PathBuf>) -> Result<()> {
    let mut reporter = reporter(log_file)?;
    let report = backup.backup(GitCli::new(), &mut reporter).await?;
    let summary = &report.sync;

    println!("\nBackup complete");
    println!("   Total repositories: {}", summary.total_repositories);
    println!("   Successful operations: {}", summary.successful_operations);
    println!("   Failed operations: {}", summary.failed_operations);
    println!("   Broken recoveries: {}", summary.broken_operations);
    println!("   Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed_operations + summary.broken_operations > 0 {
        println!("\nFailed operations:");
        for result in &summary.results {
            match result {
                SyncResult::Failed { path, error } => println!("   {}: {}", path.display(), error),
                SyncResult::RecoveryFailed(err) => println!("   {}", err),
                _ => {}
            }
        }
    }

    if !report.orphans.is_empty() {
        let failed = report
            .orphans
            .iter()
            .filter(|r| matches!(r, OrphanResult::Failed { .. }))
            .count();
        println!(
            "\nOrphaned mirrors handled: {} ({} failed)",
            report.orphans.len(),
            failed
        );
    }

    Ok(())
}

/// Print the catalog table
async fn cmd_check(backup: &mut Backup, log_file: Option<PathBuf>) -> Result<()> {
    let mut reporter = reporter(log_file)?;
    let catalog = backup.check(&mut reporter).await?;
    print!("{}", catalog.render_table());
    Ok(())
}

/// Repair stale origin URLs
async fn cmd_update(backup: &mut Backup, log_file: Option<PathBuf>) -> Result<()> {
    let mut reporter = reporter(log_file)?;
    let results = backup.update(GitCli::new(), &mut reporter).await?;

    let mut updated = 0;
    let mut failed = 0;
    for result in &results {
        match result {
            UpdateResult::Updated { path, .. } => {
                updated += 1;
                println!("   updated {}", path.display());
            }
            UpdateResult::Failed { path, error } => {
                failed += 1;
                println!("   failed {}: {}", path.display(), error);
            }
            UpdateResult::Unchanged { .. } => {}
        }
    }

    println!(
        "\nRemotes checked: {}, updated: {}, failed: {}",
        results.len(),
        updated,
        failed
    );
    Ok(())
}
