//! Sumi-Audit main entry point
//!
//! This is the command-line interface for the Sumi-Audit site audit engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sumi_audit::config::{load_config_with_hash, Config};
use sumi_audit::output::{
    print_audit_list, print_batch_report, print_scores, print_snapshot, write_report,
};
use sumi_audit::storage::{lock, AuditStore};
use sumi_audit::{AuditEngine, AuditStatus, Reconciliation};
use tracing_subscriber::EnvFilter;

/// Sumi-Audit: a batch-resumable site audit engine
///
/// Sumi-Audit crawls a single site within bounded batches, runs SEO,
/// AI-readiness and technical checks on every page it finds, and scores
/// the results.
#[derive(Parser, Debug)]
#[command(name = "sumi-audit")]
#[command(version = "1.0.0")]
#[command(about = "A batch-resumable site audit engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the audit plan without touching the database
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an audit and run batches until it finishes
    Run {
        /// Site to audit
        url: String,
    },
    /// Create an audit and run its first batch
    Start {
        /// Site to audit
        url: String,
    },
    /// Run the next batch of an audit waiting in batch_complete
    Continue {
        /// Audit ID
        id: i64,
    },
    /// Show an audit's status, resuming or failing it if it went stale
    Status {
        /// Audit ID
        id: i64,
    },
    /// Stop an audit and finalize partial scores
    Stop {
        /// Audit ID
        id: i64,
    },
    /// Write the markdown report of an audit to the report directory
    Report {
        /// Audit ID
        id: i64,
    },
    /// List the most recent audits
    List {
        /// Maximum number of audits to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.command.as_ref());
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given; see --help");
    };

    let engine = AuditEngine::open(config, config_hash)?;
    match command {
        Command::Run { url } => handle_run(&engine, &url).await,
        Command::Start { url } => handle_start(&engine, &url).await,
        Command::Continue { id } => handle_continue(&engine, id).await,
        Command::Status { id } => handle_status(&engine, id).await,
        Command::Stop { id } => handle_stop(&engine, id),
        Command::Report { id } => handle_report(&engine, id),
        Command::List { limit } => {
            print_audit_list(&engine.list_audits(limit)?);
            Ok(())
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
            0 => EnvFilter::new("sumi_audit=info,warn"),
            1 => EnvFilter::new("sumi_audit=debug,info"),
            2 => EnvFilter::new("sumi_audit=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &Config, command: Option<&Command>) {
    println!("=== Sumi-Audit Dry Run ===\n");

    println!("Audit Budgets:");
    println!("  Max pages: {}", config.audit.max_pages);
    println!("  Pages per batch: {}", config.audit.pages_per_batch);
    println!("  Batch time budget: {}s", config.audit.batch_time_budget_secs);
    println!("  Fetch concurrency: {}", config.audit.fetch_concurrency);
    println!("  Request timeout: {}s", config.audit.request_timeout_secs);
    println!("  Stale after: {}s", config.audit.stale_after_secs);
    println!("  Resume after: {}s", config.audit.resume_after_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Reports: {}", config.output.report_dir);

    println!("\n✓ Configuration is valid");
    if let Some(Command::Run { url } | Command::Start { url }) = command {
        let batches = config
            .audit
            .max_pages
            .div_ceil(config.audit.pages_per_batch.max(1));
        println!(
            "✓ Would audit {} in at most {} batches of {} pages",
            url, batches, config.audit.pages_per_batch
        );
    }
}

/// Handles `run`: creates an audit and drives it to a terminal status
async fn handle_run(engine: &AuditEngine, url: &str) -> anyhow::Result<()> {
    let audit_id = engine.create_audit(url)?;
    println!("Audit {} created for {}\n", audit_id, url);

    let snapshot = engine.drive(audit_id).await?;
    print_snapshot(&snapshot);
    write_audit_report(engine, audit_id)
}

/// Handles `start`: creates an audit and runs its first batch
///
/// The batch runs in the foreground so it is not lost when the process exits.
async fn handle_start(engine: &AuditEngine, url: &str) -> anyhow::Result<()> {
    let audit_id = engine.create_audit(url)?;
    println!("Audit {} created for {}", audit_id, url);

    engine.claim_batch(audit_id)?;
    let report = engine.run_batch(audit_id).await?;
    print_batch_report(&report);
    Ok(())
}

/// Handles `continue`: runs the next batch of a batch_complete audit
async fn handle_continue(engine: &AuditEngine, audit_id: i64) -> anyhow::Result<()> {
    let status = lock(&engine.storage())?.get_status(audit_id)?;
    if status != AuditStatus::BatchComplete {
        anyhow::bail!("audit {} cannot be continued while {}", audit_id, status);
    }

    engine.claim_batch(audit_id)?;
    let report = engine.run_batch(audit_id).await?;
    print_batch_report(&report);
    if let Some(scores) = &report.scores {
        println!();
        print_scores(scores);
    }
    Ok(())
}

/// Handles `status`: reconciles staleness, runs a resumed batch, then prints
async fn handle_status(engine: &AuditEngine, audit_id: i64) -> anyhow::Result<()> {
    match engine.reconcile_staleness(audit_id)? {
        Reconciliation::Resumed { batch_number } => {
            println!("Audit {} was idle; running batch {}", audit_id, batch_number);
            let report = engine.run_batch(audit_id).await?;
            print_batch_report(&report);
            println!();
        }
        Reconciliation::Failed => println!("Audit {} timed out and was marked failed\n", audit_id),
        Reconciliation::Unchanged => {}
    }

    print_snapshot(&engine.read_status(audit_id)?);
    Ok(())
}

/// Handles `stop`: cancels the audit and prints its partial scores
fn handle_stop(engine: &AuditEngine, audit_id: i64) -> anyhow::Result<()> {
    let scores = engine.stop(audit_id)?;
    println!("Audit {} stopped\n", audit_id);
    print_scores(&scores);
    Ok(())
}

/// Handles `report`: writes the markdown report
fn handle_report(engine: &AuditEngine, audit_id: i64) -> anyhow::Result<()> {
    write_audit_report(engine, audit_id)
}

fn write_audit_report(engine: &AuditEngine, audit_id: i64) -> anyhow::Result<()> {
    let snapshot = engine.read_status(audit_id)?;
    let results = lock(&engine.storage())?.list_check_results(audit_id)?;
    let path = write_report(&snapshot, &results, Path::new(&engine.config().output.report_dir))?;
    println!("✓ Report written to: {}", path.display());
    Ok(())
}
