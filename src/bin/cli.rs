use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use secrets_audit::{build_phases, AuditConfig, AuditError, AuditReport, Inventory, JsonlSource, Reporter, ResourceKind};

#[derive(Parser)]
#[command(name = "secrets-audit")]
#[command(about = "Verify that every stored secret can be read back, with a durable log and JSON failure report")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// YAML config file; command-line options override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append-only run log
    #[arg(long, env = "SECRETS_AUDIT_LOG")]
    log: Option<PathBuf>,

    /// JSON failure report (removed when a run has no failures)
    #[arg(long, env = "SECRETS_AUDIT_REPORT")]
    report: Option<PathBuf>,

    /// Directory holding the exported JSONL inventory
    #[arg(short, long, env = "SECRETS_AUDIT_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Do not mirror the log to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored console output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the audit (default)
    Run {
        /// Audit only these resource kinds (repeatable)
        #[arg(long, value_enum)]
        only: Vec<ResourceKind>,

        /// Run phases on worker threads
        #[arg(long)]
        concurrent: bool,
    },

    /// List audit phases and their inventory shards
    Phases,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("secrets_audit=debug,info")
    } else {
        EnvFilter::new("secrets_audit=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(Some(report)) if report.has_failures() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(2)
        }
    }
}

fn print_error(err: &AuditError) {
    eprintln!("\x1b[31m✗ Error:\x1b[0m {}", err);
}

async fn run(cli: Cli) -> Result<Option<AuditReport>, AuditError> {
    let mut config = match &cli.config {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };

    if let Some(log) = cli.log {
        config.log_path = log;
    }
    if let Some(report) = cli.report {
        config.report_path = report;
    }
    if let Some(inventory) = cli.inventory {
        config.inventory_dir = inventory;
    }
    if cli.quiet {
        config.console = false;
    }

    match cli.command {
        None => cmd_run(config).await.map(Some),

        Some(Commands::Run { only, concurrent }) => {
            if !only.is_empty() {
                config.only = only;
            }
            config.concurrent |= concurrent;
            cmd_run(config).await.map(Some)
        }

        Some(Commands::Phases) => {
            cmd_phases(&config);
            Ok(None)
        }
    }
}

async fn cmd_run(config: AuditConfig) -> Result<AuditReport, AuditError> {
    config.validate()?;
    debug!(?config, "resolved configuration");

    let inventory = Inventory::new(&config.inventory_dir);
    let orchestrator = build_phases(&inventory, &config.kinds(), config.preview_len);

    let mut reporter = Reporter::open(&config.log_path, &config.report_path)?;
    if config.console {
        reporter = reporter.with_stdout();
    }

    info!(
        inventory = %config.inventory_dir.display(),
        phases = orchestrator.len(),
        "audit starting"
    );

    let report = if config.concurrent {
        orchestrator.run_concurrent(reporter).await?
    } else {
        tokio::task::spawn_blocking(move || orchestrator.run(reporter))
            .await
            .map_err(|e| AuditError::Worker(e.to_string()))??
    };

    if report.has_failures() {
        eprintln!(
            "\x1b[33m⚠ {} of {} checks failed; details in {}\x1b[0m",
            report.failures(),
            report.total_checks(),
            config.report_path.display()
        );
    }

    Ok(report)
}

fn cmd_phases(config: &AuditConfig) {
    println!("Inventory: {}", config.inventory_dir.display());
    println!();

    for kind in config.kinds() {
        let shards = JsonlSource::<()>::new(&config.inventory_dir, kind.stem()).shards();
        let status = match shards {
            Ok(shards) => format!("{} shard(s)", shards.len()),
            Err(e) => format!("unavailable: {e}"),
        };
        println!("  {:<18} {:<36} {}", kind.stem(), kind.label(), status);
    }
}
