//! mysql2yasdb CLI - MySQL to YashanDB data sync and verification.

use clap::{Parser, Subcommand};
use mysql2yasdb::{CheckReport, Config, MigrateError, Orchestrator, SyncReport, TunableOverrides};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mysql2yasdb")]
#[command(about = "Parallel MySQL to YashanDB data sync and verification")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy table data from MySQL into existing YashanDB tables
    Sync {
        /// Tables synced concurrently (max 8)
        #[arg(short = 'p', long)]
        parallel: Option<usize>,

        /// Chunk workers per table (max 8)
        #[arg(short = 't', long)]
        parallel_per_table: Option<usize>,

        /// Rows per commit
        #[arg(short = 'b', long)]
        batch_size: Option<usize>,
    },

    /// Compare row counts and sampled rows between MySQL and YashanDB
    Check {
        /// Tables checked concurrently (max 8)
        #[arg(short = 'p', long)]
        parallel: Option<usize>,

        /// Rows sampled per table, 0 for the whole table
        #[arg(short = 's', long)]
        sample_lines: Option<usize>,

        /// Compare row counts only
        #[arg(long)]
        rows_only: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Sync {
            parallel,
            parallel_per_table,
            batch_size,
        } => {
            let overrides = TunableOverrides {
                parallel,
                parallel_per_table,
                batch_size,
                ..Default::default()
            };
            let tunables = config.sync.resolve(&overrides)?;
            let orchestrator = Orchestrator::new(config, tunables).await?;
            let report = orchestrator.sync().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_sync_report(&report);
            }
        }

        Commands::Check {
            parallel,
            sample_lines,
            rows_only,
        } => {
            let overrides = TunableOverrides {
                parallel,
                sample_lines,
                rows_only,
                ..Default::default()
            };
            let tunables = config.sync.resolve(&overrides)?;
            let orchestrator = Orchestrator::new(config, tunables).await?;
            let report = orchestrator.check().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_check_report(&report);
            }
        }

        Commands::HealthCheck => {
            let tunables = config.sync.resolve(&TunableOverrides::default())?;
            let orchestrator = Orchestrator::new(config, tunables).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref version) = result.source_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (YashanDB): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref version) = result.target_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::pool("health check failed", "health-check"));
            }
        }
    }

    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    println!("\nSync completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Parallelism: {} tables x {} workers, batch size {}",
        report.tunables.parallel, report.tunables.parallel_per_table, report.tunables.batch_size
    );
    println!("\n  {:<40} {:>12} {:>10} {:>10}", "TABLE", "ROWS", "FAILED", "SECONDS");
    for table in &report.tables {
        println!(
            "  {:<40} {:>12} {:>10} {:>10.2}",
            table.name(),
            table.rows_migrated,
            table.rows_failed,
            table.duration_seconds
        );
        if let Some(ref err) = table.error {
            println!("    Error: {}", err);
        }
    }
    println!(
        "\n  Tables: {} clean, {} with failed rows, {} skipped (of {})",
        report.clean.len(),
        report.with_differences.len(),
        report.skipped.len(),
        report.tables_total
    );
    println!("  Rows: {} migrated, {} failed", report.rows_migrated, report.rows_failed);
    println!("  Throughput: {} rows/sec", report.rows_per_second);
    if !report.skipped.is_empty() {
        println!("  Skipped tables: {:?}", report.skipped);
    }
}

fn print_check_report(report: &CheckReport) {
    println!("\nCheck completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "\n  {:<40} {:>12} {:>12} {:>8} {:>8}",
        "TABLE", "SOURCE", "TARGET", "CHECKED", "ERRORS"
    );
    for table in &report.tables {
        println!(
            "  {:<40} {:>12} {:>12} {:>8} {:>8}",
            table.name(),
            table.source_rows,
            table.target_rows,
            table.rows_checked,
            table.error_count()
        );
        if let Some(ref err) = table.error {
            println!("    Error: {}", err);
        }
    }
    println!("\n  Tables in sync: {}", report.clean.len());
    println!("  Tables with differences: {}", report.with_differences.len());
    println!("  Tables skipped: {}", report.skipped.len());
    if !report.with_differences.is_empty() {
        println!("  Differences: {:?}", report.with_differences);
    }
    if !report.skipped.is_empty() {
        println!("  Skipped: {:?}", report.skipped);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}', expected text or json", other)),
    }

    Ok(())
}
