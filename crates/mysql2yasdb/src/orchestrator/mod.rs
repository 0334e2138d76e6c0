//! Run orchestrator - wires configuration, drivers and engines together.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{CatalogReader, UnitSelection};
use crate::config::{Config, Tunables};
use crate::core::identifier::TargetNaming;
use crate::core::schema::MigrationUnit;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{MysqlReader, YashanWriter};
use crate::error::Result;
use crate::sync::{SyncEngine, TableSyncResult};
use crate::verify::{ContentCheck, TableCompareResult, VerifyEngine};

/// Run orchestrator.
pub struct Orchestrator {
    config: Config,
    tunables: Tunables,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    naming: TargetNaming,
}

/// Result of a `sync` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unique run identifier.
    pub run_id: String,

    /// "completed" or "completed_with_errors".
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tunables the run used.
    pub tunables: Tunables,

    pub tables_total: usize,

    /// Rows committed on the target across all tables.
    pub rows_migrated: i64,

    /// Rows skipped after an insert failure.
    pub rows_failed: i64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,

    /// Tables synced without a single failed row.
    pub clean: Vec<String>,

    /// Tables where some rows failed.
    pub with_differences: Vec<String>,

    /// Tables with a table- or chunk-level failure.
    pub skipped: Vec<String>,

    pub tables: Vec<TableSyncResult>,
}

/// Result of a `check` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Unique run identifier.
    pub run_id: String,

    /// "in_sync" or "differences_found".
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tunables the run used.
    pub tunables: Tunables,

    pub tables_total: usize,

    /// Tables whose counts agree and whose sampled rows match.
    pub clean: Vec<String>,

    /// Tables with a count delta or at least one row or field mismatch.
    pub with_differences: Vec<String>,

    /// Tables that failed or had no usable key for content comparison.
    pub skipped: Vec<String>,

    pub tables: Vec<TableCompareResult>,
}

/// Connectivity of both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// Where a table lands in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Clean,
    Differs,
    Skipped,
}

fn classify_sync(result: &TableSyncResult) -> Outcome {
    if result.error.is_some() {
        Outcome::Skipped
    } else if result.rows_failed > 0 {
        Outcome::Differs
    } else {
        Outcome::Clean
    }
}

fn classify_check(result: &TableCompareResult) -> Outcome {
    if result.error.is_some() {
        Outcome::Skipped
    } else if !result.counts_match() || result.error_count() > 0 {
        Outcome::Differs
    } else if result.content == ContentCheck::SkippedNoKey {
        Outcome::Skipped
    } else {
        Outcome::Clean
    }
}

/// Split table names by outcome, keeping input order.
fn partition(
    outcomes: impl IntoIterator<Item = (String, Outcome)>,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut clean = Vec::new();
    let mut differs = Vec::new();
    let mut skipped = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Outcome::Clean => clean.push(name),
            Outcome::Differs => differs.push(name),
            Outcome::Skipped => skipped.push(name),
        }
    }
    (clean, differs, skipped)
}

impl Orchestrator {
    /// Open the MySQL pool and the YashanDB ODBC environment.
    ///
    /// The source pool is sized for `tunables`. Failure on either side is
    /// fatal to the run.
    pub async fn new(config: Config, tunables: Tunables) -> Result<Self> {
        let pool_size = config.source.pool_size(&tunables);
        let source = MysqlReader::new(&config.source, pool_size).await?;

        let target_config = config.target.clone();
        let target = tokio::task::spawn_blocking(move || YashanWriter::new(&target_config)).await??;

        Ok(Self::from_parts(config, tunables, Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over existing drivers.
    pub fn from_parts(
        config: Config,
        tunables: Tunables,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        let naming = TargetNaming::new(
            config.target.case_sensitive,
            &config.target.reserved_keywords,
        );
        Self {
            config,
            tunables,
            source,
            target,
            naming,
        }
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// Resolve the configured selection into migration units.
    pub async fn units(&self) -> Result<Vec<MigrationUnit>> {
        CatalogReader::new(self.source.clone())
            .resolve_units(&UnitSelection::from(&self.config))
            .await
    }

    /// Copy every resolved table from the source to the target.
    pub async fn sync(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting sync run: {} ({:?})", run_id, self.tunables);

        let units = self.units().await?;
        let engine = SyncEngine::new(
            self.source.clone(),
            self.target.clone(),
            self.naming.clone(),
            self.tunables.parallel_per_table,
            self.tunables.batch_size,
        );
        let tables = engine.sync_all(&units, self.tunables.parallel).await;

        let rows_migrated: i64 = tables.iter().map(|t| t.rows_migrated).sum();
        let rows_failed: i64 = tables.iter().map(|t| t.rows_failed).sum();
        let (clean, with_differences, skipped) =
            partition(tables.iter().map(|t| (t.name(), classify_sync(t))));

        let duration = timer.elapsed().as_secs_f64();
        let rows_per_second = if duration > 0.0 {
            (rows_migrated as f64 / duration) as i64
        } else {
            0
        };
        let status = if with_differences.is_empty() && skipped.is_empty() {
            "completed"
        } else {
            "completed_with_errors"
        };

        info!(
            "Sync run {} finished: {} tables, {} rows migrated, {} rows failed in {:.2}s",
            run_id,
            tables.len(),
            rows_migrated,
            rows_failed,
            duration
        );
        if !skipped.is_empty() {
            warn!("Tables skipped: {:?}", skipped);
        }

        Ok(SyncReport {
            run_id,
            status: status.to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: duration,
            tunables: self.tunables,
            tables_total: tables.len(),
            rows_migrated,
            rows_failed,
            rows_per_second,
            clean,
            with_differences,
            skipped,
            tables,
        })
    }

    /// Compare every resolved table between source and target.
    pub async fn check(&self) -> Result<CheckReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting check run: {} ({:?})", run_id, self.tunables);

        let units = self.units().await?;
        let engine = VerifyEngine::new(
            self.source.clone(),
            self.target.clone(),
            self.naming.clone(),
        );
        let tables = engine
            .compare_tables(
                &units,
                self.tunables.parallel,
                self.tunables.sample_lines,
                self.tunables.rows_only,
            )
            .await;

        let (clean, with_differences, skipped) =
            partition(tables.iter().map(|t| (t.name(), classify_check(t))));
        let status = if with_differences.is_empty() {
            "in_sync"
        } else {
            "differences_found"
        };

        let duration = timer.elapsed().as_secs_f64();
        info!(
            "Check run {} finished: {} clean, {} with differences, {} skipped in {:.2}s",
            run_id,
            clean.len(),
            with_differences.len(),
            skipped.len(),
            duration
        );

        Ok(CheckReport {
            run_id,
            status: status.to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: duration,
            tunables: self.tunables,
            tables_total: tables.len(),
            clean,
            with_differences,
            skipped,
            tables,
        })
    }

    /// Query the server version on each side and time the round trip.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let timer = Instant::now();
        let source = self.source.server_version().await;
        let source_latency_ms = timer.elapsed().as_millis() as u64;

        let target_writer = self.target.clone();
        let timer = Instant::now();
        let target = tokio::task::spawn_blocking(move || target_writer.server_version()).await?;
        let target_latency_ms = timer.elapsed().as_millis() as u64;

        let (source_version, source_error) = match source {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let (target_version, target_error) = match target {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let source_connected = source_error.is_none();
        let target_connected = target_error.is_none();

        Ok(HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_version,
            source_error,
            target_connected,
            target_latency_ms,
            target_version,
            target_error,
            healthy: source_connected && target_connected,
        })
    }
}

impl SyncReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl CheckReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
