//! Sync engine: copies table rows from MySQL into existing YashanDB tables.
//!
//! Two nested worker pools bound the work. The outer pool ([`SyncEngine::sync_all`])
//! runs up to `inter` tables at once; within one table the inner pool runs up
//! to `intra` chunk workers, each over its own [`ChunkPlan`] window. Every
//! chunk worker owns one target session, so commit boundaries never cross
//! chunks.
//!
//! Within a chunk a commit happens every `batch_size` successful inserts and
//! once more when the input ends (always at least one). A failed insert is
//! logged and skipped. A failed commit or a session that cannot be opened
//! aborts that chunk only; rows committed before the failure stay counted.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::convert::{to_canonical, to_target_param};
use crate::core::identifier::TargetNaming;
use crate::core::schema::{ColumnDescriptor, MigrationUnit, TargetColumn};
use crate::core::traits::{InsertStatement, ReadOptions, ReadWindow, SourceReader, TargetWriter};
use crate::core::value::{format_params, RowBatch, TargetParam};
use crate::drivers::yashan::dialect;
use crate::error::{MigrateError, Result};
use crate::plan::{plan_chunks, ChunkPlan};
use crate::typemap::{target_type_matches, SourceType};

/// Outcome of syncing one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSyncResult {
    pub source_schema: String,
    pub target_schema: String,
    pub table: String,

    /// Rows committed on the target.
    pub rows_migrated: i64,

    /// Rows whose insert failed and was skipped.
    pub rows_failed: i64,

    /// Chunk workers that ran.
    pub chunks: usize,

    /// Wall time for the table in seconds.
    pub duration_seconds: f64,

    /// First table- or chunk-level failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableSyncResult {
    fn new(unit: &MigrationUnit) -> Self {
        Self {
            source_schema: unit.source_schema.clone(),
            target_schema: unit.target_schema.clone(),
            table: unit.table.clone(),
            rows_migrated: 0,
            rows_failed: 0,
            chunks: 0,
            duration_seconds: 0.0,
            error: None,
        }
    }

    /// `schema.table` on the source side.
    pub fn name(&self) -> String {
        format!("{}.{}", self.source_schema, self.table)
    }
}

/// What one chunk worker accomplished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub rows_written: i64,
    pub rows_failed: i64,
    pub commits: usize,
    pub error: Option<String>,
}

/// Table sync driver; cheap to clone into worker tasks.
#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    naming: TargetNaming,
    intra: usize,
    batch_size: usize,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        naming: TargetNaming,
        intra: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            target,
            naming,
            intra: intra.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Sync every unit with up to `inter` tables in flight.
    ///
    /// Results come back in unit order once every table has finished.
    pub async fn sync_all(&self, units: &[MigrationUnit], inter: usize) -> Vec<TableSyncResult> {
        let semaphore = Arc::new(Semaphore::new(inter.max(1)));
        let mut handles = Vec::with_capacity(units.len());

        for unit in units.iter().cloned() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                handles.push((unit, None));
                continue;
            };
            let engine = self.clone();
            let task_unit = unit.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                engine.sync_table(&task_unit).await
            });
            handles.push((unit, Some(handle)));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (unit, handle) in handles {
            let outcome = match handle {
                Some(handle) => handle.await.map_err(MigrateError::from),
                None => Err(MigrateError::Task("table was never scheduled".to_string())),
            };
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("{}: task failed - {}", unit, e);
                    let mut result = TableSyncResult::new(&unit);
                    result.error = Some(e.to_string());
                    results.push(result);
                }
            }
        }
        results
    }

    /// Sync one table. Failures are recorded in the result, never returned.
    pub async fn sync_table(&self, unit: &MigrationUnit) -> TableSyncResult {
        let started = Instant::now();
        let mut result = TableSyncResult::new(unit);
        info!("{}: sync started -> {}", unit, unit.target_schema);

        if let Err(e) = self.run_table(unit, &mut result).await {
            error!("{}: sync failed - {}", unit, e);
            result.error = Some(e.to_string());
        }

        result.duration_seconds = started.elapsed().as_secs_f64();
        if result.error.is_none() {
            info!(
                "{}: completed ({} rows, {} failed, {:.2}s)",
                unit, result.rows_migrated, result.rows_failed, result.duration_seconds
            );
        }
        result
    }

    async fn run_table(&self, unit: &MigrationUnit, result: &mut TableSyncResult) -> Result<()> {
        let table = dialect::target_table(&self.naming, unit)?;
        let source_columns = self
            .source
            .list_columns(&unit.source_schema, &unit.table)
            .await?;

        let target = self.target.clone();
        let lookup = table.clone();
        let target_columns =
            tokio::task::spawn_blocking(move || target.table_columns(&lookup)).await??;

        if target_columns.is_empty() {
            return Err(MigrateError::TargetTableNotFound {
                schema: table.schema,
                table: table.table,
            });
        }
        if source_columns.len() != target_columns.len() {
            return Err(MigrateError::ColumnMismatch {
                table: unit.to_string(),
                source_count: source_columns.len(),
                target_count: target_columns.len(),
            });
        }
        warn_type_drift(unit, &source_columns, &target_columns);

        let stmt = Arc::new(dialect::insert_statement(&table, &target_columns)?);
        let types: Arc<Vec<SourceType>> =
            Arc::new(source_columns.iter().map(|c| c.source_type.clone()).collect());
        let names: Vec<String> = source_columns.iter().map(|c| c.name.clone()).collect();

        let row_count = self
            .source
            .row_count(&unit.source_schema, &unit.table)
            .await?;
        let plans = plan_chunks(row_count.max(0) as u64, self.intra);
        let workers = plans.first().map(|p| p.workers).unwrap_or(1);
        info!(
            "{}: {} rows in {} chunk(s), {} worker(s)",
            unit,
            row_count,
            plans.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(plans.len());

        for plan in plans {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MigrateError::Task(e.to_string()))?;

            let rx = self.source.read_rows(ReadOptions {
                schema: unit.source_schema.clone(),
                table: unit.table.clone(),
                columns: names.clone(),
                window: ReadWindow::Range {
                    limit: plan.limit,
                    offset: plan.offset,
                },
                batch_size: self.batch_size,
            });

            let target = self.target.clone();
            let stmt = stmt.clone();
            let types = types.clone();
            let batch_size = self.batch_size;
            let label = unit.to_string();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                write_chunk(target.as_ref(), &stmt, &types, rx, batch_size, &label, &plan)
            });
            handles.push((plan.offset, handle));
        }

        for (offset, handle) in handles {
            result.chunks += 1;
            match handle.await {
                Ok(outcome) => {
                    result.rows_migrated += outcome.rows_written;
                    result.rows_failed += outcome.rows_failed;
                    if let Some(e) = outcome.error {
                        error!("{}: chunk at offset {} aborted - {}", unit, offset, e);
                        result.error.get_or_insert_with(|| {
                            let message = format!("chunk at offset {}: {}", offset, e);
                            MigrateError::transfer(unit.to_string(), message).to_string()
                        });
                    }
                }
                Err(e) => {
                    error!("{}: chunk at offset {} panicked - {}", unit, offset, e);
                    result.error.get_or_insert_with(|| {
                        let message = format!("chunk at offset {} panicked: {}", offset, e);
                        MigrateError::transfer(unit.to_string(), message).to_string()
                    });
                }
            }
        }
        Ok(())
    }
}

/// Warn when a target column's declared type differs from the mapped one.
fn warn_type_drift(unit: &MigrationUnit, source: &[ColumnDescriptor], target: &[TargetColumn]) {
    for (src, tgt) in source.iter().zip(target) {
        match src.source_type.yashan_type() {
            Ok(expected) if !target_type_matches(expected, &tgt.data_type) => warn!(
                "{}: column {} is {} on the source and {} on the target (expected {})",
                unit, src.name, src.source_type, tgt.data_type, expected
            ),
            Ok(_) => {}
            Err(e) => warn!("{}: column {}: {}", unit, src.name, e),
        }
    }
}

/// Drain one chunk's source stream into a fresh target session.
///
/// Runs on a blocking thread.
pub fn write_chunk(
    target: &dyn TargetWriter,
    stmt: &InsertStatement,
    types: &[SourceType],
    rx: mpsc::Receiver<Result<RowBatch>>,
    batch_size: usize,
    label: &str,
    plan: &ChunkPlan,
) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();
    if let Err(e) = write_rows(target, stmt, types, rx, batch_size, label, plan, &mut outcome) {
        outcome.error = Some(e.to_string());
    }
    debug!(
        "{}: chunk offset {} limit {} done ({} rows, {} failed, {} commits)",
        label, plan.offset, plan.limit, outcome.rows_written, outcome.rows_failed, outcome.commits
    );
    outcome
}

#[allow(clippy::too_many_arguments)]
fn write_rows(
    target: &dyn TargetWriter,
    stmt: &InsertStatement,
    types: &[SourceType],
    mut rx: mpsc::Receiver<Result<RowBatch>>,
    batch_size: usize,
    label: &str,
    plan: &ChunkPlan,
    outcome: &mut ChunkOutcome,
) -> Result<()> {
    let mut session = target.open_session()?;
    let mut pending: i64 = 0;
    let mut read_error = None;

    while let Some(item) = rx.blocking_recv() {
        let batch = match item {
            Ok(batch) => batch,
            Err(e) => {
                error!("{}: source read failed at offset {} - {}", label, plan.offset, e);
                read_error = Some(e);
                break;
            }
        };

        for row in batch {
            let params: Vec<TargetParam> = row
                .iter()
                .zip(types)
                .map(|(raw, ty)| to_target_param(&to_canonical(raw, ty)))
                .collect();

            if let Err(e) = session.insert(stmt, &params) {
                outcome.rows_failed += 1;
                warn!(
                    "{}: insert failed at chunk offset {} - {}\n  SQL: {}\n  Params: {}",
                    label,
                    plan.offset,
                    e,
                    stmt.sql,
                    format_params(&params)
                );
                continue;
            }

            pending += 1;
            if pending as usize >= batch_size {
                session.commit()?;
                outcome.commits += 1;
                outcome.rows_written += pending;
                pending = 0;
            }
        }
    }

    if pending > 0 || outcome.commits == 0 {
        session.commit()?;
        outcome.commits += 1;
        outcome.rows_written += pending;
    }

    match read_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
