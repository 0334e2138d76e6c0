//! Read-only verification of synced tables.
//!
//! Each table gets two checks:
//!
//! - **Row counts**: `COUNT(*)` on both sides, always recorded
//! - **Content**: a random sample of source rows (or every row when the sample
//!   size is 0) is looked up on the target by primary key and compared field
//!   by field through the canonical value form
//!
//! Content comparison needs a primary key made of predicate-friendly columns;
//! tables without one fall back to the count check. Nothing is repaired or
//! retried. Differences are counted and logged.

pub mod types;

pub use types::{ContentCheck, ContentOutcome, TableCompareResult};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::catalog::usable_key_columns;
use crate::convert::{target_to_canonical, to_canonical, to_target_param, values_equal};
use crate::core::identifier::TargetNaming;
use crate::core::schema::MigrationUnit;
use crate::core::traits::{ReadOptions, ReadWindow, RowLookup, SourceReader, TargetWriter};
use crate::core::value::{CanonicalValue, RowBatch, TargetParam};
use crate::drivers::yashan::dialect;
use crate::error::{MigrateError, Result};
use crate::typemap::SourceType;

/// Source rows per channel message while sampling.
const SAMPLE_BATCH_SIZE: usize = 500;

/// Engine comparing source tables with their synced copies.
#[derive(Clone)]
pub struct VerifyEngine {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    naming: TargetNaming,
}

impl VerifyEngine {
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        naming: TargetNaming,
    ) -> Self {
        Self {
            source,
            target,
            naming,
        }
    }

    /// Verify every unit with up to `parallelism` tables in flight.
    pub async fn compare_tables(
        &self,
        units: &[MigrationUnit],
        parallelism: usize,
        sample: usize,
        rows_only: bool,
    ) -> Vec<TableCompareResult> {
        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
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
                engine.compare_table(&task_unit, sample, rows_only).await
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
                    error!("{}: verification task failed - {}", unit, e);
                    let mut result = TableCompareResult::new(&unit);
                    result.error = Some(e.to_string());
                    results.push(result);
                }
            }
        }
        results
    }

    /// Verify one table. Failures are recorded in the result, never returned.
    pub async fn compare_table(
        &self,
        unit: &MigrationUnit,
        sample: usize,
        rows_only: bool,
    ) -> TableCompareResult {
        let started = Instant::now();
        let mut result = TableCompareResult::new(unit);

        if let Err(e) = self.run_table(unit, sample, rows_only, &mut result).await {
            error!("{}: verification failed - {}", unit, e);
            result.content = ContentCheck::Failed;
            result.error = Some(e.to_string());
        }

        result.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "{}: source {} rows, target {} rows, {} checked, {} differences",
            unit,
            result.source_rows,
            result.target_rows,
            result.rows_checked,
            result.error_count()
        );
        result
    }

    async fn run_table(
        &self,
        unit: &MigrationUnit,
        sample: usize,
        rows_only: bool,
        result: &mut TableCompareResult,
    ) -> Result<()> {
        let table = dialect::target_table(&self.naming, unit)?;

        result.source_rows = self
            .source
            .row_count(&unit.source_schema, &unit.table)
            .await?;
        let target = self.target.clone();
        let count_table = table.clone();
        result.target_rows =
            tokio::task::spawn_blocking(move || target.row_count(&count_table)).await??;

        if !result.counts_match() {
            warn!(
                table = %unit,
                source_rows = result.source_rows,
                target_rows = result.target_rows,
                "row count mismatch"
            );
        }

        if rows_only {
            result.content = ContentCheck::RowsOnly;
            return Ok(());
        }

        let columns = self
            .source
            .list_columns(&unit.source_schema, &unit.table)
            .await?;
        let key_columns: Vec<String> = usable_key_columns(&columns)
            .into_iter()
            .map(|c| c.name.clone())
            .collect();
        if key_columns.is_empty() {
            warn!("{}: no usable primary key, content comparison skipped", unit);
            result.content = ContentCheck::SkippedNoKey;
            return Ok(());
        }

        let target = self.target.clone();
        let lookup_table = table.clone();
        let target_columns =
            tokio::task::spawn_blocking(move || target.table_columns(&lookup_table)).await??;
        if target_columns.is_empty() {
            return Err(MigrateError::TargetTableNotFound {
                schema: table.schema,
                table: table.table,
            });
        }
        if target_columns.len() != columns.len() {
            return Err(MigrateError::ColumnMismatch {
                table: unit.to_string(),
                source_count: columns.len(),
                target_count: target_columns.len(),
            });
        }

        let lookup = dialect::row_lookup(&self.naming, &table, &target_columns, &key_columns)?;
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let key_idx: Vec<usize> = key_columns
            .iter()
            .filter_map(|k| names.iter().position(|n| n == k))
            .collect();
        let types: Vec<SourceType> = columns.iter().map(|c| c.source_type.clone()).collect();

        debug!("{}: sampling {} rows (0 = all)", unit, sample);
        let rx = self.source.read_rows(ReadOptions {
            schema: unit.source_schema.clone(),
            table: unit.table.clone(),
            columns: names.clone(),
            window: ReadWindow::Sample(sample as u64),
            batch_size: SAMPLE_BATCH_SIZE,
        });

        let pass = ContentPass {
            label: unit.to_string(),
            lookup,
            names,
            types,
            key_idx,
        };
        let target = self.target.clone();
        let outcome = tokio::task::spawn_blocking(move || pass.run(target.as_ref(), rx)).await??;

        outcome.apply(result);
        result.content = ContentCheck::Compared;
        Ok(())
    }
}

/// Everything a blocking content pass needs about one table.
struct ContentPass {
    label: String,
    lookup: RowLookup,
    names: Vec<String>,
    types: Vec<SourceType>,
    key_idx: Vec<usize>,
}

impl ContentPass {
    /// Compare every streamed row through one lookup connection.
    ///
    /// Failing to open the connection fails the table; a failed lookup only
    /// counts against the row.
    fn run(
        &self,
        target: &dyn TargetWriter,
        mut rx: mpsc::Receiver<Result<RowBatch>>,
    ) -> Result<ContentOutcome> {
        let mut lookup = target.open_lookup(&self.lookup)?;
        let mut outcome = ContentOutcome::default();

        while let Some(item) = rx.blocking_recv() {
            let batch = match item {
                Ok(batch) => batch,
                Err(e) => {
                    error!("{}: source read failed - {}", self.label, e);
                    outcome.read_error = Some(e.to_string());
                    break;
                }
            };

            for row in batch {
                outcome.rows_checked += 1;
                let source: Vec<CanonicalValue> = row
                    .iter()
                    .zip(&self.types)
                    .map(|(raw, ty)| to_canonical(raw, ty))
                    .collect();
                let key: Vec<TargetParam> = self
                    .key_idx
                    .iter()
                    .map(|&i| to_target_param(&source[i]))
                    .collect();
                let keys = self.describe_key(&source);

                let target_row = match lookup.fetch(&key) {
                    Ok(Some(target_row)) => target_row,
                    Ok(None) => {
                        outcome.missing_rows += 1;
                        warn!(table = %self.label, keys = %keys, "row missing on target");
                        continue;
                    }
                    Err(e) => {
                        outcome.lookup_errors += 1;
                        warn!(table = %self.label, keys = %keys, error = %e, "target lookup failed");
                        continue;
                    }
                };

                let mut differs = false;
                for (i, source_value) in source.iter().enumerate() {
                    let target_value = target_row
                        .get(i)
                        .map(|cell| target_to_canonical(cell, &self.types[i]))
                        .unwrap_or(CanonicalValue::Null);
                    if values_equal(source_value, &target_value) {
                        continue;
                    }
                    differs = true;
                    outcome.mismatched_fields += 1;
                    warn!(
                        table = %self.label,
                        column = %self.names[i],
                        keys = %keys,
                        source = %source_value,
                        source_type = source_value.type_name(),
                        target = %target_value,
                        target_type = target_value.type_name(),
                        "field mismatch"
                    );
                }
                if differs {
                    outcome.mismatched_rows += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// `id=1, region=eu` for log lines.
    fn describe_key(&self, row: &[CanonicalValue]) -> String {
        self.key_idx
            .iter()
            .map(|&i| format!("{}={}", self.names[i], row[i]))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnDescriptor;
    use crate::core::value::RawValue;
    use crate::testutil::{MockSource, MockTarget};

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int").with_primary_key(),
            ColumnDescriptor::new("name", "varchar"),
        ]
    }

    fn row(id: &str, name: Option<&str>) -> Vec<RawValue> {
        vec![RawValue::from(id), RawValue::from(name)]
    }

    fn target_with(rows: Vec<Vec<RawValue>>) -> MockTarget {
        rows.into_iter().fold(
            MockTarget::new().with_table("APP", "USERS", &[("ID", "INTEGER"), ("NAME", "VARCHAR")]),
            |t, r| t.with_row("APP", "USERS", r),
        )
    }

    fn engine(source: MockSource, target: MockTarget) -> VerifyEngine {
        VerifyEngine::new(Arc::new(source), Arc::new(target), TargetNaming::default())
    }

    fn unit() -> MigrationUnit {
        MigrationUnit::new("app", "app", "users")
    }

    #[tokio::test]
    async fn test_trailing_space_is_reported() {
        let source = MockSource::new().with_table("app", "users", columns(), vec![row("1", Some("Alice"))]);
        let target = target_with(vec![row("1", Some("Alice "))]);

        let result = engine(source, target).compare_table(&unit(), 1000, false).await;

        assert_eq!(result.content, ContentCheck::Compared);
        assert_eq!(result.source_rows, 1);
        assert_eq!(result.target_rows, 1);
        assert_eq!(result.rows_checked, 1);
        assert_eq!(result.mismatched_fields, 1);
        assert_eq!(result.mismatched_rows, 1);
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn test_identical_rows_are_clean() {
        let rows = vec![row("1", Some("Alice")), row("2", Some("Bob"))];
        let source = MockSource::new().with_table("app", "users", columns(), rows.clone());
        let target = target_with(rows);

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert!(result.is_clean(), "{:?}", result);
        assert_eq!(result.rows_checked, 2);
    }

    #[tokio::test]
    async fn test_null_matches_empty_string() {
        let source = MockSource::new().with_table("app", "users", columns(), vec![row("1", None)]);
        let target = target_with(vec![row("1", Some(""))]);

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert_eq!(result.mismatched_fields, 0);
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_value_against_null_is_a_difference() {
        let source = MockSource::new().with_table("app", "users", columns(), vec![row("1", Some("x"))]);
        let target = target_with(vec![row("1", None)]);

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert_eq!(result.mismatched_fields, 1);
    }

    #[tokio::test]
    async fn test_missing_target_row_counts_once() {
        let source = MockSource::new().with_table(
            "app",
            "users",
            columns(),
            vec![row("1", Some("Alice")), row("2", Some("Bob"))],
        );
        let target = target_with(vec![row("1", Some("Alice"))]);

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert_eq!(result.missing_rows, 1);
        assert_eq!(result.mismatched_fields, 0);
        assert_eq!(result.error_count(), 1);
        assert!(!result.counts_match());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_counted_not_fatal() {
        let source = MockSource::new().with_table(
            "app",
            "users",
            columns(),
            vec![row("1", Some("Alice")), row("2", Some("Bob"))],
        );
        let target = target_with(vec![row("1", Some("Alice")), row("2", Some("Bob"))]).fail_fetch();

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert_eq!(result.content, ContentCheck::Compared);
        assert_eq!(result.lookup_errors, 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_one_lookup_connection_per_table() {
        let rows: Vec<_> = (1..=50).map(|i| row(&i.to_string(), Some("x"))).collect();
        let source = MockSource::new().with_table("app", "users", columns(), rows.clone());
        let target = target_with(rows);

        let result = engine(source, target.clone()).compare_table(&unit(), 0, false).await;
        assert_eq!(result.rows_checked, 50);
        assert!(result.is_clean(), "{:?}", result);
        assert_eq!(target.lookups(), 1);
    }

    #[tokio::test]
    async fn test_large_object_key_skips_content() {
        let cols = vec![
            ColumnDescriptor::new("body", "longtext").with_primary_key(),
            ColumnDescriptor::new("name", "varchar"),
        ];
        let source = MockSource::new().with_table("app", "users", cols, vec![row("a", Some("b"))]);
        let target = target_with(vec![]);

        let result = engine(source, target).compare_table(&unit(), 0, false).await;
        assert_eq!(result.content, ContentCheck::SkippedNoKey);
        assert_eq!(result.source_rows, 1);
        assert_eq!(result.target_rows, 0);
        assert_eq!(result.rows_checked, 0);
    }

    #[tokio::test]
    async fn test_rows_only_mode() {
        let source = MockSource::new().with_table("app", "users", columns(), vec![row("1", Some("Alice"))]);
        let target = target_with(vec![row("1", Some("Alice "))]);

        let result = engine(source.clone(), target).compare_table(&unit(), 0, true).await;
        assert_eq!(result.content, ContentCheck::RowsOnly);
        assert_eq!(result.mismatched_fields, 0);
        assert!(source.reads().is_empty());
    }

    #[tokio::test]
    async fn test_sample_size_is_passed_to_source() {
        let source = MockSource::new().with_table("app", "users", columns(), vec![row("1", Some("Alice"))]);
        let target = target_with(vec![row("1", Some("Alice"))]);

        engine(source.clone(), target).compare_table(&unit(), 25, false).await;
        assert_eq!(source.reads(), vec![ReadWindow::Sample(25)]);
    }

    #[tokio::test]
    async fn test_compare_tables_reports_missing_target_table() {
        let source = MockSource::new()
            .with_table("app", "users", columns(), vec![row("1", Some("Alice"))])
            .with_table("app", "orders", columns(), vec![row("1", Some("x"))]);
        let target = target_with(vec![row("1", Some("Alice"))]);
        let units = vec![unit(), MigrationUnit::new("app", "app", "orders")];

        let results = engine(source, target).compare_tables(&units, 2, 0, false).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_clean());
        assert_eq!(results[1].content, ContentCheck::Failed);
        assert!(results[1].error.is_some());
    }
}
