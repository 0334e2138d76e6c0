//! Result types for table verification.

use serde::{Deserialize, Serialize};

use crate::core::schema::MigrationUnit;

/// How far content verification got for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCheck {
    /// Sampled rows were compared field by field.
    Compared,
    /// No usable primary key; only row counts were compared.
    SkippedNoKey,
    /// Row-count-only mode.
    RowsOnly,
    /// The table could not be verified at all.
    Failed,
}

/// Verification outcome for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCompareResult {
    pub source_schema: String,
    pub target_schema: String,
    pub table: String,

    /// `COUNT(*)` on the source.
    pub source_rows: i64,

    /// `COUNT(*)` on the target.
    pub target_rows: i64,

    /// Source rows looked up on the target.
    pub rows_checked: i64,

    /// Rows with at least one differing field.
    pub mismatched_rows: i64,

    /// Differing fields across all rows.
    pub mismatched_fields: i64,

    /// Source rows with no target row for the same key.
    pub missing_rows: i64,

    /// Lookups that failed on the target.
    pub lookup_errors: i64,

    pub content: ContentCheck,

    /// Wall time for the table in seconds.
    pub duration_seconds: f64,

    /// Table-level failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableCompareResult {
    pub fn new(unit: &MigrationUnit) -> Self {
        Self {
            source_schema: unit.source_schema.clone(),
            target_schema: unit.target_schema.clone(),
            table: unit.table.clone(),
            source_rows: 0,
            target_rows: 0,
            rows_checked: 0,
            mismatched_rows: 0,
            mismatched_fields: 0,
            missing_rows: 0,
            lookup_errors: 0,
            content: ContentCheck::Failed,
            duration_seconds: 0.0,
            error: None,
        }
    }

    /// `schema.table` on the source side.
    pub fn name(&self) -> String {
        format!("{}.{}", self.source_schema, self.table)
    }

    pub fn counts_match(&self) -> bool {
        self.source_rows == self.target_rows
    }

    /// Row and field problems found during content comparison.
    pub fn error_count(&self) -> i64 {
        self.mismatched_fields + self.missing_rows + self.lookup_errors
    }

    /// Counts agree and nothing differed.
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.counts_match() && self.error_count() == 0
    }
}

/// Tallies from one content pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContentOutcome {
    pub rows_checked: i64,
    pub mismatched_rows: i64,
    pub mismatched_fields: i64,
    pub missing_rows: i64,
    pub lookup_errors: i64,
    pub read_error: Option<String>,
}

impl ContentOutcome {
    pub(crate) fn apply(self, result: &mut TableCompareResult) {
        result.rows_checked = self.rows_checked;
        result.mismatched_rows = self.mismatched_rows;
        result.mismatched_fields = self.mismatched_fields;
        result.missing_rows = self.missing_rows;
        result.lookup_errors = self.lookup_errors;
        if let Some(e) = self.read_error {
            result.error = Some(e);
        }
    }
}
