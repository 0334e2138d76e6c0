//! Table and column metadata shared by the catalog, sync and verify paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::typemap::SourceType;

/// One (source schema, target schema, table) triple to sync or verify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationUnit {
    /// MySQL schema the table is read from.
    pub source_schema: String,
    /// YashanDB schema the table is written into (as configured).
    pub target_schema: String,
    /// Table name.
    pub table: String,
}

impl MigrationUnit {
    pub fn new(
        source_schema: impl Into<String>,
        target_schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            source_schema: source_schema.into(),
            target_schema: target_schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source_schema, self.table)
    }
}

/// Source column metadata read from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_type: SourceType,
    pub nullable: bool,
    /// Character length; 0 for non-character columns, -1 beyond i32.
    pub max_length: i64,
    pub precision: i64,
    pub scale: i64,
    pub auto_increment: bool,
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Minimal descriptor; the remaining attributes default to "plain nullable column".
    pub fn new(name: impl Into<String>, declared_type: &str) -> Self {
        Self {
            name: name.into(),
            source_type: SourceType::parse(declared_type),
            nullable: true,
            max_length: 0,
            precision: 0,
            scale: 0,
            auto_increment: false,
            primary_key: false,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Target column metadata read from `ALL_TAB_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    pub name: String,
    pub data_type: String,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Binary columns are fetched as bytes rather than text.
    pub fn is_binary(&self) -> bool {
        let upper = self.data_type.to_uppercase();
        upper.starts_with("RAW") || upper.starts_with("BLOB") || upper.starts_with("LONG RAW")
    }
}

/// A target table with names already resolved by the naming rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    /// Owner as stored in the target catalog.
    pub schema: String,
    /// Table name as stored in the target catalog.
    pub table: String,
    /// Quoted `"SCHEMA"."TABLE"` reference for SQL text.
    pub qualified: String,
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
