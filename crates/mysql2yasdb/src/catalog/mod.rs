//! Source catalog reader and migration unit resolution.
//!
//! Wraps a [`SourceReader`] with the rules the engines rely on: system
//! schemas are never visible, large-object columns never serve as lookup
//! keys, and a requested schema that does not exist is skipped with a
//! warning rather than failing the run.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::schema::{ColumnDescriptor, MigrationUnit};
use crate::core::traits::SourceReader;
use crate::error::Result;

/// Administrative schemas excluded from every listing.
pub const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

/// What the caller asked to sync or verify.
#[derive(Debug, Clone, Default)]
pub struct UnitSelection {
    /// Whole schemas (schemas mode).
    pub schemas: Vec<String>,
    /// Target schema per entry of `schemas`, or the single target in tables mode.
    pub remap_schemas: Vec<String>,
    /// Source schema for `tables`.
    pub database: String,
    /// Explicit tables of `database` (tables mode).
    pub tables: Vec<String>,
    /// Table names to skip.
    pub exclude_tables: Vec<String>,
}

impl From<&Config> for UnitSelection {
    fn from(config: &Config) -> Self {
        Self {
            schemas: config.source.schemas.clone(),
            remap_schemas: config.target.remap_schemas.clone(),
            database: config.source.database.clone(),
            tables: config.source.tables.clone(),
            exclude_tables: config.source.exclude_tables.clone(),
        }
    }
}

/// Read-only view of the source catalog.
#[derive(Clone)]
pub struct CatalogReader {
    source: Arc<dyn SourceReader>,
}

impl CatalogReader {
    pub fn new(source: Arc<dyn SourceReader>) -> Self {
        Self { source }
    }

    /// Databases on the source, system schemas removed.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let databases = self.source.list_databases().await?;
        Ok(databases
            .into_iter()
            .filter(|db| !is_system_schema(db))
            .collect())
    }

    /// Base tables of a schema.
    pub async fn list_base_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.source.list_base_tables(schema).await
    }

    /// Columns of a table in ordinal order.
    pub async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.source.list_columns(schema, table).await
    }

    /// Primary key columns usable in a lookup predicate.
    pub async fn list_primary_key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let columns = self.list_columns(schema, table).await?;
        Ok(usable_key_columns(&columns)
            .into_iter()
            .map(|c| c.name.clone())
            .collect())
    }

    /// Resolve the selection into migration units.
    ///
    /// Failing to list databases is an error. Missing schemas and schemas
    /// whose tables cannot be listed are skipped.
    pub async fn resolve_units(&self, selection: &UnitSelection) -> Result<Vec<MigrationUnit>> {
        let databases: HashSet<String> = self.list_databases().await?.into_iter().collect();
        let excluded: HashSet<&str> = selection
            .exclude_tables
            .iter()
            .map(String::as_str)
            .collect();

        let mut units = Vec::new();

        if !selection.tables.is_empty() {
            let Some(target_schema) = selection.remap_schemas.first() else {
                warn!("no target schema configured for tables mode");
                return Ok(units);
            };
            if !databases.contains(&selection.database) {
                warn!(
                    "schema '{}' not found in source, skipping",
                    selection.database
                );
                return Ok(units);
            }
            for table in &selection.tables {
                if excluded.contains(table.as_str()) {
                    debug!("excluding table {}.{}", selection.database, table);
                    continue;
                }
                units.push(MigrationUnit::new(
                    selection.database.clone(),
                    target_schema.clone(),
                    table.clone(),
                ));
            }
            info!("Resolved {} tables from '{}'", units.len(), selection.database);
            return Ok(units);
        }

        for (i, schema) in selection.schemas.iter().enumerate() {
            if !databases.contains(schema) {
                warn!("schema '{}' not found in source, skipping", schema);
                continue;
            }
            let Some(target_schema) = selection.remap_schemas.get(i) else {
                warn!("schema '{}' has no remap schema, skipping", schema);
                continue;
            };

            let tables = match self.list_base_tables(schema).await {
                Ok(tables) => tables,
                Err(e) => {
                    error!("failed to list tables of schema '{}': {}", schema, e);
                    continue;
                }
            };

            let before = units.len();
            units.extend(
                tables
                    .into_iter()
                    .filter(|t| !excluded.contains(t.as_str()))
                    .map(|t| MigrationUnit::new(schema.clone(), target_schema.clone(), t)),
            );
            info!(
                "Resolved {} tables from '{}' -> '{}'",
                units.len() - before,
                schema,
                target_schema
            );
        }

        Ok(units)
    }
}

/// Whether `name` is one of the MySQL administrative schemas.
pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

/// Primary key columns whose type can be used in a predicate.
pub fn usable_key_columns(columns: &[ColumnDescriptor]) -> Vec<&ColumnDescriptor> {
    columns
        .iter()
        .filter(|c| c.primary_key && !c.source_type.is_large_object())
        .collect()
}
