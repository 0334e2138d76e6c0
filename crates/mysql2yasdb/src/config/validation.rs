//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() && config.target.connection_string.is_none() {
        return Err(MigrateError::Config(
            "target.host or target.connection_string is required".into(),
        ));
    }
    if config.target.user.is_empty() && config.target.connection_string.is_none() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.remap_schemas.is_empty() {
        return Err(MigrateError::Config(
            "target.remap_schemas is required".into(),
        ));
    }

    // Exactly one of schemas / tables
    let schemas = &config.source.schemas;
    let tables = &config.source.tables;
    match (schemas.is_empty(), tables.is_empty()) {
        (true, true) => {
            return Err(MigrateError::Config(
                "one of source.schemas or source.tables is required".into(),
            ))
        }
        (false, false) => {
            return Err(MigrateError::Config(
                "source.schemas and source.tables cannot both be set".into(),
            ))
        }
        (false, true) => {
            if config.target.remap_schemas.len() != schemas.len() {
                return Err(MigrateError::Config(format!(
                    "target.remap_schemas has {} entries but source.schemas has {}",
                    config.target.remap_schemas.len(),
                    schemas.len()
                )));
            }
        }
        (true, false) => {
            if config.source.database.is_empty() {
                return Err(MigrateError::Config(
                    "source.database is required when source.tables is set".into(),
                ));
            }
        }
    }

    // Tunables - only check if explicitly set; sample_lines = 0 means full scan
    if let Some(0) = config.sync.parallel {
        return Err(MigrateError::Config("sync.parallel must be at least 1".into()));
    }
    if let Some(0) = config.sync.parallel_per_table {
        return Err(MigrateError::Config(
            "sync.parallel_per_table must be at least 1".into(),
        ));
    }
    if let Some(0) = config.sync.batch_size {
        return Err(MigrateError::Config(
            "sync.batch_size must be at least 1".into(),
        ));
    }

    Ok(())
}
