//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::{MigrateError, Result};

/// Hard ceiling for both inter-table and intra-table parallelism.
pub const MAX_PARALLEL: usize = 8;

/// Built-in default for inter-table and intra-table parallelism.
pub const DEFAULT_PARALLEL: usize = 1;

/// Built-in default for rows per commit.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Built-in default for verification sample size.
pub const DEFAULT_SAMPLE_LINES: usize = 1000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MySQL).
    pub source: SourceConfig,

    /// Target database configuration (YashanDB).
    pub target: TargetConfig,

    /// Sync and verification behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Source database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Source schema used when `tables` is set.
    #[serde(default)]
    pub database: String,

    /// Schemas to sync in full (schemas mode).
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Individual tables of `database` to sync (tables mode).
    #[serde(default)]
    pub tables: Vec<String>,

    /// Table names skipped in either mode.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Maximum pooled MySQL connections. Derived from parallelism if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("schemas", &self.schemas)
            .field("tables", &self.tables)
            .field("exclude_tables", &self.exclude_tables)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Target database (YashanDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1688).
    #[serde(default = "default_yashan_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Name of the installed YashanDB ODBC driver (default: "YashanDB").
    #[serde(default = "default_odbc_driver")]
    pub driver: String,

    /// Full ODBC connection string; overrides host/port/user/password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Target schema for each source schema, paired by position.
    #[serde(default)]
    pub remap_schemas: Vec<String>,

    /// Keep identifier case instead of folding to upper case.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Extra identifiers that must be quoted when used as column names.
    #[serde(default)]
    pub reserved_keywords: Vec<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("driver", &self.driver)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("remap_schemas", &self.remap_schemas)
            .field("case_sensitive", &self.case_sensitive)
            .field("reserved_keywords", &self.reserved_keywords)
            .finish()
    }
}

/// Sync behaviour configuration.
/// Tunables use Option<T> to distinguish between "not set" (fall back to the
/// built-in default) and "explicitly set".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Tables processed concurrently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,

    /// Chunk workers per table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_per_table: Option<usize>,

    /// Rows per commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Rows sampled per table during verification (0 = whole table).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_lines: Option<usize>,

    /// Verification compares row counts only.
    #[serde(default)]
    pub rows_only: bool,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct TunableOverrides {
    pub parallel: Option<usize>,
    pub parallel_per_table: Option<usize>,
    pub batch_size: Option<usize>,
    pub sample_lines: Option<usize>,
    pub rows_only: bool,
}

/// Fully resolved tunables handed to the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    pub parallel: usize,
    pub parallel_per_table: usize,
    pub batch_size: usize,
    pub sample_lines: usize,
    pub rows_only: bool,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_PARALLEL,
            parallel_per_table: DEFAULT_PARALLEL,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_lines: DEFAULT_SAMPLE_LINES,
            rows_only: false,
        }
    }
}

impl SyncConfig {
    /// Resolve every tunable: CLI value, then file value, then default,
    /// then the ceiling. An explicit CLI value of 0 is rejected.
    pub fn resolve(&self, overrides: &TunableOverrides) -> Result<Tunables> {
        Ok(Tunables {
            parallel: resolve_tunable(
                "parallel",
                overrides.parallel,
                self.parallel,
                DEFAULT_PARALLEL,
                Some(MAX_PARALLEL),
            )?,
            parallel_per_table: resolve_tunable(
                "parallel_per_table",
                overrides.parallel_per_table,
                self.parallel_per_table,
                DEFAULT_PARALLEL,
                Some(MAX_PARALLEL),
            )?,
            batch_size: resolve_tunable(
                "batch_size",
                overrides.batch_size,
                self.batch_size,
                DEFAULT_BATCH_SIZE,
                None,
            )?,
            sample_lines: overrides
                .sample_lines
                .or(self.sample_lines)
                .unwrap_or(DEFAULT_SAMPLE_LINES),
            rows_only: overrides.rows_only || self.rows_only,
        })
    }
}

/// Pick the first of CLI, file, default and cap it.
///
/// A CLI value of 0 is an error. A file value of 0 counts as unset here;
/// config validation rejects it before resolution.
pub fn resolve_tunable(
    name: &str,
    cli: Option<usize>,
    file: Option<usize>,
    default: usize,
    ceiling: Option<usize>,
) -> Result<usize> {
    if cli == Some(0) {
        return Err(MigrateError::Config(format!("{} must be at least 1", name)));
    }
    let value = cli.or(file.filter(|v| *v > 0)).unwrap_or(default);

    Ok(match ceiling {
        Some(max) if value > max => {
            warn!("{} = {} exceeds the maximum of {}, using {}", name, value, max, max);
            max
        }
        _ => value,
    })
}

impl SourceConfig {
    /// Whether the run is driven by an explicit table list.
    pub fn tables_mode(&self) -> bool {
        !self.tables.is_empty()
    }

    /// Pool size for the given tunables; headroom covers catalog queries.
    pub fn pool_size(&self, tunables: &Tunables) -> usize {
        let needed = tunables.parallel * tunables.parallel_per_table + 2;
        match self.max_connections {
            Some(max) => {
                if max < needed {
                    warn!(
                        "source.max_connections = {} is below parallel x parallel_per_table + 2 = {}; workers will wait for connections",
                        max, needed
                    );
                }
                max
            }
            None => needed,
        }
    }
}

impl TargetConfig {
    /// Build the ODBC connection string for the YashanDB driver.
    pub fn odbc_connection_string(&self) -> String {
        if let Some(conn) = &self.connection_string {
            return conn.clone();
        }
        format!(
            "Driver={{{}}};Server={};Port={};UID={};PWD={};",
            self.driver, self.host, self.port, self.user, self.password
        )
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_yashan_port() -> u16 {
    1688
}

fn default_odbc_driver() -> String {
    "YashanDB".to_string()
}
