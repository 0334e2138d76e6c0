//! Driver seams used by the sync and verification engines.
//!
//! - [`SourceReader`]: async catalog queries and row streaming against MySQL
//! - [`TargetWriter`]: blocking catalog queries and lookups against YashanDB
//! - [`TargetSession`]: one connection with one open write transaction
//! - [`TargetLookup`]: one connection answering keyed lookups for one table
//!
//! The target side is blocking because it sits on ODBC; engines call it from
//! `tokio::task::spawn_blocking`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::{ColumnDescriptor, TargetColumn, TargetTable};
use super::value::{Row, RowBatch, TargetParam};

/// Which rows of a table to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWindow {
    /// `LIMIT limit OFFSET offset` with no ordering.
    Range { limit: u64, offset: u64 },
    /// Random sample of up to `n` rows; 0 reads the whole table.
    Sample(u64),
}

/// Options for streaming rows from one table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Columns to read, in catalog order.
    pub columns: Vec<String>,
    /// Row window.
    pub window: ReadWindow,
    /// Rows per channel message.
    pub batch_size: usize,
}

/// Read catalog metadata and rows from the source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// All databases visible to the connection, system schemas included.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Base tables of a schema (views excluded).
    async fn list_base_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of a table in ordinal order.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// `COUNT(*)` of a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Stream rows in batches through a bounded channel.
    ///
    /// A failure mid-stream arrives as an `Err` item, after which the channel closes.
    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>>;

    /// Server version string.
    async fn server_version(&self) -> Result<String>;
}

/// A parameterised insert for one target table.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: TargetTable,
    /// Target column names, in `ALL_TAB_COLUMNS` order.
    pub columns: Vec<String>,
    pub sql: String,
}

/// A single-row select by primary key.
#[derive(Debug, Clone)]
pub struct RowLookup {
    pub table: TargetTable,
    /// Columns selected, in target order.
    pub columns: Vec<TargetColumn>,
    /// Source names of the key columns, in predicate order.
    pub key_columns: Vec<String>,
    pub sql: String,
}

/// Blocking access to the target database.
pub trait TargetWriter: Send + Sync {
    /// Columns of a table in `COLUMN_ID` order; empty when the table is missing.
    fn table_columns(&self, table: &TargetTable) -> Result<Vec<TargetColumn>>;

    /// `COUNT(*)` of a table.
    fn row_count(&self, table: &TargetTable) -> Result<i64>;

    /// Open a connection and begin a write transaction on it.
    fn open_session(&self) -> Result<Box<dyn TargetSession>>;

    /// Open a connection for repeated keyed lookups with `lookup`.
    fn open_lookup(&self, lookup: &RowLookup) -> Result<Box<dyn TargetLookup>>;

    /// Server version string.
    fn server_version(&self) -> Result<String>;
}

/// One target connection holding one write transaction.
///
/// After [`commit`](TargetSession::commit) the session continues in a fresh
/// transaction. Dropping a session rolls back uncommitted rows.
pub trait TargetSession {
    fn insert(&mut self, stmt: &InsertStatement, params: &[TargetParam]) -> Result<()>;

    fn commit(&mut self) -> Result<()>;
}

/// One target connection reused for every lookup against one table.
pub trait TargetLookup {
    /// Fetch the row matching `key`, or `None` if no row matches.
    fn fetch(&mut self, key: &[TargetParam]) -> Result<Option<Row>>;
}
