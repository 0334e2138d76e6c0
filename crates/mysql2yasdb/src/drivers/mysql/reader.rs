//! MySQL source reader implementation.
//!
//! Implements the `SourceReader` trait against MySQL using SQLx for connection
//! pooling. Catalog queries go through prepared statements; row reads use the
//! text protocol so that every cell arrives in its textual (or raw byte) form
//! and conversion is left to the canonical value layer.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::{qualify_mysql, quote_mysql};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::{ReadOptions, ReadWindow, SourceReader};
use crate::core::value::{RawValue, RowBatch};
use crate::error::{MigrateError, Result};
use crate::typemap::SourceType;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Batches buffered between the reading task and its consumer.
const CHANNEL_CAPACITY: usize = 4;

/// MySQL source reader.
#[derive(Clone)]
pub struct MysqlReader {
    pool: MySqlPool,
}

impl MysqlReader {
    /// Create a new MySQL reader from configuration.
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        let reader = Self { pool };
        reader.test_connection().await?;

        info!(
            "Connected to MySQL source: {}:{} ({} connections)",
            config.host, config.port, max_conns
        );
        Ok(reader)
    }

    /// Round-trip a trivial query.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;
        Ok(())
    }

    /// Build the SELECT for one read window.
    fn build_select(opts: &ReadOptions) -> Result<String> {
        let col_list = opts
            .columns
            .iter()
            .map(|c| quote_mysql(c))
            .collect::<Result<Vec<_>>>()?
            .join(",");
        let table_ref = qualify_mysql(&opts.schema, &opts.table)?;

        let query = match opts.window {
            ReadWindow::Range { limit, offset } => format!(
                "SELECT {} FROM {} LIMIT {} OFFSET {}",
                col_list, table_ref, limit, offset
            ),
            ReadWindow::Sample(0) => format!("SELECT {} FROM {}", col_list, table_ref),
            ReadWindow::Sample(n) => format!(
                "SELECT {} FROM {} ORDER BY RAND() LIMIT {}",
                col_list, table_ref, n
            ),
        };
        Ok(query)
    }

    /// Convert a text-protocol row into raw cells.
    fn row_to_values(row: &MySqlRow, width: usize) -> Result<Vec<RawValue>> {
        (0..width)
            .map(|i| -> Result<RawValue> {
                if row.try_get_raw(i)?.is_null() {
                    return Ok(RawValue::Null);
                }
                Ok(RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?))
            })
            .collect()
    }

    async fn read_rows_impl(
        pool: MySqlPool,
        opts: ReadOptions,
        tx: mpsc::Sender<Result<RowBatch>>,
    ) -> Result<()> {
        let query = Self::build_select(&opts)?;
        let width = opts.columns.len();
        let batch_size = opts.batch_size.max(1);
        debug!("{}.{}: {}", opts.schema, opts.table, query);

        let mut stream = sqlx::raw_sql(&query).fetch(&pool);
        let mut batch: RowBatch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.try_next().await? {
            batch.push(Self::row_to_values(&row, width)?);
            if batch.len() >= batch_size {
                total += batch.len();
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if tx.send(Ok(full)).await.is_err() {
                    return Ok(()); // Receiver dropped
                }
            }
        }

        if !batch.is_empty() {
            total += batch.len();
            let _ = tx.send(Ok(batch)).await;
        }
        debug!("{}.{}: read {} rows", opts.schema, opts.table, total);
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn list_databases(&self) -> Result<Vec<String>> {
        // CAST to CHAR: information_schema may report VARBINARY under some collations
        let rows: Vec<MySqlRow> = sqlx::query(
            "SELECT CAST(SCHEMA_NAME AS CHAR(255)) AS SCHEMA_NAME \
             FROM INFORMATION_SCHEMA.SCHEMATA ORDER BY SCHEMA_NAME",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MigrateError::pool(e, "listing MySQL databases"))?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("SCHEMA_NAME").map_err(Into::into))
            .collect()
    }

    async fn list_base_tables(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "listing MySQL tables"))?;

        let tables = rows
            .iter()
            .map(|r| r.try_get::<String, _>("TABLE_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Found {} base tables in '{}'", tables.len(), schema);
        Ok(tables)
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        // Cap max_length at i32 max, -1 for LONGTEXT and friends
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
                CAST(CASE
                    WHEN CHARACTER_MAXIMUM_LENGTH IS NULL THEN 0
                    WHEN CHARACTER_MAXIMUM_LENGTH > 2147483647 THEN -1
                    ELSE CHARACTER_MAXIMUM_LENGTH
                END AS SIGNED) AS max_length,
                CAST(COALESCE(NUMERIC_PRECISION, 0) AS SIGNED) AS num_precision,
                CAST(COALESCE(NUMERIC_SCALE, 0) AS SIGNED) AS num_scale,
                CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
                CAST(IF(EXTRA LIKE '%auto_increment%', 1, 0) AS SIGNED) AS is_identity,
                CAST(IF(COLUMN_KEY = 'PRI', 1, 0) AS SIGNED) AS is_primary,
                CAST(IF(COLUMN_TYPE LIKE '%unsigned%', 1, 0) AS SIGNED) AS is_unsigned
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL columns"))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.try_get("DATA_TYPE")?;
            let declared = if row.try_get::<i64, _>("is_unsigned")? == 1 {
                format!("{} unsigned", data_type)
            } else {
                data_type
            };
            columns.push(ColumnDescriptor {
                name: row.try_get("COLUMN_NAME")?,
                source_type: SourceType::parse(&declared),
                nullable: row.try_get::<i64, _>("is_nullable")? == 1,
                max_length: row.try_get("max_length")?,
                precision: row.try_get("num_precision")?,
                scale: row.try_get("num_scale")?,
                auto_increment: row.try_get::<i64, _>("is_identity")? == 1,
                primary_key: row.try_get::<i64, _>("is_primary")? == 1,
            });
        }

        if columns.is_empty() {
            return Err(MigrateError::Catalog(format!(
                "table '{}.{}' has no columns or does not exist",
                schema, table
            )));
        }
        Ok(columns)
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let query = format!("SELECT COUNT(*) AS cnt FROM {}", qualify_mysql(schema, table)?);

        let row: MySqlRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "getting row count"))?;

        Ok(row.try_get::<i64, _>("cnt")?)
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::read_rows_impl(pool, opts, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn server_version(&self) -> Result<String> {
        let row: MySqlRow = sqlx::query("SELECT CAST(VERSION() AS CHAR(255)) AS v")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "reading MySQL version"))?;
        Ok(row.try_get("v")?)
    }
}
