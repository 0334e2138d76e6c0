//! YashanDB target writer over ODBC.
//!
//! ODBC calls block, so everything here is synchronous and the engines reach
//! it through `tokio::task::spawn_blocking`. One process-wide ODBC
//! environment backs every connection, which lets sessions own their
//! connection outright and move freely between blocking tasks.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveTime, Timelike};
use odbc_api::buffers::TextRowSet;
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox, WithDataType};
use odbc_api::{sys, Connection, ConnectionOptions, Cursor, DataType, Environment};
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::core::schema::{TargetColumn, TargetTable};
use crate::core::traits::{InsertStatement, RowLookup, TargetLookup, TargetSession, TargetWriter};
use crate::core::value::{RawValue, Row, TargetParam};
use crate::error::{MigrateError, Result};

use super::dialect::{count_sql, COLUMNS_SQL, PING_SQL};

/// Rows fetched per round trip for catalog queries.
const CATALOG_BATCH_ROWS: usize = 100;

/// Upper bound on a single text cell in catalog queries.
const CATALOG_MAX_STR_LEN: usize = 4096;

static ODBC_ENV: OnceLock<Environment> = OnceLock::new();

/// The shared ODBC environment, created on first use.
fn environment() -> Result<&'static Environment> {
    if let Some(env) = ODBC_ENV.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        MigrateError::pool(
            format!(
                "Failed to create ODBC environment: {}.\n\n\
                 The YashanDB target requires unixODBC and the YashanDB ODBC driver.\n\
                 Register the driver in odbcinst.ini under the name set in target.driver.",
                e
            ),
            "ODBC environment",
        )
    })?;
    Ok(ODBC_ENV.get_or_init(|| env))
}

/// Bind a parameter for ODBC.
fn to_input_parameter(param: &TargetParam) -> Box<dyn InputParameter> {
    match param {
        TargetParam::Null => Box::new(VarCharBox::null()),
        TargetParam::Text(s) => Box::new(VarCharBox::from_string(s.clone())),
        TargetParam::Bytes(b) => Box::new(VarBinaryBox::from_vec(b.clone())),
        TargetParam::Int(v) => Box::new(*v),
        TargetParam::Float(v) => Box::new(*v),
        TargetParam::Date(d) => Box::new(sys::Date {
            year: d.year() as i16,
            month: d.month() as u16,
            day: d.day() as u16,
        }),
        TargetParam::Timestamp(ts) => Box::new(WithDataType {
            value: sys::Timestamp {
                year: ts.year() as i16,
                month: ts.month() as u16,
                day: ts.day() as u16,
                hour: ts.hour() as u16,
                minute: ts.minute() as u16,
                second: ts.second() as u16,
                fraction: ts.nanosecond(),
            },
            data_type: DataType::Timestamp { precision: 6 },
        }),
        // SQL_TIME_STRUCT has no fraction field, so TIME goes over as text.
        TargetParam::Time(t) => Box::new(VarCharBox::from_string(time_text(t))),
    }
}

/// `HH:MM:SS` with the fraction appended only when non-zero.
fn time_text(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}

fn bind_all(params: &[TargetParam]) -> Vec<Box<dyn InputParameter>> {
    params.iter().map(to_input_parameter).collect()
}

/// YashanDB target writer.
pub struct YashanWriter {
    env: &'static Environment,
    connection_string: String,
}

impl YashanWriter {
    /// Create a writer and verify that the target accepts connections.
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let writer = Self {
            env: environment()?,
            connection_string: config.odbc_connection_string(),
        };

        debug!(
            "ODBC target connection string (credentials hidden): Driver={{{}}};Server={};Port={};...",
            config.driver, config.host, config.port
        );

        let conn = writer.connect()?;
        conn.execute(PING_SQL, ())
            .map_err(|e| MigrateError::pool(e, "testing YashanDB target connection"))?;

        info!(
            "Connected to YashanDB target via ODBC: {}:{}",
            config.host, config.port
        );
        Ok(writer)
    }

    /// Open a new autocommit connection.
    fn connect(&self) -> Result<Connection<'static>> {
        self.env
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(|e| {
                MigrateError::pool(
                    format!("ODBC target connection failed: {}", e),
                    "getting YashanDB connection",
                )
            })
    }

    /// Run a query and collect every row as text cells.
    fn query_text(&self, sql: &str, params: &[TargetParam]) -> Result<Vec<Vec<Option<String>>>> {
        let conn = self.connect()?;
        let bound = bind_all(params);
        let mut rows = Vec::new();

        let Some(mut cursor) = conn
            .execute(sql, bound.as_slice())
            .map_err(|e| MigrateError::target(e, sql))?
        else {
            return Ok(rows);
        };

        let mut buffers = TextRowSet::for_cursor(CATALOG_BATCH_ROWS, &mut cursor, Some(CATALOG_MAX_STR_LEN))
            .map_err(|e| MigrateError::target(format!("create buffer failed: {}", e), sql))?;
        let width = buffers.num_cols();
        let mut row_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| MigrateError::target(format!("bind buffer failed: {}", e), sql))?;

        while let Some(batch) = row_cursor
            .fetch()
            .map_err(|e| MigrateError::target(format!("fetch failed: {}", e), sql))?
        {
            for row_idx in 0..batch.num_rows() {
                rows.push(
                    (0..width)
                        .map(|col| {
                            batch
                                .at(col, row_idx)
                                .map(|b| String::from_utf8_lossy(b).to_string())
                        })
                        .collect(),
                );
            }
        }
        Ok(rows)
    }

    /// First column of the first row as i64.
    fn query_scalar_i64(&self, sql: &str) -> Result<i64> {
        let rows = self.query_text(sql, &[])?;
        let Some(Some(text)) = rows.first().and_then(|r| r.first()) else {
            return Ok(0);
        };
        text.trim()
            .parse::<i64>()
            .map_err(|e| MigrateError::target(format!("parse i64 failed: {} - value: {}", e, text), sql))
    }
}

impl TargetWriter for YashanWriter {
    fn table_columns(&self, table: &TargetTable) -> Result<Vec<TargetColumn>> {
        let rows = self.query_text(
            COLUMNS_SQL,
            &[
                TargetParam::Text(table.schema.clone()),
                TargetParam::Text(table.table.clone()),
            ],
        )?;

        let columns: Vec<TargetColumn> = rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let data_type = cells.next().flatten()?;
                let name = cells.next().flatten()?;
                Some(TargetColumn::new(name, data_type))
            })
            .collect();

        debug!("{}: {} target columns", table, columns.len());
        Ok(columns)
    }

    fn row_count(&self, table: &TargetTable) -> Result<i64> {
        self.query_scalar_i64(&count_sql(table))
    }

    fn open_session(&self) -> Result<Box<dyn TargetSession>> {
        let conn = self.connect()?;
        conn.set_autocommit(false)
            .map_err(|e| MigrateError::pool(e, "starting YashanDB transaction"))?;
        Ok(Box::new(YashanSession { conn }))
    }

    fn open_lookup(&self, lookup: &RowLookup) -> Result<Box<dyn TargetLookup>> {
        let conn = self.connect()?;
        Ok(Box::new(YashanLookup {
            conn,
            lookup: lookup.clone(),
        }))
    }

    fn server_version(&self) -> Result<String> {
        let conn = self.connect()?;
        let name = conn
            .database_management_system_name()
            .map_err(|e| MigrateError::pool(e, "reading YashanDB version"))?;
        Ok(name)
    }
}

/// One YashanDB connection with autocommit off.
pub struct YashanSession {
    conn: Connection<'static>,
}

impl TargetSession for YashanSession {
    fn insert(&mut self, stmt: &InsertStatement, params: &[TargetParam]) -> Result<()> {
        let bound = bind_all(params);
        self.conn
            .execute(&stmt.sql, bound.as_slice())
            .map_err(|e| MigrateError::target(e, &stmt.sql))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .commit()
            .map_err(|e| MigrateError::Target(format!("commit failed: {}", e)))
    }
}

impl Drop for YashanSession {
    fn drop(&mut self) {
        // Uncommitted rows are discarded with the session.
        let _ = self.conn.rollback();
    }
}

/// One autocommit connection serving keyed lookups against one table.
pub struct YashanLookup {
    conn: Connection<'static>,
    lookup: RowLookup,
}

impl TargetLookup for YashanLookup {
    fn fetch(&mut self, key: &[TargetParam]) -> Result<Option<Row>> {
        let sql = &self.lookup.sql;
        let bound = bind_all(key);

        let Some(mut cursor) = self
            .conn
            .execute(sql, bound.as_slice())
            .map_err(|e| MigrateError::target(e, sql))?
        else {
            return Ok(None);
        };

        let Some(mut row) = cursor.next_row().map_err(|e| MigrateError::target(e, sql))? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.lookup.columns.len());
        let mut buf = Vec::new();
        for (i, column) in self.lookup.columns.iter().enumerate() {
            buf.clear();
            let col = (i + 1) as u16;
            let present = if column.is_binary() {
                row.get_binary(col, &mut buf)
            } else {
                row.get_text(col, &mut buf)
            }
            .map_err(|e| MigrateError::target(e, sql))?;

            values.push(if present {
                RawValue::Bytes(buf.clone())
            } else {
                RawValue::Null
            });
        }
        Ok(Some(values))
    }
}
