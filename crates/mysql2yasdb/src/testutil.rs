//! In-memory source and target doubles for engine tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::schema::{ColumnDescriptor, TargetColumn, TargetTable};
use crate::core::traits::{
    InsertStatement, ReadOptions, ReadWindow, RowLookup, SourceReader, TargetLookup,
    TargetSession, TargetWriter,
};
use crate::core::value::{RawValue, Row, RowBatch, TargetParam};
use crate::error::{MigrateError, Result};

#[derive(Clone, Default)]
struct SourceTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

/// MySQL stand-in holding tables in memory.
#[derive(Clone, Default)]
pub struct MockSource {
    databases: Vec<String>,
    tables: BTreeMap<(String, String), SourceTable>,
    reads: Arc<Mutex<Vec<ReadWindow>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, name: &str) -> Self {
        if !self.databases.iter().any(|d| d == name) {
            self.databases.push(name.to_string());
        }
        self
    }

    pub fn with_table(
        self,
        schema: &str,
        table: &str,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Row>,
    ) -> Self {
        let mut source = self.with_database(schema);
        source.tables.insert(
            (schema.to_string(), table.to_string()),
            SourceTable { columns, rows },
        );
        source
    }

    /// Windows requested through `read_rows`, in call order.
    pub fn reads(&self) -> Vec<ReadWindow> {
        self.reads.lock().unwrap().clone()
    }

    fn table(&self, schema: &str, table: &str) -> Result<&SourceTable> {
        self.tables
            .get(&(schema.to_string(), table.to_string()))
            .ok_or_else(|| MigrateError::Catalog(format!("Table '{}.{}' doesn't exist", schema, table)))
    }
}

#[async_trait]
impl SourceReader for MockSource {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.databases.clone())
    }

    async fn list_base_tables(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .keys()
            .filter(|(s, _)| s == schema)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table(schema, table)?.columns.clone())
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        Ok(self.table(schema, table)?.rows.len() as i64)
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>> {
        self.reads.lock().unwrap().push(opts.window);

        let rows: Result<Vec<Row>> = self.table(&opts.schema, &opts.table).map(|t| {
            let all = t.rows.iter();
            match opts.window {
                ReadWindow::Range { limit, offset } => all
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect(),
                ReadWindow::Sample(0) => all.cloned().collect(),
                ReadWindow::Sample(n) => all.take(n as usize).cloned().collect(),
            }
        });

        let batches: Vec<Result<RowBatch>> = match rows {
            Ok(rows) => rows
                .chunks(opts.batch_size.max(1))
                .map(|c| Ok(c.to_vec()))
                .collect(),
            Err(e) => vec![Err(e)],
        };

        let (tx, rx) = mpsc::channel(batches.len().max(1));
        for batch in batches {
            let _ = tx.try_send(batch);
        }
        rx
    }

    async fn server_version(&self) -> Result<String> {
        Ok("8.0.36-mock".to_string())
    }
}

#[derive(Default)]
struct TargetData {
    columns: Vec<TargetColumn>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct TargetState {
    tables: BTreeMap<(String, String), TargetData>,
    commits: usize,
    sessions: usize,
    lookups: usize,
    /// Inserts binding any of these text values fail.
    poison: HashSet<String>,
    /// Commit number (1-based) that fails.
    fail_commit: Option<usize>,
    fail_fetch: bool,
}

/// YashanDB stand-in; committed rows are stored as text cells.
#[derive(Clone, Default)]
pub struct MockTarget {
    state: Arc<Mutex<TargetState>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, schema: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().tables.insert(
            (schema.to_string(), table.to_string()),
            TargetData {
                columns: columns
                    .iter()
                    .map(|(name, ty)| TargetColumn::new(*name, *ty))
                    .collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn with_row(self, schema: &str, table: &str, row: Row) -> Self {
        if let Some(data) = self
            .state
            .lock()
            .unwrap()
            .tables
            .get_mut(&(schema.to_string(), table.to_string()))
        {
            data.rows.push(row);
        }
        self
    }

    pub fn poison(self, value: &str) -> Self {
        self.state.lock().unwrap().poison.insert(value.to_string());
        self
    }

    pub fn fail_commit(self, nth: usize) -> Self {
        self.state.lock().unwrap().fail_commit = Some(nth);
        self
    }

    pub fn fail_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn sessions(&self) -> usize {
        self.state.lock().unwrap().sessions
    }

    /// Lookup connections opened so far.
    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }

    pub fn rows(&self, schema: &str, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .map(|d| d.rows.clone())
            .unwrap_or_default()
    }
}

/// How a bound parameter reads back through a text cursor.
pub fn param_to_raw(param: &TargetParam) -> RawValue {
    match param {
        TargetParam::Null => RawValue::Null,
        TargetParam::Text(s) => RawValue::from(s.as_str()),
        TargetParam::Bytes(b) => RawValue::Bytes(b.clone()),
        TargetParam::Int(v) => RawValue::from(v.to_string().as_str()),
        TargetParam::Float(v) => RawValue::from(v.to_string().as_str()),
        TargetParam::Date(d) => RawValue::from(d.format("%Y-%m-%d 00:00:00").to_string().as_str()),
        TargetParam::Timestamp(ts) => {
            RawValue::from(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string().as_str())
        }
        TargetParam::Time(t) => RawValue::from(t.format("%H:%M:%S%.f").to_string().as_str()),
    }
}

impl TargetWriter for MockTarget {
    fn table_columns(&self, table: &TargetTable) -> Result<Vec<TargetColumn>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .get(&(table.schema.clone(), table.table.clone()))
            .map(|d| d.columns.clone())
            .unwrap_or_default())
    }

    fn row_count(&self, table: &TargetTable) -> Result<i64> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&(table.schema.clone(), table.table.clone()))
            .map(|d| d.rows.len() as i64)
            .ok_or_else(|| MigrateError::Target(format!("table {} does not exist", table)))
    }

    fn open_session(&self) -> Result<Box<dyn TargetSession>> {
        self.state.lock().unwrap().sessions += 1;
        Ok(Box::new(MockSession {
            target: self.clone(),
            pending: Vec::new(),
        }))
    }

    fn open_lookup(&self, lookup: &RowLookup) -> Result<Box<dyn TargetLookup>> {
        self.state.lock().unwrap().lookups += 1;
        Ok(Box::new(MockLookup {
            target: self.clone(),
            lookup: lookup.clone(),
        }))
    }

    fn server_version(&self) -> Result<String> {
        Ok("YashanDB 23.2-mock".to_string())
    }
}

struct MockLookup {
    target: MockTarget,
    lookup: RowLookup,
}

impl TargetLookup for MockLookup {
    fn fetch(&mut self, key: &[TargetParam]) -> Result<Option<Row>> {
        let lookup = &self.lookup;
        let state = self.target.state.lock().unwrap();
        if state.fail_fetch {
            return Err(MigrateError::Target("connection reset".to_string()));
        }
        let Some(data) = state
            .tables
            .get(&(lookup.table.schema.clone(), lookup.table.table.clone()))
        else {
            return Err(MigrateError::Target(format!("table {} does not exist", lookup.table)));
        };

        let key_idx: Vec<usize> = lookup
            .key_columns
            .iter()
            .filter_map(|k| {
                data.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(k))
            })
            .collect();
        let wanted: Vec<RawValue> = key.iter().map(param_to_raw).collect();

        let found = data.rows.iter().find(|row| {
            key_idx
                .iter()
                .zip(&wanted)
                .all(|(idx, value)| row.get(*idx) == Some(value))
        });

        Ok(found.map(|row| {
            lookup
                .columns
                .iter()
                .map(|c| {
                    data.columns
                        .iter()
                        .position(|d| d.name == c.name)
                        .and_then(|i| row.get(i).cloned())
                        .unwrap_or(RawValue::Null)
                })
                .collect()
        }))
    }
}

struct MockSession {
    target: MockTarget,
    pending: Vec<((String, String), Row)>,
}

impl TargetSession for MockSession {
    fn insert(&mut self, stmt: &InsertStatement, params: &[TargetParam]) -> Result<()> {
        let state = self.target.state.lock().unwrap();
        let poisoned = params
            .iter()
            .any(|p| matches!(p, TargetParam::Text(s) if state.poison.contains(s)));
        if poisoned {
            return Err(MigrateError::Target("value too large for column".to_string()));
        }
        let expected = state
            .tables
            .get(&(stmt.table.schema.clone(), stmt.table.table.clone()))
            .map(|d| d.columns.len())
            .unwrap_or_default();
        if params.len() != expected {
            return Err(MigrateError::Target("not enough values".to_string()));
        }
        drop(state);

        self.pending.push((
            (stmt.table.schema.clone(), stmt.table.table.clone()),
            params.iter().map(param_to_raw).collect(),
        ));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut state = self.target.state.lock().unwrap();
        state.commits += 1;
        if state.fail_commit == Some(state.commits) {
            self.pending.clear();
            return Err(MigrateError::Target("commit failed".to_string()));
        }
        for (key, row) in self.pending.drain(..) {
            if let Some(data) = state.tables.get_mut(&key) {
                data.rows.push(row);
            }
        }
        Ok(())
    }
}
