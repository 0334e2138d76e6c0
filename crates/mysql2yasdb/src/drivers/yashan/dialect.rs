//! YashanDB SQL text for the statements the engines issue.

use crate::core::identifier::{quote_yashan, TargetNaming};
use crate::core::schema::{MigrationUnit, TargetColumn, TargetTable};
use crate::core::traits::{InsertStatement, RowLookup};
use crate::error::Result;

/// Column catalog query; binds owner and table name.
pub const COLUMNS_SQL: &str = "SELECT DATA_TYPE, COLUMN_NAME FROM ALL_TAB_COLUMNS \
     WHERE OWNER = ? AND TABLE_NAME = ? ORDER BY COLUMN_ID";

/// Connectivity check.
pub const PING_SQL: &str = "SELECT 1 FROM DUAL";

/// Resolve the target table of a unit under the naming rules.
pub fn target_table(naming: &TargetNaming, unit: &MigrationUnit) -> Result<TargetTable> {
    Ok(TargetTable {
        schema: naming.schema_name(&unit.target_schema),
        table: naming.table_name(&unit.table),
        qualified: naming.qualify(&unit.target_schema, &unit.table)?,
    })
}

/// `SELECT COUNT(*) FROM "S"."T"`.
pub fn count_sql(table: &TargetTable) -> String {
    format!("SELECT COUNT(*) FROM {}", table.qualified)
}

/// Parameterised insert over the target's own column list.
pub fn insert_statement(table: &TargetTable, columns: &[TargetColumn]) -> Result<InsertStatement> {
    let quoted = columns
        .iter()
        .map(|c| quote_yashan(&c.name))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(",");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.qualified,
        quoted.join(","),
        placeholders
    );
    Ok(InsertStatement {
        table: table.clone(),
        columns: columns.iter().map(|c| c.name.clone()).collect(),
        sql,
    })
}

/// Single-row select by primary key, key columns rendered under `naming`.
pub fn row_lookup(
    naming: &TargetNaming,
    table: &TargetTable,
    columns: &[TargetColumn],
    key_columns: &[String],
) -> Result<RowLookup> {
    let select = columns
        .iter()
        .map(|c| quote_yashan(&c.name))
        .collect::<Result<Vec<_>>>()?;
    let predicates = key_columns
        .iter()
        .map(|k| naming.column(k).map(|c| format!("{} = ?", c)))
        .collect::<Result<Vec<_>>>()?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select.join(","),
        table.qualified,
        predicates.join(" AND ")
    );
    Ok(RowLookup {
        table: table.clone(),
        columns: columns.to_vec(),
        key_columns: key_columns.to_vec(),
        sql,
    })
}
