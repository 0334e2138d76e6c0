//! Identifier validation and quoting for both sides of the sync.
//!
//! SQL identifiers cannot be bound as parameters, so every schema, table and
//! column name that ends up in dynamic SQL passes through this module.
//!
//! MySQL identifiers are always backtick-quoted. YashanDB identifiers follow
//! [`TargetNaming`]: unquoted names fold to upper case on the target, so a
//! case-insensitive run upper-cases names itself and quotes only what must be
//! quoted, while a case-sensitive run quotes every name verbatim.

use std::collections::HashSet;

use crate::error::{MigrateError, Result};

/// Maximum identifier length (MySQL allows 64, YashanDB 64 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Words YashanDB reserves; column names matching one must be quoted.
const RESERVED_KEYWORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY",
    "CASE", "CHAR", "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT",
    "CREATE", "CURRENT", "DATE", "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP",
    "ELSE", "END", "EXCLUSIVE", "EXISTS", "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP",
    "HAVING", "IDENTIFIED", "IMMEDIATE", "IN", "INCREMENT", "INDEX", "INITIAL", "INSERT",
    "INTEGER", "INTERSECT", "INTO", "IS", "KEY", "LEVEL", "LIKE", "LIMIT", "LOCK", "LONG",
    "MAXEXTENTS", "MINUS", "MODE", "MODIFY", "NOAUDIT", "NOCOMPRESS", "NOT", "NOWAIT",
    "NULL", "NUMBER", "OF", "OFFLINE", "OFFSET", "ON", "ONLINE", "OPTION", "OR", "ORDER",
    "PCTFREE", "PRIOR", "PUBLIC", "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW", "ROWID",
    "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", "START",
    "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TIME", "TIMESTAMP", "TO",
    "TRIGGER", "TYPE", "UID", "UNION", "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES",
    "VARCHAR", "VARCHAR2", "VIEW", "WHEN", "WHENEVER", "WHERE", "WITH",
];

/// Validate an identifier for security issues.
///
/// Rejects empty names, names containing null bytes and names exceeding
/// [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Qualify a MySQL table as `` `schema`.`table` ``.
pub fn qualify_mysql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mysql(schema)?, quote_mysql(table)?))
}

/// Quote a YashanDB identifier verbatim with double quotes.
pub fn quote_yashan(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Identifier rules for target SQL, passed explicitly to both engines.
#[derive(Debug, Clone)]
pub struct TargetNaming {
    case_sensitive: bool,
    keywords: HashSet<String>,
}

impl Default for TargetNaming {
    fn default() -> Self {
        Self::new(false, &[])
    }
}

impl TargetNaming {
    /// Build naming rules from the case-sensitivity flag and extra keywords.
    pub fn new(case_sensitive: bool, extra_keywords: &[String]) -> Self {
        let keywords = RESERVED_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .chain(extra_keywords.iter().map(|k| k.to_uppercase()))
            .collect();
        Self {
            case_sensitive,
            keywords,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether `name` collides with a reserved word (case-insensitive).
    pub fn is_keyword(&self, name: &str) -> bool {
        self.keywords.contains(&name.to_uppercase())
    }

    /// Schema name as stored in the target catalog.
    ///
    /// A schema wrapped in double quotes is taken verbatim without the quotes.
    pub fn schema_name(&self, schema: &str) -> String {
        if let Some(inner) = schema
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return inner.to_string();
        }
        self.fold(schema)
    }

    /// Table name as stored in the target catalog.
    pub fn table_name(&self, table: &str) -> String {
        self.fold(table)
    }

    /// Quoted `"SCHEMA"."TABLE"` reference.
    pub fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        Ok(format!(
            "{}.{}",
            quote_yashan(&self.schema_name(schema))?,
            quote_yashan(&self.table_name(table))?
        ))
    }

    /// Render a source column name for use in a target predicate.
    pub fn column(&self, name: &str) -> Result<String> {
        validate_identifier(name)?;
        if self.case_sensitive {
            quote_yashan(name)
        } else if self.is_keyword(name) {
            quote_yashan(&name.to_uppercase())
        } else {
            Ok(name.to_string())
        }
    }

    fn fold(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_uppercase()
        }
    }
}
