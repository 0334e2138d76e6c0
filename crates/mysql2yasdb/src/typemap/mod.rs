//! MySQL column types and their YashanDB counterparts.
//!
//! Every declared MySQL type name is parsed once into a [`SourceType`]; the
//! value converter and the type map both dispatch on that enum instead of on
//! raw strings.

use std::fmt;

use crate::error::{MigrateError, Result};

/// A MySQL column type, parsed from its declared name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceType {
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    MediumInt { unsigned: bool },
    Int { unsigned: bool },
    BigInt { unsigned: bool },
    Decimal,
    Float,
    Double,
    Bit,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Binary,
    VarBinary,
    TinyBlob,
    Blob,
    MediumBlob,
    LongBlob,
    TinyText,
    Text,
    MediumText,
    LongText,
    Json,
    Enum,
    Set,
    Geometry,
    /// Any type name this tool has no rule for.
    Other(String),
}

/// How a cell of a given type is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Date,
    DateTime,
    Time,
    Year,
    Bit,
    Binary,
    Json,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Exact numerics (DECIMAL and BIGINT), kept as decimals.
    Exact,
    /// Everything else is decoded as text.
    Text,
}

impl SourceType {
    /// Parse a declared type name such as `bigint unsigned`, `varchar(64)`
    /// or `DATETIME`.
    pub fn parse(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();
        let unsigned = lower.contains("unsigned");
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "tinyint" | "bool" | "boolean" => SourceType::TinyInt { unsigned },
            "smallint" => SourceType::SmallInt { unsigned },
            "mediumint" => SourceType::MediumInt { unsigned },
            "int" | "integer" => SourceType::Int { unsigned },
            "bigint" => SourceType::BigInt { unsigned },
            "decimal" | "numeric" | "dec" | "fixed" => SourceType::Decimal,
            "float" => SourceType::Float,
            "double" | "real" => SourceType::Double,
            "bit" => SourceType::Bit,
            "date" => SourceType::Date,
            "datetime" => SourceType::DateTime,
            "timestamp" => SourceType::Timestamp,
            "time" => SourceType::Time,
            "year" => SourceType::Year,
            "char" => SourceType::Char,
            "varchar" => SourceType::VarChar,
            "nchar" => SourceType::NChar,
            "nvarchar" => SourceType::NVarChar,
            "binary" => SourceType::Binary,
            "varbinary" => SourceType::VarBinary,
            "tinyblob" => SourceType::TinyBlob,
            "blob" => SourceType::Blob,
            "mediumblob" => SourceType::MediumBlob,
            "longblob" => SourceType::LongBlob,
            "tinytext" => SourceType::TinyText,
            "text" => SourceType::Text,
            "mediumtext" => SourceType::MediumText,
            "longtext" => SourceType::LongText,
            "json" => SourceType::Json,
            "enum" => SourceType::Enum,
            "set" => SourceType::Set,
            "geometry" => SourceType::Geometry,
            _ => SourceType::Other(lower),
        }
    }

    /// Conversion rule for values of this type.
    pub fn kind(&self) -> ValueKind {
        match self {
            SourceType::Date => ValueKind::Date,
            SourceType::DateTime | SourceType::Timestamp => ValueKind::DateTime,
            SourceType::Time => ValueKind::Time,
            SourceType::Year => ValueKind::Year,
            SourceType::Bit => ValueKind::Bit,
            SourceType::Json => ValueKind::Json,
            SourceType::Float => ValueKind::Float32,
            SourceType::Double => ValueKind::Float64,
            SourceType::Decimal | SourceType::BigInt { .. } => ValueKind::Exact,
            SourceType::Binary
            | SourceType::VarBinary
            | SourceType::TinyBlob
            | SourceType::Blob
            | SourceType::MediumBlob
            | SourceType::LongBlob
            | SourceType::Geometry => ValueKind::Binary,
            _ => ValueKind::Text,
        }
    }

    /// Large object kinds cannot be used in a lookup predicate.
    pub fn is_large_object(&self) -> bool {
        matches!(
            self,
            SourceType::TinyBlob
                | SourceType::Blob
                | SourceType::MediumBlob
                | SourceType::LongBlob
                | SourceType::TinyText
                | SourceType::Text
                | SourceType::MediumText
                | SourceType::LongText
        )
    }

    /// The YashanDB type this MySQL type is created as.
    pub fn yashan_type(&self) -> Result<&'static str> {
        let mapped = match self {
            SourceType::TinyInt { .. } => "smallint",
            SourceType::SmallInt { .. } | SourceType::MediumInt { .. } => "integer",
            SourceType::Int { .. } => "bigint",
            SourceType::BigInt { .. } | SourceType::Decimal => "number",
            SourceType::Float => "float",
            SourceType::Double => "double",
            SourceType::Bit => "bit",
            SourceType::Date | SourceType::Year => "date",
            SourceType::DateTime | SourceType::Timestamp => "timestamp",
            SourceType::Time => "time",
            SourceType::Char => "char",
            SourceType::VarChar | SourceType::Enum | SourceType::Set => "varchar",
            SourceType::NChar => "nchar",
            SourceType::NVarChar => "nvarchar",
            SourceType::Binary | SourceType::VarBinary => "raw",
            SourceType::TinyBlob
            | SourceType::Blob
            | SourceType::MediumBlob
            | SourceType::LongBlob => "blob",
            SourceType::TinyText
            | SourceType::Text
            | SourceType::MediumText
            | SourceType::LongText => "clob",
            SourceType::Json => "json",
            SourceType::Geometry => "geometry",
            SourceType::Other(name) => return Err(MigrateError::UnsupportedType(name.clone())),
        };
        Ok(mapped)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, unsigned) = match self {
            SourceType::TinyInt { unsigned } => ("tinyint", *unsigned),
            SourceType::SmallInt { unsigned } => ("smallint", *unsigned),
            SourceType::MediumInt { unsigned } => ("mediumint", *unsigned),
            SourceType::Int { unsigned } => ("int", *unsigned),
            SourceType::BigInt { unsigned } => ("bigint", *unsigned),
            SourceType::Decimal => ("decimal", false),
            SourceType::Float => ("float", false),
            SourceType::Double => ("double", false),
            SourceType::Bit => ("bit", false),
            SourceType::Date => ("date", false),
            SourceType::DateTime => ("datetime", false),
            SourceType::Timestamp => ("timestamp", false),
            SourceType::Time => ("time", false),
            SourceType::Year => ("year", false),
            SourceType::Char => ("char", false),
            SourceType::VarChar => ("varchar", false),
            SourceType::NChar => ("nchar", false),
            SourceType::NVarChar => ("nvarchar", false),
            SourceType::Binary => ("binary", false),
            SourceType::VarBinary => ("varbinary", false),
            SourceType::TinyBlob => ("tinyblob", false),
            SourceType::Blob => ("blob", false),
            SourceType::MediumBlob => ("mediumblob", false),
            SourceType::LongBlob => ("longblob", false),
            SourceType::TinyText => ("tinytext", false),
            SourceType::Text => ("text", false),
            SourceType::MediumText => ("mediumtext", false),
            SourceType::LongText => ("longtext", false),
            SourceType::Json => ("json", false),
            SourceType::Enum => ("enum", false),
            SourceType::Set => ("set", false),
            SourceType::Geometry => ("geometry", false),
            SourceType::Other(name) => (name.as_str(), false),
        };
        if unsigned {
            write!(f, "{} unsigned", name)
        } else {
            f.write_str(name)
        }
    }
}

/// Whether a declared target type matches the expected one, ignoring case
/// and any length/precision suffix.
pub fn target_type_matches(expected: &str, declared: &str) -> bool {
    let base = declared
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    base.eq_ignore_ascii_case(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_names() {
        assert_eq!(SourceType::parse("DATETIME"), SourceType::DateTime);
        assert_eq!(SourceType::parse("varchar(255)"), SourceType::VarChar);
        assert_eq!(
            SourceType::parse("bigint unsigned"),
            SourceType::BigInt { unsigned: true }
        );
        assert_eq!(
            SourceType::parse("int(11) unsigned zerofill"),
            SourceType::Int { unsigned: true }
        );
        assert_eq!(SourceType::parse("numeric"), SourceType::Decimal);
        assert_eq!(
            SourceType::parse("point"),
            SourceType::Other("point".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_unsigned() {
        assert_eq!(
            SourceType::BigInt { unsigned: true }.to_string(),
            "bigint unsigned"
        );
        assert_eq!(SourceType::Json.to_string(), "json");
    }

    #[test]
    fn test_yashan_type_map() {
        let cases = [
            ("tinyint", "smallint"),
            ("smallint", "integer"),
            ("mediumint unsigned", "integer"),
            ("int", "bigint"),
            ("bigint", "number"),
            ("decimal", "number"),
            ("year", "date"),
            ("datetime", "timestamp"),
            ("varbinary", "raw"),
            ("mediumtext", "clob"),
            ("longblob", "blob"),
            ("enum", "varchar"),
            ("geometry", "geometry"),
        ];
        for (mysql, yashan) in cases {
            assert_eq!(SourceType::parse(mysql).yashan_type().unwrap(), yashan, "{}", mysql);
        }
    }

    #[test]
    fn test_unsupported_type_is_error() {
        let err = SourceType::parse("multipolygon").yashan_type().unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedType(ref t) if t == "multipolygon"));
    }

    #[test]
    fn test_large_objects_flagged() {
        for lob in ["tinyblob", "blob", "mediumblob", "longblob", "tinytext", "text", "mediumtext", "longtext"] {
            assert!(SourceType::parse(lob).is_large_object(), "{}", lob);
        }
        assert!(!SourceType::parse("varchar").is_large_object());
        assert!(!SourceType::parse("varbinary").is_large_object());
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(SourceType::parse("float").kind(), ValueKind::Float32);
        assert_eq!(SourceType::parse("double").kind(), ValueKind::Float64);
        assert_eq!(SourceType::parse("bigint unsigned").kind(), ValueKind::Exact);
        assert_eq!(SourceType::parse("int").kind(), ValueKind::Text);
        assert_eq!(SourceType::parse("timestamp").kind(), ValueKind::DateTime);
        assert_eq!(SourceType::parse("blob").kind(), ValueKind::Binary);
    }

    #[test]
    fn test_target_type_matches() {
        assert!(target_type_matches("number", "NUMBER(20,0)"));
        assert!(target_type_matches("timestamp", "TIMESTAMP"));
        assert!(!target_type_matches("varchar", "CLOB"));
    }
}
