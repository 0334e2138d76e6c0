//! Core abstractions shared by the engines and drivers.
//!
//! - [`schema`]: migration units, source and target column metadata
//! - [`value`]: raw, canonical and bound cell values
//! - [`traits`]: source and target driver seams
//! - [`identifier`]: quoting and target naming rules

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use identifier::TargetNaming;
pub use schema::{ColumnDescriptor, MigrationUnit, TargetColumn, TargetTable};
pub use traits::{
    InsertStatement, ReadOptions, ReadWindow, RowLookup, SourceReader, TargetSession,
    TargetWriter,
};
pub use value::{CanonicalValue, Number, RawValue, Row, RowBatch, TargetParam, TemporalKind};
