//! Database driver implementations.
//!
//! - [`mysql`]: MySQL source reader (SQLx)
//! - [`yashan`]: YashanDB target writer (ODBC)
//!
//! Each driver implements one side of the seams in [`crate::core::traits`];
//! the engines only ever see `Arc<dyn SourceReader>` and `Arc<dyn TargetWriter>`.

pub mod mysql;
pub mod yashan;

pub use mysql::MysqlReader;
pub use yashan::{YashanSession, YashanWriter};
