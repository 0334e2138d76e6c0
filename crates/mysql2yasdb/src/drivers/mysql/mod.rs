//! MySQL source driver.
//!
//! - [`MysqlReader`]: catalog queries and windowed row streaming
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//!
//! Row reads use the text protocol, so every cell reaches the conversion
//! layer as bytes regardless of the column type.

mod reader;

pub use reader::MysqlReader;
