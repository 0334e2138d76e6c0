//! YashanDB target driver.
//!
//! - [`YashanWriter`]: catalog queries, counts and key lookups over ODBC
//! - [`YashanSession`]: one connection holding one write transaction
//! - [`dialect`]: SQL text for inserts, lookups and catalog queries
//!
//! # Connection String
//!
//! ```text
//! Driver={YashanDB};Server=host;Port=1688;UID=user;PWD=password;
//! ```

pub mod dialect;
mod writer;

pub use writer::{YashanSession, YashanWriter};
