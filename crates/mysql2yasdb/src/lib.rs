//! # mysql2yasdb
//!
//! MySQL to YashanDB data sync and verification library.
//!
//! This library copies table data from MySQL into pre-created YashanDB
//! tables and checks the copy afterwards:
//!
//! - **Parallel sync** across tables and across row windows within a table
//! - **Batched commits** with per-row failures skipped and counted
//! - **Type conversion** between MySQL wire values and YashanDB parameters
//! - **Verification** by row count and by sampled primary-key lookups
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql2yasdb::{Config, Orchestrator, TunableOverrides};
//!
//! #[tokio::main]
//! async fn main() -> mysql2yasdb::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let tunables = config.sync.resolve(&TunableOverrides::default())?;
//!     let orchestrator = Orchestrator::new(config, tunables).await?;
//!     let report = orchestrator.sync().await?;
//!     println!("Migrated {} rows", report.rows_migrated);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod convert;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod sync;
pub mod typemap;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenient access
pub use catalog::{CatalogReader, UnitSelection};
pub use config::{Config, SourceConfig, SyncConfig, TargetConfig, TunableOverrides, Tunables};
pub use error::{MigrateError, Result};
pub use orchestrator::{CheckReport, HealthCheckResult, Orchestrator, SyncReport};
pub use plan::{plan_chunks, ChunkPlan};
pub use sync::{SyncEngine, TableSyncResult};
pub use verify::{ContentCheck, TableCompareResult, VerifyEngine};
