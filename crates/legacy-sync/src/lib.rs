//! # legacy-sync
//!
//! Incremental synchronization engine for legacy flat-file exports.
//!
//! Reads the fixed-schema export files produced by the predecessor desktop
//! database system and merges their contents into a PostgreSQL store that
//! the rest of the application treats as the system of record:
//!
//! - **Legacy record reading** with soft-deleted rows filtered at the source
//! - **Tolerant field coercion** - blank, NUL-padded, or garbage values
//!   resolve to declared defaults instead of aborting a batch
//! - **Watermark-bounded increments** - only rows whose natural key exceeds
//!   the highest already-synced key are imported
//! - **Parent/child aggregation** across physically separate header and
//!   detail files
//! - **One transaction per entity run** with conflict-tolerant upserts, so
//!   partial syncs are never visible
//!
//! The sync is one-directional and insert/update only: the legacy side is
//! authoritative, deletes do not propagate, and retroactively edited rows
//! below the watermark are left alone (a full backfill is the remedy).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use legacy_sync::{catalog, PgTarget, SyncConfig, SyncOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::load("sync.yaml")?;
//!     let target = Arc::new(PgTarget::new(&config.target).await?);
//!     let orchestrator = SyncOrchestrator::new(target, config.legacy.data_dir);
//!
//!     let mut handle = orchestrator.spawn(catalog::entity("delivery").unwrap());
//!     while let Some(progress) = handle.progress.recv().await {
//!         println!("{}: {}", progress.phase, progress.detail);
//!     }
//!     let outcome = handle.finished().await;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod coerce;
pub mod config;
pub mod error;
pub mod legacy;
pub mod orchestrator;
pub mod target;

// Re-exports for convenient access
pub use batch::{ChildRow, FieldValue, ParentRow, SyncBatch, SyncOutcome};
pub use catalog::{ColumnKind, ColumnSpec, KeyFormat, SyncEntityDescriptor};
pub use config::{LegacyConfig, SyncConfig, TargetConfig};
pub use error::{Result, SyncError};
pub use legacy::{LegacyFile, LegacyRecord};
pub use orchestrator::{SyncHandle, SyncOrchestrator, SyncPhase, SyncProgress};
pub use target::memory::MemoryTarget;
pub use target::postgres::PgTarget;
pub use target::SyncTarget;
