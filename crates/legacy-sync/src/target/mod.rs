//! Target store adapters.
//!
//! The orchestration logic is store-agnostic: everything it needs from the
//! relational side sits behind [`SyncTarget`]. [`postgres::PgTarget`] is the
//! production implementation; [`memory::MemoryTarget`] backs tests and
//! embedders that want the pipeline without a database.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::batch::SyncBatch;
use crate::catalog::SyncEntityDescriptor;
use crate::error::Result;

/// Store-side operations the sync engine depends on.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Highest already-synced natural key for an entity, or zero when the
    /// target table is empty. The exclusive lower bound for "new" records.
    async fn resolve_watermark(&self, entity: &SyncEntityDescriptor) -> Result<i64>;

    /// Write one batch inside a single transaction: parents upserted on the
    /// natural key, then child rows keyed by parent+sequence. Any row
    /// failure rolls the whole transaction back; no partial entity sync is
    /// ever visible. Returns `(parent_count, child_count)` written.
    async fn write_batch(
        &self,
        entity: &SyncEntityDescriptor,
        batch: &SyncBatch,
    ) -> Result<(usize, usize)>;
}
