//! In-memory sync target.
//!
//! Implements [`SyncTarget`] over plain maps so the pipeline can run without
//! a database: integration tests, embedders prototyping against the engine.
//! Supports poisoning a key to make the next write fail after staging, which
//! exercises the roll-back-everything atomicity contract.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::batch::{FieldValue, SyncBatch};
use crate::catalog::SyncEntityDescriptor;
use crate::error::{Result, SyncError};
use crate::target::SyncTarget;

/// One stored parent row.
#[derive(Debug, Clone)]
pub struct StoredParent {
    pub values: Vec<FieldValue>,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    /// table → key → row
    parents: HashMap<String, BTreeMap<i64, StoredParent>>,
    /// table → (fk, sequence) → values
    children: HashMap<String, BTreeMap<(i64, i64), Vec<FieldValue>>>,
}

/// In-memory implementation of [`SyncTarget`].
#[derive(Debug, Default)]
pub struct MemoryTarget {
    store: Mutex<Store>,
    poison_key: Mutex<Option<i64>>,
}

impl MemoryTarget {
    /// Create an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a parent row directly, bypassing the writer. Used to establish
    /// a watermark before a run.
    pub fn seed_parent(&self, table: &str, key: i64, values: Vec<FieldValue>) {
        let mut store = self.store.lock().expect("memory target lock");
        store.parents.entry(table.to_string()).or_default().insert(
            key,
            StoredParent {
                values,
                last_synced_at: Utc::now(),
            },
        );
    }

    /// Make the next `write_batch` containing this parent key fail after
    /// staging, simulating a constraint violation inside the transaction.
    pub fn poison_key(&self, key: i64) {
        *self.poison_key.lock().expect("memory target lock") = Some(key);
    }

    /// Clear a previously set poison key.
    pub fn clear_poison(&self) {
        *self.poison_key.lock().expect("memory target lock") = None;
    }

    /// Snapshot of a parent table, in key order.
    pub fn parent_rows(&self, table: &str) -> Vec<(i64, StoredParent)> {
        let store = self.store.lock().expect("memory target lock");
        store
            .parents
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default()
    }

    /// Snapshot of a child table as `(fk, sequence, values)`, in key order.
    pub fn child_rows(&self, table: &str) -> Vec<(i64, i64, Vec<FieldValue>)> {
        let store = self.store.lock().expect("memory target lock");
        store
            .children
            .get(table)
            .map(|t| {
                t.iter()
                    .map(|((fk, seq), v)| (*fk, *seq, v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SyncTarget for MemoryTarget {
    async fn resolve_watermark(&self, entity: &SyncEntityDescriptor) -> Result<i64> {
        let store = self.store.lock().expect("memory target lock");
        Ok(store
            .parents
            .get(entity.parent_table)
            .and_then(|t| t.keys().next_back().copied())
            .unwrap_or(0))
    }

    async fn write_batch(
        &self,
        entity: &SyncEntityDescriptor,
        batch: &SyncBatch,
    ) -> Result<(usize, usize)> {
        let poison = *self.poison_key.lock().expect("memory target lock");
        let mut store = self.store.lock().expect("memory target lock");

        // Stage against copies; commit by swapping back. A poisoned key
        // aborts after staging, leaving the store untouched - the same
        // all-or-nothing outcome a rolled-back transaction gives.
        let mut parents = store
            .parents
            .get(entity.parent_table)
            .cloned()
            .unwrap_or_default();
        let mut children = entity
            .child
            .as_ref()
            .and_then(|c| store.children.get(c.table).cloned())
            .unwrap_or_default();

        let now = Utc::now();
        let mut parent_count = 0usize;
        for row in &batch.parents {
            if poison == Some(row.key) {
                return Err(SyncError::write(
                    entity.name,
                    format!("constraint violation on key {}", row.key),
                ));
            }
            parents.insert(
                row.key,
                StoredParent {
                    values: row.values.clone(),
                    last_synced_at: now,
                },
            );
            parent_count += 1;
        }

        let mut child_count = 0usize;
        if let Some(child) = &entity.child {
            for (parent_key, rows) in &batch.children {
                if child.replace_rows {
                    children.retain(|(fk, _), _| fk != parent_key);
                }
                for row in rows {
                    if poison == Some(row.parent_key) {
                        return Err(SyncError::write(
                            entity.name,
                            format!("constraint violation on key {}", row.parent_key),
                        ));
                    }
                    children.insert((row.parent_key, row.sequence), row.values.clone());
                    child_count += 1;
                }
            }
            store.children.insert(child.table.to_string(), children);
        }
        store
            .parents
            .insert(entity.parent_table.to_string(), parents);

        Ok((parent_count, child_count))
    }
}
