//! Sync orchestrator - per-entity pipeline coordinator.
//!
//! One run walks `resolve watermark → read children → read parents →
//! assemble → write` and produces exactly one [`SyncOutcome`]. Progress
//! notifications fire at phase boundaries and are advisory only; the
//! terminal outcome is the contract. The orchestrator never retries - the
//! caller decides whether to re-trigger - and a given entity must not have
//! two runs in flight at once (the caller's mutual exclusion; different
//! entities write disjoint tables and may sync concurrently).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregate::ChildGroups;
use crate::batch::{FieldValue, ParentRow, SyncBatch, SyncOutcome};
use crate::catalog::{self, ChildSpec, SyncEntityDescriptor};
use crate::coerce;
use crate::error::{Result, SyncError};
use crate::legacy::LegacyFile;
use crate::target::SyncTarget;

/// Pipeline phase of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Querying the target for the highest already-synced key.
    ResolvingWatermark,
    /// Reading and aggregating the child/detail file.
    ReadingChildren,
    /// Reading the parent/header file and filtering by watermark.
    ReadingParents,
    /// Writing the assembled batch in one transaction.
    Writing,
    /// Terminal: the run completed.
    Succeeded,
    /// Terminal: the run failed; the outcome message names the cause.
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::ResolvingWatermark => "resolving watermark",
            SyncPhase::ReadingChildren => "reading detail records",
            SyncPhase::ReadingParents => "reading header records",
            SyncPhase::Writing => "writing to target",
            SyncPhase::Succeeded => "completed",
            SyncPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One progress notification. Advisory only: losing or ignoring these does
/// not affect the run.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    /// Entity being synced.
    pub entity: &'static str,
    /// Phase just entered.
    pub phase: SyncPhase,
    /// Human-readable description for display.
    pub detail: String,
    /// Record count, where known at this boundary.
    pub records: Option<usize>,
}

/// Handle to a background sync run started with [`SyncOrchestrator::spawn`].
pub struct SyncHandle {
    /// Phase notifications, in order. Closes when the run finishes.
    pub progress: mpsc::UnboundedReceiver<SyncProgress>,
    entity: &'static str,
    result: oneshot::Receiver<SyncOutcome>,
}

impl SyncHandle {
    /// Wait for the run's single terminal outcome.
    pub async fn finished(self) -> SyncOutcome {
        let entity = self.entity;
        let now = Utc::now();
        self.result.await.unwrap_or_else(|_| SyncOutcome {
            run_id: String::new(),
            entity: entity.to_string(),
            success: false,
            message: "sync task aborted before reporting a result".into(),
            parent_count: 0,
            child_count: 0,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
        })
    }
}

/// Per-entity sync pipeline over a [`SyncTarget`].
///
/// Cheap to clone: the target is shared, only the data directory path is
/// copied. Clones are how background runs detach from the caller.
pub struct SyncOrchestrator<T> {
    target: Arc<T>,
    data_dir: PathBuf,
}

impl<T> Clone for SyncOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            data_dir: self.data_dir.clone(),
        }
    }
}

impl<T: SyncTarget> SyncOrchestrator<T> {
    /// Create an orchestrator reading legacy exports from `data_dir`.
    pub fn new(target: Arc<T>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            target,
            data_dir: data_dir.into(),
        }
    }

    /// Run one entity sync to completion.
    ///
    /// Never returns an error: every fatal condition is folded into the
    /// outcome so callers get exactly one terminal result per trigger.
    pub async fn run(&self, entity: &'static SyncEntityDescriptor) -> SyncOutcome {
        self.run_with_progress(entity, |_| {}).await
    }

    /// Run one entity sync, delivering progress notifications through
    /// `progress` at each phase boundary.
    pub async fn run_with_progress<F>(
        &self,
        entity: &'static SyncEntityDescriptor,
        progress: F,
    ) -> SyncOutcome
    where
        F: Fn(SyncProgress),
    {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        info!(entity = entity.name, run_id = %run_id, "starting sync run");

        let result = self.run_inner(entity, &progress).await;

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        match result {
            Ok((parent_count, child_count, message)) => {
                progress(SyncProgress {
                    entity: entity.name,
                    phase: SyncPhase::Succeeded,
                    detail: message.clone(),
                    records: Some(parent_count),
                });
                info!(
                    entity = entity.name,
                    run_id = %run_id,
                    parent_count,
                    child_count,
                    "sync run completed in {duration_seconds:.1}s"
                );
                SyncOutcome {
                    run_id,
                    entity: entity.name.to_string(),
                    success: true,
                    message,
                    parent_count,
                    child_count,
                    started_at,
                    completed_at,
                    duration_seconds,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(entity = entity.name, run_id = %run_id, "sync run failed: {message}");
                progress(SyncProgress {
                    entity: entity.name,
                    phase: SyncPhase::Failed,
                    detail: message.clone(),
                    records: None,
                });
                SyncOutcome {
                    run_id,
                    entity: entity.name.to_string(),
                    success: false,
                    message,
                    parent_count: 0,
                    child_count: 0,
                    started_at,
                    completed_at,
                    duration_seconds,
                }
            }
        }
    }

    async fn run_inner<F>(
        &self,
        entity: &'static SyncEntityDescriptor,
        progress: &F,
    ) -> Result<(usize, usize, String)>
    where
        F: Fn(SyncProgress),
    {
        progress(SyncProgress {
            entity: entity.name,
            phase: SyncPhase::ResolvingWatermark,
            detail: format!("resolving watermark for {}", entity.name),
            records: None,
        });
        let watermark = self.target.resolve_watermark(entity).await?;
        debug!(entity = entity.name, watermark, "watermark resolved");

        // Children are read first and in full, even when zero qualify; only
        // groups whose parent passes the watermark are attached later.
        let mut groups = match &entity.child {
            Some(child) => {
                progress(SyncProgress {
                    entity: entity.name,
                    phase: SyncPhase::ReadingChildren,
                    detail: format!("reading {}", child.file),
                    records: None,
                });
                let path = self.data_dir.join(child.file);
                let child = *child;
                run_blocking(move || read_children(&path, entity, &child)).await?
            }
            None => {
                progress(SyncProgress {
                    entity: entity.name,
                    phase: SyncPhase::ReadingChildren,
                    detail: format!("{} has no detail file", entity.name),
                    records: Some(0),
                });
                ChildGroups::new()
            }
        };

        progress(SyncProgress {
            entity: entity.name,
            phase: SyncPhase::ReadingParents,
            detail: format!("reading {}", entity.parent_file),
            records: Some(groups.total_rows()),
        });
        let parent_path = self.data_dir.join(entity.parent_file);
        let parents =
            run_blocking(move || read_parents(&parent_path, entity, watermark)).await?;

        if parents.is_empty() {
            info!(entity = entity.name, watermark, "nothing to sync");
            return Ok((0, 0, "no new records".to_string()));
        }

        let mut batch = SyncBatch::default();
        for parent in parents {
            let lots = groups.lots_for(parent.key);
            if !lots.is_empty() {
                batch.children.insert(parent.key, lots);
            }
            batch.parents.push(parent);
        }
        if groups.remaining_rows() > 0 {
            debug!(
                entity = entity.name,
                orphans = groups.remaining_rows(),
                "dropping detail rows with no qualifying parent"
            );
        }

        let parent_count = batch.parents.len();
        let child_count = batch.child_count();
        progress(SyncProgress {
            entity: entity.name,
            phase: SyncPhase::Writing,
            detail: format!("writing {parent_count} records ({child_count} detail rows)"),
            records: Some(parent_count),
        });
        let (written_parents, written_children) = self.target.write_batch(entity, &batch).await?;

        Ok((
            written_parents,
            written_children,
            format!("synced {written_parents} records ({written_children} detail rows)"),
        ))
    }
}

impl<T: SyncTarget + 'static> SyncOrchestrator<T> {
    /// Start one entity sync as an independent background task.
    ///
    /// The triggering caller is never blocked: progress arrives on the
    /// handle's channel and the terminal outcome through
    /// [`SyncHandle::finished`]. There is no cancellation - once writing
    /// starts the run goes to completion or failure.
    pub fn spawn(&self, entity: &'static SyncEntityDescriptor) -> SyncHandle {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let outcome = orchestrator
                .run_with_progress(entity, move |p| {
                    let _ = progress_tx.send(p);
                })
                .await;
            let _ = result_tx.send(outcome);
        });

        SyncHandle {
            progress: progress_rx,
            entity: entity.name,
            result: result_rx,
        }
    }

    /// Sync every catalog entity concurrently and collect the outcomes.
    ///
    /// Entities write disjoint tables, so their runs do not interact; each
    /// failure is isolated to its own outcome.
    pub async fn run_all(&self) -> Vec<SyncOutcome> {
        let handles: Vec<_> = catalog::entities().iter().map(|e| self.spawn(e)).collect();
        futures::future::join_all(handles.into_iter().map(SyncHandle::finished)).await
    }
}

/// Run blocking file I/O off the async runtime.
async fn run_blocking<R, F>(f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?
}

/// Read and aggregate the child/detail file.
fn read_children(
    path: &Path,
    entity: &SyncEntityDescriptor,
    child: &ChildSpec,
) -> Result<ChildGroups> {
    let file = LegacyFile::open(path)?;
    file.schema().require_fields(child.required_fields())?;

    let mut groups = ChildGroups::new();
    let mut unkeyed = 0usize;
    for record in file.records() {
        let record = record?;
        let raw_key = record.raw(child.parent_key_field).unwrap_or_default();
        let Some(key) = entity.key_format.parse(raw_key) else {
            unkeyed += 1;
            continue;
        };
        let sequence = child
            .sequence_field
            .and_then(|f| coerce::coerce_integer(record.raw(f).unwrap_or_default(), None));
        let values = child
            .columns
            .iter()
            .map(|c| FieldValue::from_raw(c.kind, record.raw(c.field).unwrap_or_default()))
            .collect();
        groups.push(key, sequence, values);
    }
    if unkeyed > 0 {
        warn!(
            entity = entity.name,
            file = child.file,
            unkeyed, "dropped detail rows with unparsable parent key"
        );
    }
    debug!(
        entity = entity.name,
        file = child.file,
        rows = groups.total_rows(),
        parents = groups.group_count(),
        "aggregated detail file"
    );
    Ok(groups)
}

/// Read the parent file, keeping rows strictly above the watermark.
fn read_parents(
    path: &Path,
    entity: &SyncEntityDescriptor,
    watermark: i64,
) -> Result<Vec<ParentRow>> {
    let file = LegacyFile::open(path)?;
    file.schema().require_fields(entity.required_fields())?;

    let mut parents = Vec::new();
    for record in file.records() {
        let record = record?;
        let Some(key) = entity.parse_key(record.raw(entity.key_field).unwrap_or_default())
        else {
            continue;
        };
        if key <= watermark {
            continue;
        }
        let values = entity
            .columns
            .iter()
            .map(|c| FieldValue::from_raw(c.kind, record.raw(c.field).unwrap_or_default()))
            .collect();
        parents.push(ParentRow { key, values });
    }
    parents.sort_by_key(|p| p.key);
    debug!(
        entity = entity.name,
        file = entity.parent_file,
        qualifying = parents.len(),
        watermark,
        "read parent file"
    );
    Ok(parents)
}
