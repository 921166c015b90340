//! Parent-child aggregation.
//!
//! The child/detail file is read fully and grouped in memory by parsed
//! parent key (legacy files are bounded in size; no streaming join). After
//! the watermark filters the parents, each qualifying parent asks for its
//! group; parents with no children get an empty list, never an error.
//! Groups left unclaimed belong to already-synced or not-yet-qualifying
//! parents and are dropped.

use std::collections::BTreeMap;

use crate::batch::{ChildRow, FieldValue};

/// One child row awaiting attachment, in file order.
#[derive(Debug, Clone)]
struct PendingChild {
    /// Durable legacy sequence, when the file carries one.
    sequence: Option<i64>,
    values: Vec<FieldValue>,
}

/// In-memory grouping of child rows by parent key.
#[derive(Debug, Default)]
pub struct ChildGroups {
    groups: BTreeMap<i64, Vec<PendingChild>>,
    total: usize,
}

impl ChildGroups {
    /// Create an empty grouping (entities without a child file).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one child row to its parent's group, preserving file order.
    pub fn push(&mut self, parent_key: i64, sequence: Option<i64>, values: Vec<FieldValue>) {
        self.groups
            .entry(parent_key)
            .or_default()
            .push(PendingChild { sequence, values });
        self.total += 1;
    }

    /// Total child rows aggregated so far.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.total
    }

    /// Number of distinct parent keys seen.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Rows still unclaimed after assembly. These belong to already-synced
    /// or not-yet-qualifying parents and never reach the writer.
    #[must_use]
    pub fn remaining_rows(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Take the child rows for one parent, ordered and sequenced.
    ///
    /// Rows with a durable legacy sequence keep it and are sorted by it
    /// (stable, so equal or missing sequences preserve file order). Rows
    /// without one are numbered past the group's highest durable value, in
    /// file order, so a fallback sequence can never collide with a sibling's
    /// legacy one. In an all-fresh group that degenerates to a 1-based
    /// rewrite, which lets a resync fully replace a parent's children.
    pub fn lots_for(&mut self, parent_key: i64) -> Vec<ChildRow> {
        let mut pending = self.groups.remove(&parent_key).unwrap_or_default();
        pending.sort_by_key(|c| c.sequence.unwrap_or(i64::MAX));
        let mut next = pending.iter().filter_map(|c| c.sequence).max().unwrap_or(0);
        pending
            .into_iter()
            .map(|c| {
                let sequence = c.sequence.unwrap_or_else(|| {
                    next += 1;
                    next
                });
                ChildRow {
                    parent_key,
                    sequence,
                    values: c.values,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Vec<FieldValue> {
        vec![FieldValue::Text(s.into())]
    }

    #[test]
    fn test_groups_by_parent_key() {
        let mut groups = ChildGroups::new();
        groups.push(10, None, text("a"));
        groups.push(11, None, text("b"));
        groups.push(10, None, text("c"));
        assert_eq!(groups.total_rows(), 3);
        assert_eq!(groups.group_count(), 2);

        let lots = groups.lots_for(10);
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].values, text("a"));
        assert_eq!(lots[1].values, text("c"));
    }

    #[test]
    fn test_missing_parent_yields_empty_list() {
        let mut groups = ChildGroups::new();
        groups.push(10, None, text("a"));
        assert!(groups.lots_for(99).is_empty());
    }

    #[test]
    fn test_fresh_sequence_is_one_based_file_order() {
        let mut groups = ChildGroups::new();
        groups.push(7, None, text("first"));
        groups.push(7, None, text("second"));
        let lots = groups.lots_for(7);
        assert_eq!(lots[0].sequence, 1);
        assert_eq!(lots[1].sequence, 2);
    }

    #[test]
    fn test_fallback_sequence_never_collides_with_durable_sibling() {
        let mut groups = ChildGroups::new();
        groups.push(100, Some(2), text("kept"));
        groups.push(100, None, text("unsequenced"));
        let lots = groups.lots_for(100);
        assert_eq!(
            lots.iter().map(|l| l.sequence).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(lots[0].values, text("kept"));
        assert_eq!(lots[1].values, text("unsequenced"));
    }

    #[test]
    fn test_durable_sequence_orders_and_survives() {
        let mut groups = ChildGroups::new();
        groups.push(7, Some(30), text("third"));
        groups.push(7, Some(10), text("first"));
        groups.push(7, Some(20), text("second"));
        let lots = groups.lots_for(7);
        assert_eq!(
            lots.iter().map(|l| l.sequence).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        assert_eq!(lots[0].values, text("first"));
    }
}
