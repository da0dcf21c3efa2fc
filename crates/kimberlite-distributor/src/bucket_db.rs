//! The bucket database contract (SPEC_FULL.md "Bucket database").
//!
//! Generalizes `kimberlite_directory`'s tenant-to-group routing one level
//! down: instead of "which VSR group owns this key", the question here is
//! "which storage node replicas currently hold this bucket, and do they
//! agree." Consumed as a read-only lookup; placement, splitting, and
//! rebalancing are out of scope (spec.md Non-goals).

use crate::types::{BucketId, NodeIndex};

/// A parent entry for a bucket id: the replica set currently assigned to
/// it, plus whether that set is considered consistent (no split in
/// progress, replicas agree on membership).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    pub bucket_id: BucketId,
    nodes: Vec<NodeIndex>,
    valid_and_consistent: bool,
}

impl BucketEntry {
    pub fn new(bucket_id: BucketId, nodes: Vec<NodeIndex>, valid_and_consistent: bool) -> Self {
        Self {
            bucket_id,
            nodes,
            valid_and_consistent,
        }
    }

    /// No split in progress and the replica set agrees — the precondition
    /// for the fast path (spec.md §4.3).
    pub fn valid_and_consistent(&self) -> bool {
        self.valid_and_consistent
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ref(&self, index: usize) -> NodeIndex {
        self.nodes[index]
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }
}

/// Read-only lookup of parent entries for a given document bucket id.
pub trait BucketDatabase {
    /// Returns the parent entries currently covering `bucket_id`. More than
    /// one entry means a split is in progress.
    fn get_parents(&self, bucket_id: BucketId) -> Vec<BucketEntry>;
}

/// An in-memory [`BucketDatabase`] for tests and the reference child
/// operations, backed by a simple map from bucket id to its entries.
#[derive(Debug, Clone, Default)]
pub struct StaticBucketDatabase {
    entries: std::collections::HashMap<BucketId, Vec<BucketEntry>>,
}

impl StaticBucketDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parent entries for `bucket_id`, replacing any existing
    /// mapping.
    pub fn set_parents(&mut self, bucket_id: BucketId, entries: Vec<BucketEntry>) {
        self.entries.insert(bucket_id, entries);
    }

    /// Convenience constructor for the common case: a single consistent
    /// entry with `node_count` replicas `node#0..node#node_count`.
    pub fn single_consistent(bucket_id: BucketId, node_count: u16) -> Self {
        let mut db = Self::new();
        let nodes = (0..node_count).map(NodeIndex::new).collect();
        db.set_parents(
            bucket_id,
            vec![BucketEntry::new(bucket_id, nodes, true)],
        );
        db
    }
}

impl BucketDatabase for StaticBucketDatabase {
    fn get_parents(&self, bucket_id: BucketId) -> Vec<BucketEntry> {
        self.entries.get(&bucket_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_consistent_entry_reports_valid_and_consistent() {
        let bucket = BucketId::new(7);
        let db = StaticBucketDatabase::single_consistent(bucket, 3);
        let parents = db.get_parents(bucket);
        assert_eq!(parents.len(), 1);
        assert!(parents[0].valid_and_consistent());
        assert_eq!(parents[0].node_count(), 3);
    }

    #[test]
    fn missing_bucket_has_no_parents() {
        let db = StaticBucketDatabase::new();
        assert!(db.get_parents(BucketId::new(42)).is_empty());
    }

    #[test]
    fn split_in_progress_has_multiple_parents() {
        let bucket = BucketId::new(1);
        let mut db = StaticBucketDatabase::new();
        db.set_parents(
            bucket,
            vec![
                BucketEntry::new(BucketId::new(1), vec![NodeIndex::new(0)], true),
                BucketEntry::new(BucketId::new(2), vec![NodeIndex::new(1)], true),
            ],
        );
        assert_eq!(db.get_parents(bucket).len(), 2);
    }
}
