//! Child operation contracts (SPEC_FULL.md "Child operation contracts").
//!
//! spec.md treats `GetOperation`/`PutOperation`/`UpdateOperation` as pure
//! external collaborators, reachable only through start/receive/on_close
//! (spec.md §6). This module supplies thin, fully-working reference
//! implementations of that contract backed by an in-memory per-node
//! document store, so the coordinator can be exercised end-to-end in
//! tests. They are not the production Get/Put/Update operations — those
//! live in `kimberlite-storage`/`kimberlite-vsr`, out of scope here.

pub mod get;
pub mod put;
pub mod update;

use std::collections::HashMap;

use crate::error::ReturnCode;
use crate::sender::OutboundMessage;
use crate::types::{BucketId, Document, DocumentId, DocumentUpdate, MessageId, NodeIndex, Timestamp};

pub use get::{GetCommand, GetOperation, GetReply};
pub use put::{PutCommand, PutOperation, PutReply};
pub use update::UpdateOperation;

/// The one command type every child operation, and the coordinator itself,
/// sends through a [`crate::sender::MessageSender`].
#[derive(Debug, Clone)]
pub enum StorageCommand {
    Get(GetCommand),
    Put(PutCommand),
    Update(crate::command::UpdateCommand),
}

impl OutboundMessage for StorageCommand {
    fn msg_id(&self) -> MessageId {
        match self {
            StorageCommand::Get(cmd) => cmd.msg_id,
            StorageCommand::Put(cmd) => cmd.msg_id,
            StorageCommand::Update(_) => {
                unreachable!("UpdateCommand is dispatched directly by the coordinator, never boxed as a StorageCommand")
            }
        }
    }
}

/// The one reply type every child operation synthesizes.
#[derive(Debug, Clone)]
pub enum StorageReply {
    Get(GetReply),
    Put(PutReply),
    Update(crate::reply::UpdateReply),
}

/// Identifies the replica holding the highest timestamp for a document id
/// (spec.md §6, "newestReplica").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewestReplica {
    pub bucket_id: BucketId,
    pub node: NodeIndex,
    pub timestamp: Timestamp,
}

/// Which fields a Get should fetch. Metadata-only Gets bypass write-commit
/// queues (weak read consistency is safe because the meta-store is always
/// committed before a mutation ACK returns); full Gets use strong
/// consistency since payload fields are being dereferenced (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    Metadata,
    All,
}

/// The result of a single node-level Get.
#[derive(Debug, Clone)]
pub struct NodeGetOutcome {
    pub success: bool,
    pub document: Option<Document>,
    pub timestamp: Timestamp,
}

/// The result of a single node-level update apply.
#[derive(Debug, Clone)]
pub struct NodeUpdateOutcome {
    pub success: bool,
    /// The timestamp of the document that existed on this node before the
    /// update was applied, if any.
    pub old_timestamp: Option<Timestamp>,
}

/// Per-node document storage, consumed by the reference Get/Put/Update
/// operations. Stands in for the real storage-node RPC surface spec.md
/// excludes from scope ("the distributor message transport").
pub trait NodeStore {
    fn get(
        &self,
        bucket_id: BucketId,
        node: NodeIndex,
        document_id: &DocumentId,
        field_set: FieldSet,
    ) -> NodeGetOutcome;

    fn put(&mut self, bucket_id: BucketId, node: NodeIndex, document: Document, timestamp: Timestamp) -> bool;

    fn apply_update(
        &mut self,
        bucket_id: BucketId,
        node: NodeIndex,
        update: &DocumentUpdate,
        timestamp: Timestamp,
    ) -> NodeUpdateOutcome;
}

/// An in-memory [`NodeStore`] for tests: a map from (bucket, node, document
/// id) to the document copy held there, plus an injectable set of nodes
/// that fail every request (to exercise `any_replicas_failed` and
/// transport-failure branches without a real network).
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    documents: HashMap<(BucketId, NodeIndex, DocumentId), (Document, Timestamp)>,
    down_nodes: std::collections::HashSet<(BucketId, NodeIndex)>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a replica directly, bypassing Put — used to set up test
    /// scenarios with pre-existing, possibly divergent, replica state.
    pub fn seed(&mut self, bucket_id: BucketId, node: NodeIndex, document: Document, timestamp: Timestamp) {
        self.documents
            .insert((bucket_id, node, document.id.clone()), (document, timestamp));
    }

    /// Marks a (bucket, node) pair as failing every request from now on.
    pub fn mark_down(&mut self, bucket_id: BucketId, node: NodeIndex) {
        self.down_nodes.insert((bucket_id, node));
    }

    pub fn contains(&self, bucket_id: BucketId, node: NodeIndex, document_id: &DocumentId) -> bool {
        self.documents
            .contains_key(&(bucket_id, node, document_id.clone()))
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(
        &self,
        bucket_id: BucketId,
        node: NodeIndex,
        document_id: &DocumentId,
        field_set: FieldSet,
    ) -> NodeGetOutcome {
        if self.down_nodes.contains(&(bucket_id, node)) {
            return NodeGetOutcome {
                success: false,
                document: None,
                timestamp: Timestamp::EPOCH,
            };
        }
        match self.documents.get(&(bucket_id, node, document_id.clone())) {
            Some((doc, ts)) => NodeGetOutcome {
                success: true,
                document: match field_set {
                    FieldSet::All => Some(doc.clone()),
                    FieldSet::Metadata => None,
                },
                timestamp: *ts,
            },
            None => NodeGetOutcome {
                success: true,
                document: None,
                timestamp: Timestamp::EPOCH,
            },
        }
    }

    fn put(&mut self, bucket_id: BucketId, node: NodeIndex, document: Document, timestamp: Timestamp) -> bool {
        if self.down_nodes.contains(&(bucket_id, node)) {
            return false;
        }
        self.documents
            .insert((bucket_id, node, document.id.clone()), (document, timestamp));
        true
    }

    fn apply_update(
        &mut self,
        bucket_id: BucketId,
        node: NodeIndex,
        update: &DocumentUpdate,
        timestamp: Timestamp,
    ) -> NodeUpdateOutcome {
        if self.down_nodes.contains(&(bucket_id, node)) {
            return NodeUpdateOutcome {
                success: false,
                old_timestamp: None,
            };
        }
        let key = (bucket_id, node, update.id.clone());
        let old_timestamp = self.documents.get(&key).map(|(_, ts)| *ts);
        let mut doc = self
            .documents
            .get(&key)
            .map(|(doc, _)| doc.clone())
            .unwrap_or_else(|| Document::blank(update.doc_type.clone(), update.id.clone()));
        if update.apply_to(&mut doc).is_err() {
            return NodeUpdateOutcome {
                success: false,
                old_timestamp,
            };
        }
        self.documents.insert(key, (doc, timestamp));
        NodeUpdateOutcome {
            success: true,
            old_timestamp,
        }
    }
}

/// Combines per-node Get outcomes into a reply-ready summary: whether all
/// live replicas agree on timestamp, and which (if any) holds the newest.
pub(crate) fn summarize_get_outcomes(
    replicas: &[(BucketId, NodeIndex)],
    outcomes: &[NodeGetOutcome],
) -> (bool, bool, Option<NewestReplica>) {
    let mut any_failed = false;
    let mut timestamps = Vec::new();
    let mut newest: Option<NewestReplica> = None;
    for ((bucket_id, node), outcome) in replicas.iter().zip(outcomes) {
        if !outcome.success {
            any_failed = true;
            continue;
        }
        timestamps.push(outcome.timestamp);
        if newest.map(|n| outcome.timestamp > n.timestamp).unwrap_or(true) {
            newest = Some(NewestReplica {
                bucket_id: *bucket_id,
                node: *node,
                timestamp: outcome.timestamp,
            });
        }
    }
    let had_consistent_replicas = !any_failed && timestamps.windows(2).all(|w| w[0] == w[1]);
    (had_consistent_replicas, any_failed, newest)
}

pub(crate) fn aggregate_get_result(outcomes: &[NodeGetOutcome]) -> ReturnCode {
    if outcomes.iter().any(|o| !o.success) && outcomes.iter().all(|o| !o.success) {
        ReturnCode::InternalFailure("all replicas failed to respond to Get".to_string())
    } else {
        ReturnCode::ok()
    }
}
