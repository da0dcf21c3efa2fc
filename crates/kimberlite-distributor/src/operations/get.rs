//! Reference `GetOperation` (SPEC_FULL.md "Child operation contracts").

use crate::bucket_db::BucketDatabase;
use crate::error::ReturnCode;
use crate::reply::Trace;
use crate::sender::{MessageSender, OutboundMessage};
use crate::types::{BucketId, DocumentId, MessageId, NodeIndex, Timestamp};

use super::{
    aggregate_get_result, summarize_get_outcomes, FieldSet, NewestReplica, NodeStore, StorageCommand,
    StorageReply,
};

/// Sent to fetch a document's current state from every replica of its
/// bucket (spec.md §6: constructible with a command and a field set).
#[derive(Debug, Clone)]
pub struct GetCommand {
    pub msg_id: MessageId,
    pub bucket_id: BucketId,
    pub document_id: DocumentId,
    pub field_set: FieldSet,
}

#[derive(Debug, Clone)]
pub struct GetReply {
    pub msg_id: MessageId,
    pub result: ReturnCode,
    pub document: Option<crate::types::Document>,
    pub last_modified_timestamp: Timestamp,
    pub had_consistent_replicas: bool,
    /// Whether at least one replica failed to answer this Get, without
    /// necessarily failing the whole operation (spec.md §6
    /// `anyReplicasFailed()`). The safe-path metadata-Get handler treats
    /// this as the conservative-abort signal it can't tell apart from a
    /// stale-but-live replica (spec.md §4.5, §7).
    pub any_replicas_failed: bool,
    /// The replica holding the highest pre-update timestamp, if replicas
    /// disagree (spec.md §4.5 "newestReplica"). `None` when every replica
    /// that answered reported the same timestamp.
    pub newest_replica: Option<NewestReplica>,
    pub trace: Trace,
}

impl OutboundMessage for GetCommand {
    fn msg_id(&self) -> MessageId {
        self.msg_id
    }
}

/// Fans a Get out to every replica currently holding the target bucket and
/// synthesizes a single reply (spec.md §6: `replicasInDb()`, `newestReplica()`,
/// `anyReplicasFailed()`).
#[derive(Debug)]
pub struct GetOperation {
    bucket_id: BucketId,
    document_id: DocumentId,
    field_set: FieldSet,
    replicas_in_db: Vec<(BucketId, NodeIndex)>,
    newest_replica: Option<NewestReplica>,
    any_replicas_failed: bool,
}

impl GetOperation {
    /// Captures the replica set at construction time, not at `start()` time
    /// (spec.md §4.5: "populated at construction time, not at start()-time"),
    /// so a later change to the bucket database is detectable by comparing
    /// against [`Self::replicas_in_db`].
    pub fn new(bucket_db: &dyn BucketDatabase, document_id: DocumentId, field_set: FieldSet) -> Self {
        let bucket_id = document_id.bucket_id();
        let replicas_in_db = bucket_db
            .get_parents(bucket_id)
            .iter()
            .flat_map(|entry| entry.nodes().iter().map(move |node| (entry.bucket_id, *node)))
            .collect();
        Self {
            bucket_id,
            document_id,
            field_set,
            replicas_in_db,
            newest_replica: None,
            any_replicas_failed: false,
        }
    }

    pub fn replicas_in_db(&self) -> &[(BucketId, NodeIndex)] {
        &self.replicas_in_db
    }

    pub fn newest_replica(&self) -> Option<NewestReplica> {
        self.newest_replica
    }

    pub fn any_replicas_failed(&self) -> bool {
        self.any_replicas_failed
    }

    /// Queries every replica synchronously and emits the synthesized reply
    /// through `sink` (spec.md §6: "may synchronously emit a reply via the
    /// sink" — for this in-memory reference store, it always does).
    pub fn start(
        &mut self,
        store: &dyn NodeStore,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        msg_id: MessageId,
    ) {
        let outcomes: Vec<_> = self
            .replicas_in_db
            .iter()
            .map(|(bucket_id, node)| store.get(*bucket_id, *node, &self.document_id, self.field_set))
            .collect();

        let (had_consistent_replicas, any_failed, newest) =
            summarize_get_outcomes(&self.replicas_in_db, &outcomes);
        self.any_replicas_failed = any_failed;
        self.newest_replica = newest;

        let result = aggregate_get_result(&outcomes);
        let document = if result.success() {
            outcomes
                .iter()
                .find(|o| o.success && o.document.is_some())
                .and_then(|o| o.document.clone())
        } else {
            None
        };
        let last_modified_timestamp = newest.map(|n| n.timestamp).unwrap_or(Timestamp::EPOCH);

        sink.send_reply(StorageReply::Get(GetReply {
            msg_id,
            result,
            document,
            last_modified_timestamp,
            had_consistent_replicas,
            any_replicas_failed: any_failed,
            newest_replica: newest,
            trace: Trace::new(),
        }));
    }

    pub fn bucket_id(&self) -> BucketId {
        self.bucket_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_db::StaticBucketDatabase;
    use crate::operations::InMemoryNodeStore;
    use crate::types::{Document, FieldValue};
    use std::collections::BTreeMap;

    struct RecordingSink {
        reply: Option<StorageReply>,
    }
    impl MessageSender<StorageCommand, StorageReply> for RecordingSink {
        fn send_command(&mut self, _cmd: StorageCommand) {}
        fn send_reply(&mut self, reply: StorageReply) {
            self.reply = Some(reply);
        }
        fn send_to_node(&mut self, _node_type: crate::sender::NodeType, _node: NodeIndex, _cmd: StorageCommand) {}
        fn distributor_index(&self) -> u16 {
            0
        }
        fn cluster_name(&self) -> &str {
            "test"
        }
    }

    #[test]
    fn consistent_replicas_report_no_failures_and_agreement() {
        let bucket_id = BucketId::new(1);
        let db = StaticBucketDatabase::single_consistent(bucket_id, 2);
        let doc_id = DocumentId::new("doc:1");
        let mut store = InMemoryNodeStore::new();
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), FieldValue::Str("hello".to_string()));
        let doc = Document {
            id: doc_id.clone(),
            doc_type: "music".to_string(),
            fields,
        };
        store.seed(bucket_id, NodeIndex::new(0), doc.clone(), Timestamp::from(100));
        store.seed(bucket_id, NodeIndex::new(1), doc, Timestamp::from(100));

        let mut op = GetOperation::new(&db, doc_id, FieldSet::All);
        let mut sink = RecordingSink { reply: None };
        op.start(&store, &mut sink, MessageId::new(1));

        assert!(!op.any_replicas_failed());
        assert_eq!(op.replicas_in_db().len(), 2);
        match sink.reply {
            Some(StorageReply::Get(reply)) => {
                assert!(reply.had_consistent_replicas);
                assert!(reply.result.success());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn divergent_replicas_report_newest() {
        let bucket_id = BucketId::new(2);
        let db = StaticBucketDatabase::single_consistent(bucket_id, 2);
        let doc_id = DocumentId::new("doc:2");
        let mut store = InMemoryNodeStore::new();
        let stale = Document::blank("music", doc_id.clone());
        let fresh = Document::blank("music", doc_id.clone());
        store.seed(bucket_id, NodeIndex::new(0), stale, Timestamp::from(10));
        store.seed(bucket_id, NodeIndex::new(1), fresh, Timestamp::from(20));

        let mut op = GetOperation::new(&db, doc_id, FieldSet::Metadata);
        let mut sink = RecordingSink { reply: None };
        op.start(&store, &mut sink, MessageId::new(2));

        let newest = op.newest_replica().expect("newest replica recorded");
        assert_eq!(newest.node, NodeIndex::new(1));
        assert_eq!(newest.timestamp, Timestamp::from(20));
    }

    #[test]
    fn a_failed_replica_is_reported_without_failing_the_whole_get() {
        let bucket_id = BucketId::new(3);
        let db = StaticBucketDatabase::single_consistent(bucket_id, 2);
        let doc_id = DocumentId::new("doc:3");
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(5));
        store.mark_down(bucket_id, NodeIndex::new(1));

        let mut op = GetOperation::new(&db, doc_id, FieldSet::All);
        let mut sink = RecordingSink { reply: None };
        op.start(&store, &mut sink, MessageId::new(3));

        assert!(op.any_replicas_failed());
        match sink.reply {
            Some(StorageReply::Get(reply)) => assert!(reply.result.success()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
