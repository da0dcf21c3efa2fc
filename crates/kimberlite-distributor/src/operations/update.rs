//! Reference `UpdateOperation` (SPEC_FULL.md "Child operation contracts").
//!
//! Applies an update independently at every replica and reports whether
//! the replicas' pre-update timestamps agreed — the signal the fast-path
//! driver uses to decide between "done" and "repair needed" (spec.md §4.4,
//! §6: `getNewestTimestampLocation()`).

use crate::bucket_db::BucketDatabase;
use crate::command::UpdateCommand;
use crate::error::ReturnCode;
use crate::reply::UpdateReply;
use crate::sender::{MessageSender, OutboundMessage};
use crate::types::{BucketId, MessageId, NodeIndex, TimestampAllocator};

use super::{NodeStore, StorageCommand, StorageReply};

impl OutboundMessage for UpdateCommand {
    fn msg_id(&self) -> MessageId {
        // The fast path sends exactly one UpdateCommand per dispatch; a
        // dedicated id is allocated by the coordinator and threaded through
        // `UpdateOperation::start` rather than stored on the command itself,
        // since the client-facing `UpdateCommand` has no message-id field
        // of its own (see `distributor::command`).
        MessageId::new(0)
    }
}

/// Applies the update to every replica of the target bucket, using a
/// single freshly allocated timestamp (spec.md §4.4's "send Update
/// commands").
#[derive(Debug)]
pub struct UpdateOperation {
    replicas: Vec<(BucketId, NodeIndex)>,
    newest_timestamp_location: (BucketId, NodeIndex),
}

impl UpdateOperation {
    pub fn new(bucket_db: &dyn BucketDatabase, bucket_id: BucketId) -> Self {
        let replicas = bucket_db
            .get_parents(bucket_id)
            .iter()
            .flat_map(|entry| entry.nodes().iter().map(move |node| (entry.bucket_id, *node)))
            .collect();
        Self {
            replicas,
            newest_timestamp_location: (BucketId::ZERO, NodeIndex::new(0)),
        }
    }

    /// `(BucketId::ZERO, _)` means every replica agreed (spec.md §6:
    /// "bucket-id = 0 encodes 'all agreed'").
    pub fn newest_timestamp_location(&self) -> (BucketId, NodeIndex) {
        self.newest_timestamp_location
    }

    pub fn start(
        &mut self,
        store: &mut dyn NodeStore,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        update_cmd: &UpdateCommand,
        timestamps: &mut dyn TimestampAllocator,
    ) {
        let new_timestamp = timestamps.allocate();
        let outcomes: Vec<_> = self
            .replicas
            .iter()
            .map(|(bucket_id, node)| {
                let outcome = store.apply_update(*bucket_id, *node, &update_cmd.update, new_timestamp);
                (*bucket_id, *node, outcome)
            })
            .collect();

        let all_succeeded = outcomes.iter().all(|(_, _, o)| o.success);
        let first_old_timestamp = outcomes.first().map(|(_, _, o)| o.old_timestamp);
        let consistent = outcomes
            .iter()
            .all(|(_, _, o)| o.old_timestamp == first_old_timestamp.flatten());

        self.newest_timestamp_location = if !all_succeeded || consistent {
            (BucketId::ZERO, NodeIndex::new(0))
        } else {
            outcomes
                .iter()
                .max_by_key(|(_, _, o)| o.old_timestamp)
                .map(|(bucket_id, node, _)| (*bucket_id, *node))
                .unwrap_or((BucketId::ZERO, NodeIndex::new(0)))
        };

        let result = if all_succeeded {
            ReturnCode::ok()
        } else {
            ReturnCode::InternalFailure("update failed on one or more replicas".to_string())
        };
        let old_timestamp = first_old_timestamp.flatten();

        let mut reply = UpdateReply::new(result);
        if let Some(ts) = old_timestamp {
            reply = reply.with_old_timestamp(ts);
        }

        sink.send_reply(StorageReply::Update(reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_db::StaticBucketDatabase;
    use crate::operations::InMemoryNodeStore;
    use crate::types::{Document, DocumentUpdate, FieldMutation, FieldValue, MonotonicTimestampAllocator, Timestamp};
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

    fn command(doc_id: crate::types::DocumentId) -> UpdateCommand {
        let mut field_mutations = BTreeMap::new();
        field_mutations.insert(
            "title".to_string(),
            FieldMutation::Assign(FieldValue::Str("new".to_string())),
        );
        UpdateCommand::new(DocumentUpdate {
            doc_type: "music".to_string(),
            id: doc_id,
            create_if_non_existent: true,
            field_mutations,
        })
    }

    #[test]
    fn consistent_replicas_report_all_agreed() {
        let bucket_id = BucketId::new(1);
        let db = StaticBucketDatabase::single_consistent(bucket_id, 2);
        let doc_id = crate::types::DocumentId::new("doc:1");
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(5));
        store.seed(bucket_id, NodeIndex::new(1), Document::blank("music", doc_id.clone()), Timestamp::from(5));

        let mut op = UpdateOperation::new(&db, bucket_id);
        let mut sink = RecordingSink { reply: None };
        let mut allocator = MonotonicTimestampAllocator::new();
        op.start(&mut store, &mut sink, &command(doc_id), &mut allocator);

        assert_eq!(op.newest_timestamp_location(), (BucketId::ZERO, NodeIndex::new(0)));
        match sink.reply {
            Some(StorageReply::Update(reply)) => assert!(reply.result.success()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn divergent_replicas_report_the_newest_node() {
        let bucket_id = BucketId::new(2);
        let db = StaticBucketDatabase::single_consistent(bucket_id, 2);
        let doc_id = crate::types::DocumentId::new("doc:2");
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(5));
        store.seed(bucket_id, NodeIndex::new(1), Document::blank("music", doc_id.clone()), Timestamp::from(50));

        let mut op = UpdateOperation::new(&db, bucket_id);
        let mut sink = RecordingSink { reply: None };
        let mut allocator = MonotonicTimestampAllocator::new();
        op.start(&mut store, &mut sink, &command(doc_id), &mut allocator);

        let (location_bucket, node) = op.newest_timestamp_location();
        assert_ne!(location_bucket, BucketId::ZERO);
        assert_eq!(node, NodeIndex::new(1));
    }
}
