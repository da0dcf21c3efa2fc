//! The safe-path driver (SPEC_FULL.md §4.5).
//!
//! The metadata-Get → single-Get → local-apply → Put pipeline used when
//! replicas are known or suspected to disagree. Where the fast path bets
//! that replicas already agree and repairs the one that doesn't, the safe
//! path never assumes agreement: it reads first, and only writes once it
//! has identified a single candidate document every replica can converge
//! on.

use std::time::Instant;

use tracing::debug;

use crate::bucket_db::BucketDatabase;
use crate::condition::TasCondition;
use crate::error::{DistributorError, DistributorResult, ReturnCode};
use crate::metrics::UpdateMetrics;
use crate::operations::{
    FieldSet, GetCommand, GetOperation, GetReply, NodeStore, PutOperation, StorageCommand, StorageReply,
};
use crate::ownership::OwnershipOracle;
use crate::sender::{InterceptingSender, MessageSender, NodeType};
use crate::two_phase_update::{boxed_never_called, Mode, SendState, TwoPhaseUpdateOperation};
use crate::types::{BucketId, Document, NodeIndex, Timestamp, TimestampAllocator};

/// The document a safe-path update will apply against, plus the timestamp
/// to report as "old timestamp" on the eventual reply (spec.md §4.5:
/// "Record its timestamp as the 'old timestamp'" / "the 'old timestamp' is
/// the new Put timestamp").
struct Candidate {
    document: Document,
    /// `None` for a newly created document — the Put timestamp allocated
    /// further down stands in for it once known.
    old_timestamp: Option<Timestamp>,
}

impl TwoPhaseUpdateOperation {
    /// Issues the initial Get (spec.md §4.5 "Initial Get"). Field set is
    /// metadata-only or full depending on [`crate::config::DistributorConfig`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start_safe_path_update(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
    ) {
        self.mode = Mode::SlowPath;
        let field_set = if self.use_initial_cheap_metadata_fetch_phase {
            FieldSet::Metadata
        } else {
            FieldSet::All
        };
        let document_id = self.update_cmd.document_id().clone();
        let mut get_op = GetOperation::new(bucket_db, document_id, field_set);
        self.replicas_at_get_send_time = get_op.replicas_in_db().to_vec();

        let msg_id = self.next_message_id();
        let reply = {
            let mut adapter = InterceptingSender::new(&mut self.sent_message_map, boxed_never_called(), sink);
            get_op.start(node_store, &mut adapter, msg_id);
            adapter.reply.take()
        };
        self.transition_to(match field_set {
            FieldSet::Metadata => SendState::MetadataGetsSent,
            FieldSet::All => SendState::FullGetsSent,
        });

        // As with the fast path, the reference GetOperation always resolves
        // synchronously; a real child would leave this pending and the
        // reply would arrive through `on_receive` instead (spec.md §4.5:
        // "If the child immediately yields a reply ... feed it back through
        // the same reception path").
        if let Some(StorageReply::Get(get_reply)) = reply {
            self.dispatch_safe_path_reply(sink, bucket_db, node_store, timestamps, oracle, metrics, StorageReply::Get(get_reply));
        }
    }

    /// Demultiplexes a reply while in [`Mode::SlowPath`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn handle_safe_path_receive(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        msg_id: crate::types::MessageId,
        reply: StorageReply,
    ) {
        if let Some(mut callback) = self.sent_message_map.pop(msg_id) {
            let forwarded = {
                let mut draining = InterceptingSender::draining(&mut self.sent_message_map, sink);
                callback.receive(&mut draining, reply)
            };
            if let Some(forwarded) = forwarded {
                self.dispatch_safe_path_reply(sink, bucket_db, node_store, timestamps, oracle, metrics, forwarded);
            }
            return;
        }
        // The safe path's single full Get is sent directly, never through a
        // child operation (spec.md §3, §9), so its reply never occupies a
        // registry slot; it flows through here unchanged.
        self.dispatch_safe_path_reply(sink, bucket_db, node_store, timestamps, oracle, metrics, reply);
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_safe_path_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        reply: StorageReply,
    ) {
        match (self.send_state, reply) {
            (SendState::MetadataGetsSent, StorageReply::Get(get_reply)) => {
                self.handle_metadata_get_reply(sink, bucket_db, node_store, timestamps, oracle, metrics, get_reply);
            }
            (SendState::FullGetsSent, StorageReply::Get(get_reply)) => {
                self.handle_safe_path_full_get_reply(
                    sink, bucket_db, node_store, timestamps, oracle, metrics, get_reply, false,
                );
            }
            (SendState::SingleGetSent, StorageReply::Get(get_reply)) => {
                let elapsed = self
                    .single_get_latency_timer
                    .take()
                    .map(|started| started.elapsed())
                    .unwrap_or_default();
                metrics.record_single_get_result(get_reply.result.success());
                metrics.record_single_get_latency(elapsed);
                self.handle_safe_path_full_get_reply(
                    sink, bucket_db, node_store, timestamps, oracle, metrics, get_reply, true,
                );
            }
            (SendState::PutsSent, StorageReply::Put(put_reply)) => {
                self.send_reply_with_result(sink, put_reply.result);
            }
            (state, reply) => {
                debug!(?state, ?reply, "safe path received a reply that does not match its current state; ignoring");
            }
        }
    }

    /// spec.md §4.5 "On metadata-Get reply".
    #[allow(clippy::too_many_arguments)]
    fn handle_metadata_get_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        reply: GetReply,
    ) {
        if !reply.result.success() {
            self.send_reply_with_result(sink, reply.result);
            return;
        }
        if reply.any_replicas_failed {
            // Conservative: a failed replica might have held the newest
            // timestamp and we can't tell (spec.md §4.5 item 2, §7).
            self.send_reply_with_result(
                sink,
                ReturnCode::Aborted("one or more metadata gets failed".to_string()),
            );
            return;
        }
        if self.replica_set_changed_since_get_was_sent(bucket_db) {
            self.send_reply_with_result(
                sink,
                ReturnCode::BucketNotFound(
                    "bucket replica set changed between the metadata Get and its reply".to_string(),
                ),
            );
            return;
        }
        if self.replicas_at_get_send_time.is_empty() {
            // spec.md §4.5 "Initial Get": "If the child immediately yields a
            // reply (e.g. no replicas exist at all), feed it back through the
            // same reception path so the 'no-existing-document' branch runs
            // and writes are still issued to ideal nodes." A vacuous
            // agreement over zero replicas must not be read as grounds to
            // restart in the fast path.
            self.handle_safe_path_full_get_reply(
                sink, bucket_db, node_store, timestamps, oracle, metrics, reply, false,
            );
            return;
        }
        if reply.had_consistent_replicas {
            self.restart_in_fast_path(sink, bucket_db, node_store, timestamps, oracle, metrics);
            return;
        }

        let newest = reply
            .newest_replica
            .expect("replicas reported inconsistent implies a newest replica was identified");
        debug_assert!(
            newest.timestamp != Timestamp::EPOCH,
            "replicas only count as inconsistent when at least one holds data (spec.md §4.5)"
        );
        self.send_single_get_to_newest_replica(
            sink, bucket_db, node_store, timestamps, oracle, metrics, newest.bucket_id, newest.node,
        );
    }

    /// spec.md §4.5 "Otherwise: replicas disagree ... Start the single-Get
    /// timer, issue a full-fields Get directly to that one node ... transition
    /// to SINGLE_GET_SENT." Targeted directly, like the fast path's repair
    /// Get, rather than through a child operation (spec.md §9); resolved
    /// synchronously here and fed straight into the full-Get handler, the
    /// same way `fast_path.rs` resolves its repair Get.
    #[allow(clippy::too_many_arguments)]
    fn send_single_get_to_newest_replica(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        bucket_id: BucketId,
        node: NodeIndex,
    ) {
        let msg_id = self.next_message_id();
        let document_id = self.update_cmd.document_id().clone();
        sink.send_to_node(
            NodeType::Storage,
            node,
            StorageCommand::Get(GetCommand {
                msg_id,
                bucket_id,
                document_id: document_id.clone(),
                field_set: FieldSet::All,
            }),
        );
        let started = Instant::now();
        self.single_get_latency_timer = Some(started);
        self.transition_to(SendState::SingleGetSent);

        let outcome = node_store.get(bucket_id, node, &document_id, FieldSet::All);
        let reply = GetReply {
            msg_id,
            result: if outcome.success {
                ReturnCode::ok()
            } else {
                ReturnCode::Forwarded {
                    code: "INTERNAL_FAILURE",
                    message: "newest replica failed to respond to the single Get".to_string(),
                }
            },
            document: outcome.document,
            last_modified_timestamp: outcome.timestamp,
            had_consistent_replicas: true,
            any_replicas_failed: !outcome.success,
            newest_replica: None,
            trace: crate::reply::Trace::new(),
        };

        self.single_get_latency_timer.take();
        metrics.record_single_get_result(reply.result.success());
        metrics.record_single_get_latency(started.elapsed());
        self.handle_safe_path_full_get_reply(sink, bucket_db, node_store, timestamps, oracle, metrics, reply, true);
    }

    /// spec.md §4.5 "On full-Get reply". Also used for the single-Get reply
    /// (`is_single_get = true`), which must never qualify for a fast-path
    /// restart (spec.md: "Single-Get replies must not qualify: a single
    /// replica is trivially 'consistent with itself'").
    #[allow(clippy::too_many_arguments)]
    fn handle_safe_path_full_get_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        reply: GetReply,
        is_single_get: bool,
    ) {
        if !reply.result.success() {
            self.send_reply_with_result(sink, reply.result);
            return;
        }

        if !is_single_get
            && self.fast_path_restart_enabled
            && !self.replicas_at_get_send_time.is_empty()
            && reply.had_consistent_replicas
            && !self.replica_set_changed_since_get_was_sent(bucket_db)
        {
            self.restart_in_fast_path(sink, bucket_db, node_store, timestamps, oracle, metrics);
            return;
        }

        let candidate = match reply.document {
            Some(document) => {
                let observed_timestamp = reply.last_modified_timestamp;
                if !self.update_cmd.satisfies_timestamp_constraint(observed_timestamp) {
                    self.send_reply_with_result(
                        sink,
                        ReturnCode::ok_with_message("no document with requested timestamp found"),
                    );
                    return;
                }
                match self.evaluate_tas_condition(&document) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.send_reply_with_result(sink, ReturnCode::TestAndSetConditionFailed(String::new()));
                        return;
                    }
                    Err(code) => {
                        self.send_reply_with_result(sink, code);
                        return;
                    }
                }
                Candidate {
                    document,
                    old_timestamp: Some(observed_timestamp),
                }
            }
            None => {
                if self.update_cmd.has_tas_condition() && !self.update_cmd.should_create_if_non_existent() {
                    self.send_reply_with_result(
                        sink,
                        ReturnCode::TestAndSetConditionFailed("Document did not exist".to_string()),
                    );
                    return;
                }
                if !self.update_cmd.should_create_if_non_existent() {
                    self.send_reply_with_result(sink, reply.result);
                    return;
                }
                Candidate {
                    document: Document::blank(
                        self.update_cmd.update.doc_type.clone(),
                        self.update_cmd.document_id().clone(),
                    ),
                    old_timestamp: None,
                }
            }
        };

        self.apply_and_put(sink, bucket_db, node_store, timestamps, oracle, candidate);
    }

    /// spec.md §4.6: "If the command carries no condition, return 'match'.
    /// Otherwise parse ... Evaluate against the candidate document; result
    /// must be exactly 'true' to count as a match."
    fn evaluate_tas_condition(&self, document: &Document) -> Result<bool, ReturnCode> {
        let Some(condition) = &self.update_cmd.condition else {
            return Ok(true);
        };
        let parsed: DistributorResult<TasCondition> =
            TasCondition::parse(condition).map_err(|err| DistributorError::ConditionParse(err.to_string()));
        match parsed {
            Ok(parsed) => Ok(parsed.matches(document)),
            Err(err) => Err(ReturnCode::IllegalParameters(err.to_string())),
        }
    }

    /// Applies the update to the candidate document and dispatches the
    /// safe-path Put (spec.md §4.5 "Apply the update payload...").
    fn apply_and_put(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        mut candidate: Candidate,
    ) {
        if let Err(err) = self.update_cmd.update.apply_to(&mut candidate.document) {
            self.send_reply_with_result(sink, ReturnCode::InternalFailure(err.to_string()));
            return;
        }

        if self.lost_bucket_ownership_between_phases(oracle) {
            self.send_lost_ownership_transient_error_reply(sink);
            return;
        }

        let new_timestamp = timestamps.allocate();
        let old_timestamp = candidate.old_timestamp.unwrap_or(new_timestamp);
        self.ensure_update_reply_created().old_timestamp = Some(old_timestamp);

        let mut put_op = PutOperation::new(bucket_db, self.update_doc_bucket_id);
        let msg_id = self.next_message_id();
        let put_reply = {
            let mut adapter = InterceptingSender::new(&mut self.sent_message_map, boxed_never_called(), sink);
            put_op.start(node_store, &mut adapter, msg_id, candidate.document, new_timestamp);
            adapter.reply.take()
        };
        self.transition_to(SendState::PutsSent);

        if let Some(StorageReply::Put(put_reply)) = put_reply {
            self.send_reply_with_result(sink, put_reply.result);
        }
    }

    /// spec.md §4.5 "Restart into fast path": re-checks ownership, asserts
    /// the registry is empty, bumps the restart counter, then re-enters the
    /// fast-path driver from scratch.
    #[allow(clippy::too_many_arguments)]
    fn restart_in_fast_path(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
    ) {
        if self.lost_bucket_ownership_between_phases(oracle) {
            self.send_lost_ownership_transient_error_reply(sink);
            return;
        }
        debug_assert!(
            self.sent_message_map.is_empty(),
            "fast-path restart requires no stray in-flight child messages (spec.md §4.5, §8)"
        );
        metrics.increment_fast_path_restarts();
        self.start_fast_path_update(sink, bucket_db, node_store, timestamps);
    }

    /// spec.md §3 `replicasAtGetSendTime`: compares the (bucket, node)
    /// multiset captured when the safe-path Get was sent against the
    /// bucket database's current view.
    fn replica_set_changed_since_get_was_sent(&self, bucket_db: &dyn BucketDatabase) -> bool {
        let current: Vec<(BucketId, NodeIndex)> = bucket_db
            .get_parents(self.update_doc_bucket_id)
            .iter()
            .flat_map(|entry| entry.nodes().iter().map(move |node| (entry.bucket_id, *node)))
            .collect();
        !same_replica_multiset(&current, &self.replicas_at_get_send_time)
    }
}

fn same_replica_multiset(a: &[(BucketId, NodeIndex)], b: &[(BucketId, NodeIndex)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort();
    b_sorted.sort();
    a_sorted == b_sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_db::StaticBucketDatabase;
    use crate::command::UpdateCommand;
    use crate::config::DistributorConfig;
    use crate::operations::InMemoryNodeStore;
    use crate::ownership::AlwaysOwned;
    use crate::types::{DocumentId, DocumentUpdate, FieldMutation, FieldValue, MonotonicTimestampAllocator};
    use std::collections::BTreeMap;

    struct RecordingSink {
        commands: Vec<StorageCommand>,
        reply: Option<StorageReply>,
    }
    impl MessageSender<StorageCommand, StorageReply> for RecordingSink {
        fn send_command(&mut self, cmd: StorageCommand) {
            self.commands.push(cmd);
        }
        fn send_reply(&mut self, reply: StorageReply) {
            self.reply = Some(reply);
        }
        fn send_to_node(&mut self, _node_type: NodeType, _node: NodeIndex, cmd: StorageCommand) {
            self.commands.push(cmd);
        }
        fn distributor_index(&self) -> u16 {
            0
        }
        fn cluster_name(&self) -> &str {
            "test"
        }
    }

    fn update_command(doc_id: DocumentId) -> UpdateCommand {
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

    /// A bucket database with two split-in-progress parents never reports
    /// `valid_and_consistent` for a single entry, forcing the safe path.
    fn split_in_progress_db(bucket_id: BucketId) -> StaticBucketDatabase {
        let mut db = StaticBucketDatabase::new();
        db.set_parents(
            bucket_id,
            vec![
                crate::bucket_db::BucketEntry::new(bucket_id, vec![NodeIndex::new(0), NodeIndex::new(1)], false),
            ],
        );
        db
    }

    #[test]
    fn metadata_get_all_consistent_restarts_in_fast_path_without_a_single_get() {
        let doc_id = DocumentId::new("doc:consistent");
        let bucket_id = doc_id.bucket_id();
        let db = split_in_progress_db(bucket_id);
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(5));
        store.seed(bucket_id, NodeIndex::new(1), Document::blank("music", doc_id.clone()), Timestamp::from(5));

        let config = DistributorConfig::default();
        let mut op = TwoPhaseUpdateOperation::new(update_command(doc_id), &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        assert_eq!(metrics.fast_path_restarts.load(std::sync::atomic::Ordering::Relaxed), 1);
        match sink.reply {
            Some(StorageReply::Update(reply)) => assert!(reply.result.success()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn metadata_get_disagreement_issues_single_get_and_repairs() {
        let doc_id = DocumentId::new("doc:disagree");
        let bucket_id = doc_id.bucket_id();
        let db = split_in_progress_db(bucket_id);
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(10));
        store.seed(bucket_id, NodeIndex::new(1), Document::blank("music", doc_id.clone()), Timestamp::from(20));

        let config = DistributorConfig::default();
        let mut op = TwoPhaseUpdateOperation::new(update_command(doc_id), &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        assert_eq!(op.send_state(), SendState::PutsSent);
        match sink.reply {
            Some(StorageReply::Update(reply)) => {
                assert!(reply.result.success());
                assert_eq!(reply.old_timestamp, Some(Timestamp::from(20)));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(metrics.single_get_latency_count(), 1);
    }

    #[test]
    fn condition_failure_on_missing_document_without_create_if_missing() {
        let doc_id = DocumentId::new("doc:missing");
        let bucket_id = doc_id.bucket_id();
        let db = split_in_progress_db(bucket_id);
        // Neither replica has ever held this document; both Gets report it
        // absent at the zero timestamp, which counts as "consistent". The
        // metadata-only fetch phase and fast-path restart are both disabled
        // so the full-Get's document-absent/condition branch actually runs
        // instead of restarting into the fast path (whose reference
        // UpdateOperation never evaluates test-and-set conditions at all).
        let mut store = InMemoryNodeStore::new();

        let mut config = DistributorConfig::default();
        config.enable_metadata_only_fetch_phase_for_inconsistent_updates = false;
        config.update_fast_path_restart_enabled = false;
        let mut field_mutations = BTreeMap::new();
        field_mutations.insert(
            "title".to_string(),
            FieldMutation::Assign(FieldValue::Str("new".to_string())),
        );
        let cmd = UpdateCommand::new(DocumentUpdate {
            doc_type: "music".to_string(),
            id: doc_id.clone(),
            create_if_non_existent: false,
            field_mutations,
        })
        .with_condition("status == \"active\"");
        let mut op = TwoPhaseUpdateOperation::new(cmd, &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        match sink.reply {
            Some(StorageReply::Update(reply)) => {
                assert_eq!(reply.result.name(), "TEST_AND_SET_CONDITION_FAILED");
                assert_eq!(reply.result.message(), "Document did not exist");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_ne!(op.send_state(), SendState::PutsSent);
    }

    #[test]
    fn metadata_get_with_a_failed_replica_aborts_without_a_put() {
        let doc_id = DocumentId::new("doc:partial-fail");
        let bucket_id = doc_id.bucket_id();
        let db = split_in_progress_db(bucket_id);
        let mut store = InMemoryNodeStore::new();
        store.seed(bucket_id, NodeIndex::new(0), Document::blank("music", doc_id.clone()), Timestamp::from(10));
        store.mark_down(bucket_id, NodeIndex::new(1));

        let config = DistributorConfig::default();
        let mut op = TwoPhaseUpdateOperation::new(update_command(doc_id), &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        match sink.reply {
            Some(StorageReply::Update(reply)) => assert_eq!(reply.result.name(), "ABORTED"),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_ne!(op.send_state(), SendState::PutsSent);
    }

    #[test]
    fn no_known_replicas_runs_the_document_absent_branch_instead_of_restarting() {
        let doc_id = DocumentId::new("doc:new");
        // No parent entries at all for this bucket: `is_fast_path_possible`
        // is false, so the safe path runs, and its immediate "no replicas"
        // Get reply must flow into the document-absent branch rather than
        // vacuously restarting into the fast path forever (spec.md §4.5
        // "Initial Get").
        let db = StaticBucketDatabase::new();
        let mut store = InMemoryNodeStore::new();

        let config = DistributorConfig::default();
        let mut op = TwoPhaseUpdateOperation::new(update_command(doc_id), &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        assert_eq!(op.send_state(), SendState::PutsSent);
        match sink.reply {
            Some(StorageReply::Update(reply)) => assert!(reply.result.success()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn document_absent_with_create_if_missing_writes_a_blank_document() {
        let doc_id = DocumentId::new("doc:create-if-missing");
        let bucket_id = doc_id.bucket_id();
        let db = split_in_progress_db(bucket_id);
        // Neither replica has ever seen this document; both Gets report it
        // absent at the zero timestamp ("consistent"). The fast-path
        // restart is disabled here specifically so that consistency is
        // forced through the document-absent/create-if-missing branch
        // instead of restarting into the fast path.
        let mut store = InMemoryNodeStore::new();

        let mut config = DistributorConfig::default();
        config.enable_metadata_only_fetch_phase_for_inconsistent_updates = false;
        config.update_fast_path_restart_enabled = false;
        let mut op = TwoPhaseUpdateOperation::new(update_command(doc_id.clone()), &config);
        let mut sink = RecordingSink {
            commands: Vec::new(),
            reply: None,
        };
        let mut allocator = MonotonicTimestampAllocator::new();
        let oracle = AlwaysOwned;
        let metrics = UpdateMetrics::new();
        op.on_start(&mut sink, &db, &mut store, &mut allocator, &oracle, &metrics);

        assert!(op.reply_sent());
        assert_eq!(op.send_state(), SendState::PutsSent);
        match sink.reply {
            Some(StorageReply::Update(reply)) => assert!(reply.result.success()),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(store.contains(bucket_id, NodeIndex::new(0), &doc_id));
        assert!(store.contains(bucket_id, NodeIndex::new(1), &doc_id));
    }
}
