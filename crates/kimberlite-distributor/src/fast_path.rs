//! The fast-path driver (SPEC_FULL.md §4.4).
//!
//! Sends the update directly to every replica in a single round. If the
//! replicas' pre-update timestamps disagree, the driver identifies the
//! freshest replica and repairs the others through a targeted Get/apply/Put
//! before replying — it never gives up and falls back to the safe path;
//! the repair itself *is* the fast path's answer to divergence.

use tracing::debug;

use crate::bucket_db::BucketDatabase;
use crate::error::ReturnCode;
use crate::operations::{
    FieldSet, GetCommand, GetReply, NodeStore, PutOperation, StorageCommand, StorageReply,
    UpdateOperation,
};
use crate::reply::UpdateReply;
use crate::sender::{InterceptingSender, MessageSender, NodeType};
use crate::two_phase_update::{boxed_never_called, Mode, SendState, TwoPhaseUpdateOperation};
use crate::types::{BucketId, MessageId, NodeIndex, TimestampAllocator};

impl TwoPhaseUpdateOperation {
    /// Sends the update to all replicas via a child `UpdateOperation`
    /// (spec.md §4.4 "Send phase"). Also the re-entry point for a safe-path
    /// restart (spec.md §4.5 "Restart into fast path").
    pub(crate) fn start_fast_path_update(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
    ) {
        self.mode = Mode::FastPath;
        let mut update_op = UpdateOperation::new(bucket_db, self.update_doc_bucket_id);
        let (reply, best_node) = {
            let mut adapter =
                InterceptingSender::new(&mut self.sent_message_map, boxed_never_called(), sink);
            update_op.start(node_store, &mut adapter, &self.update_cmd, timestamps);
            (adapter.reply.take(), update_op.newest_timestamp_location())
        };
        self.transition_to(SendState::UpdatesSent);

        // The reference `UpdateOperation` always resolves synchronously; a
        // real, network-backed child would instead leave its callback in
        // the registry and this reply would arrive later through
        // `on_receive` — `dispatch_fast_path_reply` handles both cases.
        if let Some(StorageReply::Update(reply)) = reply {
            self.handle_fast_path_update_reply(sink, bucket_db, node_store, timestamps, best_node, reply);
        }
    }

    /// Demultiplexes a reply while in [`Mode::FastPath`] (spec.md §4.4
    /// "Receive UpdateReply" / "Receive GetReply" / "Receive PutReply").
    pub(crate) fn handle_fast_path_receive(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        msg_id: MessageId,
        reply: StorageReply,
    ) {
        if let Some(mut callback) = self.sent_message_map.pop(msg_id) {
            let forwarded = {
                let mut draining = InterceptingSender::draining(&mut self.sent_message_map, sink);
                callback.receive(&mut draining, reply)
            };
            if let Some(forwarded) = forwarded {
                self.dispatch_fast_path_reply(sink, bucket_db, node_store, timestamps, forwarded);
            }
            return;
        }
        self.dispatch_fast_path_reply(sink, bucket_db, node_store, timestamps, reply);
    }

    fn dispatch_fast_path_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        reply: StorageReply,
    ) {
        match (self.send_state, reply) {
            (SendState::FullGetsSent, StorageReply::Get(get_reply)) => {
                self.handle_fast_path_get_reply(sink, bucket_db, node_store, timestamps, get_reply);
            }
            (SendState::PutsSent, StorageReply::Put(put_reply)) => {
                self.handle_fast_path_put_reply(sink, put_reply.result);
            }
            (state, reply) => {
                debug!(?state, ?reply, "fast path received a reply that does not match its current state; ignoring");
            }
        }
    }

    /// spec.md §4.4 "Receive UpdateReply": decides between "all replicas
    /// agreed, forward verbatim" and "one replica is stale, repair it".
    fn handle_fast_path_update_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        best_node: (BucketId, NodeIndex),
        reply: UpdateReply,
    ) {
        if !reply.result.success() || best_node.0.is_zero() {
            self.send_reply(sink, reply);
            return;
        }

        let (bucket_id, node) = best_node;
        self.fast_path_repair_source_node = Some(node);
        self.update_reply = Some(reply);

        let msg_id = self.next_message_id();
        let document_id = self.update_cmd.document_id().clone();
        let field_set = FieldSet::All;
        sink.send_to_node(
            NodeType::Storage,
            node,
            StorageCommand::Get(GetCommand {
                msg_id,
                bucket_id,
                document_id: document_id.clone(),
                field_set,
            }),
        );
        self.transition_to(SendState::FullGetsSent);

        // Targeted single-node Gets have no child operation to delegate
        // to (spec.md §9); the reference node store resolves them inline
        // the same way it resolves every other child dispatch in this
        // crate (DESIGN.md).
        let outcome = node_store.get(bucket_id, node, &document_id, field_set);
        let get_reply = GetReply {
            msg_id,
            result: if outcome.success {
                ReturnCode::ok()
            } else {
                ReturnCode::Forwarded {
                    code: "INTERNAL_FAILURE",
                    message: "repair source node failed to respond to Get".to_string(),
                }
            },
            document: outcome.document,
            last_modified_timestamp: outcome.timestamp,
            had_consistent_replicas: true,
            any_replicas_failed: !outcome.success,
            newest_replica: None,
            trace: crate::reply::Trace::new(),
        };
        self.handle_fast_path_get_reply(sink, bucket_db, node_store, timestamps, get_reply);
    }

    /// spec.md §4.4 "Receive GetReply in FULL_GETS_SENT".
    fn handle_fast_path_get_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        reply: GetReply,
    ) {
        if !reply.result.success() {
            self.send_reply_with_result(sink, reply.result);
            return;
        }
        let Some(mut document) = reply.document else {
            self.send_reply_with_result(
                sink,
                ReturnCode::InternalFailure(
                    "document disappeared from the fast-path repair source node after an \
                     inconsistency was reported against it"
                        .to_string(),
                ),
            );
            return;
        };
        if let Err(err) = self.update_cmd.update.apply_to(&mut document) {
            self.send_reply_with_result(sink, ReturnCode::InternalFailure(err.to_string()));
            return;
        }

        let new_timestamp = timestamps.allocate();
        let mut put_op = PutOperation::new(bucket_db, self.update_doc_bucket_id);
        let msg_id = self.next_message_id();
        let put_reply = {
            let mut adapter =
                InterceptingSender::new(&mut self.sent_message_map, boxed_never_called(), sink);
            put_op.start(node_store, &mut adapter, msg_id, document, new_timestamp);
            adapter.reply.take()
        };
        self.transition_to(SendState::PutsSent);

        if let Some(StorageReply::Put(put_reply)) = put_reply {
            self.handle_fast_path_put_reply(sink, put_reply.result);
        }
    }

    /// spec.md §4.4 "Receive PutReply": forwards the Put's result code via
    /// the `updateReply` saved when the inconsistency was first observed.
    fn handle_fast_path_put_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        result: ReturnCode,
    ) {
        debug!(
            repair_source = ?self.fast_path_repair_source_node,
            "fast path forced replica convergence from repair source node",
        );
        self.send_reply_with_result(sink, result);
    }
}
