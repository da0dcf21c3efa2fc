//! The two-phase update coordinator state machine.
//!
//! [`TwoPhaseUpdateOperation`] is created per client `Update` command and
//! driven exclusively by its owner through [`TwoPhaseUpdateOperation::on_start`],
//! [`TwoPhaseUpdateOperation::on_receive`], and
//! [`TwoPhaseUpdateOperation::on_close`] (spec.md §6). Its path-specific
//! behavior lives in [`crate::fast_path`] and [`crate::safe_path`]; this
//! module owns the shared state, the common reply/trace helpers, and
//! shutdown.

use std::time::Instant;

use tracing::debug;

use crate::bucket_db::BucketDatabase;
use crate::command::UpdateCommand;
use crate::error::ReturnCode;
use crate::metrics::UpdateMetrics;
use crate::operations::{NodeStore, StorageCommand, StorageReply};
use crate::ownership::OwnershipOracle;
use crate::registry::SentMessageMap;
use crate::reply::UpdateReply;
use crate::sender::{ChildOperation, InterceptingSender, MessageSender};
use crate::types::{BucketId, DocumentId, MessageId, NodeIndex, TimestampAllocator};

/// Position in the operation's outbound-message lifecycle (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    NoneSent,
    UpdatesSent,
    MetadataGetsSent,
    SingleGetSent,
    FullGetsSent,
    PutsSent,
}

/// Which driver currently owns the operation (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FastPath,
    SlowPath,
}

/// A child operation registered in the sent-message map, erased to the
/// `receive`/`on_close` contract (spec.md §4.2). The reference child
/// operations in [`crate::operations`] never populate this — they resolve
/// synchronously inside their own `start()` — so in practice only
/// hand-built test doubles ever occupy a slot here.
pub type Callback = Box<dyn ChildOperation<StorageCommand, StorageReply>>;

/// A placeholder registry entry for a child dispatch the fast/safe-path
/// drivers resolve inline rather than leave pending (spec.md §4.1: the
/// reference `UpdateOperation`/`GetOperation`/`PutOperation` never call
/// `sendCommand`, so this callback is constructed but never actually
/// invoked). Kept as a real `ChildOperation` impl rather than an `Option`
/// in the adapter so [`InterceptingSender`] doesn't need a special case.
struct NeverCalled;

impl ChildOperation<StorageCommand, StorageReply> for NeverCalled {
    fn receive(
        &mut self,
        _sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        _reply: StorageReply,
    ) -> Option<StorageReply> {
        unreachable!("reference child operations resolve inline and never send_command")
    }

    fn on_close(&mut self, _sink: &mut dyn MessageSender<StorageCommand, StorageReply>) -> Option<StorageReply> {
        None
    }
}

pub(crate) fn boxed_never_called() -> Callback {
    Box::new(NeverCalled)
}

/// The two-phase update coordinator (spec.md §3).
pub struct TwoPhaseUpdateOperation {
    pub(crate) update_cmd: UpdateCommand,
    pub(crate) update_doc_bucket_id: BucketId,
    pub(crate) update_reply: Option<UpdateReply>,
    pub(crate) send_state: SendState,
    pub(crate) mode: Mode,
    /// Snapshot of (bucket-id, node-index) pairs taken when the safe-path
    /// Get was sent; compared later to detect a replica-set change
    /// (spec.md §3, §4.5).
    pub(crate) replicas_at_get_send_time: Vec<(BucketId, NodeIndex)>,
    pub(crate) fast_path_repair_source_node: Option<NodeIndex>,
    /// Started when the safe-path single full Get is sent; read and
    /// cleared when its reply arrives, to record latency (spec.md §3
    /// `singleGetLatencyTimer`).
    pub(crate) single_get_latency_timer: Option<Instant>,
    pub(crate) sent_message_map: SentMessageMap<Callback>,
    pub(crate) trace: crate::reply::Trace,
    pub(crate) reply_sent: bool,
    pub(crate) use_initial_cheap_metadata_fetch_phase: bool,
    pub(crate) fast_path_restart_enabled: bool,
    pub(crate) next_msg_id: u64,
}

impl TwoPhaseUpdateOperation {
    pub fn new(update_cmd: UpdateCommand, config: &crate::config::DistributorConfig) -> Self {
        let update_doc_bucket_id = update_cmd.bucket_id();
        Self {
            update_cmd,
            update_doc_bucket_id,
            update_reply: None,
            send_state: SendState::NoneSent,
            mode: Mode::FastPath,
            replicas_at_get_send_time: Vec::new(),
            fast_path_repair_source_node: None,
            single_get_latency_timer: None,
            sent_message_map: SentMessageMap::new(),
            trace: crate::reply::Trace::new(),
            reply_sent: false,
            use_initial_cheap_metadata_fetch_phase: config
                .enable_metadata_only_fetch_phase_for_inconsistent_updates,
            fast_path_restart_enabled: config.update_fast_path_restart_enabled,
            next_msg_id: 1,
        }
    }

    pub fn send_state(&self) -> SendState {
        self.send_state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn reply_sent(&self) -> bool {
        self.reply_sent
    }

    pub fn update_doc_id(&self) -> &DocumentId {
        self.update_cmd.document_id()
    }

    pub(crate) fn transition_to(&mut self, new_state: SendState) {
        debug_assert!(new_state != SendState::NoneSent, "never transitions back into NoneSent");
        debug!(?new_state, "update transitioning send state");
        self.send_state = new_state;
    }

    pub(crate) fn next_message_id(&mut self) -> MessageId {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        MessageId::new(id)
    }

    pub(crate) fn ensure_update_reply_created(&mut self) -> &mut UpdateReply {
        if self.update_reply.is_none() {
            self.update_reply = Some(UpdateReply::new(ReturnCode::ok()));
        }
        self.update_reply.as_mut().expect("just inserted")
    }

    /// Sends the operation's single client-visible reply (spec.md §4.1,
    /// invariant: "a reply is emitted exactly once per operation lifetime").
    pub(crate) fn send_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        mut reply: UpdateReply,
    ) {
        debug_assert!(!self.reply_sent, "a reply was already sent for this operation");
        if !self.trace.is_empty() {
            reply.trace.add_child(&self.trace);
        }
        sink.send_reply(StorageReply::Update(reply));
        self.reply_sent = true;
    }

    pub(crate) fn send_reply_with_result(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        result: ReturnCode,
    ) {
        let mut reply = self.ensure_update_reply_created().clone();
        reply.result = result;
        self.send_reply(sink, reply);
    }

    pub(crate) fn send_lost_ownership_transient_error_reply(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
    ) {
        self.send_reply_with_result(
            sink,
            ReturnCode::BucketNotFound(
                "Distributor lost ownership of bucket between executing the read and write \
                 phases of a two-phase update operation"
                    .to_string(),
            ),
        );
    }

    /// Folds a child reply's trace into the operation's own, if any
    /// (spec.md §4.1/§9).
    pub(crate) fn add_trace_from_reply(&mut self, trace: &crate::reply::Trace) {
        if !trace.is_empty() {
            self.trace.add_child(trace);
        }
    }

    /// Fast path iff exactly one parent bucket-database entry exists for
    /// the update's bucket id and it is valid and consistent (spec.md
    /// §4.3).
    pub(crate) fn is_fast_path_possible(&self, bucket_db: &dyn BucketDatabase) -> bool {
        let entries = bucket_db.get_parents(self.update_doc_bucket_id);
        entries.len() == 1 && entries[0].valid_and_consistent()
    }

    /// Whether ownership of the update's bucket has been lost between the
    /// read and write phases of a safe-path update (spec.md §4.7).
    pub(crate) fn lost_bucket_ownership_between_phases(&self, oracle: &dyn OwnershipOracle) -> bool {
        crate::ownership::lost_bucket_ownership_between_phases(oracle, self.update_doc_bucket_id)
    }

    /// Entry point, invoked once (spec.md §4.3).
    #[allow(clippy::too_many_arguments)]
    pub fn on_start(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
    ) {
        if self.is_fast_path_possible(bucket_db) {
            self.start_fast_path_update(sink, bucket_db, node_store, timestamps);
        } else {
            self.start_safe_path_update(sink, bucket_db, node_store, timestamps, oracle, metrics);
        }
    }

    /// Invoked per reply until the operation completes (spec.md §6).
    #[allow(clippy::too_many_arguments)]
    pub fn on_receive(
        &mut self,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        bucket_db: &dyn BucketDatabase,
        node_store: &mut dyn NodeStore,
        timestamps: &mut dyn TimestampAllocator,
        oracle: &dyn OwnershipOracle,
        metrics: &UpdateMetrics,
        msg_id: MessageId,
        reply: StorageReply,
    ) {
        if self.reply_sent {
            // Idempotent no-op past the terminal state (spec.md §5).
            self.sent_message_map.pop(msg_id);
            return;
        }
        match self.mode {
            Mode::FastPath => self.handle_fast_path_receive(sink, bucket_db, node_store, timestamps, msg_id, reply),
            Mode::SlowPath => self.handle_safe_path_receive(
                sink, bucket_db, node_store, timestamps, oracle, metrics, msg_id, reply,
            ),
        }
    }

    /// Invoked at most once, on external shutdown (spec.md §4.8).
    pub fn on_close(&mut self, sink: &mut dyn MessageSender<StorageCommand, StorageReply>) {
        let mode = self.mode;
        while let Some(mut callback) = self.sent_message_map.pop_any() {
            let forwarded = {
                let mut draining = InterceptingSender::draining(&mut self.sent_message_map, &mut *sink);
                let candidate = callback.on_close(&mut draining);
                draining.reply.or(candidate)
            };
            if let Some(StorageReply::Update(reply)) = forwarded {
                debug_assert!(mode == Mode::FastPath, "only fast-path draining yields an UpdateReply");
                self.send_reply(sink, reply);
            }
        }

        if !self.reply_sent {
            self.send_reply_with_result(sink, ReturnCode::Aborted(String::new()));
        }
    }
}
