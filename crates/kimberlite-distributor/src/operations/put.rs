//! Reference `PutOperation` (SPEC_FULL.md "Child operation contracts").

use crate::bucket_db::BucketDatabase;
use crate::error::ReturnCode;
use crate::reply::Trace;
use crate::sender::{MessageSender, OutboundMessage};
use crate::types::{BucketId, Document, MessageId, NodeIndex, Timestamp};

use super::{NodeStore, StorageCommand, StorageReply};

#[derive(Debug, Clone)]
pub struct PutCommand {
    pub msg_id: MessageId,
    pub bucket_id: BucketId,
    pub document: Document,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone)]
pub struct PutReply {
    pub msg_id: MessageId,
    pub result: ReturnCode,
    pub trace: Trace,
}

impl OutboundMessage for PutCommand {
    fn msg_id(&self) -> MessageId {
        self.msg_id
    }
}

/// Writes a merged document to every replica of its bucket (spec.md §4.4/
/// §4.5's "dispatch a child PutOperation").
#[derive(Debug)]
pub struct PutOperation {
    replicas: Vec<(BucketId, NodeIndex)>,
}

impl PutOperation {
    pub fn new(bucket_db: &dyn BucketDatabase, bucket_id: BucketId) -> Self {
        let replicas = bucket_db
            .get_parents(bucket_id)
            .iter()
            .flat_map(|entry| entry.nodes().iter().map(move |node| (entry.bucket_id, *node)))
            .collect();
        Self { replicas }
    }

    /// Writes `document` to every known replica at `timestamp`, then
    /// synthesizes a reply through `sink`. Succeeds only if every replica
    /// accepted the write — a simplification of the original's
    /// redundancy-aware quorum bookkeeping (see DESIGN.md).
    pub fn start(
        &mut self,
        store: &mut dyn NodeStore,
        sink: &mut dyn MessageSender<StorageCommand, StorageReply>,
        msg_id: MessageId,
        document: Document,
        timestamp: Timestamp,
    ) {
        let all_succeeded = self
            .replicas
            .iter()
            .map(|(bucket_id, node)| store.put(*bucket_id, *node, document.clone(), timestamp))
            .fold(true, |acc, ok| acc && ok);

        let result = if all_succeeded {
            ReturnCode::ok()
        } else {
            ReturnCode::InternalFailure("put failed on one or more replicas".to_string())
        };

        sink.send_reply(StorageReply::Put(PutReply {
            msg_id,
            result,
            trace: Trace::new(),
        }));
    }
}
