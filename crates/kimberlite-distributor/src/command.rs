//! The client-supplied update command (SPEC_FULL.md "Data model").

use crate::types::{BucketId, DocumentId, DocumentUpdate, Timestamp};

/// The update the client asked us to perform.
///
/// Owned for the duration of the operation and treated as read-only —
/// the coordinator never mutates the command, only the document it reads
/// and writes (spec.md §3: "shared, read-only for the operation's
/// duration").
#[derive(Debug, Clone)]
pub struct UpdateCommand {
    pub update: DocumentUpdate,
    /// Test-and-set selection expression, if the client supplied one.
    pub condition: Option<String>,
    /// If set, the update only applies when the candidate document's
    /// timestamp equals this value (spec.md §4.5 "old-timestamp constraint").
    pub required_old_timestamp: Option<Timestamp>,
}

impl UpdateCommand {
    pub fn new(update: DocumentUpdate) -> Self {
        Self {
            update,
            condition: None,
            required_old_timestamp: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_required_old_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.required_old_timestamp = Some(timestamp);
        self
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.update.id
    }

    pub fn bucket_id(&self) -> BucketId {
        self.update.id.bucket_id()
    }

    pub fn has_tas_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub fn should_create_if_non_existent(&self) -> bool {
        self.update.create_if_non_existent
    }

    /// Returns whether `ts` satisfies the client's required-old-timestamp
    /// constraint (spec.md §4.5: "OK with message 'no document with
    /// requested timestamp found'" when it does not).
    pub fn satisfies_timestamp_constraint(&self, ts: Timestamp) -> bool {
        match self.required_old_timestamp {
            None => true,
            Some(required) => required == ts,
        }
    }
}
