//! Core identifiers and document model used across the distributor.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use kimberlite_types::Timestamp;

/// Identifies a bucket: a partitioning unit that a set of document ids hash
/// into. A bucket id of zero is used as a sentinel meaning "all replicas",
/// mirroring the convention used by [`crate::operations::update::UpdateOperation`]
/// to signal full agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketId(u64);

impl BucketId {
    pub const ZERO: BucketId = BucketId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket({:#x})", self.0)
    }
}

impl From<u64> for BucketId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Index of a storage node within a bucket's replica set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(u16);

impl NodeIndex {
    pub fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Unique identifier for an outbound message, used to demultiplex replies
/// back to the child operation that sent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

/// A logical document identifier, as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hashes the id down to a bucket. Real placement (splitting, bucket
    /// distribution) is out of scope here (see SPEC_FULL.md Non-goals); we
    /// only need a stable, deterministic id -> bucket mapping so tests and
    /// the bucket database agree on which bucket a document belongs to.
    pub fn bucket_id(&self) -> BucketId {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self.0.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        BucketId::new(hash)
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A field value within a document. Intentionally small — the payload
/// language itself is out of scope (see SPEC_FULL.md Non-goals); this is
/// just enough to exercise test-and-set conditions and partial updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{s:?}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A document as held by a single storage node replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub doc_type: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Creates an empty document of the given type and id, for the
    /// create-if-missing path (SPEC_FULL.md safe-path driver).
    pub fn blank(doc_type: impl Into<String>, id: DocumentId) -> Self {
        Self {
            id,
            doc_type: doc_type.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// A single field mutation within a [`DocumentUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldMutation {
    Assign(FieldValue),
    Clear,
}

/// A partial mutation to apply to a document. This is the "update payload
/// language" spec.md explicitly excludes from scope; we model only enough
/// of it (field assignment/clear) to apply updates and evaluate test-and-set
/// conditions in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub doc_type: String,
    pub id: DocumentId,
    pub create_if_non_existent: bool,
    pub field_mutations: BTreeMap<String, FieldMutation>,
}

impl DocumentUpdate {
    /// Applies this update to `doc` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the update's declared type or id doesn't match
    /// the candidate document — the one case the original marks with
    /// "exception during apply" (SPEC_FULL.md §4.5).
    pub fn apply_to(&self, doc: &mut Document) -> Result<(), UpdateApplyError> {
        if doc.doc_type != self.doc_type {
            return Err(UpdateApplyError::TypeMismatch {
                expected: self.doc_type.clone(),
                found: doc.doc_type.clone(),
            });
        }
        for (field, mutation) in &self.field_mutations {
            match mutation {
                FieldMutation::Assign(value) => {
                    doc.fields.insert(field.clone(), value.clone());
                }
                FieldMutation::Clear => {
                    doc.fields.remove(field);
                }
            }
        }
        Ok(())
    }
}

/// Raised when [`DocumentUpdate::apply_to`] cannot apply the update.
///
/// Maps to [`crate::error::ReturnCode::InternalFailure`] at the call site
/// (SPEC_FULL.md §4.5: "Update apply threw").
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpdateApplyError {
    #[error("update for type '{expected}' cannot be applied to document of type '{found}'")]
    TypeMismatch { expected: String, found: String },
}

/// Allocates unique, monotonically increasing timestamps for Puts
/// generated by the coordinator. spec.md lists "the clock and
/// unique-timestamp allocator" as an external collaborator; we keep it as
/// a narrow trait rather than threading a real clock through, mirroring
/// how [`crate::bucket_db::BucketDatabase`] and
/// [`crate::ownership::OwnershipOracle`] are consumed as read-only
/// contracts.
pub trait TimestampAllocator {
    fn allocate(&mut self) -> Timestamp;
}

/// A [`TimestampAllocator`] backed by a simple incrementing counter, for
/// tests and the reference child operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicTimestampAllocator {
    next: u64,
}

impl MonotonicTimestampAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }
}

impl TimestampAllocator for MonotonicTimestampAllocator {
    fn allocate(&mut self) -> Timestamp {
        let ts = self.next;
        self.next += 1;
        Timestamp::from(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_id_is_deterministic() {
        let id = DocumentId::new("doc:1");
        assert_eq!(id.bucket_id(), id.bucket_id());
    }

    #[test]
    fn monotonic_allocator_never_repeats() {
        let mut allocator = MonotonicTimestampAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert!(b > a);
    }

    #[test]
    fn apply_rejects_type_mismatch() {
        let mut doc = Document::blank("music", DocumentId::new("doc:1"));
        let update = DocumentUpdate {
            doc_type: "video".to_string(),
            id: DocumentId::new("doc:1"),
            create_if_non_existent: false,
            field_mutations: BTreeMap::new(),
        };
        assert!(update.apply_to(&mut doc).is_err());
    }

    #[test]
    fn apply_assigns_and_clears_fields() {
        let mut doc = Document::blank("music", DocumentId::new("doc:1"));
        doc.fields
            .insert("title".to_string(), FieldValue::Str("old".to_string()));
        let mut field_mutations = BTreeMap::new();
        field_mutations.insert(
            "title".to_string(),
            FieldMutation::Assign(FieldValue::Str("new".to_string())),
        );
        field_mutations.insert("stale".to_string(), FieldMutation::Clear);
        let update = DocumentUpdate {
            doc_type: "music".to_string(),
            id: DocumentId::new("doc:1"),
            create_if_non_existent: false,
            field_mutations,
        };
        update.apply_to(&mut doc).unwrap();
        assert_eq!(
            doc.fields.get("title"),
            Some(&FieldValue::Str("new".to_string()))
        );
        assert!(!doc.fields.contains_key("stale"));
    }
}
