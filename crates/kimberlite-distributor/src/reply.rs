//! The outward-facing update reply (SPEC_FULL.md "Reply builder").
//!
//! Doubles as the child [`crate::operations::update::UpdateOperation`]'s
//! synthesized reply — in the fast path where all replicas already agree,
//! the child's own `UpdateReply` *is* forwarded verbatim as the
//! coordinator's final reply (spec.md §4.4), so the two are intentionally
//! the same type rather than two structs that get converted between each
//! other.

use crate::error::ReturnCode;
use crate::types::Timestamp;

/// Accumulated trace children folded in from child replies
/// (spec.md §3 `trace`). Kept as a flat list rather than a tree — the
/// original's `vespalib::Trace` nesting is a transport-layer concern this
/// crate doesn't own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    notes: Vec<String>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn add(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn add_child(&mut self, other: &Trace) {
        self.notes.extend(other.notes.iter().cloned());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

/// The update operation's reply: a result code, the timestamp the update
/// observed ("old timestamp"), and the accumulated trace.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReply {
    pub result: ReturnCode,
    /// The timestamp of the document the update was applied to, or the
    /// freshly allocated Put timestamp when the document was created.
    /// `None` until a candidate document has actually been identified
    /// (spec.md §3: "lazily constructed").
    pub old_timestamp: Option<Timestamp>,
    pub trace: Trace,
}

impl UpdateReply {
    pub fn new(result: ReturnCode) -> Self {
        Self {
            result,
            old_timestamp: None,
            trace: Trace::new(),
        }
    }

    pub fn with_old_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.old_timestamp = Some(timestamp);
        self
    }

    pub fn set_result(&mut self, result: ReturnCode) {
        self.result = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_accumulates_children_in_order() {
        let mut trace = Trace::new();
        let mut child = Trace::new();
        child.add("child-note");
        trace.add("parent-note");
        trace.add_child(&child);
        assert_eq!(trace.notes(), ["parent-note", "child-note"]);
    }

    #[test]
    fn empty_trace_reports_empty() {
        assert!(Trace::new().is_empty());
    }
}
