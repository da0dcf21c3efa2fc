//! Result codes and internal error types.
//!
//! [`ReturnCode`] is the outward-facing result code carried on every
//! [`crate::reply::UpdateReply`] (SPEC_FULL.md §6 "Result codes used").
//! [`DistributorError`] covers failures internal to this crate (condition
//! parsing) and is kept separate so that internal bugs are distinguishable
//! from ordinary protocol outcomes, matching the split between
//! `kimberlite_server::ServerError` (transport/auth/db) and the wire-level
//! error codes it maps to.

use std::fmt;

/// Result type for coordinator operations that can fail for internal
/// reasons (as opposed to producing a [`ReturnCode`], which is always a
/// successful return carrying a protocol-level outcome).
pub type DistributorResult<T> = Result<T, DistributorError>;

/// Internal failures in the coordinator itself.
#[derive(Debug, thiserror::Error)]
pub enum DistributorError {
    /// The test-and-set condition failed to parse.
    #[error("failed to parse test and set condition: {0}")]
    ConditionParse(String),
}

/// The outward-facing result of an update operation.
///
/// Mirrors spec.md §6's "Result codes used", plus a free-form message for
/// the codes that carry one (exactly as the original attaches a string to
/// `api::ReturnCode`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCode {
    /// The update was applied (or a documented no-op occurred).
    Ok(String),
    /// An internal error occurred (vanished document, update apply threw).
    InternalFailure(String),
    /// The operation was aborted (partial replica failure, external close).
    Aborted(String),
    /// The client should retry silently (replica set changed, lost ownership).
    BucketNotFound(String),
    /// The test-and-set condition string failed to parse.
    IllegalParameters(String),
    /// The test-and-set condition evaluated to false.
    TestAndSetConditionFailed(String),
    /// A child operation (Get/Put) failed; the code/message are forwarded
    /// verbatim from that child's result.
    Forwarded { code: &'static str, message: String },
}

impl ReturnCode {
    /// Creates a plain, message-less `Ok`.
    pub fn ok() -> Self {
        ReturnCode::Ok(String::new())
    }

    /// Creates an `Ok` carrying an explanatory message (the "OK with
    /// message" no-op disposition from spec.md §7).
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        ReturnCode::Ok(message.into())
    }

    /// Returns whether this result code represents success.
    ///
    /// Only `Ok` counts as success — this mirrors `api::ReturnCode::success()`
    /// in the original, which the coordinator consults before deciding
    /// whether to continue the pipeline or forward a failure upward.
    pub fn success(&self) -> bool {
        matches!(self, ReturnCode::Ok(_))
    }

    /// A short, stable name for this code, used in log lines and tests.
    pub fn name(&self) -> &'static str {
        match self {
            ReturnCode::Ok(_) => "OK",
            ReturnCode::InternalFailure(_) => "INTERNAL_FAILURE",
            ReturnCode::Aborted(_) => "ABORTED",
            ReturnCode::BucketNotFound(_) => "BUCKET_NOT_FOUND",
            ReturnCode::IllegalParameters(_) => "ILLEGAL_PARAMETERS",
            ReturnCode::TestAndSetConditionFailed(_) => "TEST_AND_SET_CONDITION_FAILED",
            ReturnCode::Forwarded { code, .. } => code,
        }
    }

    /// The message attached to this code, if any.
    pub fn message(&self) -> &str {
        match self {
            ReturnCode::Ok(m)
            | ReturnCode::InternalFailure(m)
            | ReturnCode::Aborted(m)
            | ReturnCode::BucketNotFound(m)
            | ReturnCode::IllegalParameters(m)
            | ReturnCode::TestAndSetConditionFailed(m)
            | ReturnCode::Forwarded { message: m, .. } => m,
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}
