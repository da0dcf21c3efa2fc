//! # kimberlite-distributor: Two-phase update coordinator
//!
//! Documents in `Kimberlite` are partitioned into **buckets**, and a bucket
//! is replicated to a small set of independent storage nodes
//! (`crates/kimberlite-storage`). Unlike the VSR-replicated event streams
//! (`crates/kimberlite-vsr`), these replicas are not kept in lockstep by a
//! consensus log — they converge lazily, which means a client `Update`
//! command has to reconcile them itself.
//!
//! This crate is that reconciliation: a single finite-state operation,
//! created per client update command, that drives either a one-round fast
//! path (replicas already agree) or a read-repair-then-write safe path
//! (they might not) to completion, emitting exactly one reply.
//!
//! ## Architecture
//!
//! - [`sender`]: the [`MessageSender`](sender::MessageSender) sink
//!   contract and the [`InterceptingSender`](sender::InterceptingSender)
//!   adapter that lets a child operation believe it is producing the final
//!   reply while the coordinator intercepts it.
//! - [`registry`]: [`SentMessageMap`](registry::SentMessageMap), the
//!   outstanding-child-message table.
//! - [`bucket_db`]: the [`BucketDatabase`](bucket_db::BucketDatabase)
//!   contract for looking up a bucket's replica set.
//! - [`condition`]: the test-and-set selection expression parser and
//!   evaluator.
//! - [`reply`]: the outward-facing [`UpdateReply`](reply::UpdateReply).
//! - [`two_phase_update`]: [`TwoPhaseUpdateOperation`], the state machine
//!   itself, split across [`fast_path`] and [`safe_path`] driver modules.
//! - [`operations`]: the `Get`/`Put`/`Update` child operation contracts,
//!   plus small in-memory reference implementations used by this crate's
//!   own tests (the production operations live in `kimberlite-storage`).

pub mod bucket_db;
pub mod command;
pub mod condition;
pub mod config;
pub mod error;
pub mod fast_path;
pub mod metrics;
pub mod operations;
pub mod ownership;
pub mod registry;
pub mod reply;
pub mod safe_path;
pub mod sender;
pub mod sequencing;
pub mod two_phase_update;
pub mod types;

pub use command::UpdateCommand;
pub use error::{DistributorError, DistributorResult, ReturnCode};
pub use two_phase_update::TwoPhaseUpdateOperation;
