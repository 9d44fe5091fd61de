//! Off-thread scans over filesystem snapshots.
//!
//! The caller copies state into a snapshot, sends a tagged request and gets exactly
//! one tagged reply back, matched by correlation id.

pub mod operations;
mod protocol;
mod snapshot;
mod worker;

pub use operations::ValidationReport;
pub use protocol::{Operation, OperationKind, ReplyData, WorkerReply, WorkerRequest, handle};
pub use snapshot::{FlatSnapshot, SnapshotEntry, SnapshotNode};
pub use worker::{OffloadError, OffloadWorker, PendingReply};
