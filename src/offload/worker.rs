use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::available_parallelism;
use std::time::Duration;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use futures_channel::oneshot;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use super::operations::ValidationReport;
use super::protocol::{self, Operation, OperationKind, ReplyData, WorkerReply, WorkerRequest};
use super::snapshot::{FlatSnapshot, SnapshotNode};

/// Default number of worker threads when unable to determine system parallelism
const DEFAULT_WORKER_THREADS: usize = 1;

/// Runs search/flatten/validate requests on dedicated threads.
///
/// Requests carry copied snapshots, never the live store, so replies may be stale
/// relative to mutations made after the snapshot was taken.
pub struct OffloadWorker {
    dispatcher: Dispatcher,
    next_id: AtomicU64,
}

impl OffloadWorker {
    pub fn new() -> Result<Self, OffloadError> {
        Self::with_threads(Self::determine_worker_count())
    }

    pub fn with_threads(threads: NonZeroUsize) -> Result<Self, OffloadError> {
        debug!("Using {} offload worker threads", threads);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(threads)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            dispatcher,
            next_id: AtomicU64::new(1),
        })
    }

    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism()
            .ok()
            .or(NonZeroUsize::new(DEFAULT_WORKER_THREADS))
            .unwrap_or(NonZeroUsize::MIN)
    }

    /// Serializes the request and hands it to a worker thread.
    ///
    /// Every call gets a fresh, increasing correlation id.
    pub fn submit(&self, operation: Operation) -> Result<PendingReply, OffloadError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = operation.kind();
        let bytes = WorkerRequest { id, operation }
            .encode()
            .context(EncodeSnafu { id })?;
        debug!("Submitting {} request {} ({} bytes)", kind, id, bytes.len());

        let receiver = self
            .dispatcher
            .dispatch(move || async move { protocol::handle(id, kind, &bytes) })
            .map_err(|e| OffloadError::DispatchError {
                id,
                error: e.to_string(),
            })?;

        Ok(PendingReply {
            id,
            operation: kind,
            receiver,
        })
    }

    pub async fn search(
        &self,
        snapshot: FlatSnapshot,
        pattern: impl Into<String>,
    ) -> Result<Vec<String>, OffloadError> {
        let reply = self
            .submit(Operation::Search {
                snapshot,
                pattern: pattern.into(),
            })?
            .wait()
            .await?;

        match reply_data(reply)? {
            (_, ReplyData::Paths(paths)) => Ok(paths),
            (id, _) => UnexpectedReplySnafu { id }.fail(),
        }
    }

    pub async fn flatten(
        &self,
        root: SnapshotNode,
        base_path: impl Into<String>,
    ) -> Result<FlatSnapshot, OffloadError> {
        let reply = self
            .submit(Operation::Flatten {
                root,
                base_path: base_path.into(),
            })?
            .wait()
            .await?;

        match reply_data(reply)? {
            (_, ReplyData::Flat(flat)) => Ok(flat),
            (id, _) => UnexpectedReplySnafu { id }.fail(),
        }
    }

    pub async fn validate(&self, snapshot: FlatSnapshot) -> Result<ValidationReport, OffloadError> {
        let reply = self
            .submit(Operation::Validate { snapshot })?
            .wait()
            .await?;

        match reply_data(reply)? {
            (_, ReplyData::Validation(report)) => Ok(report),
            (id, _) => UnexpectedReplySnafu { id }.fail(),
        }
    }
}

fn reply_data(reply: WorkerReply) -> Result<(u64, ReplyData), OffloadError> {
    if let Some(message) = reply.error {
        return WorkerSnafu {
            id: reply.id,
            message,
        }
        .fail();
    }
    match reply.data {
        Some(data) => Ok((reply.id, data)),
        None => UnexpectedReplySnafu { id: reply.id }.fail(),
    }
}

/// A reply that has not arrived yet. Dropping it abandons the result.
#[derive(Debug)]
pub struct PendingReply {
    id: u64,
    operation: OperationKind,
    receiver: oneshot::Receiver<WorkerReply>,
}

impl PendingReply {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub async fn wait(self) -> Result<WorkerReply, OffloadError> {
        let id = self.id;
        self.receiver.await.context(CanceledSnafu { id })
    }

    pub async fn wait_timeout(self, timeout: Duration) -> Result<WorkerReply, OffloadError> {
        let id = self.id;
        compio::time::timeout(timeout, self.receiver)
            .await
            .map_err(|_| OffloadError::TimeoutError { id, timeout })?
            .context(CanceledSnafu { id })
    }
}

#[derive(Debug, Snafu)]
pub enum OffloadError {
    #[snafu(display("Failed to create offload dispatcher"))]
    DispatcherError { source: std::io::Error },
    #[snafu(display("Failed to encode request {}", id))]
    EncodeError {
        id: u64,
        source: bincode::error::EncodeError,
    },
    #[snafu(display("Failed to dispatch request {}: {}", id, error))]
    DispatchError { id: u64, error: String },
    #[snafu(display("Request {} was dropped before replying", id))]
    CanceledError {
        id: u64,
        source: oneshot::Canceled,
    },
    #[snafu(display("Request {} got no reply within {:?}", id, timeout))]
    TimeoutError { id: u64, timeout: Duration },
    #[snafu(display("Request {} failed in the worker: {}", id, message))]
    WorkerError { id: u64, message: String },
    #[snafu(display("Request {} got a reply of the wrong shape", id))]
    UnexpectedReply { id: u64 },
}
