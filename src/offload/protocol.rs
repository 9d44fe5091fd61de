use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use derive_more::Display;
use tracing::debug;

use super::operations::{self, ValidationReport};
use super::snapshot::{FlatSnapshot, SnapshotNode};

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Operation {
    Search {
        snapshot: FlatSnapshot,
        pattern: String,
    },
    Flatten {
        root: SnapshotNode,
        base_path: String,
    },
    Validate {
        snapshot: FlatSnapshot,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Encode, Decode)]
pub enum OperationKind {
    #[display("search")]
    Search,
    #[display("flatten")]
    Flatten,
    #[display("validate")]
    Validate,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Search { .. } => OperationKind::Search,
            Operation::Flatten { .. } => OperationKind::Flatten,
            Operation::Validate { .. } => OperationKind::Validate,
        }
    }

    pub fn execute(&self) -> ReplyData {
        match self {
            Operation::Search { snapshot, pattern } => {
                ReplyData::Paths(operations::search(snapshot, pattern))
            }
            Operation::Flatten { root, base_path } => {
                ReplyData::Flat(operations::flatten(root, base_path))
            }
            Operation::Validate { snapshot } => {
                ReplyData::Validation(operations::validate(snapshot))
            }
        }
    }
}

/// A request as it crosses to the worker. `id` correlates it with its reply.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct WorkerRequest {
    pub id: u64,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ReplyData {
    Paths(Vec<String>),
    Flat(FlatSnapshot),
    Validation(ValidationReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct WorkerReply {
    pub id: u64,
    pub operation: OperationKind,
    pub data: Option<ReplyData>,
    pub error: Option<String>,
}

impl WorkerRequest {
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        bincode::encode_to_vec(self, bincode::config::standard())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        bincode::decode_from_slice(bytes, bincode::config::standard()).map(|(request, _)| request)
    }
}

/// Worker-side entry point: decodes a request and runs it.
///
/// `id` and `operation` come from the sender so that even an undecodable request
/// gets a reply it can be matched with.
pub fn handle(id: u64, operation: OperationKind, bytes: &[u8]) -> WorkerReply {
    match WorkerRequest::decode(bytes) {
        Ok(request) => {
            debug!("Worker running {} request {}", request.operation.kind(), request.id);
            WorkerReply {
                id: request.id,
                operation: request.operation.kind(),
                data: Some(request.operation.execute()),
                error: None,
            }
        }
        Err(e) => WorkerReply {
            id,
            operation,
            data: None,
            error: Some(format!("undecodable request: {e}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_request(id: u64) -> WorkerRequest {
        WorkerRequest {
            id,
            operation: Operation::Validate {
                snapshot: operations::flatten(&SnapshotNode::file("x"), "/x"),
            },
        }
    }

    #[test]
    fn handle_runs_decoded_request() {
        let bytes = validate_request(7).encode().unwrap();

        let reply = handle(7, OperationKind::Validate, &bytes);

        assert_eq!(reply.id, 7);
        assert_eq!(reply.operation, OperationKind::Validate);
        assert!(reply.error.is_none());
        assert!(matches!(
            reply.data,
            Some(ReplyData::Validation(ValidationReport { valid: true, .. }))
        ));
    }

    #[test]
    fn handle_replies_with_error_for_garbage() {
        let reply = handle(3, OperationKind::Search, &[0xff, 0xff, 0xff]);

        assert_eq!(reply.id, 3);
        assert_eq!(reply.operation, OperationKind::Search);
        assert!(reply.data.is_none());
        assert!(reply.error.unwrap().contains("undecodable"));
    }

    #[test]
    fn request_survives_the_wire() {
        let request = validate_request(11);
        let decoded = WorkerRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn operation_kind_display() {
        assert_eq!(OperationKind::Flatten.to_string(), "flatten");
    }
}
