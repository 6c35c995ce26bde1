use crate::model::{EntityKind, Id};

/// Structural errors raised by model mutations. The model is left untouched
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Id },
    #[error("id {id} is already used (adding {kind})")]
    DuplicateId { kind: EntityKind, id: Id },
    #[error("invalid value {value} for {kind} {id}")]
    InvalidValue { kind: EntityKind, id: Id, value: f64 },
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkspaceError {
    #[error("no workspace at index {0}")]
    NoSuchWorkspace(usize),
    #[error("the last workspace cannot be removed")]
    LastWorkspace,
}

/// Failures reported by a [`crate::canvas::CanvasAdapter`]. None of these are
/// fatal: the synchronizer rebuilds the canvas on its next pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CanvasError {
    #[error("canvas is not initialised")]
    NotInitialized,
    #[error("unknown node {0}")]
    UnknownNode(Id),
    #[error("unknown edge {0}")]
    UnknownEdge(Id),
    #[error("canvas rejected the mutation: {0}")]
    Rejected(String),
}

/// Errors from the remote processing service boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("processing service error: {0}")]
    Service(String),
    #[error("failed to decode processing response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response for superseded {0} request discarded")]
    Superseded(crate::processing::RequestKind),
}
