use timeslice_core::{CoreError, NodeId};
use timeslice_storage::StorageError;
use thiserror::Error;

/// Malformed caller input. Always raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("actor is required")]
    MissingActor,

    #[error("`{0}` is assigned by the engine and cannot be supplied in data")]
    ReservedField(String),

    #[error("invalid validity window [{begin}, {end})")]
    InvalidInterval { begin: i64, end: i64 },

    #[error("entity type name must not be empty")]
    EmptyTypeName,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("link hierarchy deeper than {max} at node {node}")]
    LinkDepthExceeded { node: NodeId, max: usize },

    #[error("fact not found: {0}")]
    FactNotFound(String),

    #[error("unknown entity type id: {0}")]
    UnknownEntityType(i64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
