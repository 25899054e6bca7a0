use thiserror::Error;

use crate::value::NodeId;

/// A node-model contract violated by an instance operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unknown class '{class}'")]
    UnknownClass { class: String },

    #[error("node {id} does not exist")]
    UnknownNode { id: NodeId },

    #[error("class '{class}' has no field '{field}'")]
    UnknownField { class: String, field: String },

    #[error("'{class}' takes {expected} constructor argument(s), got {found}")]
    Arity {
        class: String,
        expected: usize,
        found: usize,
    },

    #[error("required argument '{class}.{field}' is missing")]
    MissingArgument { class: String, field: String },

    #[error("field '{class}.{field}' expects {expected}, got {found}")]
    KindMismatch {
        class: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{class}.{field}' is set by the constructor")]
    NotDeferred { class: String, field: String },

    #[error("field '{class}.{field}' is already assigned")]
    AlreadyAssigned { class: String, field: String },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
