use std::fmt;

use nodegen_ir::CopyMode;
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Tools match on these,
// never on the human-readable message string.

pub mod error_code {
    pub const UNRESOLVED_SUPERCLASS: &str = "UNRESOLVED_SUPERCLASS";
    pub const UNRESOLVED_FIELD_TYPE: &str = "UNRESOLVED_FIELD_TYPE";
    pub const FIELD_REDECLARATION: &str = "FIELD_REDECLARATION";
    pub const INVALID_INDICATOR_BINDING: &str = "INVALID_INDICATOR_BINDING";
    pub const CYCLIC_HIERARCHY: &str = "CYCLIC_HIERARCHY";
    pub const DUPLICATE_CLASS: &str = "DUPLICATE_CLASS";
    pub const MULTIPLE_ROOTS: &str = "MULTIPLE_ROOTS";
    pub const INVALID_COPY_MODE: &str = "INVALID_COPY_MODE";
}

// ── SchemaError ─────────────────────────────────────────────────────

/// A schema-authoring defect found while resolving the node model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("class '{class}' extends '{superclass}', which is not declared")]
    UnresolvedSuperclass { class: String, superclass: String },

    #[error("field '{class}.{field}' refers to unknown type '{type_name}'")]
    UnresolvedFieldType {
        class: String,
        field: String,
        type_name: String,
    },

    /// `ancestor` is `None` when the name repeats inside one class.
    #[error("{}", redeclaration_message(.class, .field, .ancestor, .identical))]
    FieldRedeclaration {
        class: String,
        field: String,
        ancestor: Option<String>,
        identical: bool,
    },

    #[error("{indicator} indicator on '{class}' cannot bind field '{field}': {reason}")]
    InvalidIndicatorBinding {
        class: String,
        indicator: String,
        field: String,
        reason: String,
    },

    #[error("superclass cycle: {}", .cycle.join(" -> "))]
    CyclicHierarchy { cycle: Vec<String> },

    #[error("class '{class}' is declared more than once")]
    DuplicateClass { class: String },

    #[error("hierarchy has more than one root: {}", .roots.join(", "))]
    MultipleRoots { roots: Vec<String> },

    #[error("field '{class}.{field}' cannot use copy mode '{copy_mode}': {reason}")]
    InvalidCopyMode {
        class: String,
        field: String,
        copy_mode: CopyMode,
        reason: String,
    },
}

fn redeclaration_message(
    class: &String,
    field: &String,
    ancestor: &Option<String>,
    identical: &bool,
) -> String {
    match ancestor {
        Some(ancestor) if *identical => format!(
            "field '{}.{}' repeats the identical declaration inherited from '{}'; rename it",
            class, field, ancestor
        ),
        Some(ancestor) => format!(
            "field '{}.{}' redeclares the field inherited from '{}' with a different kind or policy",
            class, field, ancestor
        ),
        None => format!("field '{}.{}' is declared more than once", class, field),
    }
}

impl SchemaError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::UnresolvedSuperclass { .. } => error_code::UNRESOLVED_SUPERCLASS,
            SchemaError::UnresolvedFieldType { .. } => error_code::UNRESOLVED_FIELD_TYPE,
            SchemaError::FieldRedeclaration { .. } => error_code::FIELD_REDECLARATION,
            SchemaError::InvalidIndicatorBinding { .. } => error_code::INVALID_INDICATOR_BINDING,
            SchemaError::CyclicHierarchy { .. } => error_code::CYCLIC_HIERARCHY,
            SchemaError::DuplicateClass { .. } => error_code::DUPLICATE_CLASS,
            SchemaError::MultipleRoots { .. } => error_code::MULTIPLE_ROOTS,
            SchemaError::InvalidCopyMode { .. } => error_code::INVALID_COPY_MODE,
        }
    }
}

// ── SchemaErrors ────────────────────────────────────────────────────

/// Every defect found by one resolution run. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaErrors(Vec<SchemaError>);

impl SchemaErrors {
    pub(crate) fn new(errors: Vec<SchemaError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self(errors)
    }

    pub fn errors(&self) -> &[SchemaError] {
        &self.0
    }

    pub fn first(&self) -> &SchemaError {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if any error carries the given code.
    pub fn has_code(&self, code: &str) -> bool {
        self.0.iter().any(|e| e.error_code() == code)
    }

    pub fn into_vec(self) -> Vec<SchemaError> {
        self.0
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema has {} error(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n  [{}] {}", e.error_code(), e)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl From<SchemaError> for SchemaErrors {
    fn from(e: SchemaError) -> Self {
        Self(vec![e])
    }
}

impl IntoIterator for SchemaErrors {
    type Item = SchemaError;
    type IntoIter = std::vec::IntoIter<SchemaError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
