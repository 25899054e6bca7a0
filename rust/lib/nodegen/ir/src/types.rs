//! Shared types used across all IR layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive payload of a field that is not a child node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Bool,
    Integer,
    /// Opaque type owned by a collaborator (symbol table, type system, ...).
    External(String),
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// One node of the named class (or a subclass).
    ScalarRef(String),
    /// An ordered sequence of nodes of the named class.
    ListRef(String),
    Primitive(PrimitiveKind),
}

impl FieldKind {
    /// Named class for `ScalarRef` / `ListRef`, `None` for primitives.
    pub fn node_type(&self) -> Option<&str> {
        match self {
            FieldKind::ScalarRef(t) | FieldKind::ListRef(t) => Some(t),
            FieldKind::Primitive(_) => None,
        }
    }

    /// Returns true for `ScalarRef` and `ListRef`.
    pub fn is_reference(&self) -> bool {
        self.node_type().is_some()
    }

    /// Returns true for `ListRef`.
    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::ListRef(_))
    }

    /// External type name for `Primitive(External(..))`.
    pub fn external_type(&self) -> Option<&str> {
        match self {
            FieldKind::Primitive(PrimitiveKind::External(t)) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::ScalarRef(t) => write!(f, "{}", t),
            FieldKind::ListRef(t) => write!(f, "[{}]", t),
            FieldKind::Primitive(PrimitiveKind::String) => f.write_str("string"),
            FieldKind::Primitive(PrimitiveKind::Bool) => f.write_str("bool"),
            FieldKind::Primitive(PrimitiveKind::Integer) => f.write_str("int"),
            FieldKind::Primitive(PrimitiveKind::External(t)) => write!(f, "extern {}", t),
        }
    }
}

/// How a field is treated when its owning node is structurally cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Clone the referent (or every list element) recursively.
    DeepCopy,
    /// Copy the reference verbatim; original and clone alias the same object.
    ShareReference,
    /// Leave the field absent in the clone.
    ResetOnCopy,
    /// Delegate to the copy routine of the collaborator owning the type.
    ExternalDeepCopy,
}

impl CopyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyMode::DeepCopy => "deep",
            CopyMode::ShareReference => "share",
            CopyMode::ResetOnCopy => "reset",
            CopyMode::ExternalDeepCopy => "external_copy",
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
