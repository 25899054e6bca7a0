//! Node IR: one declared AST class and its own fields.
//!
//! Corresponds to one `node` block of a `.nodes` schema.

use serde::{Deserialize, Serialize};

use crate::types::{CopyMode, FieldKind, PrimitiveKind};

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Per-field policy flags as written by the schema author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPolicy {
    /// Absence is allowed even after the owning phase completes.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,

    /// Supplied at construction. `false` = populated later by a pass.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub constructor_bound: bool,

    /// Participates in generic tree traversal.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub visitable: bool,

    /// Explicit copy mode. `None` = derived from kind and binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_mode: Option<CopyMode>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            optional: false,
            constructor_bound: true,
            visitable: true,
            copy_mode: None,
        }
    }
}

/// A field declared on a node class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name (e.g. `declarator`).
    pub name: String,

    pub kind: FieldKind,

    #[serde(default)]
    pub policy: FieldPolicy,

    /// Documentation comment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            policy: FieldPolicy::default(),
            doc: None,
        }
    }

    pub fn scalar(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ScalarRef(ty.into()))
    }

    pub fn list(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ListRef(ty.into()))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Primitive(PrimitiveKind::String))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Primitive(PrimitiveKind::Bool))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Primitive(PrimitiveKind::Integer))
    }

    pub fn external(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Primitive(PrimitiveKind::External(ty.into())))
    }

    pub fn optional(mut self) -> Self {
        self.policy.optional = true;
        self
    }

    /// Mark as populated by a later pass instead of the constructor.
    pub fn deferred(mut self) -> Self {
        self.policy.constructor_bound = false;
        self
    }

    /// Exclude from generic traversal.
    pub fn hidden(mut self) -> Self {
        self.policy.visitable = false;
        self
    }

    pub fn copy(mut self, mode: CopyMode) -> Self {
        self.policy.copy_mode = Some(mode);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Binds the identity-name field and the boolean applicability field that
/// decide, per instance, whether the name is replaced by a mangled one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangleIndicator {
    pub name_field: String,
    pub flag_field: String,
}

/// Class-level capability markers. None of them contributes a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicators {
    /// Participates in generic-type substitution.
    #[serde(default, skip_serializing_if = "is_false")]
    pub generic: bool,

    /// Participates in compile-time uniqueness numbering.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangle: Option<MangleIndicator>,
}

impl Indicators {
    pub fn is_empty(&self) -> bool {
        !self.generic && !self.unique && self.mangle.is_none()
    }
}

/// A declared AST class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Class name (e.g. `FunctionDecl`).
    pub name: String,

    /// Superclass name. `None` only for the hierarchy root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,

    /// Own fields, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptor>,

    #[serde(default, skip_serializing_if = "Indicators::is_empty")]
    pub indicators: Indicators,

    /// Documentation comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            fields: vec![],
            indicators: Indicators::default(),
            doc: None,
        }
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn generic(mut self) -> Self {
        self.indicators.generic = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.indicators.unique = true;
        self
    }

    pub fn mangle(mut self, name_field: impl Into<String>, flag_field: impl Into<String>) -> Self {
        self.indicators.mangle = Some(MangleIndicator {
            name_field: name_field.into(),
            flag_field: flag_field.into(),
        });
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Get an own field by name.
    pub fn own_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}
