use std::fmt;

use nodegen_ir::{DefaultValue, FieldKind, PrimitiveKind};

/// Index of a node in its [`Tree`](crate::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key into a table owned by the collaborator responsible for `type_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalRef {
    pub type_name: String,
    pub key: u64,
}

impl ExternalRef {
    pub fn new(type_name: impl Into<String>, key: u64) -> Self {
        Self {
            type_name: type_name.into(),
            key,
        }
    }
}

/// Contents of one field slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Node(NodeId),
    List(Vec<NodeId>),
    External(ExternalRef),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Str(_) => "string".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Node(id) => format!("node {}", id),
            Value::List(ids) => format!("list of {}", ids.len()),
            Value::External(r) => format!("extern {}", r.type_name),
        }
    }

    /// Initial slot contents for a field default. Absent and unset start empty.
    pub fn from_default(default: DefaultValue) -> Option<Value> {
        match default {
            DefaultValue::Absent | DefaultValue::Unset => None,
            DefaultValue::False => Some(Value::Bool(false)),
            DefaultValue::Zero => Some(Value::Int(0)),
            DefaultValue::EmptyString => Some(Value::Str(String::new())),
            DefaultValue::EmptyList => Some(Value::List(Vec::new())),
        }
    }

    /// Whether the value has the primitive shape of `kind`. Node classes are
    /// checked by the tree.
    pub(crate) fn matches_shape(&self, kind: &FieldKind) -> bool {
        match (kind, self) {
            (FieldKind::Primitive(PrimitiveKind::String), Value::Str(_))
            | (FieldKind::Primitive(PrimitiveKind::Bool), Value::Bool(_))
            | (FieldKind::Primitive(PrimitiveKind::Integer), Value::Int(_))
            | (FieldKind::ScalarRef(_), Value::Node(_))
            | (FieldKind::ListRef(_), Value::List(_)) => true,
            (FieldKind::Primitive(PrimitiveKind::External(t)), Value::External(r)) => *t == r.type_name,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<Vec<NodeId>> for Value {
    fn from(ids: Vec<NodeId>) -> Self {
        Value::List(ids)
    }
}

impl From<ExternalRef> for Value {
    fn from(r: ExternalRef) -> Self {
        Value::External(r)
    }
}
