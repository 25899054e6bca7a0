//! Schema IR: the complete author-supplied declaration list.

use serde::{Deserialize, Serialize};

use crate::node::NodeDescriptor;

/// All node classes of one AST, plus the external names they may refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Designated external root type (e.g. `BasicASTNode`). Top-level
    /// classes may name it as their superclass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Opaque external types declared by the schema author.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,

    /// Node classes, in declaration order.
    pub nodes: Vec<NodeDescriptor>,
}

impl Schema {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            root: None,
            externals: vec![],
            nodes,
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_externals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.externals.extend(names.into_iter().map(Into::into));
        self
    }

    /// Find a node class by name.
    pub fn node(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Returns true if the superclass name designates the hierarchy root.
    pub fn is_root_name(&self, name: &str) -> bool {
        self.root.as_deref() == Some(name)
    }
}
