//! Resolved IR: the per-class contract exported to renderers.
//!
//! Produced by `nodegen-resolve`. A renderer for any target language consumes
//! exactly this shape: flattened fields with concrete policies, the
//! construction signature, the traversal list, the clone specification and
//! the indicator bindings.

use serde::{Deserialize, Serialize};

use crate::types::{CopyMode, FieldKind};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Field policy after defaults have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPolicy {
    pub optional: bool,
    pub constructor_bound: bool,
    pub visitable: bool,
    pub copy_mode: CopyMode,
}

/// Initial value of a field that is not a constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Optional field, nothing assigned.
    Absent,
    False,
    Zero,
    EmptyString,
    /// Present list with no elements.
    EmptyList,
    /// Required reference that a later pass must assign.
    Unset,
}

/// One entry of a class's flattened field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub name: String,
    pub kind: FieldKind,
    pub policy: ResolvedPolicy,

    /// Class whose descriptor declares this field.
    pub declared_in: String,

    /// Initial value for deferred fields; `None` for constructor parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// A parameter of the generated constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorParam {
    pub field: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

/// A child slot offered to generic visitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSlot {
    pub field: String,
    /// Elements are visited in list order; an absent list yields nothing.
    #[serde(default, skip_serializing_if = "is_false")]
    pub list: bool,
}

/// What a structural copy does with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CloneStep {
    /// Copy a string / bool / integer by value.
    CopyValue,
    /// Recursively clone the single child.
    CloneChild,
    /// Recursively clone each element; absent stays absent, empty stays empty.
    CloneList,
    /// Alias the same object.
    ShareReference,
    /// Leave absent in the clone.
    Reset,
    /// Call the collaborator's copy routine for this type.
    ExternalCopy { type_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneRule {
    pub field: String,
    #[serde(flatten)]
    pub step: CloneStep,
}

/// Mangle indicator after its fields were checked against the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangleBinding {
    pub name_field: String,
    pub flag_field: String,
    /// The identity name may be absent on an instance.
    #[serde(default, skip_serializing_if = "is_false")]
    pub name_optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flag_optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIndicators {
    #[serde(default, skip_serializing_if = "is_false")]
    pub generic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangle: Option<MangleBinding>,
}

/// Complete contract of one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedClass {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,

    /// Declared classes from the root down to this one (inclusive).
    pub chain: Vec<String>,

    /// Direct subclasses, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subclasses: Vec<String>,

    /// Inherited fields first, then own fields, each in declaration order.
    pub fields: Vec<ResolvedField>,

    pub constructor: Vec<ConstructorParam>,
    pub traversal: Vec<TraversalSlot>,
    pub clone: Vec<CloneRule>,

    #[serde(default)]
    pub indicators: ResolvedIndicators,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl ResolvedClass {
    /// Leaf classes become concrete variants of their category.
    pub fn is_leaf(&self) -> bool {
        self.subclasses.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field in the flattened list.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields declared by this class itself.
    pub fn own_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(move |f| f.declared_in == self.name)
    }

    /// Returns true if `ancestor` is this class or one of its superclasses.
    pub fn is_subclass_of(&self, ancestor: &str) -> bool {
        self.chain.iter().any(|c| c == ancestor)
    }

    /// Deferred fields, set later through accessors.
    pub fn deferred_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(|f| !f.policy.constructor_bound)
    }
}

/// The whole resolved schema, classes in pre-order from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    /// Designated external root type, if the schema names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// External types confirmed during resolution, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,

    pub classes: Vec<ResolvedClass>,
}

impl ResolvedModel {
    /// Find a class by name.
    pub fn class(&self, name: &str) -> Option<&ResolvedClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Concrete classes.
    pub fn leaves(&self) -> impl Iterator<Item = &ResolvedClass> {
        self.classes.iter().filter(|c| c.is_leaf())
    }

    /// Classes that have subclasses (rendered as sum types over their leaves).
    pub fn categories(&self) -> impl Iterator<Item = &ResolvedClass> {
        self.classes.iter().filter(|c| !c.is_leaf())
    }

    /// All leaf classes below `name` (or `name` itself when it is a leaf),
    /// in pre-order.
    pub fn leaves_under(&self, name: &str) -> Vec<&ResolvedClass> {
        self.classes
            .iter()
            .filter(|c| c.is_leaf() && c.is_subclass_of(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    fn field(name: &str, declared_in: &str, kind: FieldKind) -> ResolvedField {
        ResolvedField {
            name: name.into(),
            kind,
            policy: ResolvedPolicy {
                optional: false,
                constructor_bound: true,
                visitable: true,
                copy_mode: CopyMode::DeepCopy,
            },
            declared_in: declared_in.into(),
            default: None,
            doc: None,
        }
    }

    fn class(name: &str, chain: &[&str], subclasses: &[&str], fields: Vec<ResolvedField>) -> ResolvedClass {
        ResolvedClass {
            name: name.into(),
            superclass: chain.iter().rev().nth(1).map(|s| s.to_string()),
            chain: chain.iter().map(|s| s.to_string()).collect(),
            subclasses: subclasses.iter().map(|s| s.to_string()).collect(),
            fields,
            constructor: vec![],
            traversal: vec![],
            clone: vec![],
            indicators: ResolvedIndicators::default(),
            doc: None,
        }
    }

    fn sample_model() -> ResolvedModel {
        let name = || field("name", "Node", FieldKind::Primitive(PrimitiveKind::String));
        ResolvedModel {
            root: None,
            externals: vec![],
            classes: vec![
                class("Node", &["Node"], &["Expression", "Statement"], vec![name()]),
                class("Expression", &["Node", "Expression"], &["Identifier"], vec![name()]),
                class(
                    "Identifier",
                    &["Node", "Expression", "Identifier"],
                    &[],
                    vec![name(), field("target", "Identifier", FieldKind::ScalarRef("Node".into()))],
                ),
                class("Statement", &["Node", "Statement"], &[], vec![name()]),
            ],
        }
    }

    #[test]
    fn leaves_and_categories() {
        let model = sample_model();
        let leaves: Vec<_> = model.leaves().map(|c| c.name.as_str()).collect();
        assert_eq!(leaves, vec!["Identifier", "Statement"]);
        let cats: Vec<_> = model.categories().map(|c| c.name.as_str()).collect();
        assert_eq!(cats, vec!["Node", "Expression"]);

        let under: Vec<_> = model.leaves_under("Expression").iter().map(|c| c.name.as_str()).collect();
        assert_eq!(under, vec!["Identifier"]);
        assert_eq!(model.leaves_under("Statement").len(), 1);
    }

    #[test]
    fn class_queries() {
        let model = sample_model();
        let ident = model.class("Identifier").unwrap();
        assert!(ident.is_subclass_of("Node"));
        assert!(!ident.is_subclass_of("Statement"));
        assert_eq!(ident.field_index("target"), Some(1));
        let own: Vec<_> = ident.own_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(own, vec!["target"]);
        assert_eq!(ident.superclass.as_deref(), Some("Expression"));
    }

    #[test]
    fn clone_rule_serde_shape() {
        let rule = CloneRule {
            field: "moduleTable".into(),
            step: CloneStep::ExternalCopy {
                type_name: "ModuleTable".into(),
            },
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(
            json,
            r#"{"field":"moduleTable","step":"external_copy","type_name":"ModuleTable"}"#
        );
        let back: CloneRule = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, back);
    }
}
