//! Per-field policy resolution and per-class contract derivation.
//!
//! Field checks (type resolution, copy-mode admissibility, warnings) run once
//! per declaration, on the class that declares the field. Subclasses reuse
//! the cached outcome so an inherited defect is reported exactly once.

use std::collections::{BTreeSet, HashMap};

use nodegen_ir::{
    CloneRule, CloneStep, ConstructorParam, CopyMode, DefaultValue, FieldKind, MangleBinding,
    PrimitiveKind, ResolvedClass, ResolvedField, ResolvedIndicators, ResolvedPolicy,
    TraversalSlot,
};
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::externals::ExternalTypes;
use crate::hierarchy::{ClassLayout, FlatField, Hierarchy};

const MANGLE: &str = "mangle";

pub struct PolicyEngine<'h, 's> {
    hierarchy: &'h Hierarchy<'s>,
    externals: &'h dyn ExternalTypes,
    /// Keyed by (declaring class, field name).
    fields: HashMap<(&'s str, &'s str), ResolvedField>,
    /// Mangle binding in effect for each class already resolved.
    mangle: HashMap<&'s str, Option<MangleBinding>>,
    confirmed: BTreeSet<String>,
}

impl<'h, 's> PolicyEngine<'h, 's> {
    pub fn new(hierarchy: &'h Hierarchy<'s>, externals: &'h dyn ExternalTypes) -> Self {
        Self {
            hierarchy,
            externals,
            fields: HashMap::new(),
            mangle: HashMap::new(),
            confirmed: BTreeSet::new(),
        }
    }

    /// External type names that fields referred to, sorted.
    pub fn into_confirmed_externals(self) -> Vec<String> {
        self.confirmed.into_iter().collect()
    }

    /// Derive the full contract of one class. Layouts must arrive in
    /// pre-order so ancestors' indicator bindings are known.
    pub fn resolve_class(
        &mut self,
        layout: &ClassLayout<'s>,
        errors: &mut Vec<SchemaError>,
    ) -> ResolvedClass {
        let fields: Vec<ResolvedField> = layout
            .fields
            .iter()
            .map(|flat| self.resolve_field(flat, errors))
            .collect();

        let constructor = fields
            .iter()
            .filter(|f| f.policy.constructor_bound)
            .map(|f| ConstructorParam {
                field: f.name.clone(),
                optional: f.policy.optional,
            })
            .collect();

        let traversal = fields
            .iter()
            .filter(|f| f.policy.visitable && f.kind.is_reference())
            .map(|f| TraversalSlot {
                field: f.name.clone(),
                list: f.kind.is_list(),
            })
            .collect();

        let clone = fields
            .iter()
            .map(|f| CloneRule {
                field: f.name.clone(),
                step: clone_step(&f.kind, f.policy.copy_mode),
            })
            .collect();

        let indicators = self.resolve_indicators(layout, &fields, errors);

        debug!(
            class = layout.name(),
            fields = fields.len(),
            "class resolved"
        );

        ResolvedClass {
            name: layout.node.name.clone(),
            superclass: layout
                .node
                .superclass
                .clone()
                .filter(|s| self.hierarchy.contains(s)),
            chain: layout.chain.iter().map(|c| c.to_string()).collect(),
            subclasses: layout.subclasses.iter().map(|c| c.to_string()).collect(),
            fields,
            constructor,
            traversal,
            clone,
            indicators,
            doc: layout.node.doc.clone(),
        }
    }

    fn resolve_field(&mut self, flat: &FlatField<'s>, errors: &mut Vec<SchemaError>) -> ResolvedField {
        let key = (flat.declared_in, flat.field.name.as_str());
        if let Some(done) = self.fields.get(&key) {
            return done.clone();
        }

        let field = flat.field;
        let class = flat.declared_in;
        self.check_type(class, &field.name, &field.kind, errors);

        let policy = &field.policy;
        let copy_mode = policy
            .copy_mode
            .unwrap_or_else(|| default_copy_mode(&field.kind, policy.constructor_bound));
        if let Err(reason) = check_copy_mode(&field.kind, policy.constructor_bound, copy_mode) {
            errors.push(SchemaError::InvalidCopyMode {
                class: class.to_string(),
                field: field.name.clone(),
                copy_mode,
                reason: reason.to_string(),
            });
        }

        if policy.visitable && field.kind.is_reference() && copy_mode == CopyMode::ShareReference {
            warn!(
                class,
                field = %field.name,
                "visitable shared reference: traversal may reach the referent more than once"
            );
        }
        if policy.constructor_bound && !policy.optional && copy_mode == CopyMode::ResetOnCopy {
            warn!(
                class,
                field = %field.name,
                "required constructor field is reset on copy; clones will lack it"
            );
        }

        let default = if policy.constructor_bound {
            None
        } else if policy.optional {
            Some(DefaultValue::Absent)
        } else {
            Some(sentinel(&field.kind))
        };

        let resolved = ResolvedField {
            name: field.name.clone(),
            kind: field.kind.clone(),
            policy: ResolvedPolicy {
                optional: policy.optional,
                constructor_bound: policy.constructor_bound,
                visitable: policy.visitable,
                copy_mode,
            },
            declared_in: class.to_string(),
            default,
            doc: field.doc.clone(),
        };
        self.fields.insert(key, resolved.clone());
        resolved
    }

    fn check_type(&mut self, class: &str, field: &str, kind: &FieldKind, errors: &mut Vec<SchemaError>) {
        let unresolved = match kind {
            FieldKind::ScalarRef(t) | FieldKind::ListRef(t) => {
                (!self.hierarchy.contains(t)).then_some(t)
            }
            FieldKind::Primitive(PrimitiveKind::External(t)) => {
                if self.externals.contains(t) {
                    self.confirmed.insert(t.clone());
                    None
                } else {
                    Some(t)
                }
            }
            FieldKind::Primitive(_) => None,
        };
        if let Some(type_name) = unresolved {
            errors.push(SchemaError::UnresolvedFieldType {
                class: class.to_string(),
                field: field.to_string(),
                type_name: type_name.clone(),
            });
        }
    }

    fn resolve_indicators(
        &mut self,
        layout: &ClassLayout<'s>,
        fields: &[ResolvedField],
        errors: &mut Vec<SchemaError>,
    ) -> ResolvedIndicators {
        let hierarchy = self.hierarchy;
        let ancestors = layout
            .chain
            .iter()
            .filter_map(|name| hierarchy.node(name))
            .collect::<Vec<_>>();
        let generic = ancestors.iter().any(|n| n.indicators.generic);
        let unique = ancestors.iter().any(|n| n.indicators.unique);

        let class = layout.name();
        let inherited = layout
            .node
            .superclass
            .as_deref()
            .and_then(|sup| self.mangle.get(sup).cloned())
            .flatten();
        let inherited_declared = ancestors
            .iter()
            .take(ancestors.len().saturating_sub(1))
            .any(|n| n.indicators.mangle.is_some());

        let mangle = match &layout.node.indicators.mangle {
            None => inherited,
            Some(decl) if inherited_declared => {
                errors.push(SchemaError::InvalidIndicatorBinding {
                    class: class.to_string(),
                    indicator: MANGLE.into(),
                    field: decl.name_field.clone(),
                    reason: "a superclass already declares a mangle indicator".into(),
                });
                inherited
            }
            Some(decl) => bind_mangle(class, &decl.name_field, &decl.flag_field, fields, errors),
        };
        self.mangle.insert(class, mangle.clone());

        ResolvedIndicators {
            generic,
            unique,
            mangle,
        }
    }
}

fn bind_mangle(
    class: &str,
    name_field: &str,
    flag_field: &str,
    fields: &[ResolvedField],
    errors: &mut Vec<SchemaError>,
) -> Option<MangleBinding> {
    let fail = |errors: &mut Vec<SchemaError>, field: &str, reason: String| {
        errors.push(SchemaError::InvalidIndicatorBinding {
            class: class.to_string(),
            indicator: MANGLE.into(),
            field: field.to_string(),
            reason,
        });
    };

    if name_field == flag_field {
        fail(errors, name_field, "the same field cannot be both name and flag".into());
        return None;
    }

    let lookup = |errors: &mut Vec<SchemaError>, name: &str, want: PrimitiveKind| {
        match fields.iter().find(|f| f.name == name) {
            None => {
                fail(errors, name, "no such field in the flattened field list".into());
                None
            }
            Some(f) if f.kind != FieldKind::Primitive(want.clone()) => {
                let expected = FieldKind::Primitive(want);
                fail(errors, name, format!("expected {}, found {}", expected, f.kind));
                None
            }
            Some(f) => Some(f.policy.optional),
        }
    };

    let name_optional = lookup(errors, name_field, PrimitiveKind::String);
    let flag_optional = lookup(errors, flag_field, PrimitiveKind::Bool);
    Some(MangleBinding {
        name_field: name_field.to_string(),
        flag_field: flag_field.to_string(),
        name_optional: name_optional?,
        flag_optional: flag_optional?,
    })
}

/// Copy mode used when the author does not name one.
pub fn default_copy_mode(kind: &FieldKind, constructor_bound: bool) -> CopyMode {
    match kind {
        FieldKind::Primitive(PrimitiveKind::External(_)) => CopyMode::ShareReference,
        FieldKind::Primitive(_) if constructor_bound => CopyMode::DeepCopy,
        FieldKind::Primitive(_) => CopyMode::ShareReference,
        FieldKind::ScalarRef(_) | FieldKind::ListRef(_) if constructor_bound => CopyMode::DeepCopy,
        FieldKind::ScalarRef(_) | FieldKind::ListRef(_) => CopyMode::ResetOnCopy,
    }
}

/// Rejects copy modes that cannot be honored for the kind and binding.
pub fn check_copy_mode(
    kind: &FieldKind,
    constructor_bound: bool,
    mode: CopyMode,
) -> Result<(), &'static str> {
    let external = kind.external_type().is_some();
    match mode {
        CopyMode::ExternalDeepCopy if !external => {
            Err("external copy applies only to opaque external types")
        }
        CopyMode::DeepCopy if external => {
            Err("external types are never deep-copied by the core; use external_copy")
        }
        CopyMode::DeepCopy if kind.is_reference() && !constructor_bound => {
            Err("deferred node references are shared or reset, never deep-copied")
        }
        _ => Ok(()),
    }
}

fn sentinel(kind: &FieldKind) -> DefaultValue {
    match kind {
        FieldKind::Primitive(PrimitiveKind::Bool) => DefaultValue::False,
        FieldKind::Primitive(PrimitiveKind::Integer) => DefaultValue::Zero,
        FieldKind::Primitive(PrimitiveKind::String) => DefaultValue::EmptyString,
        FieldKind::ListRef(_) => DefaultValue::EmptyList,
        FieldKind::ScalarRef(_) | FieldKind::Primitive(PrimitiveKind::External(_)) => {
            DefaultValue::Unset
        }
    }
}

fn clone_step(kind: &FieldKind, mode: CopyMode) -> CloneStep {
    match (mode, kind) {
        (CopyMode::ResetOnCopy, _) => CloneStep::Reset,
        (CopyMode::ExternalDeepCopy, _) => CloneStep::ExternalCopy {
            type_name: kind.external_type().unwrap_or_default().to_string(),
        },
        (CopyMode::ShareReference, FieldKind::Primitive(p))
            if !matches!(p, PrimitiveKind::External(_)) =>
        {
            CloneStep::CopyValue
        }
        (CopyMode::ShareReference, _) => CloneStep::ShareReference,
        (CopyMode::DeepCopy, FieldKind::ScalarRef(_)) => CloneStep::CloneChild,
        (CopyMode::DeepCopy, FieldKind::ListRef(_)) => CloneStep::CloneList,
        (CopyMode::DeepCopy, FieldKind::Primitive(_)) => CloneStep::CopyValue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegen_ir::FieldDescriptor;

    fn string() -> FieldKind {
        FieldKind::Primitive(PrimitiveKind::String)
    }

    fn external() -> FieldKind {
        FieldKind::Primitive(PrimitiveKind::External("Type".into()))
    }

    #[test]
    fn defaults_follow_kind_and_binding() {
        let node = FieldKind::ScalarRef("Expression".into());
        assert_eq!(default_copy_mode(&node, true), CopyMode::DeepCopy);
        assert_eq!(default_copy_mode(&node, false), CopyMode::ResetOnCopy);
        assert_eq!(default_copy_mode(&string(), true), CopyMode::DeepCopy);
        assert_eq!(default_copy_mode(&string(), false), CopyMode::ShareReference);
        assert_eq!(default_copy_mode(&external(), true), CopyMode::ShareReference);
        assert_eq!(default_copy_mode(&external(), false), CopyMode::ShareReference);
    }

    #[test]
    fn admissible_copy_modes() {
        let list = FieldKind::ListRef("Declaration".into());
        assert!(check_copy_mode(&list, true, CopyMode::DeepCopy).is_ok());
        assert!(check_copy_mode(&list, false, CopyMode::DeepCopy).is_err());
        assert!(check_copy_mode(&list, false, CopyMode::ShareReference).is_ok());
        assert!(check_copy_mode(&list, true, CopyMode::ExternalDeepCopy).is_err());
        assert!(check_copy_mode(&string(), false, CopyMode::DeepCopy).is_ok());
        assert!(check_copy_mode(&string(), true, CopyMode::ExternalDeepCopy).is_err());
        assert!(check_copy_mode(&external(), true, CopyMode::DeepCopy).is_err());
        assert!(check_copy_mode(&external(), false, CopyMode::ExternalDeepCopy).is_ok());
        assert!(check_copy_mode(&external(), false, CopyMode::ResetOnCopy).is_ok());
    }

    #[test]
    fn clone_steps() {
        assert_eq!(clone_step(&string(), CopyMode::ShareReference), CloneStep::CopyValue);
        assert_eq!(clone_step(&string(), CopyMode::DeepCopy), CloneStep::CopyValue);
        assert_eq!(clone_step(&external(), CopyMode::ShareReference), CloneStep::ShareReference);
        assert_eq!(
            clone_step(&external(), CopyMode::ExternalDeepCopy),
            CloneStep::ExternalCopy {
                type_name: "Type".into()
            }
        );
        let child = FieldKind::ScalarRef("Node".into());
        assert_eq!(clone_step(&child, CopyMode::DeepCopy), CloneStep::CloneChild);
        assert_eq!(clone_step(&child, CopyMode::ResetOnCopy), CloneStep::Reset);
        assert_eq!(
            clone_step(&FieldKind::ListRef("Node".into()), CopyMode::DeepCopy),
            CloneStep::CloneList
        );
    }

    #[test]
    fn sentinels() {
        assert_eq!(sentinel(&FieldDescriptor::boolean("b").kind), DefaultValue::False);
        assert_eq!(sentinel(&FieldDescriptor::integer("i").kind), DefaultValue::Zero);
        assert_eq!(sentinel(&string()), DefaultValue::EmptyString);
        assert_eq!(sentinel(&FieldDescriptor::list("l", "Node").kind), DefaultValue::EmptyList);
        assert_eq!(sentinel(&external()), DefaultValue::Unset);
    }
}
