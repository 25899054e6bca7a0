//! Node model resolver.
//!
//! Turns a declared [`Schema`] into the [`ResolvedModel`] every renderer
//! consumes:
//! - superclass chains and flattened field lists
//! - construction signatures and traversal lists
//! - clone specifications with concrete copy modes
//! - indicator bindings
//!
//! Resolution is all-or-nothing. Structural defects (duplicate classes,
//! dangling superclasses, cycles, extra roots) stop it before flattening;
//! field-level defects are collected across the whole schema and returned
//! together.

pub mod error;
pub mod externals;
pub mod hierarchy;
pub mod policy;

pub use error::{error_code, SchemaError, SchemaErrors};
pub use externals::{DeclaredExternals, ExternalTypes};

use nodegen_ir::{ResolvedModel, Schema};
use tracing::{debug, info};

use crate::hierarchy::Hierarchy;
use crate::policy::PolicyEngine;

/// Resolve a schema, confirming external type names with `externals`.
pub fn resolve(schema: &Schema, externals: &dyn ExternalTypes) -> Result<ResolvedModel, SchemaErrors> {
    let hierarchy = Hierarchy::build(schema)?;

    let mut errors = Vec::new();
    let layouts = hierarchy.flatten(&mut errors);

    let mut engine = PolicyEngine::new(&hierarchy, externals);
    let classes: Vec<_> = layouts
        .iter()
        .map(|layout| engine.resolve_class(layout, &mut errors))
        .collect();

    if !errors.is_empty() {
        debug!(errors = errors.len(), "schema rejected");
        return Err(SchemaErrors::new(errors));
    }

    let model = ResolvedModel {
        root: schema.root.clone(),
        externals: engine.into_confirmed_externals(),
        classes,
    };
    info!(classes = model.classes.len(), "node model resolved");
    Ok(model)
}

/// Resolve a schema against the external types it declares itself.
pub fn resolve_schema(schema: &Schema) -> Result<ResolvedModel, SchemaErrors> {
    let externals = DeclaredExternals::new(schema.externals.iter().cloned());
    resolve(schema, &externals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegen_ir::*;

    fn string() -> FieldKind {
        FieldKind::Primitive(PrimitiveKind::String)
    }

    /// A trimmed-down C front-end AST: statements, expressions, identifiers
    /// with mangle bookkeeping and a deferred type annotation.
    fn nesc_schema() -> Schema {
        Schema::new(vec![
            NodeDescriptor::new("Node")
                .field(FieldDescriptor::external("location", "Location"))
                .field(
                    FieldDescriptor::scalar("next", "Node")
                        .optional()
                        .deferred()
                        .hidden()
                        .copy(CopyMode::ResetOnCopy),
                )
                .field(FieldDescriptor::boolean("isPasted").deferred()),
            NodeDescriptor::new("Expression")
                .extends("Node")
                .generic()
                .field(FieldDescriptor::external("type", "Type").optional().deferred())
                .field(FieldDescriptor::integer("parenthesesCount").deferred()),
            NodeDescriptor::new("Identifier")
                .extends("Expression")
                .mangle("uniqueName", "refsDeclInThisNescEntity")
                .field(FieldDescriptor::string("name"))
                .field(FieldDescriptor::string("uniqueName").optional().deferred())
                .field(FieldDescriptor::boolean("refsDeclInThisNescEntity").deferred())
                .field(
                    FieldDescriptor::scalar("declaration", "Declaration")
                        .optional()
                        .deferred()
                        .hidden()
                        .copy(CopyMode::ShareReference),
                ),
            NodeDescriptor::new("FunctionCall")
                .extends("Expression")
                .field(FieldDescriptor::scalar("function", "Expression"))
                .field(FieldDescriptor::list("arguments", "Expression")),
            NodeDescriptor::new("UniqueCall").extends("FunctionCall").unique(),
            NodeDescriptor::new("Declaration")
                .extends("Node")
                .field(FieldDescriptor::list("attributes", "Attribute").optional()),
            NodeDescriptor::new("Attribute")
                .extends("Node")
                .field(FieldDescriptor::scalar("name", "Word")),
            NodeDescriptor::new("Word")
                .extends("Node")
                .field(FieldDescriptor::string("name")),
            NodeDescriptor::new("Module")
                .extends("Node")
                .field(
                    FieldDescriptor::external("moduleTable", "ModuleTable")
                        .deferred()
                        .copy(CopyMode::ExternalDeepCopy),
                ),
        ])
        .with_externals(["Location", "Type", "ModuleTable"])
    }

    fn names<T>(items: &[T], name: impl Fn(&T) -> &str) -> Vec<&str> {
        items.iter().map(name).collect()
    }

    #[test]
    fn resolves_sample_ast() {
        let model = resolve_schema(&nesc_schema()).unwrap();
        let order = names(&model.classes, |c| c.name.as_str());
        assert_eq!(
            order,
            vec![
                "Node",
                "Expression",
                "Identifier",
                "FunctionCall",
                "UniqueCall",
                "Declaration",
                "Attribute",
                "Word",
                "Module"
            ]
        );
        assert_eq!(model.externals, vec!["Location", "ModuleTable", "Type"]);

        let ident = model.class("Identifier").unwrap();
        assert_eq!(
            names(&ident.fields, |f| f.name.as_str()),
            vec![
                "location",
                "next",
                "isPasted",
                "type",
                "parenthesesCount",
                "name",
                "uniqueName",
                "refsDeclInThisNescEntity",
                "declaration"
            ]
        );
        assert_eq!(names(&ident.constructor, |p| p.field.as_str()), vec!["location", "name"]);
        assert!(ident.traversal.is_empty());
        assert!(ident.indicators.generic);
        assert!(!ident.indicators.unique);
        assert_eq!(
            ident.indicators.mangle,
            Some(MangleBinding {
                name_field: "uniqueName".into(),
                flag_field: "refsDeclInThisNescEntity".into(),
                name_optional: true,
                flag_optional: false,
            })
        );

        let ty = ident.field("type").unwrap();
        assert_eq!(ty.declared_in, "Expression");
        assert_eq!(ty.default, Some(DefaultValue::Absent));
        assert_eq!(ty.policy.copy_mode, CopyMode::ShareReference);
        assert_eq!(ident.field("parenthesesCount").unwrap().default, Some(DefaultValue::Zero));
        assert_eq!(ident.field("isPasted").unwrap().default, Some(DefaultValue::False));

        let call = model.class("UniqueCall").unwrap();
        assert!(call.indicators.unique && call.indicators.generic);
        assert_eq!(
            call.traversal,
            vec![
                TraversalSlot {
                    field: "function".into(),
                    list: false
                },
                TraversalSlot {
                    field: "arguments".into(),
                    list: true
                },
            ]
        );

        let module = model.class("Module").unwrap();
        assert_eq!(
            module.clone.last().unwrap().step,
            CloneStep::ExternalCopy {
                type_name: "ModuleTable".into()
            }
        );
        assert_eq!(module.field("moduleTable").unwrap().default, Some(DefaultValue::Unset));
    }

    #[test]
    fn base_derived_scenario() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Base").field(FieldDescriptor::string("x").optional()),
            NodeDescriptor::new("Derived")
                .extends("Base")
                .field(FieldDescriptor::scalar("y", "Base")),
        ]);
        let model = resolve_schema(&schema).unwrap();
        let derived = model.class("Derived").unwrap();
        assert_eq!(names(&derived.fields, |f| f.name.as_str()), vec!["x", "y"]);
        assert_eq!(
            derived.constructor,
            vec![
                ConstructorParam {
                    field: "x".into(),
                    optional: true
                },
                ConstructorParam {
                    field: "y".into(),
                    optional: false
                },
            ]
        );
        assert_eq!(derived.clone[0].step, CloneStep::CopyValue);
        assert_eq!(derived.clone[1].step, CloneStep::CloneChild);
        assert_eq!(derived.chain, vec!["Base", "Derived"]);
        assert_eq!(derived.superclass.as_deref(), Some("Base"));
    }

    #[test]
    fn next_field_is_never_visited_constructed_or_copied() {
        let model = resolve_schema(&nesc_schema()).unwrap();
        for class in &model.classes {
            assert!(class.traversal.iter().all(|s| s.field != "next"), "{}", class.name);
            assert!(class.constructor.iter().all(|p| p.field != "next"), "{}", class.name);
            let rule = class.clone.iter().find(|r| r.field == "next").unwrap();
            assert_eq!(rule.step, CloneStep::Reset);
        }
    }

    #[test]
    fn contracts_are_subsequences_of_flattened_fields() {
        let model = resolve_schema(&nesc_schema()).unwrap();
        for class in &model.classes {
            let visitable: Vec<_> = class
                .fields
                .iter()
                .filter(|f| f.policy.visitable && f.kind.is_reference())
                .map(|f| f.name.as_str())
                .collect();
            assert_eq!(names(&class.traversal, |s| s.field.as_str()), visitable);

            let bound: Vec<_> = class
                .fields
                .iter()
                .filter(|f| f.policy.constructor_bound)
                .map(|f| f.name.as_str())
                .collect();
            assert_eq!(names(&class.constructor, |p| p.field.as_str()), bound);
            assert_eq!(names(&class.clone, |r| r.field.as_str()), names(&class.fields, |f| f.name.as_str()));
        }
    }

    #[test]
    fn deferred_fields_do_not_change_signature() {
        let mut schema = nesc_schema();
        let before = resolve_schema(&schema).unwrap();
        let node = schema.nodes.iter_mut().find(|n| n.name == "Identifier").unwrap();
        node.fields.push(FieldDescriptor::integer("idCount").deferred());
        node.fields.push(FieldDescriptor::list("pastedFrom", "Node").deferred());
        let after = resolve_schema(&schema).unwrap();

        let sig = |m: &ResolvedModel| m.class("Identifier").unwrap().constructor.clone();
        assert_eq!(sig(&before), sig(&after));
        let ident = after.class("Identifier").unwrap();
        assert_eq!(ident.field("pastedFrom").unwrap().default, Some(DefaultValue::EmptyList));
        assert_eq!(ident.field("pastedFrom").unwrap().policy.copy_mode, CopyMode::ResetOnCopy);
    }

    #[test]
    fn sibling_classes_may_reuse_names() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node"),
            NodeDescriptor::new("IntConst")
                .extends("Node")
                .field(FieldDescriptor::integer("value")),
            NodeDescriptor::new("StringConst")
                .extends("Node")
                .field(FieldDescriptor::string("value")),
            NodeDescriptor::new("Wrapper")
                .extends("Node")
                .field(FieldDescriptor::scalar("value", "Node")),
        ]);
        let model = resolve_schema(&schema).unwrap();
        assert_eq!(model.class("IntConst").unwrap().fields[0].kind, FieldKind::Primitive(PrimitiveKind::Integer));
        assert_eq!(model.class("StringConst").unwrap().fields[0].kind, string());
    }

    #[test]
    fn redeclaration_with_different_kind() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node").field(FieldDescriptor::string("name")),
            NodeDescriptor::new("Word").extends("Node"),
            NodeDescriptor::new("TagRef")
                .extends("Node")
                .field(FieldDescriptor::scalar("name", "Word")),
        ]);
        let errs = resolve_schema(&schema).unwrap_err();
        assert_eq!(
            errs.into_vec(),
            vec![SchemaError::FieldRedeclaration {
                class: "TagRef".into(),
                field: "name".into(),
                ancestor: Some("Node".into()),
                identical: false,
            }]
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let schema = nesc_schema();
        let first = serde_json::to_string_pretty(&resolve_schema(&schema).unwrap()).unwrap();
        let second = serde_json::to_string_pretty(&resolve_schema(&schema).unwrap()).unwrap();
        assert_eq!(first, second);

        let back: ResolvedModel = serde_json::from_str(&first).unwrap();
        assert_eq!(back, resolve_schema(&schema).unwrap());
    }

    #[test]
    fn unresolved_types_are_collected() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node").field(FieldDescriptor::external("location", "Location")),
            NodeDescriptor::new("Expr")
                .extends("Node")
                .field(FieldDescriptor::scalar("operand", "Expresion"))
                .field(FieldDescriptor::list("args", "Expr")),
            NodeDescriptor::new("Call").extends("Expr"),
        ]);
        let errs = resolve_schema(&schema).unwrap_err();
        // Inherited fields are reported once, on the declaring class.
        assert_eq!(
            errs.into_vec(),
            vec![
                SchemaError::UnresolvedFieldType {
                    class: "Node".into(),
                    field: "location".into(),
                    type_name: "Location".into(),
                },
                SchemaError::UnresolvedFieldType {
                    class: "Expr".into(),
                    field: "operand".into(),
                    type_name: "Expresion".into(),
                },
            ]
        );

        let externals = DeclaredExternals::new(["Location"]);
        let errs = resolve(&schema, &externals).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs.has_code(error_code::UNRESOLVED_FIELD_TYPE));
    }

    #[test]
    fn invalid_copy_modes() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node")
                .field(FieldDescriptor::scalar("parent", "Node").deferred().copy(CopyMode::DeepCopy))
                .field(FieldDescriptor::external("env", "Environment").copy(CopyMode::DeepCopy))
                .field(FieldDescriptor::string("name").copy(CopyMode::ExternalDeepCopy)),
        ])
        .with_externals(["Environment"]);
        let errs = resolve_schema(&schema).unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs.errors().iter().all(|e| e.error_code() == error_code::INVALID_COPY_MODE));
        assert!(matches!(
            &errs.errors()[0],
            SchemaError::InvalidCopyMode { field, copy_mode: CopyMode::DeepCopy, .. } if field == "parent"
        ));
    }

    #[test]
    fn mangle_binding_failures() {
        let base = || {
            NodeDescriptor::new("Node")
                .field(FieldDescriptor::string("name"))
                .field(FieldDescriptor::integer("count"))
                .field(FieldDescriptor::boolean("flag"))
        };

        let cases = [
            (base().mangle("missing", "flag"), "missing"),
            (base().mangle("count", "flag"), "count"),
            (base().mangle("name", "name"), "name"),
            (base().mangle("name", "count"), "count"),
        ];
        for (node, field) in cases {
            let errs = resolve_schema(&Schema::new(vec![node])).unwrap_err();
            match errs.first() {
                SchemaError::InvalidIndicatorBinding {
                    class,
                    indicator,
                    field: bad,
                    ..
                } => {
                    assert_eq!(class, "Node");
                    assert_eq!(indicator, "mangle");
                    assert_eq!(bad, field);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        let ok = resolve_schema(&Schema::new(vec![base().mangle("name", "flag")])).unwrap();
        assert!(ok.classes[0].indicators.mangle.is_some());
    }

    #[test]
    fn mangle_is_inherited_and_not_redeclared() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node")
                .mangle("name", "flag")
                .field(FieldDescriptor::string("name"))
                .field(FieldDescriptor::boolean("flag")),
            NodeDescriptor::new("Leaf").extends("Node"),
        ]);
        let model = resolve_schema(&schema).unwrap();
        assert_eq!(
            model.class("Leaf").unwrap().indicators.mangle,
            model.class("Node").unwrap().indicators.mangle
        );

        let mut schema = schema;
        schema.nodes[1] = NodeDescriptor::new("Leaf").extends("Node").mangle("name", "flag");
        let errs = resolve_schema(&schema).unwrap_err();
        assert!(errs.has_code(error_code::INVALID_INDICATOR_BINDING));
    }

    #[test]
    fn external_root() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("Node").extends("BasicASTNode"),
            NodeDescriptor::new("Word").extends("Node").field(FieldDescriptor::string("name")),
        ])
        .with_root("BasicASTNode");
        let model = resolve_schema(&schema).unwrap();
        assert_eq!(model.root.as_deref(), Some("BasicASTNode"));
        let node = model.class("Node").unwrap();
        assert_eq!(node.superclass, None);
        assert_eq!(node.chain, vec!["Node"]);
        assert_eq!(model.class("Word").unwrap().chain, vec!["Node", "Word"]);
    }

    #[test]
    fn structural_errors_stop_early() {
        let schema = Schema::new(vec![
            NodeDescriptor::new("A").extends("B").field(FieldDescriptor::scalar("x", "Nowhere")),
            NodeDescriptor::new("B").extends("A"),
        ]);
        let errs = resolve_schema(&schema).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs.has_code(error_code::CYCLIC_HIERARCHY));
    }
}
