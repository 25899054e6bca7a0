//! Rust node generator.
//!
//! Renders the resolved model as one self-contained `nodes.rs`:
//! - a struct per class with its flattened fields and a `new` constructor
//! - set-once accessors for deferred fields (backed by `OnceCell`)
//! - `children` (traversal list) and `structural_clone` (clone specification)
//! - an `Any{Category}` enum per non-leaf class, leaves as variants
//! - indicator consts and mangle bookkeeping accessors
//!
//! Owned node edges are `Rc`; `ShareReference` node edges are `Weak` so that
//! back-references never keep a tree alive. External types come from
//! `super::externals` and are shared through `Rc`.

use anyhow::Result;
use nodegen_ir::{
    CloneStep, CopyMode, FieldKind, PrimitiveKind, ResolvedClass, ResolvedField, ResolvedModel,
};

use crate::naming::{bare, field_ident};

pub struct RustNodesGenerator;

impl crate::Codegen for RustNodesGenerator {
    fn generate(&self, model: &ResolvedModel) -> Result<crate::GeneratedCode> {
        let content = generate_nodes(model)?;
        Ok(crate::GeneratedCode {
            files: vec![crate::GeneratedFile {
                path: "nodes.rs".into(),
                content,
            }],
        })
    }

    fn language(&self) -> &str {
        "rust"
    }
}

/// Methods every struct gets; deferred accessors must not collide with them.
const METHOD_NAMES: &[&str] = &["new", "children", "structural_clone", "mangle_name", "mangle_applies"];

/// How a field is held inside its struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// `T`
    Plain,
    /// `Option<T>`: optional, or reset on copy.
    Optional,
    /// `OnceCell<T>`: deferred, assigned at most once.
    Cell,
}

fn storage(field: &ResolvedField) -> Storage {
    if !field.policy.constructor_bound {
        Storage::Cell
    } else if field.policy.optional || field.policy.copy_mode == CopyMode::ResetOnCopy {
        Storage::Optional
    } else {
        Storage::Plain
    }
}

/// Non-owning node edge.
fn is_weak(field: &ResolvedField) -> bool {
    field.kind.is_reference() && field.policy.copy_mode == CopyMode::ShareReference
}

struct Features {
    rc: bool,
    weak: bool,
    cell: bool,
    external_copy: bool,
    map_cell: bool,
}

impl Features {
    fn scan(model: &ResolvedModel) -> Self {
        let fields = || model.classes.iter().flat_map(|c| c.fields.iter());
        let external_copy = |f: &&ResolvedField| f.policy.copy_mode == CopyMode::ExternalDeepCopy;
        Self {
            rc: fields().any(|f| f.kind.is_reference() || f.kind.external_type().is_some()),
            weak: fields().any(is_weak),
            cell: fields().any(|f| !f.policy.constructor_bound),
            external_copy: fields().any(|f| external_copy(&f)),
            map_cell: fields().any(|f| external_copy(&f) && storage(f) == Storage::Cell),
        }
    }
}

fn generate_nodes(model: &ResolvedModel) -> Result<String> {
    let mut output = String::new();
    output.push_str("// Auto-generated by nodegen from the resolved node model. Do not edit.\n");
    if model.classes.is_empty() {
        return Ok(output);
    }
    output.push('\n');

    let features = Features::scan(model);
    if features.cell {
        output.push_str("use std::cell::OnceCell;\n");
    }
    output.push_str("use std::fmt;\n");
    match (features.rc, features.weak) {
        (_, true) => output.push_str("use std::rc::{Rc, Weak};\n"),
        (true, false) => output.push_str("use std::rc::Rc;\n"),
        (false, false) => {}
    }
    if !model.externals.is_empty() {
        output.push_str(&format!(
            "\n#[allow(unused_imports)]\nuse super::externals::{{{}}};\n",
            model.externals.join(", ")
        ));
    }
    output.push('\n');

    generate_prelude(&mut output, &features);
    generate_node_ref(&mut output, model);

    for class in &model.classes {
        generate_struct(&mut output, model, class);
        generate_impl(&mut output, model, class);
    }
    for class in model.categories() {
        generate_category(&mut output, model, class);
    }

    Ok(output)
}

fn generate_prelude(output: &mut String, features: &Features) {
    output.push_str("/// A deferred field was assigned twice.\n");
    output.push_str("#[derive(Debug, Clone, PartialEq, Eq)]\n");
    output.push_str("pub struct AlreadyAssigned {\n");
    output.push_str("    pub class: &'static str,\n");
    output.push_str("    pub field: &'static str,\n");
    output.push_str("}\n\n");
    output.push_str("impl fmt::Display for AlreadyAssigned {\n");
    output.push_str("    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {\n");
    output.push_str("        write!(f, \"{}.{} is already assigned\", self.class, self.field)\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");
    output.push_str("impl std::error::Error for AlreadyAssigned {}\n\n");

    if features.external_copy {
        output.push_str("/// Copy routine for external types cloned with `@external_copy`.\n");
        output.push_str("pub trait ExternalCopy {\n");
        output.push_str("    fn external_copy(&self) -> Self;\n");
        output.push_str("}\n\n");
    }
    if features.map_cell {
        output.push_str("fn map_cell<T, U>(cell: &OnceCell<T>, f: impl FnOnce(&T) -> U) -> OnceCell<U> {\n");
        output.push_str("    let out = OnceCell::new();\n");
        output.push_str("    if let Some(value) = cell.get() {\n");
        output.push_str("        let _ = out.set(f(value));\n");
        output.push_str("    }\n");
        output.push_str("    out\n");
        output.push_str("}\n\n");
    }

    output.push_str("/// Borrowed view of a node, for generic traversal.\n");
    output.push_str("pub trait AsNodeRef {\n");
    output.push_str("    fn as_node_ref(&self) -> NodeRef<'_>;\n");
    output.push_str("}\n\n");
}

fn generate_node_ref(output: &mut String, model: &ResolvedModel) {
    let leaves: Vec<&ResolvedClass> = model.leaves().collect();

    output.push_str("/// Any concrete node.\n");
    output.push_str("#[derive(Debug, Clone, Copy)]\n");
    output.push_str("pub enum NodeRef<'a> {\n");
    for leaf in &leaves {
        output.push_str(&format!("    {0}(&'a {0}),\n", leaf.name));
    }
    output.push_str("}\n\n");

    output.push_str("impl<'a> NodeRef<'a> {\n");
    output.push_str("    pub fn class_name(&self) -> &'static str {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!("            NodeRef::{0}(_) => {0}::CLASS,\n", leaf.name));
    }
    output.push_str("        }\n");
    output.push_str("    }\n\n");
    output.push_str("    pub fn children(&self, visit: &mut dyn FnMut(NodeRef<'_>)) {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!("            NodeRef::{}(node) => node.children(visit),\n", leaf.name));
    }
    output.push_str("        }\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    output.push_str("/// Pre-order walk over visitable edges.\n");
    output.push_str("pub fn walk(node: NodeRef<'_>, visit: &mut dyn FnMut(NodeRef<'_>)) {\n");
    output.push_str("    visit(node);\n");
    output.push_str("    node.children(&mut |child| walk(child, &mut *visit));\n");
    output.push_str("}\n\n");
}

/// Rust type naming a reference target: the struct for a leaf, the enum
/// for a category.
fn target_type(model: &ResolvedModel, class: &str) -> String {
    match model.class(class) {
        Some(c) if !c.is_leaf() => format!("Any{}", class),
        _ => class.to_string(),
    }
}

/// Type of one stored value, before `Option` / `OnceCell` wrapping.
fn value_type(model: &ResolvedModel, field: &ResolvedField) -> String {
    let pointer = if is_weak(field) { "Weak" } else { "Rc" };
    match &field.kind {
        FieldKind::Primitive(PrimitiveKind::String) => "String".into(),
        FieldKind::Primitive(PrimitiveKind::Bool) => "bool".into(),
        FieldKind::Primitive(PrimitiveKind::Integer) => "i64".into(),
        FieldKind::Primitive(PrimitiveKind::External(t)) => format!("Rc<{}>", t),
        FieldKind::ScalarRef(c) => format!("{}<{}>", pointer, target_type(model, c)),
        FieldKind::ListRef(c) => format!("Vec<{}<{}>>", pointer, target_type(model, c)),
    }
}

fn stored_type(model: &ResolvedModel, field: &ResolvedField) -> String {
    let value = value_type(model, field);
    match storage(field) {
        Storage::Plain => value,
        Storage::Optional => format!("Option<{}>", value),
        Storage::Cell => format!("OnceCell<{}>", value),
    }
}

fn push_doc(output: &mut String, indent: &str, doc: Option<&str>) {
    if let Some(doc) = doc {
        for line in doc.lines() {
            output.push_str(&format!("{}/// {}\n", indent, line).replace("/// \n", "///\n"));
        }
    }
}

fn generate_struct(output: &mut String, model: &ResolvedModel, class: &ResolvedClass) {
    push_doc(output, "", class.doc.as_deref());
    output.push_str("#[derive(Debug)]\n");
    output.push_str(&format!("pub struct {} {{\n", class.name));
    for field in &class.fields {
        push_doc(output, "    ", field.doc.as_deref());
        let vis = if field.policy.constructor_bound { "pub " } else { "" };
        output.push_str(&format!(
            "    {}{}: {},\n",
            vis,
            field_ident(&field.name),
            stored_type(model, field)
        ));
    }
    output.push_str("}\n\n");
}

fn generate_impl(output: &mut String, model: &ResolvedModel, class: &ResolvedClass) {
    output.push_str(&format!("impl {} {{\n", class.name));
    output.push_str(&format!("    pub const CLASS: &'static str = \"{}\";\n", class.name));
    output.push_str(&format!("    pub const IS_GENERIC: bool = {};\n", class.indicators.generic));
    output.push_str(&format!("    pub const IS_UNIQUE: bool = {};\n\n", class.indicators.unique));

    generate_constructor(output, model, class);
    for field in class.deferred_fields() {
        generate_accessors(output, model, field);
    }
    generate_children(output, class);
    generate_clone(output, class);
    generate_mangle(output, class);

    output.push_str("}\n\n");

    if class.is_leaf() {
        output.push_str(&format!("impl AsNodeRef for {} {{\n", class.name));
        output.push_str("    fn as_node_ref(&self) -> NodeRef<'_> {\n");
        output.push_str(&format!("        NodeRef::{}(self)\n", class.name));
        output.push_str("    }\n");
        output.push_str("}\n\n");
    }
}

fn generate_constructor(output: &mut String, model: &ResolvedModel, class: &ResolvedClass) {
    let params: Vec<String> = class
        .constructor
        .iter()
        .filter_map(|p| class.field(&p.field))
        .map(|f| {
            let value = value_type(model, f);
            let ty = if f.policy.optional {
                format!("Option<{}>", value)
            } else {
                value
            };
            format!("{}: {}", field_ident(&f.name), ty)
        })
        .collect();

    output.push_str(&format!("    pub fn new({}) -> Self {{\n", params.join(", ")));
    output.push_str("        Self {\n");
    for field in &class.fields {
        let ident = field_ident(&field.name);
        match storage(field) {
            Storage::Cell => output.push_str(&format!("            {}: OnceCell::new(),\n", ident)),
            Storage::Optional if !field.policy.optional => {
                output.push_str(&format!("            {0}: Some({0}),\n", ident))
            }
            _ => output.push_str(&format!("            {},\n", ident)),
        }
    }
    output.push_str("        }\n");
    output.push_str("    }\n\n");
}

fn accessor_name(field: &ResolvedField) -> String {
    let ident = field_ident(&field.name);
    if METHOD_NAMES.contains(&bare(&ident)) {
        format!("{}_field", bare(&ident))
    } else {
        ident
    }
}

/// Getter signature and body for a deferred field, applying the sentinel.
fn accessor(model: &ResolvedModel, field: &ResolvedField) -> (String, String) {
    let ident = field_ident(&field.name);
    let cell = format!("self.{}.get()", ident);
    let optional = field.policy.optional;

    if is_weak(field) {
        if let FieldKind::ScalarRef(c) = &field.kind {
            return (
                format!("Option<Rc<{}>>", target_type(model, c)),
                format!("{}.and_then(Weak::upgrade)", cell),
            );
        }
    }

    match &field.kind {
        FieldKind::Primitive(PrimitiveKind::String) if optional => {
            ("Option<&str>".into(), format!("{}.map(String::as_str)", cell))
        }
        FieldKind::Primitive(PrimitiveKind::String) => {
            ("&str".into(), format!("{}.map(String::as_str).unwrap_or(\"\")", cell))
        }
        FieldKind::Primitive(PrimitiveKind::Bool) if optional => {
            ("Option<bool>".into(), format!("{}.copied()", cell))
        }
        FieldKind::Primitive(PrimitiveKind::Bool) => {
            ("bool".into(), format!("{}.copied().unwrap_or(false)", cell))
        }
        FieldKind::Primitive(PrimitiveKind::Integer) if optional => {
            ("Option<i64>".into(), format!("{}.copied()", cell))
        }
        FieldKind::Primitive(PrimitiveKind::Integer) => {
            ("i64".into(), format!("{}.copied().unwrap_or(0)", cell))
        }
        FieldKind::ListRef(_) if !optional => {
            let value = value_type(model, field);
            let elem = value
                .strip_prefix("Vec<")
                .and_then(|v| v.strip_suffix('>'))
                .unwrap_or(&value)
                .to_string();
            (format!("&[{}]", elem), format!("{}.map(Vec::as_slice).unwrap_or(&[])", cell))
        }
        _ => (format!("Option<&{}>", value_type(model, field)), cell),
    }
}

fn generate_accessors(output: &mut String, model: &ResolvedModel, field: &ResolvedField) {
    let ident = field_ident(&field.name);
    let (ret, body) = accessor(model, field);

    push_doc(output, "    ", field.doc.as_deref());
    output.push_str(&format!("    pub fn {}(&self) -> {} {{\n", accessor_name(field), ret));
    output.push_str(&format!("        {}\n", body));
    output.push_str("    }\n\n");

    let (param, stored) = match (&field.kind, is_weak(field)) {
        (FieldKind::ScalarRef(c), true) => (
            format!("&Rc<{}>", target_type(model, c)),
            "Rc::downgrade(value)".to_string(),
        ),
        _ => (value_type(model, field), "value".to_string()),
    };
    output.push_str(&format!(
        "    pub fn set_{}(&self, value: {}) -> Result<(), AlreadyAssigned> {{\n",
        bare(&ident),
        param
    ));
    output.push_str(&format!("        self.{}.set({}).map_err(|_| AlreadyAssigned {{\n", ident, stored));
    output.push_str("            class: Self::CLASS,\n");
    output.push_str(&format!("            field: \"{}\",\n", field.name));
    output.push_str("        })\n");
    output.push_str("    }\n\n");
}

fn generate_children(output: &mut String, class: &ResolvedClass) {
    let slots: Vec<&ResolvedField> = class
        .traversal
        .iter()
        .filter_map(|slot| class.field(&slot.field))
        .collect();

    let visit = if slots.is_empty() { "_visit" } else { "visit" };
    output.push_str(&format!(
        "    pub fn children(&self, {}: &mut dyn FnMut(NodeRef<'_>)) {{\n",
        visit
    ));
    for field in slots {
        let ident = field_ident(&field.name);
        let iter = match (storage(field), field.kind.is_list()) {
            (Storage::Plain, false) => format!("std::iter::once(&self.{})", ident),
            (Storage::Optional, false) => format!("self.{}.iter()", ident),
            (Storage::Cell, false) => format!("self.{}.get().into_iter()", ident),
            (Storage::Plain, true) => format!("self.{}.iter()", ident),
            (Storage::Optional, true) => format!("self.{}.iter().flatten()", ident),
            (Storage::Cell, true) => format!("self.{}.get().into_iter().flatten()", ident),
        };
        output.push_str(&format!("        for child in {} {{\n", iter));
        if is_weak(field) {
            output.push_str("            if let Some(child) = child.upgrade() {\n");
            output.push_str("                visit(child.as_node_ref());\n");
            output.push_str("            }\n");
        } else {
            output.push_str("            visit(child.as_node_ref());\n");
        }
        output.push_str("        }\n");
    }
    output.push_str("    }\n\n");
}

fn clone_expr(field: &ResolvedField, step: &CloneStep) -> String {
    let this = format!("self.{}", field_ident(&field.name));
    let st = storage(field);
    match step {
        CloneStep::CopyValue | CloneStep::ShareReference => format!("{}.clone()", this),
        CloneStep::Reset => match st {
            Storage::Cell => "OnceCell::new()".into(),
            _ => "None".into(),
        },
        CloneStep::CloneChild => match st {
            Storage::Optional => format!("{}.as_ref().map(|c| Rc::new(c.structural_clone()))", this),
            _ => format!("Rc::new({}.structural_clone())", this),
        },
        CloneStep::CloneList => {
            let list = "l.iter().map(|c| Rc::new(c.structural_clone())).collect()";
            match st {
                Storage::Optional => format!("{}.as_ref().map(|l| {})", this, list),
                _ => format!("{}.iter().map(|c| Rc::new(c.structural_clone())).collect()", this),
            }
        }
        CloneStep::ExternalCopy { type_name } => {
            let copy = format!("Rc::new(<{} as ExternalCopy>::external_copy(c))", type_name);
            match st {
                Storage::Plain => format!("{{ let c = &{}; {} }}", this, copy),
                Storage::Optional => format!("{}.as_ref().map(|c| {})", this, copy),
                Storage::Cell => format!("map_cell(&{}, |c| {})", this, copy),
            }
        }
    }
}

fn generate_clone(output: &mut String, class: &ResolvedClass) {
    output.push_str("    /// Copy per the clone specification: owned children are fresh,\n");
    output.push_str("    /// shared edges alias, reset fields start absent.\n");
    output.push_str("    pub fn structural_clone(&self) -> Self {\n");
    output.push_str("        Self {\n");
    for rule in &class.clone {
        if let Some(field) = class.field(&rule.field) {
            output.push_str(&format!(
                "            {}: {},\n",
                field_ident(&field.name),
                clone_expr(field, &rule.step)
            ));
        }
    }
    output.push_str("        }\n");
    output.push_str("    }\n");
}

/// Expression reading a string or bool field as `Option<&str>` / `Option<bool>`.
fn read_optional(field: &ResolvedField) -> String {
    let ident = field_ident(&field.name);
    let is_string = matches!(field.kind, FieldKind::Primitive(PrimitiveKind::String));
    match (storage(field), is_string) {
        (Storage::Plain, true) => format!("Some(self.{}.as_str())", ident),
        (Storage::Plain, false) => format!("Some(self.{})", ident),
        (Storage::Optional, true) => format!("self.{}.as_deref()", ident),
        (Storage::Optional, false) => format!("self.{}", ident),
        (Storage::Cell, _) if !field.policy.optional => format!("Some(self.{}())", accessor_name(field)),
        (Storage::Cell, true) => format!("self.{}.get().map(String::as_str)", ident),
        (Storage::Cell, false) => format!("self.{}.get().copied()", ident),
    }
}

fn generate_mangle(output: &mut String, class: &ResolvedClass) {
    let Some(binding) = &class.indicators.mangle else {
        return;
    };
    let (Some(name), Some(flag)) = (class.field(&binding.name_field), class.field(&binding.flag_field)) else {
        return;
    };

    output.push('\n');
    output.push_str(&format!(
        "    pub const MANGLE_NAME_FIELD: &'static str = \"{}\";\n",
        binding.name_field
    ));
    output.push_str(&format!(
        "    pub const MANGLE_FLAG_FIELD: &'static str = \"{}\";\n\n",
        binding.flag_field
    ));
    output.push_str("    /// Identity name recorded for mangling, if assigned.\n");
    output.push_str("    pub fn mangle_name(&self) -> Option<&str> {\n");
    output.push_str(&format!("        {}\n", read_optional(name)));
    output.push_str("    }\n\n");
    output.push_str("    /// Whether this instance's name is replaced by the mangled one.\n");
    output.push_str("    pub fn mangle_applies(&self) -> bool {\n");
    output.push_str(&format!("        {}.unwrap_or(false)\n", read_optional(flag)));
    output.push_str("    }\n");
}

fn generate_category(output: &mut String, model: &ResolvedModel, class: &ResolvedClass) {
    let leaves = model.leaves_under(&class.name);
    let name = format!("Any{}", class.name);

    output.push_str(&format!("/// Concrete subclasses of `{}`.\n", class.name));
    output.push_str("#[derive(Debug)]\n");
    output.push_str(&format!("pub enum {} {{\n", name));
    for leaf in &leaves {
        output.push_str(&format!("    {0}({0}),\n", leaf.name));
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl {} {{\n", name));
    output.push_str("    pub fn class_name(&self) -> &'static str {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!("            Self::{0}(_) => {0}::CLASS,\n", leaf.name));
    }
    output.push_str("        }\n");
    output.push_str("    }\n\n");
    output.push_str("    pub fn children(&self, visit: &mut dyn FnMut(NodeRef<'_>)) {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!("            Self::{}(node) => node.children(visit),\n", leaf.name));
    }
    output.push_str("        }\n");
    output.push_str("    }\n\n");
    output.push_str("    pub fn structural_clone(&self) -> Self {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!(
            "            Self::{0}(node) => Self::{0}(node.structural_clone()),\n",
            leaf.name
        ));
    }
    output.push_str("        }\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    output.push_str(&format!("impl AsNodeRef for {} {{\n", name));
    output.push_str("    fn as_node_ref(&self) -> NodeRef<'_> {\n");
    output.push_str("        match self {\n");
    for leaf in &leaves {
        output.push_str(&format!("            Self::{0}(node) => NodeRef::{0}(node),\n", leaf.name));
    }
    output.push_str("        }\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    for leaf in &leaves {
        output.push_str(&format!("impl From<{}> for {} {{\n", leaf.name, name));
        output.push_str(&format!("    fn from(node: {}) -> Self {{\n", leaf.name));
        output.push_str(&format!("        Self::{}(node)\n", leaf.name));
        output.push_str("    }\n");
        output.push_str("}\n\n");
    }
}
