//! `.nodes` schema parser.
//!
//! ```text
//! root BasicASTNode
//! extern Location, Type
//!
//! /// A common superclass of all expressions.
//! node Expression : Node #generic {
//!     type: Type? @deferred
//! }
//! ```

use std::collections::BTreeSet;
use std::iter::{Enumerate, Peekable};
use std::str::Lines as StrLines;

use nodegen_ir::{
    CopyMode, FieldDescriptor, FieldKind, MangleIndicator, NodeDescriptor, PrimitiveKind, Schema,
};
use tracing::debug;

use crate::util::{is_comment, is_identifier, split_keyword, split_list};
use crate::ParseError;

type Lines<'a> = Peekable<Enumerate<StrLines<'a>>>;

/// Pending `///` lines, attached to the next node or field.
#[derive(Default)]
struct DocBuffer(Vec<String>);

impl DocBuffer {
    fn push(&mut self, text: &str) {
        self.0.push(text.trim().to_string());
    }

    fn take(&mut self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.0).join("\n"))
        }
    }
}

/// Parse `.nodes` source into a schema.
pub fn parse(input: &str) -> Result<Schema, ParseError> {
    let mut schema = Schema::default();
    let mut doc = DocBuffer::default();
    let mut lines: Lines<'_> = input.lines().enumerate().peekable();

    while let Some((idx, raw)) = lines.next() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || is_comment(line) {
            continue;
        }
        if let Some(text) = line.strip_prefix("///") {
            doc.push(text);
            continue;
        }

        let (keyword, rest) = split_keyword(line);
        match keyword {
            "root" => {
                doc.take();
                if !is_identifier(rest) {
                    return Err(ParseError::new(line_no, format!("invalid root type `{}`", rest)));
                }
                if let Some(prev) = &schema.root {
                    return Err(ParseError::new(
                        line_no,
                        format!("root already declared as `{}`", prev),
                    ));
                }
                schema.root = Some(rest.to_string());
            }
            "extern" => {
                doc.take();
                let names = split_list(rest);
                if names.is_empty() {
                    return Err(ParseError::new(line_no, "`extern` needs at least one type name"));
                }
                for name in names {
                    if !is_identifier(name) {
                        return Err(ParseError::new(
                            line_no,
                            format!("invalid external type `{}`", name),
                        ));
                    }
                    if !schema.externals.iter().any(|e| e == name) {
                        schema.externals.push(name.to_string());
                    }
                }
            }
            "node" => {
                let node = parse_node(line_no, rest, doc.take(), &mut lines)?;
                schema.nodes.push(node);
            }
            "}" => return Err(ParseError::new(line_no, "`}` without an open node")),
            other => {
                return Err(ParseError::new(
                    line_no,
                    format!("expected `node`, `root` or `extern`, found `{}`", other),
                ))
            }
        }
    }

    tag_externals(&mut schema);
    debug!(
        nodes = schema.nodes.len(),
        externals = schema.externals.len(),
        "parsed .nodes schema"
    );
    Ok(schema)
}

/// A bare name listed by `extern` is an opaque external, not a node reference.
///
/// Run again after adding names to `schema.externals` from elsewhere.
pub fn tag_externals(schema: &mut Schema) {
    let externals: BTreeSet<&str> = schema.externals.iter().map(String::as_str).collect();
    for node in &mut schema.nodes {
        for field in &mut node.fields {
            if let FieldKind::ScalarRef(t) = &field.kind {
                if externals.contains(t.as_str()) {
                    field.kind = FieldKind::Primitive(PrimitiveKind::External(t.clone()));
                }
            }
        }
    }
}

fn parse_node(
    line_no: usize,
    header: &str,
    doc: Option<String>,
    lines: &mut Lines<'_>,
) -> Result<NodeDescriptor, ParseError> {
    let open = header
        .find('{')
        .ok_or_else(|| ParseError::new(line_no, "expected `{` after node header"))?;
    let after = header[open + 1..].trim();
    let inline_empty = match after {
        "}" => true,
        "" => false,
        _ => return Err(ParseError::new(line_no, "fields must start on their own line")),
    };

    let head = header[..open].trim();
    let (head, indicators) = match head.find('#') {
        Some(at) => (head[..at].trim(), &head[at..]),
        None => (head, ""),
    };
    let (name, superclass) = match head.split_once(':') {
        Some((name, sup)) => (name.trim(), Some(sup.trim())),
        None => (head, None),
    };
    if !is_identifier(name) {
        return Err(ParseError::new(line_no, format!("invalid node name `{}`", name)));
    }

    let mut node = NodeDescriptor::new(name);
    node.doc = doc;
    if let Some(sup) = superclass {
        if !is_identifier(sup) {
            return Err(ParseError::new(line_no, format!("invalid superclass `{}`", sup)));
        }
        node.superclass = Some(sup.to_string());
    }
    parse_indicators(line_no, indicators, &mut node)?;

    if inline_empty {
        return Ok(node);
    }

    let mut doc = DocBuffer::default();
    while let Some((idx, raw)) = lines.next() {
        let field_line = idx + 1;
        let line = raw.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }
        if line == "}" {
            return Ok(node);
        }
        if let Some(text) = line.strip_prefix("///") {
            doc.push(text);
            continue;
        }
        let field = parse_field(field_line, line, doc.take())?;
        node.fields.push(field);
    }

    Err(ParseError::new(
        line_no,
        format!("node `{}` is missing its closing `}}`", node.name),
    ))
}

fn parse_indicators(line_no: usize, mut rest: &str, node: &mut NodeDescriptor) -> Result<(), ParseError> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }
        let body = rest
            .strip_prefix('#')
            .ok_or_else(|| ParseError::new(line_no, format!("unexpected `{}` in node header", rest)))?;
        let end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        let (word, tail) = body.split_at(end);

        match word {
            "generic" => node.indicators.generic = true,
            "unique" => node.indicators.unique = true,
            "mangle" => {
                let args = tail
                    .strip_prefix('(')
                    .and_then(|t| t.find(')').map(|close| (&t[..close], &t[close + 1..])));
                let (args, after) = args.ok_or_else(|| {
                    ParseError::new(line_no, "expected `#mangle(nameField, flagField)`")
                })?;
                match split_list(args).as_slice() {
                    [name_field, flag_field] if is_identifier(name_field) && is_identifier(flag_field) => {
                        node.indicators.mangle = Some(MangleIndicator {
                            name_field: name_field.to_string(),
                            flag_field: flag_field.to_string(),
                        });
                    }
                    _ => {
                        return Err(ParseError::new(
                            line_no,
                            "`#mangle` takes exactly two field names",
                        ))
                    }
                }
                rest = after;
                continue;
            }
            other => {
                return Err(ParseError::new(line_no, format!("unknown indicator `#{}`", other)))
            }
        }
        rest = tail;
    }
}

fn parse_field(line_no: usize, line: &str, doc: Option<String>) -> Result<FieldDescriptor, ParseError> {
    let line = line.strip_suffix(',').unwrap_or(line);
    let (name, rest) = line
        .split_once(':')
        .ok_or_else(|| ParseError::new(line_no, "expected `name: type`"))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(ParseError::new(line_no, format!("invalid field name `{}`", name)));
    }

    let mut tokens = rest.split_whitespace();
    let ty = tokens
        .next()
        .ok_or_else(|| ParseError::new(line_no, format!("field `{}` has no type", name)))?;
    let (ty, optional) = match ty.strip_suffix('?') {
        Some(ty) => (ty, true),
        None => (ty, false),
    };
    let kind = parse_type(line_no, ty)?;

    let mut field = FieldDescriptor::new(name, kind);
    field.policy.optional = optional;
    field.doc = doc;

    let mut seen = BTreeSet::new();
    for attr in tokens {
        let word = attr.strip_prefix('@').ok_or_else(|| {
            ParseError::new(line_no, format!("expected `@attribute`, found `{}`", attr))
        })?;
        if !seen.insert(word) {
            return Err(ParseError::new(line_no, format!("attribute `@{}` repeated", word)));
        }
        let mode = match word {
            "deferred" => {
                field.policy.constructor_bound = false;
                continue;
            }
            "hidden" => {
                field.policy.visitable = false;
                continue;
            }
            "deep" => CopyMode::DeepCopy,
            "share" => CopyMode::ShareReference,
            "reset" => CopyMode::ResetOnCopy,
            "external_copy" => CopyMode::ExternalDeepCopy,
            other => {
                return Err(ParseError::new(line_no, format!("unknown attribute `@{}`", other)))
            }
        };
        if let Some(prev) = field.policy.copy_mode {
            return Err(ParseError::new(
                line_no,
                format!("conflicting copy attributes `@{}` and `@{}`", prev, mode),
            ));
        }
        field.policy.copy_mode = Some(mode);
    }

    Ok(field)
}

fn parse_type(line_no: usize, ty: &str) -> Result<FieldKind, ParseError> {
    let kind = match ty {
        "string" => FieldKind::Primitive(PrimitiveKind::String),
        "bool" => FieldKind::Primitive(PrimitiveKind::Bool),
        "int" => FieldKind::Primitive(PrimitiveKind::Integer),
        _ => match ty.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some(inner) if is_identifier(inner) => FieldKind::ListRef(inner.to_string()),
            None if is_identifier(ty) => FieldKind::ScalarRef(ty.to_string()),
            _ => return Err(ParseError::new(line_no, format!("invalid type `{}`", ty))),
        },
    };
    Ok(kind)
}
