//! Hierarchy resolution: class tree construction and field flattening.
//!
//! Structural checks run first and abort on failure, because flattening needs
//! a tree: duplicate classes, dangling superclasses, cycles and extra roots.
//! Flattening then collects field redeclarations across all classes.

use std::collections::{HashMap, HashSet};

use nodegen_ir::{FieldDescriptor, NodeDescriptor, Schema};
use tracing::debug;

use crate::error::{SchemaError, SchemaErrors};

/// The validated single-inheritance tree of a schema.
#[derive(Debug)]
pub struct Hierarchy<'s> {
    schema: &'s Schema,
    index: HashMap<&'s str, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    /// Pre-order from the root(s), siblings in declaration order.
    order: Vec<usize>,
}

/// One entry of a flattened field list.
#[derive(Debug, Clone, Copy)]
pub struct FlatField<'s> {
    pub field: &'s FieldDescriptor,
    pub declared_in: &'s str,
}

/// A class with its inherited-then-own field list.
#[derive(Debug, Clone)]
pub struct ClassLayout<'s> {
    pub node: &'s NodeDescriptor,
    /// Root → this class, inclusive.
    pub chain: Vec<&'s str>,
    pub subclasses: Vec<&'s str>,
    pub fields: Vec<FlatField<'s>>,
}

impl<'s> ClassLayout<'s> {
    pub fn name(&self) -> &'s str {
        &self.node.name
    }

    pub fn field_names(&self) -> Vec<&'s str> {
        self.fields.iter().map(|f| f.field.name.as_str()).collect()
    }
}

impl<'s> Hierarchy<'s> {
    /// Build and validate the class tree.
    pub fn build(schema: &'s Schema) -> Result<Self, SchemaErrors> {
        let mut errors = Vec::new();

        // 1. Unique class names.
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, node) in schema.nodes.iter().enumerate() {
            if index.insert(node.name.as_str(), i).is_some() {
                errors.push(SchemaError::DuplicateClass {
                    class: node.name.clone(),
                });
            }
        }
        if !errors.is_empty() {
            return Err(SchemaErrors::new(errors));
        }

        // 2. Every superclass resolves to a class or to the designated root.
        let mut parent = vec![None; schema.nodes.len()];
        let mut roots = Vec::new();
        for (i, node) in schema.nodes.iter().enumerate() {
            match node.superclass.as_deref() {
                None => roots.push(i),
                Some(sup) if schema.is_root_name(sup) && !index.contains_key(sup) => roots.push(i),
                Some(sup) => match index.get(sup) {
                    Some(&p) => parent[i] = Some(p),
                    None => errors.push(SchemaError::UnresolvedSuperclass {
                        class: node.name.clone(),
                        superclass: sup.to_string(),
                    }),
                },
            }
        }
        if !errors.is_empty() {
            return Err(SchemaErrors::new(errors));
        }

        // 3. Without an external root exactly one class may stand alone.
        if schema.root.is_none() && roots.len() > 1 {
            return Err(SchemaError::MultipleRoots {
                roots: roots.iter().map(|&r| schema.nodes[r].name.clone()).collect(),
            }
            .into());
        }

        let mut children = vec![Vec::new(); schema.nodes.len()];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        // 4. Walk from the roots; whatever is never reached sits on a cycle
        //    or below one.
        let mut order = Vec::with_capacity(schema.nodes.len());
        let mut seen = vec![false; schema.nodes.len()];
        for &root in &roots {
            let mut stack = vec![root];
            while let Some(i) = stack.pop() {
                seen[i] = true;
                order.push(i);
                stack.extend(children[i].iter().rev().copied());
            }
        }

        if order.len() < schema.nodes.len() {
            let mut reported: HashSet<usize> = HashSet::new();
            for start in 0..schema.nodes.len() {
                if seen[start] || reported.contains(&start) {
                    continue;
                }
                if let Some(cycle) = find_cycle(&parent, start) {
                    if cycle.iter().any(|c| reported.contains(c)) {
                        continue;
                    }
                    reported.extend(cycle.iter().copied());
                    errors.push(SchemaError::CyclicHierarchy {
                        cycle: cycle.iter().map(|&c| schema.nodes[c].name.clone()).collect(),
                    });
                }
            }
            return Err(SchemaErrors::new(errors));
        }

        debug!(classes = order.len(), roots = roots.len(), "class hierarchy built");

        Ok(Self {
            schema,
            index,
            parent,
            children,
            order,
        })
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&'s NodeDescriptor> {
        self.index.get(name).map(|&i| &self.schema.nodes[i])
    }

    /// Classes in pre-order.
    pub fn classes(&self) -> impl Iterator<Item = &'s NodeDescriptor> + '_ {
        self.order.iter().map(move |&i| &self.schema.nodes[i])
    }

    /// Superclass chain of a class, root first, the class itself last.
    pub fn chain(&self, name: &str) -> Option<Vec<&'s str>> {
        let mut i = *self.index.get(name)?;
        let mut chain = vec![self.schema.nodes[i].name.as_str()];
        while let Some(p) = self.parent[i] {
            chain.push(self.schema.nodes[p].name.as_str());
            i = p;
        }
        chain.reverse();
        Some(chain)
    }

    pub fn subclasses(&self, name: &str) -> Vec<&'s str> {
        match self.index.get(name) {
            Some(&i) => self.children[i]
                .iter()
                .map(|&c| self.schema.nodes[c].name.as_str())
                .collect(),
            None => vec![],
        }
    }

    /// Flatten every class: `flattened(C) = flattened(super(C)) ++ own(C)`.
    ///
    /// Redeclared names are reported and skipped so the remaining classes
    /// can still be checked.
    pub fn flatten(&self, errors: &mut Vec<SchemaError>) -> Vec<ClassLayout<'s>> {
        let mut flat: Vec<Option<Vec<FlatField<'s>>>> = vec![None; self.schema.nodes.len()];
        let mut layouts = Vec::with_capacity(self.order.len());

        for &i in &self.order {
            let node = &self.schema.nodes[i];
            let mut fields = match self.parent[i] {
                // Pre-order guarantees the parent is already flattened.
                Some(p) => flat[p].clone().unwrap_or_default(),
                None => Vec::new(),
            };
            let inherited = fields.len();

            for field in &node.fields {
                if let Some(at) = fields.iter().position(|f| f.field.name == field.name) {
                    let prev = fields[at];
                    let from_ancestor = at < inherited;
                    errors.push(SchemaError::FieldRedeclaration {
                        class: node.name.clone(),
                        field: field.name.clone(),
                        ancestor: from_ancestor.then(|| prev.declared_in.to_string()),
                        identical: from_ancestor
                            && prev.field.kind == field.kind
                            && prev.field.policy == field.policy,
                    });
                    continue;
                }
                fields.push(FlatField {
                    field,
                    declared_in: node.name.as_str(),
                });
            }

            layouts.push(ClassLayout {
                node,
                chain: self.chain(&node.name).unwrap_or_default(),
                subclasses: self.children[i]
                    .iter()
                    .map(|&c| self.schema.nodes[c].name.as_str())
                    .collect(),
                fields: fields.clone(),
            });
            flat[i] = Some(fields);
        }

        layouts
    }
}

/// Follow superclass links from `start` until a class repeats; returns the
/// repeating segment in chain order, starting from its first-declared member.
fn find_cycle(parent: &[Option<usize>], start: usize) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut pos: HashMap<usize, usize> = HashMap::new();
    let mut cur = start;
    loop {
        if let Some(&at) = pos.get(&cur) {
            let mut cycle = path[at..].to_vec();
            let min_at = cycle
                .iter()
                .enumerate()
                .min_by_key(|&(_, c)| *c)
                .map(|(k, _)| k)
                .unwrap_or(0);
            cycle.rotate_left(min_at);
            return Some(cycle);
        }
        pos.insert(cur, path.len());
        path.push(cur);
        cur = parent[cur]?;
    }
}
