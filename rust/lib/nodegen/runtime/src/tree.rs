//! Arena of node instances checked against a resolved model.

use nodegen_ir::{CloneStep, FieldKind, ResolvedClass, ResolvedField, ResolvedModel};
use tracing::{debug, trace};

use crate::error::{Result, RuntimeError};
use crate::value::{ExternalRef, NodeId, Value};

/// Copy routine for fields cloned with `ExternalCopy`.
pub trait ExternalCopier {
    fn copy(&mut self, value: &ExternalRef) -> ExternalRef;
}

impl<F> ExternalCopier for F
where
    F: FnMut(&ExternalRef) -> ExternalRef,
{
    fn copy(&mut self, value: &ExternalRef) -> ExternalRef {
        self(value)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    /// Index into `model.classes`.
    class: usize,
    /// One slot per flattened field; `None` is absent or unset.
    slots: Vec<Option<Value>>,
    /// Deferred fields already given a value through `set`.
    assigned: Vec<bool>,
}

/// Node instances of one resolved model.
#[derive(Debug)]
pub struct Tree<'m> {
    model: &'m ResolvedModel,
    nodes: Vec<NodeData>,
}

impl<'m> Tree<'m> {
    pub fn new(model: &'m ResolvedModel) -> Self {
        Self {
            model,
            nodes: Vec::new(),
        }
    }

    pub fn model(&self) -> &'m ResolvedModel {
        self.model
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node from its construction arguments, in signature order.
    pub fn construct(&mut self, class: &str, args: Vec<Option<Value>>) -> Result<NodeId> {
        let model = self.model;
        let index = model
            .classes
            .iter()
            .position(|c| c.name == class)
            .ok_or_else(|| RuntimeError::UnknownClass {
                class: class.to_string(),
            })?;
        let resolved = &model.classes[index];

        if args.len() != resolved.constructor.len() {
            return Err(RuntimeError::Arity {
                class: class.to_string(),
                expected: resolved.constructor.len(),
                found: args.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = resolved
            .fields
            .iter()
            .map(|f| f.default.and_then(Value::from_default))
            .collect();

        for (param, arg) in resolved.constructor.iter().zip(args) {
            let at = field_position(resolved, &param.field)?;
            let field = &resolved.fields[at];
            match arg {
                None if !param.optional => {
                    return Err(RuntimeError::MissingArgument {
                        class: class.to_string(),
                        field: field.name.clone(),
                    })
                }
                None => {}
                Some(value) => {
                    self.check_value(resolved, field, &value)?;
                    slots[at] = Some(value);
                }
            }
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            class: index,
            assigned: vec![false; slots.len()],
            slots,
        });
        trace!(%id, class, "node constructed");
        Ok(id)
    }

    /// Assign a deferred field. Each deferred field takes at most one `set`.
    pub fn set(&mut self, id: NodeId, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let resolved = self.class_of(id)?;
        let at = field_position(resolved, field)?;
        let descriptor = &resolved.fields[at];

        if descriptor.policy.constructor_bound {
            return Err(RuntimeError::NotDeferred {
                class: resolved.name.clone(),
                field: field.to_string(),
            });
        }
        if self.nodes[id.0].assigned[at] {
            return Err(RuntimeError::AlreadyAssigned {
                class: resolved.name.clone(),
                field: field.to_string(),
            });
        }
        self.check_value(resolved, descriptor, &value)?;

        let node = &mut self.nodes[id.0];
        node.slots[at] = Some(value);
        node.assigned[at] = true;
        Ok(())
    }

    /// Current contents of a field; `None` when absent or unset.
    pub fn get(&self, id: NodeId, field: &str) -> Result<Option<&Value>> {
        let resolved = self.class_of(id)?;
        let at = field_position(resolved, field)?;
        Ok(self.nodes[id.0].slots[at].as_ref())
    }

    pub fn class_of(&self, id: NodeId) -> Result<&'m ResolvedClass> {
        let node = self.nodes.get(id.0).ok_or(RuntimeError::UnknownNode { id })?;
        Ok(&self.model.classes[node.class])
    }

    /// Child nodes along the traversal list, lists expanded in order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let resolved = self.class_of(id)?;
        let node = &self.nodes[id.0];
        let mut out = Vec::new();
        for slot in &resolved.traversal {
            let at = field_position(resolved, &slot.field)?;
            match &node.slots[at] {
                Some(Value::Node(child)) => out.push(*child),
                Some(Value::List(items)) => out.extend(items.iter().copied()),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Pre-order walk from `root`. Visitable shared references are followed
    /// too, so their referents may be visited more than once. An edge back to
    /// a node on the current path is skipped.
    pub fn walk(&self, root: NodeId, mut visit: impl FnMut(NodeId)) -> Result<()> {
        enum Step {
            Enter(NodeId),
            Leave(NodeId),
        }

        let mut on_path = vec![false; self.nodes.len()];
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Leave(id) => {
                    on_path[id.0] = false;
                    continue;
                }
                Step::Enter(id) => id,
            };
            let children = self.children(id)?;
            visit(id);
            on_path[id.0] = true;
            stack.push(Step::Leave(id));
            for child in children.into_iter().rev() {
                if on_path[child.0] {
                    trace!(from = %id, to = %child, "cycle skipped during walk");
                } else {
                    stack.push(Step::Enter(child));
                }
            }
        }
        Ok(())
    }

    /// Copy `id` following its class's clone specification.
    pub fn structural_clone(&mut self, id: NodeId, copier: &mut dyn ExternalCopier) -> Result<NodeId> {
        let resolved = self.class_of(id)?;
        let source = self.nodes[id.0].clone();
        let mut slots = Vec::with_capacity(source.slots.len());
        let mut assigned = source.assigned.clone();

        for rule in &resolved.clone {
            let at = field_position(resolved, &rule.field)?;
            let slot = match (&rule.step, &source.slots[at]) {
                (CloneStep::Reset, _) => {
                    assigned[at] = false;
                    resolved.fields[at].default.and_then(Value::from_default)
                }
                (_, None) => None,
                (CloneStep::CopyValue | CloneStep::ShareReference, Some(value)) => Some(value.clone()),
                (CloneStep::CloneChild, Some(Value::Node(child))) => {
                    Some(Value::Node(self.structural_clone(*child, copier)?))
                }
                (CloneStep::CloneList, Some(Value::List(items))) => {
                    let mut cloned = Vec::with_capacity(items.len());
                    for child in items {
                        cloned.push(self.structural_clone(*child, copier)?);
                    }
                    Some(Value::List(cloned))
                }
                (CloneStep::ExternalCopy { .. }, Some(Value::External(r))) => {
                    Some(Value::External(copier.copy(r)))
                }
                (_, Some(value)) => Some(value.clone()),
            };
            slots.push(slot);
        }

        let copy = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            class: source.class,
            slots,
            assigned,
        });
        debug!(from = %id, to = %copy, class = %resolved.name, "node cloned");
        Ok(copy)
    }

    /// Non-optional fields that are still absent or unset.
    pub fn missing_fields(&self, id: NodeId) -> Result<Vec<&'m str>> {
        let resolved = self.class_of(id)?;
        let node = &self.nodes[id.0];
        Ok(resolved
            .fields
            .iter()
            .zip(&node.slots)
            .filter(|(f, slot)| !f.policy.optional && slot.is_none())
            .map(|(f, _)| f.name.as_str())
            .collect())
    }

    /// Same classes and values, comparing owned children recursively and
    /// every other edge by identity.
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> Result<bool> {
        let (ca, cb) = (self.class_of(a)?, self.class_of(b)?);
        if ca.name != cb.name {
            return Ok(false);
        }
        for rule in &ca.clone {
            let at = field_position(ca, &rule.field)?;
            let (va, vb) = (&self.nodes[a.0].slots[at], &self.nodes[b.0].slots[at]);
            let equal = match (&rule.step, va, vb) {
                (CloneStep::CloneChild, Some(Value::Node(x)), Some(Value::Node(y))) => {
                    self.structurally_equal(*x, *y)?
                }
                (CloneStep::CloneList, Some(Value::List(xs)), Some(Value::List(ys))) => {
                    xs.len() == ys.len() && {
                        let mut all = true;
                        for (x, y) in xs.iter().zip(ys) {
                            if !self.structurally_equal(*x, *y)? {
                                all = false;
                                break;
                            }
                        }
                        all
                    }
                }
                _ => va == vb,
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_value(&self, class: &ResolvedClass, field: &ResolvedField, value: &Value) -> Result<()> {
        let mismatch = || RuntimeError::KindMismatch {
            class: class.name.clone(),
            field: field.name.clone(),
            expected: field.kind.to_string(),
            found: value.kind_name(),
        };
        if !value.matches_shape(&field.kind) {
            return Err(mismatch());
        }

        let ids: &[NodeId] = match value {
            Value::Node(id) => std::slice::from_ref(id),
            Value::List(ids) => ids,
            _ => return Ok(()),
        };
        let expected = match &field.kind {
            FieldKind::ScalarRef(t) | FieldKind::ListRef(t) => t,
            FieldKind::Primitive(_) => return Ok(()),
        };
        for id in ids {
            if !self.class_of(*id)?.is_subclass_of(expected) {
                return Err(mismatch());
            }
        }
        Ok(())
    }
}

fn field_position(class: &ResolvedClass, field: &str) -> Result<usize> {
    class
        .field_index(field)
        .ok_or_else(|| RuntimeError::UnknownField {
            class: class.name.clone(),
            field: field.to_string(),
        })
}
