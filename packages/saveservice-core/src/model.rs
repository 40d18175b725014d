//! Object graph values exchanged with the save service.
//!
//! Test plans and result records are owned by the caller; the service only
//! sees them through this closed value model.

use crate::catalog::{STRING_TYPE, TREE_TYPE};

/// A node in a persisted object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,
    /// Scalar text
    Text(String),
    /// Typed object with named fields and ordered entries
    Object(Object),
    /// Ordered element tree (test plan structure)
    Tree(PlanTree),
}

impl Value {
    /// Type identifier used to pick a tag and a converter, `None` for null.
    pub fn type_id(&self) -> Option<&str> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(STRING_TYPE),
            Value::Object(object) => Some(&object.type_id),
            Value::Tree(_) => Some(TREE_TYPE),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<PlanTree> for Value {
    fn from(tree: PlanTree) -> Self {
        Value::Tree(tree)
    }
}

/// A typed object: named members plus unnamed ordered entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Current type identifier
    pub type_id: String,
    /// Named members in declaration order
    pub fields: Vec<(String, Value)>,
    /// Unnamed members (collection items, sub-results)
    pub entries: Vec<Value>,
}

impl Object {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            fields: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Builder style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Builder style entry append.
    pub fn with_entry(mut self, value: impl Into<Value>) -> Self {
        self.entries.push(value.into());
        self
    }

    /// Sets a field, replacing an existing one of the same name in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Text of a field, if it is a text value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_text)
    }
}

/// One element of a plan tree together with its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub element: Value,
    pub children: PlanTree,
}

/// Ordered tree of test elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanTree {
    nodes: Vec<PlanNode>,
}

impl PlanTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `element` with an empty subtree and returns that subtree.
    pub fn add(&mut self, element: impl Into<Value>) -> &mut PlanTree {
        self.add_with_children(element, PlanTree::new())
    }

    /// Appends `element` with the given subtree and returns it.
    pub fn add_with_children(
        &mut self,
        element: impl Into<Value>,
        children: PlanTree,
    ) -> &mut PlanTree {
        self.nodes.push(PlanNode {
            element: element.into(),
            children,
        });
        let last = self.nodes.len() - 1;
        &mut self.nodes[last].children
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of elements at every depth.
    pub fn element_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| 1 + node.children.element_count())
            .sum()
    }
}

/// Sampling event a result record originated from.
///
/// Travels next to a record on save; never written as part of the record body
/// unless a converter asks for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleEvent {
    /// Host that produced the sample
    pub hostname: String,
    /// Name of the thread group that produced the sample
    pub thread_group: String,
    /// Sample variables selected for saving, in order
    pub variables: Vec<(String, String)>,
}
