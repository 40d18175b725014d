use crate::catalog::TREE_TYPE;
use crate::codec::{MarshalContext, UnmarshalContext};
use crate::error::SaveError;
use crate::model::{PlanTree, Value};
use crate::xml::XmlNode;

use super::Converter;

pub const TREE_CONVERTER: &str = "org.apache.jmeter.save.converters.HashTreeConverter";

/// Plan trees: every element is followed by the tree of its children.
///
/// ```text
/// <hashTree>
///   <TestPlan .../>
///   <hashTree>
///     <ThreadGroup .../>
///     <hashTree/>
///   </hashTree>
/// </hashTree>
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeConverter;

impl TreeConverter {
    fn write_tree(
        tree: &PlanTree,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        let tree_tag = ctx.serialized_name(TREE_TYPE)?;
        for entry in tree.nodes() {
            if let Value::Tree(_) = entry.element {
                return Err(SaveError::Serialization(
                    "A plan tree cannot be used as a tree element".to_string(),
                ));
            }
            node.push_child(ctx.marshal(&entry.element)?);
            let mut subtree = XmlNode::new(tree_tag.as_str());
            Self::write_tree(&entry.children, &mut subtree, ctx)?;
            node.push_child(subtree);
        }
        Ok(())
    }

    fn is_subtree(child: &XmlNode, ctx: &UnmarshalContext<'_>) -> bool {
        ctx.mapper()
            .real_type(&child.name)
            .is_some_and(|binding| binding.type_id == TREE_TYPE)
    }
}

impl Converter for TreeConverter {
    fn name(&self) -> &str {
        TREE_CONVERTER
    }

    fn can_convert(&self, type_id: &str) -> bool {
        type_id == TREE_TYPE
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        match value {
            Value::Tree(tree) => Self::write_tree(tree, node, ctx),
            other => Err(SaveError::Serialization(format!(
                "Tree converter cannot write {:?}",
                other.type_id()
            ))),
        }
    }

    fn unmarshal(
        &self,
        _type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError> {
        let mut tree = PlanTree::new();
        let mut pending: Option<Value> = None;

        for child in &node.children {
            if Self::is_subtree(child, ctx) {
                let Some(element) = pending.take() else {
                    return Err(SaveError::malformed_at(
                        format!("<{}> without a preceding element", child.name),
                        ctx.location(child),
                    ));
                };
                let children = match ctx.unmarshal(child)? {
                    Value::Tree(children) => children,
                    _ => PlanTree::new(),
                };
                tree.add_with_children(element, children);
            } else {
                if let Some(element) = pending.take() {
                    tree.add(element);
                }
                pending = Some(ctx.unmarshal(child)?);
            }
        }
        if let Some(element) = pending {
            tree.add(element);
        }
        Ok(Value::Tree(tree))
    }
}
