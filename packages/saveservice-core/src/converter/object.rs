use crate::codec::{MarshalContext, UnmarshalContext};
use crate::error::SaveError;
use crate::model::{Object, Value};
use crate::xml::XmlNode;

use super::Converter;

/// Child element holding the unnamed entries of an object.
pub const ENTRIES_TAG: &str = "collection";

/// Generic converter for objects without a dedicated converter.
///
/// Fields become child elements named after the field. Entries are written
/// as type-tagged elements inside a single `collection` child.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectConverter;

impl Converter for ObjectConverter {
    fn name(&self) -> &str {
        "object"
    }

    fn can_convert(&self, _type_id: &str) -> bool {
        true
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        let Value::Object(object) = value else {
            return Err(SaveError::Serialization(format!(
                "Object converter cannot write {:?}",
                value.type_id()
            )));
        };

        for (name, field) in &object.fields {
            if name == ENTRIES_TAG {
                return Err(SaveError::Serialization(format!(
                    "Field name '{}' of {} is reserved",
                    name, object.type_id
                )));
            }
            node.push_child(ctx.marshal_field(name, field)?);
        }

        if !object.entries.is_empty() {
            let mut entries = XmlNode::new(ENTRIES_TAG);
            for entry in &object.entries {
                entries.push_child(ctx.marshal(entry)?);
            }
            node.push_child(entries);
        }
        Ok(())
    }

    fn unmarshal(
        &self,
        type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError> {
        if node.children.is_empty() && !node.text_or_empty().trim().is_empty() {
            return Err(SaveError::malformed_at(
                format!("Unexpected text in <{}>", node.name),
                ctx.location(node),
            ));
        }

        let mut object = Object::new(type_id);
        for child in &node.children {
            if child.name == ENTRIES_TAG {
                for entry in &child.children {
                    object.entries.push(ctx.unmarshal(entry)?);
                }
            } else {
                let value = ctx.unmarshal_field(child)?;
                object.set_field(child.name.as_str(), value);
            }
        }
        Ok(Value::Object(object))
    }
}
