use crate::catalog::STRING_TYPE;
use crate::codec::{MarshalContext, UnmarshalContext};
use crate::error::SaveError;
use crate::model::Value;
use crate::xml::XmlNode;

use super::Converter;

/// Scalar text written as element content.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn name(&self) -> &str {
        "text"
    }

    fn can_convert(&self, type_id: &str) -> bool {
        type_id == STRING_TYPE
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        _ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        match value {
            Value::Text(text) => {
                node.set_text(text.as_str());
                Ok(())
            }
            other => Err(SaveError::Serialization(format!(
                "Text converter cannot write {:?}",
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
        if !node.children.is_empty() {
            return Err(SaveError::malformed_at(
                format!("Text element <{}> has child elements", node.name),
                ctx.location(node),
            ));
        }
        Ok(Value::Text(node.text_or_empty().to_string()))
    }
}
