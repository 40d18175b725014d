use crate::catalog::{ENVELOPE_TYPE, TREE_TYPE};
use crate::codec::{MarshalContext, UnmarshalContext};
use crate::error::SaveError;
use crate::model::{Object, PlanTree, Value};
use crate::xml::XmlNode;

use super::Converter;

pub const ENVELOPE_CONVERTER: &str = "org.apache.jmeter.save.ScriptWrapperConverter";

/// Version of the document format written by this crate.
pub const FORMAT_VERSION: &str = "1.2";

const VERSION_ATTRIBUTE: &str = "version";
const PROPERTIES_ATTRIBUTE: &str = "properties";
const APPLICATION_ATTRIBUTE: &str = "jmeter";

/// Root of a test plan document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEnvelope {
    /// Document format version
    pub version: String,
    /// Declared version of the alias definitions used to write the document
    pub properties: String,
    /// Version of the application that wrote the document
    pub application: String,
    pub tree: PlanTree,
}

impl ScriptEnvelope {
    pub fn new(properties: impl Into<String>, application: impl Into<String>, tree: PlanTree) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            properties: properties.into(),
            application: application.into(),
            tree,
        }
    }

    pub fn into_value(self) -> Value {
        Object::new(ENVELOPE_TYPE)
            .with_field(VERSION_ATTRIBUTE, self.version)
            .with_field(PROPERTIES_ATTRIBUTE, self.properties)
            .with_field(APPLICATION_ATTRIBUTE, self.application)
            .with_entry(self.tree)
            .into()
    }

    /// Unwraps a decoded envelope; `None` if `value` is not one.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };
        if object.type_id != ENVELOPE_TYPE {
            return None;
        }
        let tree = match object.entries.pop() {
            Some(Value::Tree(tree)) => tree,
            _ => return None,
        };
        let text = |name: &str| object.text(name).unwrap_or_default().to_string();
        Some(Self {
            version: text(VERSION_ATTRIBUTE),
            properties: text(PROPERTIES_ATTRIBUTE),
            application: text(APPLICATION_ATTRIBUTE),
            tree,
        })
    }
}

/// Writes the envelope metadata as attributes around the plan tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeConverter;

impl Converter for EnvelopeConverter {
    fn name(&self) -> &str {
        ENVELOPE_CONVERTER
    }

    fn can_convert(&self, type_id: &str) -> bool {
        type_id == ENVELOPE_TYPE
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        let Some(envelope) = value.as_object() else {
            return Err(SaveError::Serialization(
                "Envelope converter expects an envelope object".to_string(),
            ));
        };
        for name in [VERSION_ATTRIBUTE, PROPERTIES_ATTRIBUTE, APPLICATION_ATTRIBUTE] {
            if let Some(text) = envelope.text(name) {
                node.set_attribute(name, text);
            }
        }
        match envelope.entries.as_slice() {
            [tree @ Value::Tree(_)] => {
                node.push_child(ctx.marshal(tree)?);
                Ok(())
            }
            _ => Err(SaveError::Serialization(
                "Envelope must wrap exactly one tree".to_string(),
            )),
        }
    }

    fn unmarshal(
        &self,
        _type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError> {
        let mut envelope = Object::new(ENVELOPE_TYPE);
        for name in [VERSION_ATTRIBUTE, PROPERTIES_ATTRIBUTE, APPLICATION_ATTRIBUTE] {
            if let Some(text) = node.attribute(name) {
                envelope.set_field(name, text);
            }
        }

        let mut tree = None;
        for child in &node.children {
            match ctx.unmarshal(child)? {
                Value::Tree(decoded) if tree.is_none() => tree = Some(decoded),
                other => {
                    return Err(SaveError::malformed_at(
                        format!(
                            "Unexpected <{}> in envelope ({:?})",
                            child.name,
                            other.type_id()
                        ),
                        ctx.location(child),
                    ))
                }
            }
        }
        let Some(tree) = tree else {
            return Err(SaveError::malformed_at(
                format!(
                    "Envelope <{}> has no <{}>",
                    node.name,
                    ctx.mapper().serialized_name(TREE_TYPE)
                ),
                ctx.location(node),
            ));
        };
        Ok(envelope.with_entry(tree).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_value_round_trip() {
        let mut tree = PlanTree::new();
        tree.add(Object::new("org.example.TestPlan"));
        let envelope = ScriptEnvelope::new("4.0", "5.6.3", tree);

        let value = envelope.clone().into_value();
        assert_eq!(value.type_id(), Some(ENVELOPE_TYPE));
        assert_eq!(ScriptEnvelope::from_value(value), Some(envelope));
    }

    #[test]
    fn non_envelopes_are_rejected() {
        assert!(ScriptEnvelope::from_value(Value::from("x")).is_none());
        assert!(ScriptEnvelope::from_value(Object::new(ENVELOPE_TYPE).into()).is_none());
        assert!(ScriptEnvelope::from_value(PlanTree::new().into()).is_none());
    }
}
