//! Per-call marshalling state handed to converters.

use std::collections::HashMap;

use crate::catalog::{TypeBinding, NULL_TAG};
use crate::error::{Location, SaveError};
use crate::mapper::AliasMapper;
use crate::model::{SampleEvent, Value};
use crate::xml::{is_valid_name, XmlNode};

use super::{Codec, CodecMode};

/// Attribute naming the type of a field value.
pub const CLASS_ATTRIBUTE: &str = "class";

/// Attribute identifying a value for later references (tree mode).
pub const ID_ATTRIBUTE: &str = "id";

/// Attribute pointing at an earlier identified value (tree mode).
pub const REFERENCE_ATTRIBUTE: &str = "reference";

/// Out-of-band data accompanying a record on save.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordContext<'a> {
    /// Event the record was produced by
    pub event: Option<&'a SampleEvent>,
}

impl<'a> RecordContext<'a> {
    pub fn with_event(event: &'a SampleEvent) -> Self {
        Self { event: Some(event) }
    }
}

/// Receives records decoded from a result log.
pub trait RecordSink {
    fn accept(&mut self, record: Value);
}

impl RecordSink for Vec<Value> {
    fn accept(&mut self, record: Value) {
        self.push(record);
    }
}

/// Adapts a closure to [`RecordSink`].
pub struct FnRecordSink<F>(pub F);

impl<F: FnMut(Value)> RecordSink for FnRecordSink<F> {
    fn accept(&mut self, record: Value) {
        (self.0)(record)
    }
}

/// State of one encode call.
pub struct MarshalContext<'a> {
    codec: &'a Codec,
    event: Option<&'a SampleEvent>,
}

impl<'a> MarshalContext<'a> {
    pub(crate) fn new(codec: &'a Codec, record: RecordContext<'a>) -> Self {
        Self {
            codec,
            event: record.event,
        }
    }

    pub fn mode(&self) -> CodecMode {
        self.codec.mode()
    }

    pub fn mapper(&self) -> &'a AliasMapper {
        self.codec.mapper()
    }

    /// Event passed next to the record being saved, if any.
    pub fn event(&self) -> Option<&'a SampleEvent> {
        self.event
    }

    /// Tag used for values of `type_id`.
    pub fn serialized_name(&self, type_id: &str) -> Result<String, SaveError> {
        let tag = self.codec.mapper().serialized_name(type_id);
        if !is_valid_name(tag) {
            return Err(SaveError::Serialization(format!(
                "Type '{}' has no usable tag (got '{}')",
                type_id, tag
            )));
        }
        Ok(tag.to_string())
    }

    /// Encodes `value` as an element named after its type.
    pub fn marshal(&mut self, value: &Value) -> Result<XmlNode, SaveError> {
        let Some(type_id) = value.type_id() else {
            return Ok(XmlNode::new(NULL_TAG));
        };
        let mut node = XmlNode::new(self.serialized_name(type_id)?);
        self.marshal_content(value, &mut node)?;
        Ok(node)
    }

    /// Encodes a named member. Text is written inline, null as a `null`
    /// class and anything else carries the `class` of its type.
    pub fn marshal_field(&mut self, name: &str, value: &Value) -> Result<XmlNode, SaveError> {
        if !is_valid_name(name) {
            return Err(SaveError::Serialization(format!(
                "Field name '{}' cannot be used as an element name",
                name
            )));
        }
        let mut node = XmlNode::new(name);
        match value {
            Value::Null => node.set_attribute(CLASS_ATTRIBUTE, NULL_TAG),
            Value::Text(text) => node.set_text(text.as_str()),
            other => {
                if let Some(type_id) = other.type_id() {
                    node.set_attribute(CLASS_ATTRIBUTE, self.serialized_name(type_id)?);
                }
                self.marshal_content(other, &mut node)?;
            }
        }
        Ok(node)
    }

    /// Fills `node` with the content of `value` using its converter.
    pub fn marshal_content(&mut self, value: &Value, node: &mut XmlNode) -> Result<(), SaveError> {
        let codec = self.codec;
        let Some(type_id) = value.type_id() else {
            return Ok(());
        };
        let converter = codec.converters().converter_for(type_id);
        converter.marshal(value, node, self)
    }
}

/// State of one decode call.
pub struct UnmarshalContext<'a> {
    codec: &'a Codec,
    records: Option<&'a mut dyn RecordSink>,
    references: HashMap<String, Value>,
    path: Vec<String>,
}

impl<'a> UnmarshalContext<'a> {
    pub(crate) fn new(codec: &'a Codec, records: Option<&'a mut dyn RecordSink>) -> Self {
        Self {
            codec,
            records,
            references: HashMap::new(),
            path: Vec::new(),
        }
    }

    pub fn mode(&self) -> CodecMode {
        self.codec.mode()
    }

    pub fn mapper(&self) -> &'a AliasMapper {
        self.codec.mapper()
    }

    /// Hands a decoded record to the caller's sink.
    ///
    /// Returns the record back when no sink was supplied.
    pub fn emit_record(&mut self, record: Value) -> Option<Value> {
        match self.records.as_mut() {
            Some(sink) => {
                sink.accept(record);
                None
            }
            None => Some(record),
        }
    }

    /// Location of `node` for error reporting.
    pub fn location(&self, node: &XmlNode) -> Location {
        Location::at(node.line, format!("/{}", self.path.join("/")))
    }

    /// Decodes an element whose tag names its type.
    pub fn unmarshal(&mut self, node: &XmlNode) -> Result<Value, SaveError> {
        self.path.push(node.name.clone());
        let result = self.decode(node, Some(node.name.as_str()));
        self.path.pop();
        result
    }

    /// Decodes a named member written by [`MarshalContext::marshal_field`].
    pub fn unmarshal_field(&mut self, node: &XmlNode) -> Result<Value, SaveError> {
        self.path.push(node.name.clone());
        let result = self.decode(node, node.attribute(CLASS_ATTRIBUTE));
        self.path.pop();
        result
    }

    /// Resolves a tag or class attribute to a catalog binding.
    pub fn resolve_type(&self, name: &str, node: &XmlNode) -> Result<&'a TypeBinding, SaveError> {
        self.codec
            .mapper()
            .real_type(name)
            .ok_or_else(|| SaveError::UnresolvableType {
                name: name.to_string(),
                location: self.location(node),
            })
    }

    fn decode(&mut self, node: &XmlNode, type_name: Option<&str>) -> Result<Value, SaveError> {
        if let Some(reference) = node.attribute(REFERENCE_ATTRIBUTE) {
            return self.resolve_reference(reference, node);
        }

        let value = match type_name {
            None if node.children.is_empty() => Value::Text(node.text_or_empty().to_string()),
            None => {
                return Err(SaveError::malformed_at(
                    format!("Element <{}> has nested content but no type", node.name),
                    self.location(node),
                ))
            }
            Some(NULL_TAG) => Value::Null,
            Some(name) => {
                let binding = self.resolve_type(name, node)?;
                self.decode_as(binding, node)?
            }
        };

        if self.mode() == CodecMode::Tree {
            if let Some(id) = node.attribute(ID_ATTRIBUTE) {
                self.references.insert(id.to_string(), value.clone());
            }
        }
        Ok(value)
    }

    /// Decodes `node` as a value of the bound type.
    pub fn decode_as(&mut self, binding: &TypeBinding, node: &XmlNode) -> Result<Value, SaveError> {
        let converters = self.codec.converters();
        match converters.dedicated_converter(&binding.type_id) {
            Some(converter) => converter.unmarshal(&binding.type_id, node, self),
            None if binding.requires_converter => Err(SaveError::malformed_at(
                format!("No converter available for type '{}'", binding.type_id),
                self.location(node),
            )),
            None => converters
                .fallback()
                .unmarshal(&binding.type_id, node, self),
        }
    }

    fn resolve_reference(&self, reference: &str, node: &XmlNode) -> Result<Value, SaveError> {
        if self.mode() == CodecMode::Streaming {
            return Err(SaveError::malformed_at(
                "Object references are not allowed in record logs",
                self.location(node),
            ));
        }
        self.references.get(reference).cloned().ok_or_else(|| {
            SaveError::malformed_at(
                format!("Reference to unknown id '{}'", reference),
                self.location(node),
            )
        })
    }
}
