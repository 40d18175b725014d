use crate::codec::{
    MarshalContext, UnmarshalContext, CLASS_ATTRIBUTE, ID_ATTRIBUTE, REFERENCE_ATTRIBUTE,
};
use crate::error::SaveError;
use crate::model::{Object, Value};
use crate::xml::{is_valid_name, XmlNode};

use super::Converter;

pub const SAMPLE_RESULT_CONVERTER: &str = "org.apache.jmeter.save.converters.SampleResultConverter";

pub const SAMPLE_RESULT_TYPE: &str = "org.apache.jmeter.samplers.SampleResult";

pub const HTTP_SAMPLE_RESULT_TYPE: &str = "org.apache.jmeter.protocol.http.sampler.HTTPSampleResult";

/// Attribute carrying the host name of the originating event.
pub const HOSTNAME_ATTRIBUTE: &str = "hn";

/// Attribute carrying the thread group of the originating event.
pub const THREAD_GROUP_ATTRIBUTE: &str = "tg";

/// Compact form for result records.
///
/// Text fields are written as attributes, other fields as named children and
/// sub-results as type-tagged children. When the record is saved together
/// with its sampling event, the host name, thread group and sample variables
/// are appended as attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleResultConverter;

impl SampleResultConverter {
    /// Child elements whose tag resolves to a record type are sub-results.
    fn is_sub_result(&self, child: &XmlNode, ctx: &UnmarshalContext<'_>) -> bool {
        ctx.mapper()
            .real_type(&child.name)
            .is_some_and(|binding| self.can_convert(&binding.type_id))
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, CLASS_ATTRIBUTE | ID_ATTRIBUTE | REFERENCE_ATTRIBUTE)
}

fn set_attribute_checked(node: &mut XmlNode, name: &str, value: &str) -> Result<(), SaveError> {
    if !is_valid_name(name) || is_reserved(name) {
        return Err(SaveError::Serialization(format!(
            "'{}' cannot be written as an attribute of <{}>",
            name, node.name
        )));
    }
    node.set_attribute(name, value);
    Ok(())
}

impl Converter for SampleResultConverter {
    fn name(&self) -> &str {
        SAMPLE_RESULT_CONVERTER
    }

    fn can_convert(&self, type_id: &str) -> bool {
        type_id == SAMPLE_RESULT_TYPE || type_id == HTTP_SAMPLE_RESULT_TYPE
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        let Some(record) = value.as_object() else {
            return Err(SaveError::Serialization(
                "Sample result converter expects a record object".to_string(),
            ));
        };

        for (name, field) in &record.fields {
            if let Value::Text(text) = field {
                set_attribute_checked(node, name, text)?;
            }
        }

        if let Some(event) = ctx.event() {
            if !event.hostname.is_empty() {
                node.set_attribute(HOSTNAME_ATTRIBUTE, event.hostname.as_str());
            }
            if !event.thread_group.is_empty() {
                node.set_attribute(THREAD_GROUP_ATTRIBUTE, event.thread_group.as_str());
            }
            for (name, value) in &event.variables {
                set_attribute_checked(node, name, value)?;
            }
        }

        for (name, field) in &record.fields {
            if !matches!(field, Value::Text(_)) {
                node.push_child(ctx.marshal_field(name, field)?);
            }
        }
        for sub_result in &record.entries {
            node.push_child(ctx.marshal(sub_result)?);
        }
        Ok(())
    }

    fn unmarshal(
        &self,
        type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError> {
        let mut record = Object::new(type_id);
        for (name, value) in node.attributes.iter().filter(|(name, _)| !is_reserved(name)) {
            record.set_field(name.as_str(), value.as_str());
        }
        for child in &node.children {
            if self.is_sub_result(child, ctx) {
                record.entries.push(ctx.unmarshal(child)?);
            } else {
                let value = ctx.unmarshal_field(child)?;
                record.set_field(child.name.as_str(), value);
            }
        }
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_both_result_types() {
        let converter = SampleResultConverter;
        assert!(converter.can_convert(SAMPLE_RESULT_TYPE));
        assert!(converter.can_convert(HTTP_SAMPLE_RESULT_TYPE));
        assert!(!converter.can_convert("org.example.Other"));
    }
}
