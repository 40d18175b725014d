use crate::catalog::RESULT_WRAPPER_TYPE;
use crate::codec::{MarshalContext, UnmarshalContext};
use crate::error::SaveError;
use crate::model::{Object, Value};
use crate::xml::XmlNode;

use super::envelope::FORMAT_VERSION;
use super::Converter;

pub const RESULT_WRAPPER_CONVERTER: &str =
    "org.apache.jmeter.save.converters.TestResultWrapperConverter";

const VERSION_ATTRIBUTE: &str = "version";

/// Root element of a wrapped result log.
///
/// On read every record inside the wrapper is handed to the record sink of
/// the current call. Records are kept in the wrapper only when the caller
/// supplied no sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultWrapperConverter;

impl ResultWrapperConverter {
    /// Wrapper holding `records`.
    pub fn wrap(records: impl IntoIterator<Item = Value>) -> Value {
        let mut wrapper = Object::new(RESULT_WRAPPER_TYPE).with_field(VERSION_ATTRIBUTE, FORMAT_VERSION);
        wrapper.entries.extend(records);
        wrapper.into()
    }
}

impl Converter for ResultWrapperConverter {
    fn name(&self) -> &str {
        RESULT_WRAPPER_CONVERTER
    }

    fn can_convert(&self, type_id: &str) -> bool {
        type_id == RESULT_WRAPPER_TYPE
    }

    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError> {
        let Some(wrapper) = value.as_object() else {
            return Err(SaveError::Serialization(
                "Result wrapper converter expects a wrapper object".to_string(),
            ));
        };
        node.set_attribute(
            VERSION_ATTRIBUTE,
            wrapper.text(VERSION_ATTRIBUTE).unwrap_or(FORMAT_VERSION),
        );
        for record in &wrapper.entries {
            node.push_child(ctx.marshal(record)?);
        }
        Ok(())
    }

    fn unmarshal(
        &self,
        type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError> {
        let mut wrapper = Object::new(type_id);
        if let Some(version) = node.attribute(VERSION_ATTRIBUTE) {
            wrapper.set_field(VERSION_ATTRIBUTE, version);
        }
        for child in &node.children {
            let record = ctx.unmarshal(child)?;
            if let Some(kept) = ctx.emit_record(record) {
                wrapper.entries.push(kept);
            }
        }
        Ok(wrapper.into())
    }
}
