//! Codec driving converters over an element tree.
//!
//! Two codecs share one mapper and one converter set: the tree codec used
//! for test plans and the streaming codec used for result logs. The
//! streaming codec keeps no identity state between or within records.

mod context;

use std::sync::Arc;

pub use context::{
    FnRecordSink, MarshalContext, RecordContext, RecordSink, UnmarshalContext, CLASS_ATTRIBUTE,
    ID_ATTRIBUTE, REFERENCE_ATTRIBUTE,
};

use crate::converter::ConverterSet;
use crate::error::SaveError;
use crate::mapper::AliasMapper;
use crate::model::Value;
use crate::xml::XmlNode;

/// Delivery mode of a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    /// Whole documents; `id`/`reference` attributes are honoured on read
    Tree,
    /// Independent records; references are rejected
    Streaming,
}

/// Long-lived codec configured once at startup.
#[derive(Debug)]
pub struct Codec {
    mode: CodecMode,
    mapper: AliasMapper,
    converters: Arc<ConverterSet>,
}

impl Codec {
    pub fn new(mode: CodecMode, mapper: AliasMapper, converters: Arc<ConverterSet>) -> Self {
        Self {
            mode,
            mapper,
            converters,
        }
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    pub fn mapper(&self) -> &AliasMapper {
        &self.mapper
    }

    pub fn converters(&self) -> &ConverterSet {
        &self.converters
    }

    /// Encodes `value` as a standalone element.
    pub fn marshal(&self, value: &Value, record: RecordContext<'_>) -> Result<XmlNode, SaveError> {
        let mut ctx = MarshalContext::new(self, record);
        ctx.marshal(value)
    }

    /// Decodes a standalone element with a fresh per-call context.
    pub fn unmarshal<'a>(
        &'a self,
        node: &XmlNode,
        records: Option<&'a mut dyn RecordSink>,
    ) -> Result<Value, SaveError> {
        let mut ctx = UnmarshalContext::new(self, records);
        ctx.unmarshal(node)
    }
}
