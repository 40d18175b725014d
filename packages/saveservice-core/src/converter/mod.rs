//! Converters between values and elements.
//!
//! A converter claims one or more type identifiers. Converters registered
//! later take precedence over earlier ones; values no converter claims fall
//! back to [`ObjectConverter`].

mod envelope;
mod object;
mod results;
mod sample;
mod text;
mod tree;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use envelope::{EnvelopeConverter, ScriptEnvelope, ENVELOPE_CONVERTER, FORMAT_VERSION};
pub use object::{ObjectConverter, ENTRIES_TAG};
pub use results::{ResultWrapperConverter, RESULT_WRAPPER_CONVERTER};
pub use sample::{
    SampleResultConverter, HOSTNAME_ATTRIBUTE, HTTP_SAMPLE_RESULT_TYPE, SAMPLE_RESULT_CONVERTER,
    SAMPLE_RESULT_TYPE, THREAD_GROUP_ATTRIBUTE,
};
pub use text::TextConverter;
pub use tree::{TreeConverter, TREE_CONVERTER};

use crate::alias::AliasTable;
use crate::codec::{MarshalContext, UnmarshalContext};
use crate::definitions::ConverterRegistration;
use crate::error::SaveError;
use crate::model::Value;
use crate::xml::XmlNode;

/// Encodes and decodes values of the types it claims.
pub trait Converter: Send + Sync {
    /// Converter identifier as named in definition sources.
    fn name(&self) -> &str;

    /// Whether this converter handles values of `type_id`.
    fn can_convert(&self, type_id: &str) -> bool;

    /// Writes the content of `value` into `node`, whose tag is already set.
    fn marshal(
        &self,
        value: &Value,
        node: &mut XmlNode,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<(), SaveError>;

    /// Rebuilds a value of `type_id` from `node`.
    fn unmarshal(
        &self,
        type_id: &str,
        node: &XmlNode,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value, SaveError>;
}

/// Ordered converter registrations shared by both codecs.
pub struct ConverterSet {
    registered: Vec<Arc<dyn Converter>>,
    fallback: Arc<dyn Converter>,
}

impl fmt::Debug for ConverterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterSet")
            .field(
                "registered",
                &self.registered.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl Default for ConverterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterSet {
    /// Creates a set holding the converters for the built-in types.
    pub fn new() -> Self {
        let registered: Vec<Arc<dyn Converter>> = vec![
            Arc::new(TextConverter),
            Arc::new(TreeConverter),
            Arc::new(EnvelopeConverter),
            Arc::new(ResultWrapperConverter),
        ];
        Self {
            registered,
            fallback: Arc::new(ObjectConverter),
        }
    }

    /// Registers a converter ahead of every earlier registration.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        tracing::debug!("Registered converter {}", converter.name());
        self.registered.push(converter);
    }

    /// Most recently registered converter claiming `type_id`.
    pub fn dedicated_converter(&self, type_id: &str) -> Option<&dyn Converter> {
        self.registered
            .iter()
            .rev()
            .find(|c| c.can_convert(type_id))
            .map(|c| c.as_ref())
    }

    /// Converter for `type_id`, falling back to the generic object converter.
    pub fn converter_for(&self, type_id: &str) -> &dyn Converter {
        self.dedicated_converter(type_id)
            .unwrap_or_else(|| self.fallback())
    }

    pub fn fallback(&self) -> &dyn Converter {
        self.fallback.as_ref()
    }

    /// Names of registered converters, most recent last.
    pub fn names(&self) -> Vec<&str> {
        self.registered.iter().map(|c| c.name()).collect()
    }
}

/// How a converter is constructed.
#[derive(Clone)]
pub enum ConverterFactory {
    /// Constructed without arguments
    Plain(fn() -> Arc<dyn Converter>),
    /// Constructed with the alias table it will resolve nested tags through
    WithMapper(fn(Arc<AliasTable>) -> Arc<dyn Converter>),
}

/// Converters known to the running code, by converter identifier.
#[derive(Clone, Default)]
pub struct ConverterFactories {
    factories: HashMap<String, ConverterFactory>,
}

impl fmt::Debug for ConverterFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ConverterFactories")
            .field("factories", &names)
            .finish()
    }
}

impl ConverterFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factories for every converter shipped with this crate.
    pub fn standard() -> Self {
        let mut factories = Self::new();
        factories.insert(
            TREE_CONVERTER,
            ConverterFactory::WithMapper(|_| Arc::new(TreeConverter)),
        );
        factories.insert(
            ENVELOPE_CONVERTER,
            ConverterFactory::WithMapper(|_| Arc::new(EnvelopeConverter)),
        );
        factories.insert(
            RESULT_WRAPPER_CONVERTER,
            ConverterFactory::WithMapper(|_| Arc::new(ResultWrapperConverter)),
        );
        factories.insert(
            SAMPLE_RESULT_CONVERTER,
            ConverterFactory::WithMapper(|_| Arc::new(SampleResultConverter)),
        );
        factories
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: ConverterFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds the converter requested by a definition entry.
    ///
    /// The constructor shape must match the registration: a converter
    /// registered as `collection`/`mapping` needs a mapper-taking constructor
    /// and vice versa.
    pub fn build(
        &self,
        registration: &ConverterRegistration,
        aliases: &Arc<AliasTable>,
    ) -> Result<Arc<dyn Converter>, SaveError> {
        let factory = self.factories.get(&registration.converter).ok_or_else(|| {
            SaveError::ConverterRegistration {
                converter: registration.converter.clone(),
                reason: "unknown converter".to_string(),
            }
        })?;

        match (factory, registration.uses_mapper) {
            (ConverterFactory::WithMapper(make), true) => Ok(make(Arc::clone(aliases))),
            (ConverterFactory::Plain(make), false) => Ok(make()),
            (ConverterFactory::WithMapper(_), false) => Err(SaveError::ConverterRegistration {
                converter: registration.converter.clone(),
                reason: "converter requires mapper access but is not registered as collection or mapping".to_string(),
            }),
            (ConverterFactory::Plain(_), true) => Err(SaveError::ConverterRegistration {
                converter: registration.converter.clone(),
                reason: "converter has no mapper-taking constructor".to_string(),
            }),
        }
    }
}
