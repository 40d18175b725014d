//! Document and record marshalling.
//!
//! Test plans go through the tree codec and are wrapped in a
//! [`ScriptEnvelope`]. Result records go through the streaming codec one
//! fragment at a time. Each mode serializes its calls through a mutex that
//! guards the mode's reusable buffer; the two modes never block each other.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::RESULT_WRAPPER_TYPE;
use crate::charset::{render_xml_header, Charset};
use crate::codec::{Codec, CodecMode, RecordContext, RecordSink};
use crate::converter::{ConverterSet, ScriptEnvelope, FORMAT_VERSION};
use crate::error::{Location, SaveError};
use crate::io_utils::classify_io_error;
use crate::mapper::AliasMapper;
use crate::model::{PlanTree, Value};
use crate::xml::{parse_fragments, render_into, XmlNode};

/// One codec plus the buffer its calls render into and read through.
#[derive(Debug)]
struct ModeState {
    codec: Codec,
    buffer: Mutex<Vec<u8>>,
}

impl ModeState {
    fn new(mode: CodecMode, mapper: AliasMapper, converters: Arc<ConverterSet>) -> Self {
        Self {
            codec: Codec::new(mode, mapper, converters),
            buffer: Mutex::new(Vec::new()),
        }
    }
}

/// Counts records on their way to the caller's sink.
struct CountingSink<'s> {
    inner: &'s mut dyn RecordSink,
    count: usize,
}

impl RecordSink for CountingSink<'_> {
    fn accept(&mut self, record: Value) {
        self.count += 1;
        self.inner.accept(record);
    }
}

/// Tree and streaming marshaller sharing one alias mapper.
#[derive(Debug)]
pub struct Marshaller {
    tree: ModeState,
    streaming: ModeState,
    charset: Charset,
    properties_version: String,
    application_version: String,
}

impl Marshaller {
    pub fn new(
        mapper: AliasMapper,
        converters: Arc<ConverterSet>,
        charset: Charset,
        properties_version: impl Into<String>,
        application_version: impl Into<String>,
    ) -> Self {
        Self {
            tree: ModeState::new(CodecMode::Tree, mapper.clone(), Arc::clone(&converters)),
            streaming: ModeState::new(CodecMode::Streaming, mapper, converters),
            charset,
            properties_version: properties_version.into(),
            application_version: application_version.into(),
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn mapper(&self) -> &AliasMapper {
        self.tree.codec.mapper()
    }

    pub fn converters(&self) -> &ConverterSet {
        self.tree.codec.converters()
    }

    /// Writes `tree` as a complete test plan document.
    pub fn save_document<W: Write>(&self, tree: &PlanTree, sink: &mut W) -> Result<(), SaveError> {
        let envelope = ScriptEnvelope::new(
            self.properties_version.as_str(),
            self.application_version.as_str(),
            tree.clone(),
        )
        .into_value();
        self.save_tree_value(&envelope, sink)?;
        tracing::debug!("Saved test plan with {} elements", tree.element_count());
        Ok(())
    }

    /// Reads a test plan document and returns its tree.
    pub fn load_document<R: Read>(&self, source: R) -> Result<PlanTree, SaveError> {
        let (value, root) = self.load_tree_value(source)?;
        let envelope = ScriptEnvelope::from_value(value).ok_or_else(|| {
            SaveError::malformed_at(
                format!("Root element <{}> is not a test plan", root.name),
                Location::at(root.line, format!("/{}", root.name)),
            )
        })?;
        if envelope.version != FORMAT_VERSION {
            tracing::debug!(
                "Loading document format {} (current {})",
                envelope.version,
                FORMAT_VERSION
            );
        }
        Ok(envelope.tree)
    }

    /// Reads a test plan document from `path`; errors name the file.
    pub fn load_document_file(&self, path: &Path) -> Result<PlanTree, SaveError> {
        let file = File::open(path)
            .map_err(|e| classify_io_error(e, &format!("Failed to open '{}'", path.display())))?;
        self.load_document(file).map_err(|e| e.in_file(path))
    }

    /// Writes a single value in tree mode, with a header but no envelope.
    pub fn save_element<W: Write>(&self, value: &Value, sink: &mut W) -> Result<(), SaveError> {
        self.save_tree_value(value, sink)
    }

    /// Reads a single value written by [`Marshaller::save_element`].
    pub fn load_element<R: Read>(&self, source: R) -> Result<Value, SaveError> {
        self.load_tree_value(source).map(|(value, _)| value)
    }

    /// Writes one result record as an independent fragment.
    pub fn save_record<W: Write>(
        &self,
        record: &Value,
        ctx: RecordContext<'_>,
        sink: &mut W,
    ) -> Result<(), SaveError> {
        let mut buffer = self.streaming.buffer.lock();
        let node = self
            .streaming
            .codec
            .marshal(record, ctx)
            .map_err(|e| match e {
                SaveError::Serialization(message) => SaveError::Serialization(format!(
                    "{} while saving record {}",
                    message,
                    describe_record(record)
                )),
                other => other,
            })?;

        buffer.clear();
        render_into(&node, &mut buffer)?;
        buffer.push(b'\n');
        self.write_encoded(&buffer, sink)
    }

    /// Decodes every record in `source` and feeds them to `sink` in order.
    ///
    /// Each top-level element is decoded on its own. A wrapping `testResults`
    /// element is unwrapped. Returns the number of records delivered.
    ///
    /// `sink` runs while the streaming mode is held and must not save records
    /// through this marshaller.
    pub fn load_records<R: Read>(
        &self,
        source: R,
        sink: &mut dyn RecordSink,
    ) -> Result<usize, SaveError> {
        let mut buffer = self.streaming.buffer.lock();
        read_source(source, &mut buffer)?;
        let text = self.charset.decode(&buffer)?;
        let fragments = parse_fragments(&text)?;

        let mut counting = CountingSink {
            inner: sink,
            count: 0,
        };
        for fragment in &fragments {
            let value = self
                .streaming
                .codec
                .unmarshal(fragment, Some(&mut counting as &mut dyn RecordSink))?;
            if value.type_id() != Some(RESULT_WRAPPER_TYPE) {
                counting.accept(value);
            }
        }
        tracing::debug!("Loaded {} records", counting.count);
        Ok(counting.count)
    }

    /// Starts a wrapped result log: header plus the opening wrapper tag.
    pub fn begin_record_log<W: Write>(&self, sink: &mut W) -> Result<(), SaveError> {
        let tag = self.wrapper_tag()?;
        let text = format!(
            "{}\n<{} version=\"{}\">\n",
            render_xml_header(self.charset),
            tag,
            FORMAT_VERSION
        );
        self.write_encoded(text.as_bytes(), sink)
    }

    /// Ends a wrapped result log started by [`Marshaller::begin_record_log`].
    pub fn end_record_log<W: Write>(&self, sink: &mut W) -> Result<(), SaveError> {
        let text = format!("</{}>\n", self.wrapper_tag()?);
        self.write_encoded(text.as_bytes(), sink)
    }

    fn wrapper_tag(&self) -> Result<String, SaveError> {
        let tag = self.streaming.codec.mapper().serialized_name(RESULT_WRAPPER_TYPE);
        if !crate::xml::is_valid_name(tag) {
            return Err(SaveError::Serialization(format!(
                "Result wrapper has no usable tag (got '{}')",
                tag
            )));
        }
        Ok(tag.to_string())
    }

    fn save_tree_value<W: Write>(&self, value: &Value, sink: &mut W) -> Result<(), SaveError> {
        if !self.charset.is_writable() {
            return Err(SaveError::Encoding(format!(
                "Charset {} cannot be used for output",
                self.charset.name()
            )));
        }
        let mut buffer = self.tree.buffer.lock();
        let node = self.tree.codec.marshal(value, RecordContext::default())?;

        buffer.clear();
        buffer.extend_from_slice(render_xml_header(self.charset).as_bytes());
        buffer.push(b'\n');
        render_into(&node, &mut buffer)?;
        buffer.push(b'\n');
        self.write_encoded(&buffer, sink)
    }

    fn load_tree_value<R: Read>(&self, source: R) -> Result<(Value, XmlNode), SaveError> {
        let mut buffer = self.tree.buffer.lock();
        read_source(source, &mut buffer)?;
        let text = self.charset.decode(&buffer)?;
        let mut roots = parse_fragments(&text)?;

        let root = match roots.len() {
            1 => roots.remove(0),
            0 => return Err(SaveError::malformed("Document has no root element")),
            _ => {
                return Err(SaveError::malformed_at(
                    "Document has more than one root element",
                    Location::line(roots[1].line),
                ))
            }
        };
        let value = self.tree.codec.unmarshal(&root, None)?;
        Ok((value, root))
    }

    fn write_encoded<W: Write>(&self, utf8: &[u8], sink: &mut W) -> Result<(), SaveError> {
        let text = std::str::from_utf8(utf8)
            .map_err(|e| SaveError::Serialization(format!("Rendered XML is not UTF-8: {}", e)))?;
        let bytes = self.charset.encode(text)?;
        sink.write_all(&bytes)
            .and_then(|_| sink.flush())
            .map_err(|e| classify_io_error(e, "Failed to write XML"))
    }
}

fn read_source<R: Read>(mut source: R, buffer: &mut Vec<u8>) -> Result<(), SaveError> {
    buffer.clear();
    source
        .read_to_end(buffer)
        .map_err(|e| classify_io_error(e, "Failed to read XML"))?;
    Ok(())
}

/// Short description of a record for error messages.
fn describe_record(record: &Value) -> String {
    match record {
        Value::Object(object) => {
            let label = object
                .text("lb")
                .or_else(|| object.text("label"))
                .map(|label| format!(" '{}'", label))
                .unwrap_or_default();
            format!(
                "{}{} ({} fields, {} entries)",
                object.type_id,
                label,
                object.fields.len(),
                object.entries.len()
            )
        }
        other => format!("{:?}", other.type_id()),
    }
}
