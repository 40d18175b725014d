//! Element tree read and written through quick-xml.
//!
//! Converters work on [`XmlNode`]s rather than on raw events: a document or a
//! record fragment is parsed into nodes first, and nodes are rendered with
//! two-space indentation.

use std::fmt::Display;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Location, SaveError};

/// An XML element with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Character content; `None` for an empty element or a pure container
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
    /// 1-based source line of the start tag (0 for nodes built in memory)
    pub line: usize,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing an existing value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Text content, empty for elements without any.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn push_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }
}

/// Whether `name` can be used as an element or attribute name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == ':') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
}

fn write_error(e: impl Display) -> SaveError {
    SaveError::Serialization(format!("Failed to write XML: {}", e))
}

/// Renders `node` and its subtree into `out` without a trailing newline.
pub fn render_into(node: &XmlNode, out: &mut Vec<u8>) -> Result<(), SaveError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    write_node(&mut writer, node)
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<(), SaveError> {
    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(write_error)
}

/// Maps byte offsets to 1-based line numbers for monotonically growing offsets.
struct LineCounter<'a> {
    input: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> usize {
        let offset = offset.min(self.input.len());
        if offset > self.offset {
            self.line += self.input[self.offset..offset]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = offset;
        }
        self.line
    }
}

fn open_node(start: &BytesStart<'_>, line: usize) -> Result<XmlNode, SaveError> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    node.line = line;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            SaveError::malformed_at(
                format!("Bad attribute on <{}>: {}", node.name, e),
                Location::line(line),
            )
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| {
                SaveError::malformed_at(
                    format!("Bad attribute value for '{}' on <{}>: {}", key, node.name, e),
                    Location::line(line),
                )
            })?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

/// Containers keep no whitespace between their children.
fn close_node(node: &mut XmlNode) {
    if !node.children.is_empty()
        && node
            .text
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
    {
        node.text = None;
    }
}

fn attach(stack: &mut [XmlNode], roots: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn append_text(stack: &mut [XmlNode], text: &str, line: usize) -> Result<(), SaveError> {
    match stack.last_mut() {
        Some(node) => {
            node.text.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SaveError::malformed_at(
            "Text outside of any element",
            Location::line(line),
        )),
    }
}

/// Parses zero or more top-level elements.
///
/// Declarations, processing instructions, comments and whitespace between
/// fragments are skipped.
pub fn parse_fragments(input: &str) -> Result<Vec<XmlNode>, SaveError> {
    let mut reader = Reader::from_str(input);
    let mut lines = LineCounter::new(input);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut roots = Vec::new();

    loop {
        let position = reader.buffer_position() as usize;
        let line = lines.line_at(position);
        let event = reader.read_event().map_err(|e| {
            SaveError::malformed_at(format!("XML parse error: {}", e), Location::line(line))
        })?;

        match event {
            Event::Start(start) => {
                let node = open_node(&start, line)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = open_node(&start, line)?;
                attach(&mut stack, &mut roots, node);
            }
            Event::End(_) => {
                let Some(mut node) = stack.pop() else {
                    return Err(SaveError::malformed_at(
                        "Unexpected end tag",
                        Location::line(line),
                    ));
                };
                close_node(&mut node);
                attach(&mut stack, &mut roots, node);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| {
                    SaveError::malformed_at(format!("Bad text content: {}", e), Location::line(line))
                })?;
                append_text(&mut stack, &text, line)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                append_text(&mut stack, &text, line)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(SaveError::malformed_at(
            format!("Unclosed element <{}>", open.name),
            Location::line(open.line),
        ));
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(node: &XmlNode) -> String {
        let mut out = Vec::new();
        render_into(node, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_indented_tree() {
        let mut root = XmlNode::new("testResults");
        root.set_attribute("version", "1.2");
        let mut sample = XmlNode::new("sample");
        sample.set_attribute("lb", "a<b");
        let mut label = XmlNode::new("label");
        label.set_text("x & y");
        sample.push_child(label);
        root.push_child(sample);
        root.push_child(XmlNode::new("null"));

        let xml = render(&root);
        assert_eq!(
            xml,
            "<testResults version=\"1.2\">\n  <sample lb=\"a&lt;b\">\n    <label>x &amp; y</label>\n  </sample>\n  <null/>\n</testResults>"
        );
    }

    #[test]
    fn parses_lines_text_and_attributes() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                   <root a=\"1 &amp; 2\">\n  <!-- note -->\n  <leaf>  keep  </leaf>\n  <empty/>\n  <data><![CDATA[<raw>]]></data>\n</root>\n";
        let nodes = parse_fragments(xml).unwrap();
        assert_eq!(nodes.len(), 1);

        let root = &nodes[0];
        assert_eq!(root.line, 2);
        assert_eq!(root.attribute("a"), Some("1 & 2"));
        assert!(root.text.is_none());
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[0].text.as_deref(), Some("  keep  "));
        assert_eq!(root.children[0].line, 4);
        assert!(root.children[1].text.is_none());
        assert_eq!(root.children[2].text_or_empty(), "<raw>");
    }

    #[test]
    fn parses_multiple_fragments() {
        let xml = "<a x=\"1\"/>\n<a x=\"2\">\n  <b/>\n</a>\n<a x=\"3\"/>\n";
        let nodes = parse_fragments(xml).unwrap();
        let xs: Vec<_> = nodes.iter().filter_map(|n| n.attribute("x")).collect();
        assert_eq!(xs, vec!["1", "2", "3"]);
        assert_eq!(nodes[2].line, 5);
    }

    #[test]
    fn render_then_parse_preserves_structure() {
        let mut root = XmlNode::new("a");
        let mut child = XmlNode::new("b");
        child.set_text("");
        root.push_child(child);
        let mut other = XmlNode::new("c");
        other.set_attribute("k", "\"quoted\"");
        other.set_text(" spaced ");
        root.push_child(other);

        let parsed = parse_fragments(&render(&root)).unwrap();
        assert_eq!(parsed.len(), 1);
        let parsed = &parsed[0];
        assert_eq!(parsed.children[0].text_or_empty(), "");
        assert_eq!(parsed.children[1].attribute("k"), Some("\"quoted\""));
        assert_eq!(parsed.children[1].text.as_deref(), Some(" spaced "));
    }

    #[test]
    fn unclosed_element_is_malformed() {
        let err = parse_fragments("<a>\n<b>\n</b>\n").unwrap_err();
        assert!(matches!(err, SaveError::MalformedDocument { .. }));
    }

    #[test]
    fn mismatched_end_tag_is_malformed_with_line() {
        let err = parse_fragments("<a>\n<b>\n</c>\n</a>").unwrap_err();
        match err {
            SaveError::MalformedDocument { location, .. } => assert_eq!(location.line, Some(3)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_text_is_malformed() {
        assert!(parse_fragments("hello <a/>").is_err());
        assert!(parse_fragments("  \n <a/> \n").is_ok());
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("HTTPSamplerProxy"));
        assert!(is_valid_name("org.apache.jmeter.save.ScriptWrapper"));
        assert!(is_valid_name("_private-name"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("a<b"));
    }
}
