//! Alias definition source.
//!
//! The source is a `.properties` style list of `key=value` pairs:
//!
//! ```text
//! _version=4.0
//! _file_encoding=UTF-8
//! HTTPSampler,HTTPSamplerProxy=org.apache.jmeter.protocol.http.sampler.HTTPSamplerProxy
//! _org.apache.jmeter.save.converters.HashTreeConverter=collection
//! ```
//!
//! Keys starting with `_` are reserved: metadata or converter registrations.

use std::fs;
use std::path::Path;

use crate::error::SaveError;
use crate::io_utils::classify_init_error;

/// Prefix marking reserved keys.
pub const RESERVED_PREFIX: char = '_';

/// Ordered key/value pairs read from a definition source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSource {
    entries: Vec<(String, String)>,
}

/// Classified meaning of one definition entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionEntry {
    /// `alias1,alias2=typeId`
    Alias { aliases: String, type_id: String },
    /// `_version`
    Version(String),
    /// `_file_encoding`
    FileEncoding(String),
    /// `_file_version`, superseded by the computed checksum
    ObsoleteFileVersion,
    /// `_converter.TypeId=collection|mapping|...`
    Converter(ConverterRegistration),
}

/// A converter requested by the definition source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterRegistration {
    /// Converter type identifier (the key without its `_` prefix)
    pub converter: String,
    /// Whether the converter is constructed with access to the alias mapper
    pub uses_mapper: bool,
}

impl DefinitionSource {
    /// Creates a source from ordered pairs. Later duplicate keys replace earlier ones.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::default();
        for (key, value) in pairs {
            source.insert(key.into(), value.into());
        }
        source
    }

    /// Parses properties text.
    pub fn parse(text: &str) -> Self {
        let mut source = Self::default();
        for logical in logical_lines(text) {
            let (key, value) = split_key_value(&logical);
            source.insert(unescape(&key), unescape(&value));
        }
        source
    }

    /// Reads and parses a properties file.
    pub fn from_file(path: &Path) -> Result<Self, SaveError> {
        let bytes = fs::read(path).map_err(|e| {
            classify_init_error(
                e,
                &format!("Bad definition source '{}'", path.display()),
            )
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    fn insert(&mut self, key: String, value: String) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Classified entries in source order.
    pub fn classified(&self) -> impl Iterator<Item = DefinitionEntry> + '_ {
        self.iter().map(|(k, v)| classify(k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classifies one key/value pair.
pub fn classify(key: &str, value: &str) -> DefinitionEntry {
    let Some(reserved) = key.strip_prefix(RESERVED_PREFIX) else {
        return DefinitionEntry::Alias {
            aliases: key.to_string(),
            type_id: value.trim().to_string(),
        };
    };

    if reserved.eq_ignore_ascii_case("version") {
        DefinitionEntry::Version(value.trim().to_string())
    } else if reserved.eq_ignore_ascii_case("file_version") {
        DefinitionEntry::ObsoleteFileVersion
    } else if reserved.eq_ignore_ascii_case("file_encoding") {
        DefinitionEntry::FileEncoding(value.trim().to_string())
    } else {
        let kind = value.trim();
        DefinitionEntry::Converter(ConverterRegistration {
            converter: reserved.to_string(),
            uses_mapper: kind == "collection" || kind == "mapping",
        })
    }
}

/// Joins continuation lines and drops blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_start();
        let mut buf = match current.take() {
            Some(mut buf) => {
                buf.push_str(line);
                buf
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                line.to_string()
            }
        };

        if ends_with_continuation(&buf) {
            buf.pop();
            current = Some(buf);
        } else {
            out.push(buf);
        }
    }

    if let Some(rest) = current {
        out.push(rest);
    }
    out
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped `=`, `:` or whitespace.
fn split_key_value(line: &str) -> (String, String) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = line[..key_end].to_string();
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\u{c}']);
    }
    (key, rest.to_string())
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
