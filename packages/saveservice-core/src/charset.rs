//! Charset resolution and the XML declaration written ahead of documents.

use std::borrow::Cow;
use std::sync::Once;

use encoding_rs::{Encoding, UTF_8};

use crate::error::SaveError;

static DEFAULT_CHARSET_NOTICE: Once = Once::new();

/// Character set documents are written and read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    encoding: &'static Encoding,
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl Charset {
    pub fn utf8() -> Self {
        Self { encoding: UTF_8 }
    }

    /// Looks a charset up by any of its labels (`utf8`, `latin1`, `Shift_JIS`...).
    pub fn for_label(label: &str) -> Result<Self, SaveError> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| SaveError::Encoding(format!("Unsupported charset '{}'", label)))
    }

    /// Canonical name, as written in the XML declaration.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Whether documents can be written in this charset.
    ///
    /// The UTF-16 family and the replacement encoding can only be read.
    pub fn is_writable(&self) -> bool {
        self.encoding.output_encoding() == self.encoding
    }

    /// Encodes `text`. Characters the charset cannot represent are written
    /// as numeric character references.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, SaveError> {
        if !self.is_writable() {
            return Err(SaveError::Encoding(format!(
                "Charset {} cannot be used for output",
                self.name()
            )));
        }
        if self.encoding == UTF_8 {
            return Ok(Cow::Borrowed(text.as_bytes()));
        }
        let (bytes, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            tracing::debug!(
                "Some characters are not representable in {} and were escaped",
                self.name()
            );
        }
        Ok(bytes)
    }

    /// Decodes `bytes`, dropping a leading byte order mark.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, SaveError> {
        let (text, had_errors) = self.encoding.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(SaveError::Encoding(format!(
                "Input is not valid {}",
                self.name()
            )));
        }
        Ok(text)
    }
}

/// Resolves the charset to use for documents.
///
/// A non-empty `configured` name must be a known label. Without one the
/// `default` is used and a notice is logged the first time this happens.
pub fn resolve_charset(configured: Option<&str>, default: &str) -> Result<Charset, SaveError> {
    match configured.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => Charset::for_label(name),
        None => {
            let charset = Charset::for_label(default)?;
            DEFAULT_CHARSET_NOTICE.call_once(|| {
                tracing::info!("_file_encoding not set, using {}", charset.name());
            });
            Ok(charset)
        }
    }
}

/// XML declaration naming `charset`, without a line terminator.
pub fn render_xml_header(charset: Charset) -> String {
    format!("<?xml version=\"1.0\" encoding=\"{}\"?>", charset.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_resolve_to_canonical_names() {
        assert_eq!(Charset::for_label("utf8").unwrap().name(), "UTF-8");
        assert_eq!(Charset::for_label(" UTF-8 ").unwrap().name(), "UTF-8");
        assert_eq!(Charset::for_label("shift_jis").unwrap().name(), "Shift_JIS");
    }

    #[test]
    fn unknown_label_is_an_encoding_error() {
        assert!(matches!(
            Charset::for_label("klingon-8"),
            Err(SaveError::Encoding(_))
        ));
        assert!(matches!(
            resolve_charset(Some("klingon-8"), "UTF-8"),
            Err(SaveError::Encoding(_))
        ));
    }

    #[test]
    fn blank_configuration_uses_default() {
        assert_eq!(resolve_charset(None, "UTF-8").unwrap(), Charset::utf8());
        assert_eq!(resolve_charset(Some("  "), "UTF-8").unwrap(), Charset::utf8());
        assert_eq!(
            resolve_charset(Some("windows-1252"), "UTF-8").unwrap().name(),
            "windows-1252"
        );
    }

    #[test]
    fn header_names_the_charset() {
        assert_eq!(
            render_xml_header(Charset::utf8()),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>"
        );
    }

    #[test]
    fn utf16_is_read_only() {
        let utf16 = Charset::for_label("utf-16le").unwrap();
        assert!(!utf16.is_writable());
        assert!(matches!(utf16.encode("x"), Err(SaveError::Encoding(_))));
        assert_eq!(utf16.decode(&[b'o', 0, b'k', 0]).unwrap(), "ok");
    }

    #[test]
    fn unmappable_characters_become_references() {
        let latin = Charset::for_label("windows-1252").unwrap();
        let bytes = latin.encode("caf\u{e9} \u{4e2d}").unwrap();
        assert_eq!(&bytes[..], b"caf\xe9 &#20013;");
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(matches!(
            Charset::utf8().decode(b"\xff\xfe\xfd"),
            Err(SaveError::Encoding(_))
        ));
        assert_eq!(Charset::utf8().decode(b"\xef\xbb\xbfok").unwrap(), "ok");
    }
}
