//! Consistency checks between the definition source and the running code.
//!
//! Two markers are kept: the `_version` declared inside the source and a
//! SHA-1 checksum of the source content. Mismatches are warnings; only a
//! source that cannot be read at all is fatal.

use std::fs;
use std::path::Path;

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::SaveError;
use crate::io_utils::classify_init_error;

/// Version markers of the loaded definition source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaVersion {
    /// `_version` as declared in the source (empty if absent)
    pub declared: String,
    /// Checksum of the source content
    pub checksum: String,
}

/// Non-fatal inconsistency found by [`SchemaVersion::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IntegrityWarning {
    VersionMismatch { expected: String, found: String },
    ChecksumMismatch { expected: String, found: String },
}

/// Computes the checksum of a definition source.
///
/// Line terminators (`\n`, `\r\n`, `\r`) are not part of the digest, so the
/// same content checks out identically on every platform.
pub fn compute_checksum(source: &[u8]) -> String {
    let mut hasher = Sha1::new();
    for line in source.split(|b| *b == b'\n' || *b == b'\r') {
        hasher.update(line);
    }
    hex::encode(hasher.finalize())
}

/// Reads `path` and computes its checksum.
pub fn checksum_file(path: &Path) -> Result<String, SaveError> {
    let bytes = fs::read(path).map_err(|e| {
        classify_init_error(
            e,
            &format!(
                "Can't compute checksum for definition source '{}'",
                path.display()
            ),
        )
    })?;
    Ok(compute_checksum(&bytes))
}

impl SchemaVersion {
    pub fn new(declared: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            declared: declared.into(),
            checksum: checksum.into(),
        }
    }

    /// Compares against the versions the running code expects.
    ///
    /// Every mismatch is logged and returned; none of them abort.
    pub fn verify(
        &self,
        expected_version: &str,
        expected_checksum: Option<&str>,
    ) -> Vec<IntegrityWarning> {
        let mut warnings = Vec::new();

        if !expected_version.eq_ignore_ascii_case(&self.declared) {
            tracing::warn!(
                "Bad _version - expected {}, found {}.",
                expected_version,
                self.declared
            );
            warnings.push(IntegrityWarning::VersionMismatch {
                expected: expected_version.to_string(),
                found: self.declared.clone(),
            });
        }

        if let Some(expected) = expected_checksum {
            if !expected.eq_ignore_ascii_case(&self.checksum) {
                tracing::warn!(
                    "Definition source checksum mismatch - expected {}, found {}. \
                     Code and alias definitions may be out of step.",
                    expected,
                    self.checksum
                );
                warnings.push(IntegrityWarning::ChecksumMismatch {
                    expected: expected.to_string(),
                    found: self.checksum.clone(),
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha1("") and sha1("abc")
    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    #[test]
    fn checksum_of_known_inputs() {
        assert_eq!(compute_checksum(b""), EMPTY_SHA1);
        assert_eq!(compute_checksum(b"abc"), ABC_SHA1);
    }

    #[test]
    fn checksum_ignores_line_endings() {
        let unix = compute_checksum(b"a=b\nc=d\n");
        let windows = compute_checksum(b"a=b\r\nc=d\r\n");
        let mac = compute_checksum(b"a=b\rc=d");
        assert_eq!(unix, windows);
        assert_eq!(unix, mac);
        assert_eq!(unix, compute_checksum(b"a=bc=d"));
    }

    #[test]
    fn checksum_is_deterministic() {
        let source = b"_version=4.0\nTestPlan=org.example.TestPlan\n";
        assert_eq!(compute_checksum(source), compute_checksum(source));
        assert_ne!(
            compute_checksum(source),
            compute_checksum(b"_version=4.1\nTestPlan=org.example.TestPlan\n")
        );
    }

    #[test]
    fn version_compare_is_case_insensitive() {
        let version = SchemaVersion::new("4.0-RC", "abc");
        assert!(version.verify("4.0-rc", None).is_empty());
    }

    #[test]
    fn mismatches_are_reported_not_fatal() {
        let version = SchemaVersion::new("3.2", "abc");
        let warnings = version.verify("4.0", Some("def"));
        assert_eq!(
            warnings,
            vec![
                IntegrityWarning::VersionMismatch {
                    expected: "4.0".to_string(),
                    found: "3.2".to_string(),
                },
                IntegrityWarning::ChecksumMismatch {
                    expected: "def".to_string(),
                    found: "abc".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unreadable_source_is_fatal() {
        let err = checksum_file(Path::new("/nonexistent/saveservice.properties")).unwrap_err();
        assert!(matches!(err, SaveError::Initialization(_)));
    }
}
