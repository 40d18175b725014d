//! Save service error types.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where in a document a decode failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// File the document was read from, if known
    pub file: Option<PathBuf>,
    /// 1-based line of the offending element
    pub line: Option<usize>,
    /// Element path from the document root, e.g. `/jmeterTestPlan/hashTree`
    pub path: Option<String>,
}

impl Location {
    /// Location of an element at `line` reached through `path`.
    pub fn at(line: usize, path: impl Into<String>) -> Self {
        Self {
            file: None,
            line: Some(line),
            path: Some(path.into()),
        }
    }

    /// Location known only by line.
    pub fn line(line: usize) -> Self {
        Self {
            file: None,
            line: Some(line),
            path: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, " in '{}'", file.display())?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path {})", path)?;
        }
        Ok(())
    }
}

/// Save service errors.
#[derive(Error, Debug, Clone)]
pub enum SaveError {
    /// Definition source missing or unreadable; the service cannot start
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// A converter named in the definition source could not be registered
    #[error("Can't register converter '{converter}': {reason}")]
    ConverterRegistration { converter: String, reason: String },

    /// A tag maps to no known or migrated type
    #[error("Cannot determine type for element '{name}'{location}")]
    UnresolvableType { name: String, location: Location },

    /// Structural decode failure
    #[error("Malformed document: {message}{location}")]
    MalformedDocument { message: String, location: Location },

    /// Charset unknown or unusable for the requested direction
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A value in the graph could not be written
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error on a sink or source
    #[error("I/O error: {0}")]
    Io(String),
}

impl SaveError {
    /// Structural failure without location information.
    pub fn malformed(message: impl Into<String>) -> Self {
        SaveError::MalformedDocument {
            message: message.into(),
            location: Location::default(),
        }
    }

    /// Structural failure at a known location.
    pub fn malformed_at(message: impl Into<String>, location: Location) -> Self {
        SaveError::MalformedDocument {
            message: message.into(),
            location,
        }
    }

    /// Attaches the originating file to location-carrying errors.
    pub fn in_file(self, file: &Path) -> Self {
        match self {
            SaveError::UnresolvableType { name, mut location } => {
                location.file = Some(file.to_path_buf());
                SaveError::UnresolvableType { name, location }
            }
            SaveError::MalformedDocument {
                message,
                mut location,
            } => {
                location.file = Some(file.to_path_buf());
                SaveError::MalformedDocument { message, location }
            }
            other => other,
        }
    }

    /// Location of a decode failure, if this error carries one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SaveError::UnresolvableType { location, .. }
            | SaveError::MalformedDocument { location, .. } => Some(location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_message_names_tag_and_position() {
        let err = SaveError::UnresolvableType {
            name: "UnknownWidget".to_string(),
            location: Location::at(7, "/jmeterTestPlan/hashTree/UnknownWidget"),
        };
        let msg = err.to_string();
        assert!(msg.contains("UnknownWidget"));
        assert!(msg.contains("line 7"));
        assert!(msg.contains("/jmeterTestPlan/hashTree"));
    }

    #[test]
    fn in_file_only_touches_located_errors() {
        let err = SaveError::malformed_at("bad", Location::line(3)).in_file(Path::new("plan.jmx"));
        assert_eq!(
            err.location().and_then(|l| l.file.clone()),
            Some(PathBuf::from("plan.jmx"))
        );

        let err = SaveError::Encoding("x".to_string()).in_file(Path::new("plan.jmx"));
        assert!(err.location().is_none());
    }
}
