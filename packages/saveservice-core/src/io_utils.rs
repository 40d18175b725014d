//! I/O utilities for save and load operations.

use std::io::ErrorKind;

use crate::error::SaveError;

/// Classifies I/O errors into specific SaveError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> SaveError {
    match error.kind() {
        ErrorKind::InvalidData => SaveError::Encoding(format!("{}: {}", context, error)),
        _ => SaveError::Io(format!("{}: {}", context, error)),
    }
}

/// Classifies an I/O error raised while reading the definition source.
///
/// Without the source the alias registry cannot be populated, so every
/// failure here is fatal.
pub fn classify_init_error(error: std::io::Error, context: &str) -> SaveError {
    SaveError::Initialization(format!("{}: {}", context, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn invalid_data_is_an_encoding_problem() {
        let err = classify_io_error(io::Error::new(ErrorKind::InvalidData, "bad bytes"), "read");
        assert!(matches!(err, SaveError::Encoding(_)));
    }

    #[test]
    fn missing_file_is_io() {
        let err = classify_io_error(io::Error::new(ErrorKind::NotFound, "gone"), "open");
        match err {
            SaveError::Io(msg) => assert!(msg.starts_with("open: ")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_kinds_are_io() {
        for kind in [ErrorKind::WriteZero, ErrorKind::UnexpectedEof, ErrorKind::Other] {
            let err = classify_io_error(io::Error::new(kind, "short"), "write");
            assert!(matches!(err, SaveError::Io(_)), "{kind:?}");
        }
    }

    #[test]
    fn init_errors_are_fatal() {
        let err = classify_init_error(io::Error::new(ErrorKind::NotFound, "gone"), "checksum");
        assert!(matches!(err, SaveError::Initialization(_)));
    }
}
