//! All error types for the locsync crate.
//!
//! These are returned from every fallible operation (parsing, merging,
//! serialization, writing). Callers that only need the coarse category can
//! use [`Error::kind`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("merge error for key `{key}`: {message}")]
    Merge { key: String, message: String },

    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    #[error("invalid key pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup of `{}` to `{}` failed: {source}", path.display(), backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse error category, used by callers to map failures to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Merge,
    Io,
    Format,
}

impl Error {
    /// Creates a parse error located at `line` (1-based).
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    /// Creates a merge error for `key`.
    pub fn merge(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Merge {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { .. } | Error::Encoding(_) => ErrorKind::Parse,
            Error::Merge { .. } => ErrorKind::Merge,
            Error::Io { .. } | Error::Backup { .. } => ErrorKind::Io,
            Error::UnknownFormat(_) | Error::FormatMismatch(_) | Error::InvalidPattern { .. } => {
                ErrorKind::Format
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unknown_format_error() {
        let error = Error::UnknownFormat("invalid_format".to_string());
        assert_eq!(error.to_string(), "unknown format `invalid_format`");
        assert_eq!(error.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let error = Error::parse(12, "unterminated string");
        assert_eq!(
            error.to_string(),
            "parse error at line 12: unterminated string"
        );
        assert_eq!(error.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_merge_error_names_key() {
        let error = Error::merge("items_count", "plural entry collides with flat entry");
        assert_eq!(
            error.to_string(),
            "merge error for key `items_count`: plural entry collides with flat entry"
        );
        assert_eq!(error.kind(), ErrorKind::Merge);
    }

    #[test]
    fn test_io_error_includes_path() {
        let error = Error::io(
            "fr.lproj/Localizable.strings",
            io::Error::new(io::ErrorKind::NotFound, "File not found"),
        );
        let message = error.to_string();
        assert!(message.contains("fr.lproj/Localizable.strings"));
        assert!(message.contains("File not found"));
        assert_eq!(error.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_backup_error_is_io_kind() {
        let error = Error::Backup {
            path: PathBuf::from("a.strings"),
            backup: PathBuf::from("a.strings.bak"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("a.strings.bak"));
        assert_eq!(error.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_encoding_error_is_parse_kind() {
        let error = Error::Encoding("malformed UTF-16".to_string());
        assert_eq!(error.to_string(), "encoding error: malformed UTF-16");
        assert_eq!(error.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_error_debug() {
        let error = Error::UnknownFormat("test".to_string());
        let debug = format!("{:?}", error);
        assert!(debug.contains("UnknownFormat"));
        assert!(debug.contains("test"));
    }
}
