//! All error types for the resindex crate.
//!
//! These are returned from every fallible operation (decoding, lookup, reference
//! resolution, reload, etc.).

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ResType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ResType, found: ResType },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("reference chain exceeded {depth} hops")]
    ReferenceCycle { depth: usize },

    #[error("reload failed for {}", display_paths(.paths))]
    ReloadFailed { paths: Vec<PathBuf> },

    #[error("invalid density hint: {0}")]
    InvalidDensity(u32),

    #[error("invalid value `{value}` for {expected}")]
    InvalidValue { expected: ResType, value: String },

    #[error("invalid locale `{0}`")]
    InvalidLocale(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A convenience `Result` alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode(message.into())
    }

    /// Creates a `NotFound` error for a numeric id.
    pub fn id_not_found(id: u32) -> Self {
        Error::NotFound(format!("id {:#010x}", id))
    }

    /// Creates a `NotFound` error for a `(type, name)` pair.
    pub fn name_not_found(res_type: ResType, name: &str) -> Self {
        Error::NotFound(format!("{}:{}", res_type, name))
    }

    pub fn invalid_value(expected: ResType, value: impl Into<String>) -> Self {
        Error::InvalidValue {
            expected,
            value: value.into(),
        }
    }

    pub fn invalid_locale(tag: impl Into<String>) -> Self {
        Error::InvalidLocale(tag.into())
    }

    /// Whether this error rolls back manager state when raised during a reload.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::ReloadFailed { .. })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_not_found_error() {
        let error = Error::id_not_found(0x0100_0001);
        assert_eq!(error.to_string(), "resource not found: id 0x01000001");

        let error = Error::name_not_found(ResType::String, "app_name");
        assert_eq!(error.to_string(), "resource not found: string:app_name");
    }

    #[test]
    fn test_type_mismatch_error() {
        let error = Error::TypeMismatch {
            expected: ResType::String,
            found: ResType::Integer,
        };
        assert_eq!(
            error.to_string(),
            "type mismatch: expected string, found integer"
        );
    }

    #[test]
    fn test_decode_error() {
        let error = Error::decode("bad tag");
        assert_eq!(error.to_string(), "decode error: bad tag");
        assert!(error.is_rollback());
    }

    #[test]
    fn test_reload_failed_lists_paths() {
        let error = Error::ReloadFailed {
            paths: vec![PathBuf::from("a.hap"), PathBuf::from("b.hap")],
        };
        assert_eq!(error.to_string(), "reload failed for a.hap, b.hap");
        assert!(error.is_rollback());
    }

    #[test]
    fn test_local_errors_do_not_roll_back() {
        let errors = vec![
            Error::NotFound("x".to_string()),
            Error::ReferenceCycle { depth: 20 },
            Error::InvalidDensity(130),
            Error::invalid_value(ResType::Boolean, "yes"),
        ];
        for error in errors {
            assert!(!error.is_rollback(), "{error}");
        }
    }

    #[test]
    fn test_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = Error::Io(io_error);
        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_debug() {
        let error = Error::InvalidDensity(7);
        let debug = format!("{:?}", error);
        assert!(debug.contains("InvalidDensity"));
        assert!(debug.contains('7'));
    }
}
