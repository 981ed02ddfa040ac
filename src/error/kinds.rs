use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExportError {
    /// Schema inference or layout errors.
    Schema(SchemaError),

    /// Writer lifecycle and backend errors.
    Writer(WriterError),

    /// Configuration errors.
    Config(ConfigError),

    /// Document source failures.
    Source(String),

    /// I/O errors.
    Io(io::Error),

    /// JSON encoding or decoding errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Schema-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two observed shapes cannot be reconciled.
    Conflict { path: String, detail: String },

    /// A saved table layout no longer maps onto the computed schema.
    Mismatch(String),
}

/// Writer-specific errors.
#[derive(Debug)]
pub enum WriterError {
    /// `open` called on a writer that is already open.
    AlreadyOpen,

    /// Table operation attempted before `open`.
    NotOpen,

    /// Operation attempted after `close`.
    Closed,

    /// Row addressed to a table that was never added.
    UnknownTable(String),

    /// Format backend failure.
    Backend(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Schema(e) => write!(f, "Schema error: {e}"),
            ExportError::Writer(e) => write!(f, "Writer error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Source(msg) => write!(f, "Document source error: {msg}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Json(e) => write!(f, "JSON error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Conflict { path, detail } => {
                if path.is_empty() {
                    write!(f, "Schema conflict at document root: {detail}")
                } else {
                    write!(f, "Schema conflict at '{path}': {detail}")
                }
            }
            SchemaError::Mismatch(msg) => write!(f, "Schema mismatch: {msg}"),
        }
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::AlreadyOpen => write!(f, "Writer is already open"),
            WriterError::NotOpen => write!(f, "Writer is not open"),
            WriterError::Closed => write!(f, "Writer has been closed"),
            WriterError::UnknownTable(tag) => write!(f, "Unknown table: {tag}"),
            WriterError::Backend(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value for '{field}': {value}")
            }
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for SchemaError {}
impl std::error::Error for WriterError {}
impl std::error::Error for ConfigError {}

impl ExportError {
    /// Whether this error is a saved-layout mismatch that a schema rebuild can fix
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, ExportError::Schema(SchemaError::Mismatch(_)))
    }
}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

impl From<SchemaError> for ExportError {
    fn from(err: SchemaError) -> Self {
        ExportError::Schema(err)
    }
}

impl From<WriterError> for ExportError {
    fn from(err: WriterError) -> Self {
        ExportError::Writer(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Writer(WriterError::Backend(format!("CSV error: {err}")))
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Writer(WriterError::Backend(format!("Archive error: {err}")))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Writer(WriterError::Backend(format!("Workbook error: {err}")))
    }
}

impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display_names_path() {
        let err = ExportError::from(SchemaError::Conflict {
            path: "form.items".to_string(),
            detail: "list cannot merge with object".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Schema error: Schema conflict at 'form.items': list cannot merge with object"
        );
    }

    #[test]
    fn test_mismatch_detection() {
        let err = ExportError::from(SchemaError::Mismatch("column 'a' missing".into()));
        assert!(err.is_schema_mismatch());
        assert!(!ExportError::from("boom").is_schema_mismatch());
    }
}
