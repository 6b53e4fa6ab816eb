use std::path::PathBuf;

use thiserror::Error;

/// Main application error type for failures of the tool itself
///
/// Problems found in the checked files are never errors: they are reported as
/// diagnostics and folded into the run [`Status`](crate::status::Status).
#[derive(Error, Debug)]
pub enum BcfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing diagnostics failed; no later container can be reported either
    #[error("Output error: {0}")]
    Output(#[source] std::io::Error),

    #[error("Zip archive error: {path} - {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Schema not found: {path}")]
    SchemaNotFound { path: PathBuf },

    #[error("Schema compilation failed: {name} - {source}")]
    SchemaCompilation {
        name: String,
        #[source]
        source: LibXml2Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("Invalid input source: {path}")]
    InvalidSource { path: PathBuf },

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {}", .messages.join("; "))]
    SchemaParseFailed { messages: Vec<String> },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Invalid schema location: {path}")]
    InvalidLocation { path: PathBuf },

    #[error("Document too large for libxml2: {name} ({size} bytes)")]
    DocumentTooLarge { name: String, size: usize },

    #[error("Schema validation internal error: {name} returned {code}")]
    InternalError { name: String, code: i32 },
}

impl BcfError {
    /// Whether the error comes from the diagnostic stream rather than the checked files
    pub fn is_output(&self) -> bool {
        matches!(self, BcfError::Output(_))
    }
}

impl From<ConfigError> for BcfError {
    fn from(err: ConfigError) -> Self {
        BcfError::Config(err.to_string())
    }
}

impl From<LibXml2Error> for BcfError {
    fn from(err: LibXml2Error) -> Self {
        BcfError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BcfError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
