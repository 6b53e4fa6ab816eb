//! # validate-bcf Library
//!
//! Quality checks for BIM Collaboration Format (BCF) example containers: XSD
//! schema compliance of every document, agreement between each archive and its
//! extracted copy, identifier integrity and presentation hygiene. Findings are
//! reported as diagnostics and folded into a status bitmask.

pub mod cache;
pub mod checks;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_discovery;
pub mod libxml2;
pub mod output;
pub mod schema_loader;
pub mod source;
pub mod status;
pub mod validator;
pub mod version;

pub use cache::{ParsedCacheStats, ParsedSchemaCache};
pub use checks::{CheckContext, ContentMatchOptions, IdentifierRegistry};
pub use cli::{Cli, Command, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use error::{BcfError, ConfigError, LibXml2Error};
pub use file_discovery::FileDiscovery;
pub use libxml2::{LibXml2Wrapper, XmlDiagnostic, XmlSchemaPtr};
pub use output::{Category, Diagnostic, Location, OutputFormat, Reporter};
pub use schema_loader::{DocumentKind, SchemaLoader};
pub use source::{ArchiveSource, BcfSource, FolderSource};
pub use status::Status;
pub use validator::{CheckOptions, CheckRunner};
pub use version::BcfVersion;
