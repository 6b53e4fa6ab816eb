use std::fmt;

use serde::Serialize;

use crate::source::BcfSource;

/// Name of the marker entry holding the format version
pub const VERSION_MARKER: &str = "bcf.version";

/// Supported BCF format versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BcfVersion {
    V2_0,
    V2_1,
    V3_0,
    Unknown,
}

impl BcfVersion {
    /// Tokens in matching priority; the first contained token wins
    const TOKENS: [(&'static str, BcfVersion); 3] = [
        ("3.0", BcfVersion::V3_0),
        ("2.1", BcfVersion::V2_1),
        ("2.0", BcfVersion::V2_0),
    ];

    /// Map the free text of the marker entry to a version
    pub fn from_marker(content: &str) -> BcfVersion {
        let content = content.to_lowercase();
        Self::TOKENS
            .iter()
            .find(|(token, _)| content.contains(token))
            .map(|(_, version)| *version)
            .unwrap_or(BcfVersion::Unknown)
    }

    /// Read the marker entry of a source; absent or unreadable markers are `Unknown`
    pub fn resolve(source: &dyn BcfSource) -> BcfVersion {
        match source.read(VERSION_MARKER) {
            Ok(Some(bytes)) => Self::from_marker(&String::from_utf8_lossy(&bytes)),
            Ok(None) => {
                tracing::debug!(source = %source.root().display(), "version marker missing");
                BcfVersion::Unknown
            }
            Err(e) => {
                tracing::warn!(source = %source.root().display(), error = %e, "version marker unreadable");
                BcfVersion::Unknown
            }
        }
    }

    /// Folder name holding this version's schemas, `None` for `Unknown`
    pub fn schema_folder(self) -> Option<&'static str> {
        match self {
            BcfVersion::V2_0 => Some("v2.0"),
            BcfVersion::V2_1 => Some("v2.1"),
            BcfVersion::V3_0 => Some("v3.0"),
            BcfVersion::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != BcfVersion::Unknown
    }
}

impl fmt::Display for BcfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BcfVersion::V2_0 => "2.0",
            BcfVersion::V2_1 => "2.1",
            BcfVersion::V3_0 => "3.0",
            BcfVersion::Unknown => "unknown",
        };
        f.write_str(text)
    }
}
