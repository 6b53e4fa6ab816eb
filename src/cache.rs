use std::path::PathBuf;
use std::sync::Arc;

use moka::sync::Cache;

use crate::error::{LibXml2Error, LibXml2Result};
use crate::libxml2::XmlSchemaPtr;

/// Key of a compiled schema set: the schema files it was compiled from, in order
pub type SchemaSetKey = Vec<PathBuf>;

/// In-memory cache for parsed libxml2 schema pointers
///
/// Compiling the BCF schema sets is the most expensive step of a sweep, and
/// every input of the same version uses the same sets. Entries are keyed by
/// the schema files so inputs resolving to different schema folders never
/// share a compiled schema. Compilation failures are not cached.
pub struct ParsedSchemaCache {
    cache: Cache<SchemaSetKey, XmlSchemaPtr>,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedCacheStats {
    pub entry_count: u64,
}

impl ParsedSchemaCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();

        Self { cache }
    }

    /// Get a parsed schema from the cache, or compile it if missing.
    ///
    /// The `loader` closure only runs when the key is missing.
    pub fn get_or_load<F>(&self, key: SchemaSetKey, loader: F) -> LibXml2Result<XmlSchemaPtr>
    where
        F: FnOnce() -> LibXml2Result<XmlSchemaPtr>,
    {
        self.cache
            .try_get_with(key, loader)
            .map_err(|e: Arc<LibXml2Error>| (*e).clone())
    }

    pub fn stats(&self) -> ParsedCacheStats {
        self.cache.run_pending_tasks();
        ParsedCacheStats {
            entry_count: self.cache.entry_count(),
        }
    }
}

impl Default for ParsedSchemaCache {
    fn default() -> Self {
        // four document kinds for each of the three versions
        Self::new(12)
    }
}
