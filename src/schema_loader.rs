use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::ParsedSchemaCache;
use crate::error::{BcfError, Result};
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::version::{BcfVersion, VERSION_MARKER};

/// Name of the schema folder looked up next to inputs and the executable
pub const SCHEMAS_FOLDER: &str = "schemas";

/// Type library every 3.0 schema depends on
pub const SHARED_TYPES_SCHEMA: &str = "shared-types.xsd";

/// Kinds of documents inside a BCF container, each with its own schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Markup,
    Visualization,
    Project,
    VersionMarker,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Markup,
        DocumentKind::Visualization,
        DocumentKind::Project,
        DocumentKind::VersionMarker,
    ];

    pub fn schema_file_name(self) -> &'static str {
        match self {
            DocumentKind::Markup => "markup.xsd",
            DocumentKind::Visualization => "visinfo.xsd",
            DocumentKind::Project => "project.xsd",
            DocumentKind::VersionMarker => "version.xsd",
        }
    }

    /// Suffix used to enumerate documents of this kind from a source
    pub fn suffix(self) -> &'static str {
        match self {
            DocumentKind::Markup => ".bcf",
            DocumentKind::Visualization => ".bcfv",
            DocumentKind::Project => ".bcfp",
            DocumentKind::VersionMarker => VERSION_MARKER,
        }
    }

    /// Whether an entry name holds a document of this kind
    pub fn matches(self, name: &str) -> bool {
        match self {
            DocumentKind::VersionMarker => {
                name.rsplit('/').next().is_some_and(|file| file == VERSION_MARKER)
            }
            other => name.ends_with(other.suffix()),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DocumentKind::Markup => "markup",
            DocumentKind::Visualization => "visualization",
            DocumentKind::Project => "project",
            DocumentKind::VersionMarker => "version",
        };
        f.write_str(text)
    }
}

/// Locates, compiles and caches the XSD schema sets of each BCF version
///
/// Schema roots are searched in order: the explicit folder from the command
/// line, the configured folder, the nearest `schemas` folder above the input,
/// `./schemas`, and `schemas` next to the executable. A root holding
/// `v2.0`/`v2.1`/`v3.0` subfolders is a per-version tree; any other root is
/// used as-is for every version.
pub struct SchemaLoader {
    explicit: Option<PathBuf>,
    configured: Option<PathBuf>,
    wrapper: LibXml2Wrapper,
    cache: ParsedSchemaCache,
}

impl SchemaLoader {
    pub fn new(explicit: Option<PathBuf>, configured: Option<PathBuf>) -> Self {
        Self {
            explicit,
            configured,
            wrapper: LibXml2Wrapper::new(),
            cache: ParsedSchemaCache::default(),
        }
    }

    /// Schema root to use for an input, `None` when nothing was found
    pub fn locate_root(&self, input: &Path) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            return Some(explicit.clone());
        }
        if let Some(configured) = &self.configured {
            return Some(configured.clone());
        }

        let nearest = input
            .ancestors()
            .skip(1)
            .map(|ancestor| ancestor.join(SCHEMAS_FOLDER))
            .find(|candidate| candidate.is_dir());
        if nearest.is_some() {
            return nearest;
        }

        let working = PathBuf::from(SCHEMAS_FOLDER);
        if working.is_dir() {
            return Some(working);
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SCHEMAS_FOLDER)))
            .filter(|bundled| bundled.is_dir())
    }

    /// Schema files making up the set for a version and document kind
    ///
    /// Every file must exist; the first missing one is reported.
    pub fn schema_files(
        &self,
        input: &Path,
        version: BcfVersion,
        kind: DocumentKind,
    ) -> Result<Vec<PathBuf>> {
        let root = self
            .locate_root(input)
            .ok_or_else(|| BcfError::SchemaNotFound {
                path: PathBuf::from(SCHEMAS_FOLDER),
            })?;
        let folder_name = version
            .schema_folder()
            .ok_or_else(|| BcfError::SchemaNotFound { path: root.clone() })?;

        let per_version = root.join(folder_name);
        let folder = if per_version.is_dir() { per_version } else { root };

        let mut files = vec![folder.join(kind.schema_file_name())];
        if version == BcfVersion::V3_0 {
            files.push(folder.join(SHARED_TYPES_SCHEMA));
        }

        if let Some(missing) = files.iter().find(|file| !file.is_file()) {
            return Err(BcfError::SchemaNotFound {
                path: missing.clone(),
            });
        }
        Ok(files)
    }

    /// Compiled schema set for a version and document kind, cached per run
    pub fn load(
        &self,
        input: &Path,
        version: BcfVersion,
        kind: DocumentKind,
    ) -> Result<XmlSchemaPtr> {
        let files = self.schema_files(input, version, kind)?;
        tracing::debug!(?files, %version, %kind, "loading schema set");

        self.cache
            .get_or_load(files.clone(), || self.wrapper.parse_schema_files(&files))
            .map_err(|source| BcfError::SchemaCompilation {
                name: files[0].display().to_string(),
                source,
            })
    }

    pub fn wrapper(&self) -> &LibXml2Wrapper {
        &self.wrapper
    }

    pub fn cache(&self) -> &ParsedSchemaCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VERSION_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="Version" type="xs:string"/>
</xs:schema>"#;

    #[test]
    fn test_document_kind_matching() {
        assert!(DocumentKind::Markup.matches("topic/markup.bcf"));
        assert!(!DocumentKind::Markup.matches("topic/viewpoint.bcfv"));
        assert!(DocumentKind::Visualization.matches("topic/viewpoint.bcfv"));
        assert!(DocumentKind::Project.matches("project.bcfp"));
        assert!(DocumentKind::VersionMarker.matches("bcf.version"));
        assert!(!DocumentKind::VersionMarker.matches("old-bcf.version"));
        assert_eq!(DocumentKind::Visualization.schema_file_name(), "visinfo.xsd");
    }

    #[test]
    fn test_per_version_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("schemas");
        fs::create_dir_all(root.join("v2.1")).unwrap();
        fs::create_dir_all(root.join("v3.0")).unwrap();
        fs::write(root.join("v2.1/version.xsd"), VERSION_XSD).unwrap();
        fs::write(root.join("v3.0/version.xsd"), VERSION_XSD).unwrap();

        let loader = SchemaLoader::new(Some(root.clone()), None);
        let input = temp_dir.path().join("case.bcfzip");

        let files = loader
            .schema_files(&input, BcfVersion::V2_1, DocumentKind::VersionMarker)
            .unwrap();
        assert_eq!(files, vec![root.join("v2.1/version.xsd")]);

        match loader.schema_files(&input, BcfVersion::V3_0, DocumentKind::VersionMarker) {
            Err(BcfError::SchemaNotFound { path }) => {
                assert_eq!(path, root.join("v3.0").join(SHARED_TYPES_SCHEMA))
            }
            other => panic!("Expected SchemaNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_folder_is_used_for_every_version() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("markup.xsd"), VERSION_XSD).unwrap();

        let loader = SchemaLoader::new(None, Some(temp_dir.path().to_path_buf()));
        let files = loader
            .schema_files(Path::new("case.bcf"), BcfVersion::V2_0, DocumentKind::Markup)
            .unwrap();
        assert_eq!(files, vec![temp_dir.path().join("markup.xsd")]);
    }

    #[test]
    fn test_nearest_schemas_folder_above_input() {
        let temp_dir = TempDir::new().unwrap();
        let schemas = temp_dir.path().join("schemas");
        let nested = temp_dir.path().join("cases/topic");
        fs::create_dir_all(&schemas).unwrap();
        fs::create_dir_all(&nested).unwrap();

        let loader = SchemaLoader::new(None, None);
        assert_eq!(
            loader.locate_root(&nested.join("case.bcf")),
            Some(schemas)
        );
    }

    #[test]
    fn test_load_compiles_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("version.xsd"), VERSION_XSD).unwrap();
        fs::write(temp_dir.path().join("markup.xsd"), "<broken").unwrap();

        let loader = SchemaLoader::new(Some(temp_dir.path().to_path_buf()), None);
        let input = Path::new("case.bcf");

        let schema = loader
            .load(input, BcfVersion::V2_1, DocumentKind::VersionMarker)
            .unwrap();
        assert!(!schema.as_ptr().is_null());
        assert_eq!(loader.cache().stats().entry_count, 1);

        assert!(matches!(
            loader.load(input, BcfVersion::V2_1, DocumentKind::Markup),
            Err(BcfError::SchemaCompilation { .. })
        ));
        assert!(matches!(
            loader.load(input, BcfVersion::V2_1, DocumentKind::Project),
            Err(BcfError::SchemaNotFound { .. })
        ));
    }
}
