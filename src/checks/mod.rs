//! Checks run against each BCF container
//!
//! Every check reports what it finds through the [`Reporter`](crate::output::Reporter)
//! and only returns an error when the tool itself fails (output stream or
//! file system writes).

pub mod content_match;
pub mod hygiene;
pub mod identifiers;
pub mod schema;

use std::path::Path;

use roxmltree::{Document, Node};

use crate::output::Location;
use crate::source::BcfSource;
use crate::version::BcfVersion;

pub use content_match::{ContentMatchOptions, check_content_match, contents_match, rebuild_archive};
pub use hygiene::{check_folder_names, check_image_sizes, check_new_lines, check_referenced_files};
pub use identifiers::{IdentifierRegistry, check_unique_ids};
pub use schema::{check_schema_compliance, check_schema_definitions};

/// One container under check
pub struct CheckContext<'a> {
    /// The archive file
    pub archive: &'a Path,
    /// The extracted mirror folder, when it exists
    pub mirror: Option<&'a Path>,
    /// Source the document checks read from
    pub source: &'a dyn BcfSource,
    pub version: BcfVersion,
    /// Diagnostic subjects are shown relative to this folder
    pub base: &'a Path,
}

impl CheckContext<'_> {
    pub fn subject(&self, path: &Path) -> String {
        path.strip_prefix(self.base)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    pub fn entry_subject(&self, name: &str) -> String {
        self.subject(&self.source.root().join(name))
    }
}

/// Decode document bytes for XML navigation, dropping a leading byte order mark
pub(crate) fn document_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Line and column of an element's start tag
pub(crate) fn node_location(doc: &Document<'_>, node: Node<'_, '_>) -> Location {
    let pos = doc.text_pos_at(node.range().start);
    Location::new(pos.row, pos.col)
}

/// Whether an element sits at `path`, given as local names from the root down
///
/// A `*` segment matches any element name.
pub(crate) fn matches_path(node: Node<'_, '_>, path: &[&str]) -> bool {
    if !node.is_element() {
        return false;
    }
    let mut segments = path.iter().rev();
    let mut current = Some(node);
    while let Some(element) = current {
        match segments.next() {
            Some(&segment) if segment == "*" || segment == element.tag_name().name() => {}
            _ => return false,
        }
        current = element.parent_element();
    }
    segments.next().is_none()
}
