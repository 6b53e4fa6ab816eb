use std::collections::HashMap;

use roxmltree::Document;

use super::{CheckContext, document_text, matches_path, node_location};
use crate::error::Result;
use crate::output::{Category, Diagnostic, Location, Reporter};

/// Positions declaring an identifier in their `Guid` attribute
const DECLARATIONS: [(&[&str], &str); 5] = [
    (&["*", "Topic"], "topic"),
    (&["*", "Comment"], "comment"),
    (&["*", "Topic", "Comments", "Comment"], "comment"),
    (&["*", "Viewpoints"], "viewpoint"),
    (&["*", "Topic", "Viewpoints", "ViewPoint"], "viewpoint"),
];

/// Positions citing an identifier declared elsewhere
const REFERENCES: [(&[&str], &str); 6] = [
    (&["*", "Comment", "Viewpoint"], "viewpoint"),
    (&["*", "Topic", "Comments", "Comment", "Viewpoint"], "viewpoint"),
    (&["*", "Comment", "ReplyToComment"], "comment"),
    (&["*", "Topic", "RelatedTopic"], "topic"),
    (&["*", "Topic", "RelatedTopics", "RelatedTopic"], "topic"),
    (&["VisualizationInfo"], "viewpoint"),
];

const GUID_ATTRIBUTE: &str = "Guid";

/// Identifiers declared so far in a run, with the document declaring each first
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    declared: HashMap<String, String>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration; on conflict the registry is unchanged and the
    /// first declaring document is returned
    pub fn declare(&mut self, id: &str, owner: &str) -> std::result::Result<(), &str> {
        if self.declared.contains_key(id) {
            return Err(self.declared[id].as_str());
        }
        self.declared.insert(id.to_string(), owner.to_string());
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.declared.contains_key(id)
    }

    pub fn owner(&self, id: &str) -> Option<&str> {
        self.declared.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

struct PendingReference {
    id: String,
    kind: &'static str,
    subject: String,
    location: Location,
}

fn check_capitalization(
    reporter: &mut Reporter,
    id: &str,
    subject: &str,
    location: Location,
) -> Result<()> {
    if id != id.to_lowercase() {
        reporter.report(
            Diagnostic::new(
                Category::Content,
                subject,
                format!("GUID '{}' is not lowercase", id),
            )
            .at(Some(location)),
        )?;
    }
    Ok(())
}

/// Check identifier uniqueness, capitalization and reference resolution
///
/// Markup and visualization documents are scanned in name order. References
/// are resolved only once every document of the source has been scanned, so
/// declaration order within the container does not matter.
pub fn check_unique_ids(
    ctx: &CheckContext<'_>,
    registry: &mut IdentifierRegistry,
    reporter: &mut Reporter,
) -> Result<()> {
    let mut names = ctx.source.names(".bcf")?;
    names.extend(ctx.source.names(".bcfv")?);
    names.sort();

    let mut pending: Vec<PendingReference> = Vec::new();

    for name in &names {
        let Some(bytes) = ctx.source.read(name)? else {
            continue;
        };
        let subject = ctx.entry_subject(name);
        let text = document_text(&bytes);
        let doc = match Document::parse(&text) {
            Ok(doc) => doc,
            Err(e) => {
                let pos = e.pos();
                reporter.report(
                    Diagnostic::new(
                        Category::Content,
                        &subject,
                        format!("XML ERROR: {}", e),
                    )
                    .at(Some(Location::new(pos.row, pos.col))),
                )?;
                continue;
            }
        };

        for node in doc.descendants().filter(|n| n.is_element()) {
            let Some(id) = node.attribute(GUID_ATTRIBUTE) else {
                continue;
            };

            if let Some((_, kind)) = DECLARATIONS.iter().find(|(path, _)| matches_path(node, path)) {
                let location = node_location(&doc, node);
                check_capitalization(reporter, id, &subject, location)?;
                if let Err(first) = registry.declare(id, &subject) {
                    let message = format!("GUID '{}' duplicated ({}), also found in {}", id, kind, first);
                    reporter.report(
                        Diagnostic::new(Category::Content, &subject, message).at(Some(location)),
                    )?;
                }
            }

            if let Some((_, kind)) = REFERENCES.iter().find(|(path, _)| matches_path(node, path)) {
                let location = node_location(&doc, node);
                check_capitalization(reporter, id, &subject, location)?;
                pending.push(PendingReference {
                    id: id.to_string(),
                    kind: *kind,
                    subject: subject.clone(),
                    location,
                });
            }
        }
    }

    for reference in pending {
        if !registry.contains(&reference.id) {
            reporter.report(
                Diagnostic::new(
                    Category::Content,
                    reference.subject,
                    format!(
                        "GUID '{}' referenced as {} is not declared",
                        reference.id, reference.kind
                    ),
                )
                .at(Some(reference.location)),
            )?;
        }
    }

    tracing::debug!(
        documents = names.len(),
        registered = registry.len(),
        "identifier check finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputFormat, SharedBuffer};
    use crate::source::FolderSource;
    use crate::version::BcfVersion;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run(root: &Path, registry: &mut IdentifierRegistry) -> (Reporter, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let mut reporter = Reporter::new(Box::new(buffer.clone()), OutputFormat::Human);
        let source = FolderSource::new(root);
        let ctx = CheckContext {
            archive: root,
            mirror: Some(root),
            source: &source,
            version: BcfVersion::V2_1,
            base: root,
        };
        check_unique_ids(&ctx, registry, &mut reporter).unwrap();
        (reporter, buffer)
    }

    #[test]
    fn test_registry_keeps_first_owner() {
        let mut registry = IdentifierRegistry::new();
        assert!(registry.declare("a", "first.bcf").is_ok());
        assert_eq!(registry.declare("a", "second.bcf"), Err("first.bcf"));
        assert_eq!(registry.owner("a"), Some("first.bcf"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_clean_container() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(
            root,
            "t1/markup.bcf",
            r#"<Markup>
  <Topic Guid="t1"><RelatedTopic Guid="t2"/></Topic>
  <Comment Guid="c1"><Viewpoint Guid="v1"/></Comment>
  <Viewpoints Guid="v1"/>
</Markup>"#,
        );
        write(root, "t1/viewpoint.bcfv", r#"<VisualizationInfo Guid="v1"/>"#);
        write(root, "t2/markup.bcf", r#"<Markup><Topic Guid="t2"/></Markup>"#);

        let mut registry = IdentifierRegistry::new();
        let (reporter, _) = run(root, &mut registry);
        assert_eq!(reporter.total(), 0);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_duplicate_names_first_document() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/markup.bcf", r#"<Markup><Topic Guid="same"/></Markup>"#);
        write(root, "b/markup.bcf", r#"<Markup><Topic Guid="same"/></Markup>"#);

        let (reporter, buffer) = run(root, &mut IdentifierRegistry::new());
        assert_eq!(reporter.count(Category::Content), 1);
        let text = buffer.contents();
        assert!(text.contains("b/markup.bcf"));
        assert!(text.contains("also found in a/markup.bcf"));
    }

    #[test]
    fn test_dangling_references_reported_per_occurrence() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(
            root,
            "a/markup.bcf",
            r#"<Markup>
  <Topic Guid="t1">
    <Comments>
      <Comment Guid="c1"><Viewpoint Guid="missing"/></Comment>
      <Comment Guid="c2"><Viewpoint Guid="missing"/></Comment>
    </Comments>
  </Topic>
</Markup>"#,
        );

        let (reporter, buffer) = run(root, &mut IdentifierRegistry::new());
        assert_eq!(reporter.count(Category::Content), 2);
        let text = buffer.contents();
        assert!(text.contains("a/markup.bcf:4:"));
        assert!(text.contains("a/markup.bcf:5:"));
    }

    #[test]
    fn test_reference_declared_in_later_document() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(
            root,
            "a/markup.bcf",
            r#"<Markup><Topic Guid="t1"><RelatedTopics><RelatedTopic Guid="t9"/></RelatedTopics></Topic></Markup>"#,
        );
        write(root, "z/markup.bcf", r#"<Markup><Topic Guid="t9"/></Markup>"#);

        let (reporter, _) = run(root, &mut IdentifierRegistry::new());
        assert_eq!(reporter.total(), 0);
    }

    #[test]
    fn test_uppercase_reported_once_besides_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/markup.bcf", r#"<Markup><Topic Guid="ABC"/></Markup>"#);

        let mut registry = IdentifierRegistry::new();
        let (reporter, buffer) = run(root, &mut registry);
        assert_eq!(reporter.count(Category::Content), 1);
        assert!(buffer.contents().contains("not lowercase"));

        // the same container seen again in the sweep adds the duplicate
        let (reporter, buffer) = run(root, &mut registry);
        assert_eq!(reporter.count(Category::Content), 2);
        assert!(buffer.contents().contains("duplicated"));
    }

    #[test]
    fn test_uppercase_reference_reported_at_its_own_line() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(
            root,
            "t9/markup.bcf",
            "<Markup>\n  <Topic Guid=\"T9\">\n    <RelatedTopic Guid=\"T9\"/>\n  </Topic>\n</Markup>",
        );

        let mut registry = IdentifierRegistry::new();
        let (reporter, buffer) = run(root, &mut registry);

        let text = buffer.contents();
        let lowercase: Vec<&str> = text.lines().filter(|l| l.contains("is not lowercase")).collect();
        assert_eq!(lowercase.len(), 2, "{}", text);
        assert!(lowercase[0].contains("t9/markup.bcf:2:"), "{}", lowercase[0]);
        assert!(lowercase[1].contains("t9/markup.bcf:3:"), "{}", lowercase[1]);
        assert!(!text.contains("duplicated"));
        assert!(!text.contains("not declared"));
        assert_eq!(reporter.count(Category::Content), 2);
        assert_eq!(registry.owner("T9"), Some("t9/markup.bcf"));
    }

    #[test]
    fn test_unparseable_document_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/markup.bcf", "<Markup><Topic Guid=\"t1\">");
        write(root, "b/markup.bcf", r#"<Markup><Topic Guid="t2"/></Markup>"#);

        let mut registry = IdentifierRegistry::new();
        let (reporter, buffer) = run(root, &mut registry);
        assert_eq!(reporter.count(Category::Content), 1);
        assert!(buffer.contents().contains("XML ERROR"));
        assert!(registry.contains("t2"));
        assert!(!registry.contains("t1"));
    }
}
