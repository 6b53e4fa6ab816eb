use std::fs;
use std::path::Path;

use roxmltree::Document;

use super::{CheckContext, document_text, matches_path, node_location};
use crate::error::Result;
use crate::output::{Category, Diagnostic, Reporter};
use crate::source::normalize_name;

/// Document suffixes expected to be split over several lines
const TEXT_DOCUMENTS: [&str; 3] = [".bcf", ".bcfv", ".bcfp"];

/// Raster formats whose dimensions are limited
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Markup elements whose text names a file of the container
const FILE_REFERENCES: [&[&str]; 4] = [
    &["*", "Viewpoints", "Viewpoint"],
    &["*", "Viewpoints", "Snapshot"],
    &["*", "Topic", "Viewpoints", "ViewPoint", "Viewpoint"],
    &["*", "Topic", "Viewpoints", "ViewPoint", "Snapshot"],
];

/// Report documents written on fewer than `min_lines` lines
pub fn check_new_lines(
    ctx: &CheckContext<'_>,
    min_lines: usize,
    reporter: &mut Reporter,
) -> Result<()> {
    for suffix in TEXT_DOCUMENTS {
        for name in ctx.source.names(suffix)? {
            let Some(bytes) = ctx.source.read(&name)? else {
                continue;
            };
            let line_count = String::from_utf8_lossy(&bytes).lines().count();
            if line_count < min_lines {
                reporter.error(
                    Category::Content,
                    ctx.entry_subject(&name),
                    format!("Has {} lines", line_count),
                )?;
            }
        }
    }
    Ok(())
}

/// Report raster images wider or taller than `max_dimension` pixels
pub fn check_image_sizes(
    ctx: &CheckContext<'_>,
    max_dimension: usize,
    reporter: &mut Reporter,
) -> Result<()> {
    for name in ctx.source.names("")? {
        let is_image = name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if !is_image {
            continue;
        }
        let Some(bytes) = ctx.source.read(&name)? else {
            continue;
        };

        match imagesize::blob_size(&bytes) {
            Ok(size) if size.width > max_dimension || size.height > max_dimension => {
                reporter.error(
                    Category::Content,
                    ctx.entry_subject(&name),
                    format!("Is too big ({} x {}).", size.width, size.height),
                )?;
            }
            Ok(_) => {}
            Err(e) => {
                reporter.error(
                    Category::Content,
                    ctx.entry_subject(&name),
                    format!("Unreadable image: {}", e),
                )?;
            }
        }
    }
    Ok(())
}

/// Report immediate subfolders of the mirror whose name is not lowercase
pub fn check_folder_names(
    ctx: &CheckContext<'_>,
    mirror: &Path,
    reporter: &mut Reporter,
) -> Result<()> {
    let mut folders: Vec<String> = Vec::new();
    for entry in fs::read_dir(mirror)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    folders.sort();

    for folder in folders {
        if folder != folder.to_lowercase() {
            reporter.error(
                Category::Content,
                ctx.subject(&mirror.join(&folder)),
                format!("Folder name '{}' is not lowercase", folder),
            )?;
        }
    }
    Ok(())
}

/// Report viewpoint and snapshot files named by markup documents but absent
/// from the container
///
/// File names resolve relative to the folder of the markup document.
pub fn check_referenced_files(ctx: &CheckContext<'_>, reporter: &mut Reporter) -> Result<()> {
    let mut names = ctx.source.names(".bcf")?;
    names.sort();

    for name in &names {
        let Some(bytes) = ctx.source.read(name)? else {
            continue;
        };
        let text = document_text(&bytes);
        // unparseable documents are reported by the schema and identifier checks
        let Ok(doc) = Document::parse(&text) else {
            tracing::debug!(document = %name, "skipping unparseable markup");
            continue;
        };
        let folder = name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

        for node in doc.descendants().filter(|n| n.is_element()) {
            if !FILE_REFERENCES.iter().any(|path| matches_path(node, path)) {
                continue;
            }
            let Some(file) = node.text().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            let target = normalize_name(&format!("{}/{}", folder, file));
            if !ctx.source.exists(&target)? {
                reporter.report(
                    Diagnostic::new(
                        Category::Content,
                        ctx.entry_subject(name),
                        format!("Referenced file '{}' not found", file),
                    )
                    .at(Some(node_location(&doc, node))),
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputFormat, SharedBuffer};
    use crate::source::FolderSource;
    use crate::version::BcfVersion;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &[u8]) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Minimal PNG header declaring the given dimensions
    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes.extend_from_slice(&[0; 4]);
        bytes
    }

    fn with_context(root: &Path, check: impl FnOnce(&CheckContext<'_>, &mut Reporter)) -> (Reporter, String) {
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
        check(&ctx, &mut reporter);
        (reporter, buffer.contents())
    }

    #[test]
    fn test_new_lines() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/markup.bcf", b"<Markup><Topic Guid=\"t\"/></Markup>");
        write(root, "a/viewpoint.bcfv", b"<VisualizationInfo>\r\n</VisualizationInfo>");
        write(root, "bcf.version", b"<Version/>");

        let (reporter, text) = with_context(root, |ctx, reporter| {
            check_new_lines(ctx, 2, reporter).unwrap();
        });
        assert_eq!(reporter.count(Category::Content), 1);
        assert!(text.contains("a/markup.bcf\tHas 1 lines"));
    }

    #[test]
    fn test_image_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/snapshot.png", &png(1500, 1500));
        write(root, "b/snapshot.PNG", &png(1501, 20));
        write(root, "c/snapshot.jpg", b"not an image");

        let (reporter, text) = with_context(root, |ctx, reporter| {
            check_image_sizes(ctx, 1500, reporter).unwrap();
        });
        assert_eq!(reporter.count(Category::Content), 2);
        assert!(text.contains("b/snapshot.PNG\tIs too big (1501 x 20)."));
        assert!(text.contains("c/snapshot.jpg\tUnreadable image"));
        assert!(!text.contains("a/snapshot.png"));
    }

    #[test]
    fn test_folder_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("0a1b-lower")).unwrap();
        fs::create_dir_all(root.join("0A1B-Upper/Nested")).unwrap();

        let (reporter, text) = with_context(root, |ctx, reporter| {
            check_folder_names(ctx, root, reporter).unwrap();
        });
        assert_eq!(reporter.count(Category::Content), 1);
        assert!(text.contains("0A1B-Upper"));
        assert!(!text.contains("Nested"));
    }

    #[test]
    fn test_referenced_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(
            root,
            "t1/markup.bcf",
            br#"<Markup>
  <Viewpoints Guid="v1">
    <Viewpoint>viewpoint.bcfv</Viewpoint>
    <Snapshot>snapshot.png</Snapshot>
  </Viewpoints>
</Markup>"#,
        );
        write(root, "t1/viewpoint.bcfv", b"<VisualizationInfo/>");

        let (reporter, text) = with_context(root, |ctx, reporter| {
            check_referenced_files(ctx, reporter).unwrap();
        });
        assert_eq!(reporter.count(Category::Content), 1);
        assert!(text.contains("t1/markup.bcf:4:"));
        assert!(text.contains("'snapshot.png'"));
    }
}
