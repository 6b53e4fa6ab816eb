use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{BcfError, Result};

/// Discovers BCF containers below a directory
///
/// Mirror folders are skipped wherever they appear in a path, so extracted
/// copies are never taken for inputs of their own.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Container extensions to include, lowercase and without dot
    extensions: Vec<String>,
    /// Name of the mirror folder, compared case-insensitively
    mirror_folder: String,
    /// File names never treated as inputs
    excluded_file_names: Vec<String>,
    /// Follow symbolic links
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["bcf".to_string(), "bcfzip".to_string()],
            mirror_folder: "unzipped".to_string(),
            excluded_file_names: Vec::new(),
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_mirror_folder(mut self, mirror_folder: impl Into<String>) -> Self {
        self.mirror_folder = mirror_folder.into();
        self
    }

    pub fn with_excluded_file_names(mut self, names: Vec<String>) -> Self {
        self.excluded_file_names = names;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Discover containers in the given path (file or directory), sorted by full path
    ///
    /// A file given directly is returned as-is, whatever its extension.
    pub fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(BcfError::InvalidSource {
                path: path.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        let walker = WalkBuilder::new(path)
            .standard_filters(false)
            .follow_links(self.follow_symlinks)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
            if self.should_process(relative) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        tracing::debug!(count = files.len(), root = %path.display(), "discovered containers");
        Ok(files)
    }

    /// Check if a file should be processed based on extension, mirror folders and exclusions
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(parent) = path.parent()
            && parent.components().any(|component| {
                component
                    .as_os_str()
                    .to_str()
                    .is_some_and(|name| name.eq_ignore_ascii_case(&self.mirror_folder))
            })
        {
            return false;
        }

        let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        !self
            .excluded_file_names
            .iter()
            .any(|excluded| excluded == file_name)
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"PK").unwrap();
    }

    #[test]
    fn test_should_process() {
        let discovery = FileDiscovery::new();

        assert!(discovery.should_process(Path::new("cases/Topic.bcf")));
        assert!(discovery.should_process(Path::new("cases/topic.BCFZIP")));
        assert!(!discovery.should_process(Path::new("cases/markup.bcfv")));
        assert!(!discovery.should_process(Path::new("cases/Unzipped/nested.bcf")));
        assert!(!discovery.should_process(Path::new("README.md")));
    }

    #[test]
    fn test_discovery_sorted_and_mirror_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "b/second.bcfzip");
        touch(root, "a/first.bcf");
        touch(root, "a/unzipped/copy.bcf");
        touch(root, "a/unzipped/topic/markup.bcf");
        touch(root, "c/notes.txt");

        let files = FileDiscovery::new().discover_files(root).unwrap();
        assert_eq!(
            files,
            vec![root.join("a/first.bcf"), root.join("b/second.bcfzip")]
        );
    }

    #[test]
    fn test_excluded_file_names_and_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "keep.bcf");
        touch(root, "skip.bcf");
        touch(root, "other.zip");

        let discovery = FileDiscovery::new()
            .with_extensions(vec![".bcf".to_string(), "zip".to_string()])
            .with_excluded_file_names(vec!["skip.bcf".to_string()]);
        let files = discovery.discover_files(root).unwrap();
        assert_eq!(files, vec![root.join("keep.bcf"), root.join("other.zip")]);
    }

    #[test]
    fn test_single_file_and_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "single.bcfzip");
        let discovery = FileDiscovery::new();

        let single = temp_dir.path().join("single.bcfzip");
        assert_eq!(discovery.discover_files(&single).unwrap(), vec![single]);

        assert!(matches!(
            discovery.discover_files(&temp_dir.path().join("missing")),
            Err(BcfError::InvalidSource { .. })
        ));
    }
}
