//! Uniform read-only view over the contents of a BCF container
//!
//! A container is either the zip archive itself or a folder holding its
//! extracted contents. Checks only see relative entry names using `/` as the
//! separator, so the same name addresses the same document in both stores.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{BcfError, Result};

/// Read-only, name-addressed bag of byte streams
pub trait BcfSource {
    /// Path of the underlying archive or folder
    fn root(&self) -> &Path;

    /// Entry names ending with `suffix`, directories excluded, in the store's
    /// native enumeration order
    fn names(&self, suffix: &str) -> Result<Vec<String>>;

    /// Open an entry; `Ok(None)` when the entry does not exist
    fn open(&self, name: &str) -> Result<Option<Box<dyn Read>>>;

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.open(name)? {
            Some(mut stream) => {
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer)?;
                Ok(Some(buffer))
            }
            None => Ok(None),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.open(name)?.is_some())
    }
}

/// Normalize an entry name so names compare equal regardless of backing store
pub fn normalize_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Upper bound on the buffer reserved up front for an archive entry
const MAX_CAPACITY_HINT: u64 = 1 << 20;

/// Source backed by a zip archive, entries decompressed on demand
pub struct ArchiveSource {
    path: PathBuf,
    archive: RefCell<ZipArchive<BufReader<File>>>,
}

impl ArchiveSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| BcfError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: RefCell::new(archive),
        })
    }

    fn zip_error(&self, source: ZipError) -> BcfError {
        BcfError::Zip {
            path: self.path.clone(),
            source,
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let wanted = normalize_name(name);
        let archive = self.archive.borrow();
        archive
            .file_names()
            .find(|candidate| normalize_name(candidate) == wanted)
            .and_then(|candidate| archive.index_for_name(candidate))
    }
}

impl BcfSource for ArchiveSource {
    fn root(&self) -> &Path {
        &self.path
    }

    fn names(&self, suffix: &str) -> Result<Vec<String>> {
        let mut archive = self.archive.borrow_mut();
        let mut names = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| self.zip_error(e))?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_name(entry.name());
            if name.ends_with(suffix) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read>>> {
        let Some(index) = self.index_of(name) else {
            return Ok(None);
        };
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive.by_index(index).map_err(|e| self.zip_error(e))?;
        if entry.is_dir() {
            return Ok(None);
        }
        // the declared size is untrusted header data
        let mut buffer = Vec::with_capacity(entry.size().min(MAX_CAPACITY_HINT) as usize);
        entry.read_to_end(&mut buffer)?;
        Ok(Some(Box::new(Cursor::new(buffer))))
    }
}

/// Source backed by an extracted folder
pub struct FolderSource {
    root: PathBuf,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BcfSource for FolderSource {
    fn root(&self) -> &Path {
        &self.root
    }

    fn names(&self, suffix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .build();
        for entry in walker {
            let entry = entry.map_err(|e| BcfError::FileSystemTraversal {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = normalize_name(&relative.to_string_lossy());
            if name.ends_with(suffix) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read>>> {
        let path = self.root.join(normalize_name(name));
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Box::new(BufReader::new(File::open(path)?))))
    }
}
