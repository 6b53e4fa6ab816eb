//! Archive and mirror reconciliation
//!
//! Each archive entry is compared with the file of the same name in the
//! mirror folder. Byte-identical files match; so do text files that differ
//! only in whitespace or line endings.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{BcfError, Result};
use crate::output::{Category, Reporter};
use crate::source::{ArchiveSource, BcfSource, normalize_name};

/// What to do about the differences found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatchOptions {
    /// Write the archived bytes next to a mismatching mirror file
    pub write_mismatch: bool,
    /// Rebuild the archive from the mirror on the first mismatch
    pub rezip: bool,
    /// Restore mirror files missing from the mirror
    pub repair: bool,
    /// Suffix of the comparison copies written by `write_mismatch`
    pub mismatch_suffix: String,
}

impl Default for ContentMatchOptions {
    fn default() -> Self {
        Self {
            write_mismatch: false,
            rezip: false,
            repair: false,
            mismatch_suffix: ".zipMismatch".to_string(),
        }
    }
}

/// Strip everything the comparison tolerates: line endings, tabs and spaces
fn normalize_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t' | ' '))
        .collect()
}

/// Whether an extracted file faithfully represents its archived counterpart
pub fn contents_match(archived: &[u8], extracted: &[u8]) -> bool {
    if crc32fast::hash(archived) == crc32fast::hash(extracted) && archived == extracted {
        return true;
    }
    normalize_text(archived) == normalize_text(extracted)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Compare every archive entry with the mirror
///
/// Returns whether the archive was rebuilt. `subject` renders diagnostic
/// subjects for paths on disk.
pub fn check_content_match(
    archive: &ArchiveSource,
    mirror: &Path,
    options: &ContentMatchOptions,
    reporter: &mut Reporter,
    subject: &dyn Fn(&Path) -> String,
) -> Result<bool> {
    if !mirror.is_dir() {
        reporter.error(
            Category::Mismatch,
            subject(archive.root()),
            "Unzipped folder not found.",
        )?;
        return Ok(false);
    }

    for name in archive.names("")? {
        let Some(archived) = archive.read(&name)? else {
            continue;
        };
        let on_disk = mirror.join(&name);

        if !on_disk.is_file() {
            reporter.error(
                Category::Mismatch,
                subject(&on_disk),
                "Uncompressed file not found.",
            )?;
            if options.repair {
                if let Some(parent) = on_disk.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&on_disk, &archived)?;
                tracing::info!(path = %on_disk.display(), "restored missing mirror file");
            }
            continue;
        }

        let extracted = fs::read(&on_disk)?;
        if contents_match(&archived, &extracted) {
            continue;
        }

        reporter.error(
            Category::Mismatch,
            subject(&on_disk),
            "Compressed/Uncompressed mismatch.",
        )?;
        if options.write_mismatch {
            let copy = with_suffix(&on_disk, &options.mismatch_suffix);
            fs::write(&copy, &archived)?;
            tracing::info!(path = %copy.display(), "wrote comparison copy");
        }
        if options.rezip {
            let entries = rebuild_archive(archive.root(), mirror, &options.mismatch_suffix)?;
            tracing::info!(
                archive = %archive.root().display(),
                entries,
                "rebuilt archive from mirror"
            );
            return Ok(true);
        }
    }

    Ok(false)
}

/// Regenerate an archive from the whole mirror folder
///
/// Entries are deflated and written in relative path order; comparison
/// copies are left out. The new archive replaces the old one only once it is
/// complete. Returns the number of entries written.
pub fn rebuild_archive(archive: &Path, mirror: &Path, mismatch_suffix: &str) -> Result<usize> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let walker = WalkBuilder::new(mirror)
        .standard_filters(false)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| BcfError::FileSystemTraversal {
            path: mirror.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(mirror) else {
            continue;
        };
        let name = normalize_name(&relative.to_string_lossy());
        if !mismatch_suffix.is_empty() && name.ends_with(mismatch_suffix) {
            continue;
        }
        files.push((name, entry.path().to_path_buf()));
    }
    files.sort();

    let temporary = with_suffix(archive, ".rebuild");
    let zip_error = |source: ZipError| BcfError::Zip {
        path: archive.to_path_buf(),
        source,
    };
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(BufWriter::new(File::create(&temporary)?));
    for (name, path) in &files {
        writer.start_file(name.as_str(), options).map_err(zip_error)?;
        writer.write_all(&fs::read(path)?)?;
    }
    let mut inner = writer.finish().map_err(zip_error)?;
    inner.flush()?;
    drop(inner);

    fs::rename(&temporary, archive)?;
    Ok(files.len())
}
