//! Run coordinator
//!
//! Resolves the inputs of a run, chooses the source of every container and
//! runs the selected checks in a fixed order. The identifier registry and the
//! status accumulate across every container of the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::checks::{
    CheckContext, ContentMatchOptions, IdentifierRegistry, check_content_match, check_folder_names,
    check_image_sizes, check_new_lines, check_referenced_files, check_schema_compliance,
    check_schema_definitions, check_unique_ids,
};
use crate::config::Config;
use crate::error::Result;
use crate::file_discovery::FileDiscovery;
use crate::output::{Category, Reporter};
use crate::schema_loader::SchemaLoader;
use crate::source::{ArchiveSource, BcfSource, FolderSource};
use crate::status::Status;
use crate::version::{BcfVersion, VERSION_MARKER};

/// Checks selected for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub schema: bool,
    pub zip_match: bool,
    pub rezip: bool,
    pub write_mismatch: bool,
    pub repair: bool,
    pub new_lines: bool,
    pub unique_ids: bool,
    pub image_size: bool,
    pub file_contents: bool,
    pub schema_definition: bool,
}

impl CheckOptions {
    /// Checks run when none is selected explicitly
    pub fn default_subset() -> Self {
        Self {
            schema: true,
            zip_match: true,
            new_lines: true,
            unique_ids: true,
            image_size: true,
            file_contents: true,
            ..Self::default()
        }
    }

    pub fn any_selected(&self) -> bool {
        self.schema
            || self.zip_match
            || self.rezip
            || self.write_mismatch
            || self.repair
            || self.new_lines
            || self.unique_ids
            || self.image_size
            || self.file_contents
            || self.schema_definition
    }

    /// Apply the default subset and the options implying the content match
    pub fn resolved(self) -> Self {
        let mut options = if self.any_selected() {
            self
        } else {
            Self::default_subset()
        };
        if options.rezip || options.write_mismatch || options.repair {
            options.zip_match = true;
        }
        options
    }
}

/// Runs the selected checks over one input, a container or a folder of them
pub struct CheckRunner {
    options: CheckOptions,
    config: Config,
    loader: SchemaLoader,
    registry: IdentifierRegistry,
    checked_versions: HashSet<BcfVersion>,
}

impl CheckRunner {
    pub fn new(config: Config, options: CheckOptions, schemas: Option<PathBuf>) -> Self {
        let loader = SchemaLoader::new(schemas, config.schemas.folder.clone());
        Self {
            options: options.resolved(),
            config,
            loader,
            registry: IdentifierRegistry::new(),
            checked_versions: HashSet::new(),
        }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    fn discovery(&self) -> FileDiscovery {
        FileDiscovery::new()
            .with_extensions(self.config.discovery.extensions.clone())
            .with_mirror_folder(self.config.discovery.mirror_folder.clone())
            .with_excluded_file_names(self.config.discovery.excluded_file_names.clone())
            .with_follow_symlinks(self.config.discovery.follow_symlinks)
    }

    /// Check an input and write the completion summary
    pub fn run(&mut self, input: &Path, reporter: &mut Reporter) -> Result<Status> {
        reporter.header()?;

        if !input.exists() {
            reporter.error(
                Category::NotFound,
                input.display().to_string(),
                "Invalid input source",
            )?;
            return reporter.finish();
        }

        let base = if input.is_dir() {
            input.to_path_buf()
        } else {
            input.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        let containers = match self.discovery().discover_files(input) {
            Ok(containers) => containers,
            Err(e) if !e.is_output() => {
                reporter.error(Category::NotFound, input.display().to_string(), e.to_string())?;
                return reporter.finish();
            }
            Err(e) => return Err(e),
        };
        tracing::info!(input = %input.display(), containers = containers.len(), "checking input");

        for container in &containers {
            self.check_container(container, &base, reporter)?;
        }
        tracing::debug!(
            schema_sets = self.loader.cache().stats().entry_count,
            identifiers = self.registry.len(),
            "run finished"
        );

        reporter.finish()
    }

    /// Run the selected checks against a single container
    ///
    /// A check that cannot read the container is reported against it and the
    /// remaining checks still run. Only [`crate::error::BcfError::Output`] is returned.
    pub fn check_container(
        &mut self,
        archive_path: &Path,
        base: &Path,
        reporter: &mut Reporter,
    ) -> Result<()> {
        let subject = |path: &Path| {
            path.strip_prefix(base)
                .unwrap_or(path)
                .display()
                .to_string()
        };
        tracing::debug!(container = %archive_path.display(), "checking container");

        let mirror_path = archive_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.config.discovery.mirror_folder);
        let mirror = mirror_path.is_dir().then_some(mirror_path.as_path());

        let archive = match ArchiveSource::open(archive_path) {
            Ok(archive) => Some(archive),
            Err(e) => {
                reporter.error(Category::Content, subject(archive_path), e.to_string())?;
                None
            }
        };

        let folder = mirror.map(FolderSource::new);
        let source: &dyn BcfSource = match (&folder, &archive) {
            (Some(folder), _) => folder,
            (None, Some(archive)) => archive,
            (None, None) => return Ok(()),
        };

        let version = BcfVersion::resolve(source);
        if !version.is_known() {
            let message = match source.exists(VERSION_MARKER) {
                Ok(false) => "version file missing",
                _ => "version not resolved",
            };
            reporter.error(Category::Version, subject(archive_path), message)?;
            return Ok(());
        }
        tracing::debug!(container = %archive_path.display(), %version, "version resolved");

        let ctx = CheckContext {
            archive: archive_path,
            mirror,
            source,
            version,
            base,
        };

        let container = subject(archive_path);

        if self.options.schema_definition {
            let outcome = check_schema_definitions(
                archive_path,
                version,
                &self.loader,
                &mut self.checked_versions,
                reporter,
            );
            contain(outcome, Category::Schema, &container, reporter)?;
        }

        if self.options.zip_match {
            if let Some(archive) = &archive {
                let match_options = ContentMatchOptions {
                    write_mismatch: self.options.write_mismatch,
                    rezip: self.options.rezip,
                    repair: self.options.repair,
                    mismatch_suffix: self.config.content.mismatch_suffix.clone(),
                };
                let outcome =
                    check_content_match(archive, &mirror_path, &match_options, reporter, &subject)
                        .map(|rebuilt| {
                            if rebuilt {
                                tracing::info!(container = %archive_path.display(), "archive rebuilt");
                            }
                        });
                contain(outcome, Category::Mismatch, &container, reporter)?;
            } else {
                tracing::debug!(container = %archive_path.display(), "no archive to match");
            }
        }

        if self.options.schema {
            let outcome = check_schema_compliance(&ctx, &self.loader, reporter);
            contain(outcome, Category::Content, &container, reporter)?;
        }

        if self.options.unique_ids {
            let outcome = check_unique_ids(&ctx, &mut self.registry, reporter);
            contain(outcome, Category::Content, &container, reporter)?;
            if let Some(mirror) = mirror {
                let outcome = check_folder_names(&ctx, mirror, reporter);
                contain(outcome, Category::Content, &container, reporter)?;
            }
        }

        if self.options.file_contents {
            let outcome = check_referenced_files(&ctx, reporter);
            contain(outcome, Category::Content, &container, reporter)?;
        }

        if self.options.new_lines || self.options.image_size {
            if mirror.is_none() {
                tracing::debug!(
                    container = %archive_path.display(),
                    "no mirror folder, skipping new line and image checks"
                );
                return Ok(());
            }
            if self.options.new_lines {
                let outcome = check_new_lines(&ctx, self.config.content.min_lines, reporter);
                contain(outcome, Category::Content, &container, reporter)?;
            }
            if self.options.image_size {
                let outcome =
                    check_image_sizes(&ctx, self.config.content.max_image_dimension, reporter);
                contain(outcome, Category::Content, &container, reporter)?;
            }
        }

        Ok(())
    }
}

/// Turn a check's input failure into a diagnostic against the container
fn contain(
    outcome: Result<()>,
    category: Category,
    container: &str,
    reporter: &mut Reporter,
) -> Result<()> {
    match outcome {
        Err(e) if !e.is_output() => {
            tracing::warn!(container, error = %e, "check aborted");
            reporter.error(category, container, e.to_string())
        }
        outcome => outcome,
    }
}
