use crate::cli::{CheckArgs, VerbosityLevel};
use crate::error::{ConfigError, ConfigResult as Result};
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source of `VALIDATE_BCF_*` overrides
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Settings of a check run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub content: ContentConfig,
    pub schemas: SchemaConfig,
    pub output: OutputConfig,
}

/// Which files of a folder sweep are containers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Container extensions, without dot
    pub extensions: Vec<String>,
    /// Name of the extracted copy next to each archive
    pub mirror_folder: String,
    /// File names never treated as containers
    pub excluded_file_names: Vec<String>,
    /// Follow symbolic links while sweeping folders
    pub follow_symlinks: bool,
}

/// Limits applied by the content checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    /// Largest accepted image width or height, in pixels
    pub max_image_dimension: usize,
    /// Suffix of the comparison copies written for mismatching files
    pub mismatch_suffix: String,
    /// Fewest lines a document may be written on
    pub min_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema folder used instead of discovering one
    pub folder: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Diagnostic line format
    pub format: OutputFormat,
    /// Verbose output
    pub verbose: bool,
    /// Only log errors
    pub quiet: bool,
}

impl OutputConfig {
    /// Log level for a run, `requested` being the level asked for on the command line
    ///
    /// A command-line level other than normal wins; otherwise the configured
    /// `quiet`/`verbose` flags decide.
    pub fn verbosity(&self, requested: VerbosityLevel) -> VerbosityLevel {
        if requested != VerbosityLevel::Normal {
            requested
        } else if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["bcf".to_string(), "bcfzip".to_string()],
            mirror_folder: "unzipped".to_string(),
            excluded_file_names: vec![],
            follow_symlinks: false,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 1500,
            mismatch_suffix: ".zipMismatch".to_string(),
            min_lines: 2,
        }
    }
}

/// Loads the run settings from defaults, file, environment and command line
pub struct ConfigManager;

impl ConfigManager {
    /// Settings for a `check` invocation; later layers win
    pub fn load_config(args: &CheckArgs) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, args)
    }

    /// Load configuration reading the environment through `env`
    pub fn load_config_with(env: &impl EnvProvider, args: &CheckArgs) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &args.config {
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, args);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// First settings file found in the working directory, then in the
    /// user configuration directory
    pub fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "validate-bcf.toml",
            "validate-bcf.json",
            ".validate-bcf.toml",
            ".validate-bcf.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-bcf");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    tracing::debug!(path = %path.display(), "using configuration file");
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply `VALIDATE_BCF_*` overrides read through `env`
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        fn list(value: &str) -> Vec<String> {
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }

        fn parsed<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        }

        // Discovery settings
        if let Some(extensions) = env.get("VALIDATE_BCF_EXTENSIONS") {
            config.discovery.extensions = list(&extensions);
        }
        if let Some(mirror_folder) = env.get("VALIDATE_BCF_MIRROR_FOLDER") {
            config.discovery.mirror_folder = mirror_folder;
        }
        if let Some(excluded) = env.get("VALIDATE_BCF_EXCLUDED_FILES") {
            config.discovery.excluded_file_names = list(&excluded);
        }
        if let Some(follow) = env.get("VALIDATE_BCF_FOLLOW_SYMLINKS") {
            config.discovery.follow_symlinks = parsed("VALIDATE_BCF_FOLLOW_SYMLINKS", &follow)?;
        }

        // Content settings
        if let Some(dimension) = env.get("VALIDATE_BCF_MAX_IMAGE_DIMENSION") {
            config.content.max_image_dimension =
                parsed("VALIDATE_BCF_MAX_IMAGE_DIMENSION", &dimension)?;
        }
        if let Some(suffix) = env.get("VALIDATE_BCF_MISMATCH_SUFFIX") {
            config.content.mismatch_suffix = suffix;
        }
        if let Some(min_lines) = env.get("VALIDATE_BCF_MIN_LINES") {
            config.content.min_lines = parsed("VALIDATE_BCF_MIN_LINES", &min_lines)?;
        }

        // Schema settings
        if let Some(folder) = env.get("VALIDATE_BCF_SCHEMAS") {
            config.schemas.folder = Some(PathBuf::from(folder));
        }

        // Output settings
        if let Some(verbose) = env.get("VALIDATE_BCF_VERBOSE") {
            config.output.verbose = parsed("VALIDATE_BCF_VERBOSE", &verbose)?;
        }
        if let Some(quiet) = env.get("VALIDATE_BCF_QUIET") {
            config.output.quiet = parsed("VALIDATE_BCF_QUIET", &quiet)?;
        }
        if let Some(format) = env.get("VALIDATE_BCF_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_BCF_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    ///
    /// The command line's own schema folder is handed to the schema loader
    /// directly and takes precedence over `schemas.folder` there.
    pub fn merge_with_cli(mut config: Config, args: &CheckArgs) -> Config {
        if let Some(format) = args.format {
            config.output.format = format;
        }
        if args.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if args.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        config
    }

    /// Merge two configurations (second takes precedence for set values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        // Discovery settings
        if !override_config.discovery.extensions.is_empty() {
            base.discovery.extensions = override_config.discovery.extensions;
        }
        base.discovery.mirror_folder = override_config.discovery.mirror_folder;
        if !override_config.discovery.excluded_file_names.is_empty() {
            base.discovery.excluded_file_names = override_config.discovery.excluded_file_names;
        }
        base.discovery.follow_symlinks = override_config.discovery.follow_symlinks;

        // Content settings
        base.content = override_config.content;

        // Schema settings
        if override_config.schemas.folder.is_some() {
            base.schemas.folder = override_config.schemas.folder;
        }

        // Output settings
        base.output = override_config.output;

        base
    }

    /// Reject settings no run could use
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.discovery.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one container extension must be specified".to_string(),
            ));
        }

        for ext in &config.discovery.extensions {
            if ext.is_empty() || ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid container extension: {}",
                    ext
                )));
            }
        }

        if config.discovery.mirror_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Mirror folder name must not be empty".to_string(),
            ));
        }

        if config.content.max_image_dimension == 0 {
            return Err(ConfigError::Validation(
                "Maximum image dimension must be greater than 0".to_string(),
            ));
        }

        if !config.content.mismatch_suffix.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "Mismatch suffix must start with a dot: {}",
                config.content.mismatch_suffix
            )));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }
}
