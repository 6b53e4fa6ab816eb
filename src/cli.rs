use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::output::OutputFormat;
use crate::validator::CheckOptions;

/// Verbosity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show warnings and errors
    #[default]
    Normal,
    /// Show progress per container
    Verbose,
    /// Show every check step
    Debug,
    /// Show everything
    Trace,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
            VerbosityLevel::Trace => "trace",
        }
    }
}

/// Quality gate for BIM Collaboration Format example files
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-bcf")]
#[command(about = "Check BCF containers against their schemas and their extracted copies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check a BCF container, or every container below a folder
    Check(CheckArgs),
    /// Explain the status bits of an exit code
    #[command(name = "errorcode")]
    ErrorCode(ErrorCodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Container file or folder to scan for containers
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Validate documents against the XSD schemas of their version
    #[arg(short = 's', long = "schema")]
    pub schema: bool,

    /// Compare archive entries with the extracted mirror folder
    #[arg(short = 'm', long = "zip-match")]
    pub zip_match: bool,

    /// Rebuild mismatching archives from the mirror folder (implies -m)
    #[arg(short = 'z', long = "rezip")]
    pub rezip: bool,

    /// Write the archived copy of mismatching files next to them (implies -m)
    #[arg(short = 'w', long = "write-mismatch")]
    pub write_mismatch: bool,

    /// Restore files missing from the mirror folder (implies -m)
    #[arg(short = 'r', long = "repair")]
    pub repair: bool,

    /// Check that documents are split over several lines
    #[arg(short = 'n', long = "new-lines")]
    pub new_lines: bool,

    /// Check identifier uniqueness, references and folder names
    #[arg(short = 'u', long = "unique-ids")]
    pub unique_ids: bool,

    /// Check that images are not oversized
    #[arg(short = 'i', long = "image-size")]
    pub image_size: bool,

    /// Check that files referenced by markup documents exist
    #[arg(short = 'c', long = "file-contents")]
    pub file_contents: bool,

    /// Check that the schema documents compile
    #[arg(short = 'd', long = "schema-definition")]
    pub schema_definition: bool,

    /// Schema folder, either per-version (v2.0, v2.1, v3.0) or flat
    #[arg(long = "schemas", value_name = "DIR")]
    pub schemas: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Diagnostic line format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CheckArgs {
    /// Checks selected on the command line, with implications and defaults applied
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            schema: self.schema,
            zip_match: self.zip_match,
            rezip: self.rezip,
            write_mismatch: self.write_mismatch,
            repair: self.repair,
            new_lines: self.new_lines,
            unique_ids: self.unique_ids,
            image_size: self.image_size,
            file_contents: self.file_contents,
            schema_definition: self.schema_definition,
        }
        .resolved()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            return VerbosityLevel::Quiet;
        }
        match self.verbose {
            0 => VerbosityLevel::Normal,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ErrorCodeArgs {
    /// Exit code returned by a previous check
    #[arg(allow_hyphen_values = true)]
    pub code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn check_args(args: &[&str]) -> CheckArgs {
        let mut argv = vec!["validate-bcf", "check"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Check(args) => args,
            other => panic!("Expected check, got {:?}", other),
        }
    }

    #[test]
    fn test_default_check_subset() {
        let options = check_args(&["cases"]).check_options();

        assert!(options.schema);
        assert!(options.zip_match);
        assert!(options.new_lines);
        assert!(options.unique_ids);
        assert!(options.image_size);
        assert!(options.file_contents);
        assert!(!options.schema_definition);
        assert!(!options.rezip);
        assert!(!options.write_mismatch);
    }

    #[test]
    fn test_explicit_flags_and_implications() {
        let args = check_args(&["cases", "-w", "-u"]);
        let options = args.check_options();

        assert!(options.write_mismatch);
        assert!(options.zip_match);
        assert!(options.unique_ids);
        assert!(!options.schema);
        assert!(!options.new_lines);

        let options = check_args(&["cases", "--rezip"]).check_options();
        assert!(options.rezip && options.zip_match);
        let options = check_args(&["cases", "-r"]).check_options();
        assert!(options.repair && options.zip_match);
    }

    #[test]
    fn test_verbosity_and_format() {
        let args = check_args(&["cases", "-vv", "--format", "json", "--schemas", "xsd"]);
        assert_eq!(args.verbosity(), VerbosityLevel::Debug);
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.schemas, Some(PathBuf::from("xsd")));

        assert_eq!(check_args(&["cases", "-q"]).verbosity(), VerbosityLevel::Quiet);
        assert!(Cli::try_parse_from(["validate-bcf", "check", "cases", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_errorcode_subcommand() {
        let cli = Cli::try_parse_from(["validate-bcf", "errorcode", "-1"]).unwrap();
        match cli.command {
            Command::ErrorCode(args) => assert_eq!(args.code, -1),
            other => panic!("Expected errorcode, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["validate-bcf", "check"]).is_err());
    }
}
