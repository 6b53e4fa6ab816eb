//! Diagnostic output and status accounting
//!
//! Every problem found in the checked files is written as one line the moment
//! it is reported, and folds its category's bit into the run status.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{BcfError, Result};
use crate::status::Status;

/// Title line written before the first diagnostic
pub const HEADER: &str = "=== validate-bcf - checking example files.";

/// Line format of reported diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Diagnostic category, each owning one status bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CommandLine,
    NotFound,
    Content,
    Mismatch,
    Schema,
    Version,
}

impl Category {
    pub fn status(self) -> Status {
        match self {
            Category::CommandLine => Status::COMMAND_LINE_ERROR,
            Category::NotFound => Status::NOT_FOUND_ERROR,
            Category::Content => Status::CONTENT_ERROR,
            Category::Mismatch => Status::CONTENT_MISMATCH,
            Category::Schema => Status::XSD_SCHEMA_ERROR,
            Category::Version => Status::VERSION_ERROR,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Category::CommandLine => "COMMAND LINE",
            Category::NotFound => "NOT FOUND",
            Category::Content => "CONTENT",
            Category::Mismatch => "MISMATCH",
            Category::Schema => "SCHEMA",
            Category::Version => "VERSION",
        }
    }

    /// ANSI color of the label
    fn color(self) -> &'static str {
        match self {
            Category::Mismatch => "33",
            Category::NotFound | Category::Version => "35",
            _ => "31",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position inside a document, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: Option<u32>,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }
}

/// One problem found in a checked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: Category,
    pub subject: String,
    #[serde(flatten)]
    pub location: Option<Location>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(category: Category, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            subject: subject.into(),
            location: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }
}

#[derive(Serialize)]
struct Completion<'a> {
    completed: bool,
    status: u8,
    names: Vec<&'static str>,
    counts: &'a BTreeMap<Category, usize>,
}

/// Writes diagnostics and accumulates the run status
pub struct Reporter {
    out: Box<dyn Write>,
    format: OutputFormat,
    show_colors: bool,
    verbose: bool,
    status: Status,
    counts: BTreeMap<Category, usize>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write>, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            show_colors: false,
            verbose: false,
            status: Status::OK,
            counts: BTreeMap::new(),
        }
    }

    /// Reporter on standard output, colorized when attached to a terminal
    pub fn stdout(format: OutputFormat, verbose: bool) -> Self {
        let mut reporter = Self::new(Box::new(io::stdout()), format);
        reporter.show_colors = format == OutputFormat::Human && atty::is(atty::Stream::Stdout);
        reporter.verbose = verbose;
        reporter
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn write_line(&mut self, line: fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.out, "{}", line).map_err(BcfError::Output)
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value).map_err(|e| BcfError::Output(io::Error::other(e)))?;
        self.write_line(format_args!("{}", line))
    }

    pub fn header(&mut self) -> Result<()> {
        if self.format == OutputFormat::Human {
            self.write_line(format_args!("{}", HEADER))?;
        }
        Ok(())
    }

    /// Write a diagnostic and set its category bit
    ///
    /// Only failures of the output stream are returned, as [`BcfError::Output`].
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        self.status |= diagnostic.category.status();
        *self.counts.entry(diagnostic.category).or_insert(0) += 1;

        match self.format {
            OutputFormat::Human => {
                let label = self.colorize(diagnostic.category.label(), diagnostic.category.color());
                let position = match diagnostic.location {
                    Some(Location {
                        line,
                        column: Some(column),
                    }) => format!(":{}:{}", line, column),
                    Some(Location { line, column: None }) => format!(":{}", line),
                    None => String::new(),
                };
                self.write_line(format_args!(
                    "{}\t{}{}\t{}",
                    label, diagnostic.subject, position, diagnostic.message
                ))
            }
            OutputFormat::Json => self.write_json(&diagnostic),
        }
    }

    /// Shorthand for a diagnostic without location
    pub fn error(
        &mut self,
        category: Category,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.report(Diagnostic::new(category, subject, message))
    }

    /// Write the final status line, preceded by per-category counts when verbose
    pub fn finish(&mut self) -> Result<Status> {
        match self.format {
            OutputFormat::Human => {
                if self.verbose {
                    let counts: Vec<(Category, usize)> =
                        self.counts.iter().map(|(c, n)| (*c, *n)).collect();
                    for (category, count) in counts {
                        self.write_line(format_args!("  {}: {}", category, count))?;
                    }
                }
                let status = self.status;
                self.write_line(format_args!(
                    "Completed with status: {} ({}).",
                    status,
                    status.bits()
                ))?;
            }
            OutputFormat::Json => {
                let counts = self.counts.clone();
                let completion = Completion {
                    completed: true,
                    status: self.status.bits(),
                    names: self.status.names(),
                    counts: &counts,
                };
                self.write_json(&completion)?;
            }
        }
        self.out.flush().map_err(BcfError::Output)?;
        Ok(self.status)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// In-memory writer that stays readable after being handed to a [`Reporter`]
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Captured output decoded as UTF-8 (lossy)
    pub(crate) fn contents(&self) -> String {
        match self.0.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
