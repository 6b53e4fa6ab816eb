use std::collections::HashSet;
use std::path::Path;

use super::CheckContext;
use crate::error::{BcfError, Result};
use crate::libxml2::{Severity, XmlDiagnostic};
use crate::output::{Category, Diagnostic, Location, Reporter};
use crate::schema_loader::{DocumentKind, SchemaLoader};
use crate::version::BcfVersion;

/// Report a schema set that could not be obtained; other errors propagate
fn report_load_failure(reporter: &mut Reporter, subject: &str, error: BcfError) -> Result<()> {
    match error {
        BcfError::SchemaNotFound { path } => reporter.error(
            Category::NotFound,
            subject,
            format!("Schema not found: {}", path.display()),
        )?,
        BcfError::SchemaCompilation { name, source } => {
            reporter.error(Category::Schema, name, source.to_string())?
        }
        other => return Err(other),
    }
    Ok(())
}

fn to_diagnostic(subject: &str, diagnostic: XmlDiagnostic) -> Diagnostic {
    let prefix = match diagnostic.severity {
        Severity::Warning => "XML WARNING",
        Severity::Error => "XML ERROR",
    };
    let location = diagnostic.line.map(|line| Location {
        line,
        column: diagnostic.column,
    });
    Diagnostic::new(
        Category::Content,
        subject,
        format!("{}: {}", prefix, diagnostic.message),
    )
    .at(location)
}

/// Validate every document of the source against the schema set of its kind
///
/// Kinds without documents never load their schema. A missing or broken
/// schema set is reported once and its kind skipped for this container.
pub fn check_schema_compliance(
    ctx: &CheckContext<'_>,
    loader: &SchemaLoader,
    reporter: &mut Reporter,
) -> Result<()> {
    for kind in DocumentKind::ALL {
        let names: Vec<String> = ctx
            .source
            .names(kind.suffix())?
            .into_iter()
            .filter(|name| kind.matches(name))
            .collect();
        if names.is_empty() {
            continue;
        }

        let schema = match loader.load(ctx.archive, ctx.version, kind) {
            Ok(schema) => schema,
            Err(e) => {
                report_load_failure(reporter, &ctx.subject(ctx.archive), e)?;
                continue;
            }
        };

        for name in &names {
            let Some(content) = ctx.source.read(name)? else {
                continue;
            };
            let subject = ctx.entry_subject(name);
            match loader.wrapper().validate_memory(&schema, &content, name) {
                Ok(diagnostics) => {
                    for diagnostic in diagnostics {
                        reporter.report(to_diagnostic(&subject, diagnostic))?;
                    }
                }
                Err(e) => reporter.error(Category::Content, &subject, e.to_string())?,
            }
        }
        tracing::debug!(%kind, documents = names.len(), "schema compliance checked");
    }
    Ok(())
}

/// Check that the schema set of every document kind compiles for a version
///
/// Each version is checked once per run; `checked` holds the versions done.
pub fn check_schema_definitions(
    input: &Path,
    version: BcfVersion,
    loader: &SchemaLoader,
    checked: &mut HashSet<BcfVersion>,
    reporter: &mut Reporter,
) -> Result<()> {
    if !checked.insert(version) {
        return Ok(());
    }

    for kind in DocumentKind::ALL {
        match loader.load(input, version, kind) {
            Ok(_) => tracing::debug!(%version, %kind, "schema set compiles"),
            Err(e) => report_load_failure(reporter, &format!("schemas v{}", version), e)?,
        }
    }
    Ok(())
}
