//! `validate` command handler.
//!
//! Checks every file, prints one report per file and fails if any file
//! has errors (or warnings, with `--strict`).

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, Validator};
use crate::error::{ConfigError, MankindError, Severity, ValidationIssue};

#[derive(Debug)]
struct FileReport {
    path: PathBuf,
    errors: Vec<String>,
    warnings: Vec<String>,
    failure: Option<ConfigError>,
}

impl FileReport {
    fn is_valid(&self, strict: bool) -> bool {
        self.failure.is_none() && self.errors.is_empty() && !(strict && !self.warnings.is_empty())
    }

    fn to_json(&self, strict: bool) -> Value {
        json!({
            "file": self.path.display().to_string(),
            "valid": self.is_valid(strict),
            "errors": self.errors,
            "warnings": self.warnings,
        })
    }
}

fn check(path: &Path, strict: bool) -> FileReport {
    let mut report = FileReport {
        path: path.to_path_buf(),
        errors: Vec::new(),
        warnings: Vec::new(),
        failure: None,
    };

    let loaded = match ConfigLoader::new().load(path) {
        Ok(loaded) => loaded,
        Err(e) => {
            report.errors.push(e.to_string());
            report.failure = Some(e);
            return report;
        }
    };
    report.warnings.extend(loaded.warnings.iter().map(|w| {
        w.location
            .as_deref()
            .map_or_else(|| w.message.clone(), |l| format!("{} ({l})", w.message))
    }));

    let result = Validator::new().validate(&loaded.config);
    report
        .warnings
        .extend(result.warnings.iter().map(ToString::to_string));
    report
        .errors
        .extend(result.errors.iter().map(ToString::to_string));

    let mut issues = result.errors;
    if strict {
        issues.extend(result.warnings.into_iter().map(|w| ValidationIssue {
            severity: Severity::Error,
            ..w
        }));
    }
    if !issues.is_empty() {
        report.failure = Some(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors: issues,
        });
    }
    report
}

/// Validate configuration files without connecting.
///
/// # Errors
///
/// Returns the first file's configuration error after every file has been
/// reported.
pub fn run(args: &ValidateArgs) -> Result<(), MankindError> {
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| {
            tracing::info!(file = %path.display(), "validating configuration");
            check(path, args.strict)
        })
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let status = if report.is_valid(args.strict) {
                    "ok"
                } else {
                    "FAILED"
                };
                println!("{}: {status}", report.path.display());
                for line in report.errors.iter().chain(&report.warnings) {
                    println!("  {line}");
                }
            }
        }
        OutputFormat::Json => {
            let all: Vec<Value> = reports.iter().map(|r| r.to_json(args.strict)).collect();
            println!("{}", Value::Array(all));
        }
    }

    match reports.into_iter().find_map(|r| r.failure) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
