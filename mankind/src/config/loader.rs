//! Configuration loader.
//!
//! Pipeline:
//! 1. Size check and read (UTF-8 BOM stripped)
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing into [`ClientConfig`]
//!
//! Validation happens later, once command-line overrides are applied.

use std::path::Path;

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;

/// Largest configuration file accepted, in bytes.
pub const MAX_CONFIG_SIZE: u64 = 64 * 1024;

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The parsed configuration.
    pub config: ClientConfig,
    /// Non-fatal findings.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal finding while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// What was found.
    pub message: String,
    /// Where, if known.
    pub location: Option<String>,
}

/// Reads client configuration files.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Creates a loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads and parses `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or too large, a
    /// required environment variable is unset, or the YAML does not
    /// describe a client configuration.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_owned(),
                value: format!("{} bytes", metadata.len()),
                expected: format!("at most {MAX_CONFIG_SIZE} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.parse(&raw, path)
    }

    /// Parses configuration text; `path` is only used in messages.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn parse(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env = EnvSubstitution::new();
        let expanded = env.substitute(raw, path)?;

        if expanded.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "configuration file is empty".to_owned(),
            });
        }

        let config: ClientConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        Ok(LoadResult {
            config,
            warnings: env.warnings,
        })
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Expands `${VAR}`, `${VAR:-default}`, `${VAR:?message}` and `$$` in raw
/// text before it is parsed, so expanded values get normal YAML typing.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    fn substitute(&mut self, raw: &str, source: &Path) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();
        let mut line = 1usize;

        while let Some(c) = chars.next() {
            match c {
                '\n' => {
                    line += 1;
                    out.push(c);
                }
                '$' if chars.peek() == Some(&'$') => {
                    chars.next();
                    out.push('$');
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    let reference = read_reference(&mut chars).ok_or_else(|| ConfigError::ParseError {
                        path: source.to_path_buf(),
                        line: Some(line),
                        message: "unclosed environment variable reference".to_owned(),
                    })?;
                    let location = format!("{}:{line}", source.display());
                    out.push_str(&self.resolve(&reference, location)?);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn resolve(&mut self, reference: &str, location: String) -> Result<String, ConfigError> {
        let (name, fallback) = match reference.split_once(':') {
            Some((name, rest)) if rest.starts_with('-') || rest.starts_with('?') => {
                (name, Some(rest.split_at(1)))
            }
            _ => (reference, None),
        };

        if let Ok(value) = std::env::var(name) {
            return Ok(value);
        }
        match fallback {
            Some(("-", default)) => Ok(default.to_owned()),
            Some((_, message)) => Err(ConfigError::EnvVarNotSet {
                var: name.to_owned(),
                location: if message.is_empty() {
                    location
                } else {
                    format!("{location}: {message}")
                },
            }),
            None => {
                self.warnings.push(LoadWarning {
                    message: format!("environment variable '{name}' is not set, using empty string"),
                    location: Some(location),
                });
                Ok(String::new())
            }
        }
    }
}

/// Reads up to the matching `}`, allowing nested braces in defaults.
fn read_reference(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut reference = String::new();
    let mut depth = 1usize;
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(reference);
                }
            }
            '\n' => return None,
            _ => {}
        }
        reference.push(c);
    }
    None
}
