//! Config document location, parsing and validation.
//!
//! A document is YAML holding either a single task object or a list of
//! them. Every definition is checked for a `src` at load time so that a
//! broken document is rejected before any command runs.
pub mod data_store;
pub mod normalize;
pub mod task;
pub mod template;

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::ConfigError;
use task::{DestBlock, Endpoint, TaskDefinition};

/// File looked up in the working directory when no document is given or the
/// given one does not exist.
pub const DEFAULT_FILE: &str = "rsync.yml";

/// How the document path was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// The requested file (or the default when none was requested).
    Requested(PathBuf),
    /// The requested file was missing; the default file was used instead.
    Fallback {
        /// Path that was asked for.
        requested: PathBuf,
        /// Default file that will be loaded.
        path: PathBuf,
    },
}

impl Located {
    /// Path of the document that will be loaded.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Requested(path) | Self::Fallback { path, .. } => path,
        }
    }
}

/// Find the document to load.
///
/// A requested path is resolved against `cwd`. When it does not exist,
/// `<cwd>/rsync.yml` is tried instead.
///
/// # Errors
///
/// Returns [`ConfigError::MissingConfig`] when neither file exists.
pub fn locate(requested: Option<&Path>, cwd: &Path) -> Result<Located, ConfigError> {
    let default = cwd.join(DEFAULT_FILE);
    let Some(requested) = requested else {
        return if default.is_file() {
            Ok(Located::Requested(canonical(default)))
        } else {
            Err(ConfigError::MissingConfig(default))
        };
    };

    let requested = cwd.join(requested);
    if requested.is_file() {
        return Ok(Located::Requested(canonical(requested)));
    }
    if default.is_file() {
        return Ok(Located::Fallback {
            requested,
            path: canonical(default),
        });
    }
    Err(ConfigError::MissingConfig(requested))
}

fn canonical(path: PathBuf) -> PathBuf {
    dunce::canonicalize(&path).unwrap_or(path)
}

/// A parsed config document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the document was read from.
    pub path: PathBuf,
    /// Task definitions in document order.
    pub tasks: Vec<TaskDefinition>,
}

impl Document {
    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, and otherwise
    /// the errors of [`Document::parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse document text. `path` is only used for the config stem and
    /// error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or an empty
    /// document, [`ConfigError::MissingSource`] when a definition has no
    /// `src`, and [`ConfigError::InvalidCopies`] for `copies: 0`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let value: Value = serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        let tasks: Vec<TaskDefinition> = match value {
            Value::Null => return Err(parse_error("document contains no tasks".to_string())),
            Value::Sequence(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_yaml::from_value(item)
                        .map_err(|e| parse_error(format!("task #{}: {e}", i + 1)))
                })
                .collect::<Result<_, _>>()?,
            other => vec![serde_yaml::from_value(other).map_err(|e| parse_error(e.to_string()))?],
        };

        if let Some((index, def)) = tasks.iter().enumerate().find(|(_, d)| d.src.is_none()) {
            return Err(ConfigError::MissingSource {
                task: def.label(index),
            });
        }

        for (index, def) in tasks.iter().enumerate() {
            if let Some(Endpoint::Block(DestBlock {
                copies: Some(0), ..
            })) = &def.dest
            {
                return Err(ConfigError::InvalidCopies {
                    task: def.label(index),
                    copies: 0,
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            tasks,
        })
    }

    /// Document file name minus its last extension.
    #[must_use]
    pub fn config_stem(&self) -> String {
        normalize::config_stem(&self.path)
    }
}
