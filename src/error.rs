//! Error types for schema-driven code generation.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while obtaining the schema graph.
///
/// Always raised before any overlay exists, so nothing has been written.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("Introspection transport failed: {0}")]
    Transport(String),

    #[error("Introspection query returned errors: {0}")]
    Query(String),

    #[error("Failed to decode introspection payload: {0}")]
    Decode(String),

    #[error("Introspection timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("No introspection payload and no connection configured")]
    MissingConnection,
}

/// A backend could not produce a generated state.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Template rendering failed: {0}")]
    Render(String),

    #[error("Unknown sdk language: {0}")]
    UnknownLanguage(String),

    #[error("Invalid overlay entry {path:?}: {reason}")]
    InvalidOverlay { path: PathBuf, reason: String },
}

/// Filesystem failure while applying an overlay.
///
/// Files committed before the failing entry stay on disk.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path escapes output root: {path:?}")]
    PathEscapesRoot { path: PathBuf },

    #[error("Failed to write merge log: {0}")]
    Log(#[source] std::io::Error),
}

impl MergeError {
    /// Path of the entry that failed, if the failure is tied to one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            MergeError::CreateDir { path, .. }
            | MergeError::Read { path, .. }
            | MergeError::Write { path, .. }
            | MergeError::PathEscapesRoot { path } => Some(path),
            MergeError::Log(_) => None,
        }
    }
}

/// A post-processing command failed; later commands were not run.
#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("Post command #{index} `{command}` could not be started: {source}")]
    Spawn {
        index: usize,
        command: String,
        succeeded: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("Post command #{index} `{command}` exited with {status}")]
    Failed {
        index: usize,
        command: String,
        status: String,
        succeeded: Vec<String>,
    },
}

impl PostProcessError {
    /// Zero-based position of the failing command in the sequence.
    pub fn index(&self) -> usize {
        match self {
            PostProcessError::Spawn { index, .. } | PostProcessError::Failed { index, .. } => {
                *index
            }
        }
    }

    /// Command lines that completed successfully before the failure.
    pub fn succeeded(&self) -> &[String] {
        match self {
            PostProcessError::Spawn { succeeded, .. }
            | PostProcessError::Failed { succeeded, .. } => succeeded,
        }
    }
}

/// Umbrella error returned to callers of the pipeline and controller.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("Generation pass {pass} failed: {source}")]
    Generation {
        pass: usize,
        #[source]
        source: GenerationError,
    },

    #[error("Merge during pass {pass} failed: {source}")]
    Merge {
        pass: usize,
        #[source]
        source: MergeError,
    },

    #[error(transparent)]
    PostProcess(#[from] PostProcessError),

    #[error("Regeneration did not converge after {passes} passes")]
    NotConverged { passes: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for CodegenError {
    fn from(err: config::ConfigError) -> Self {
        CodegenError::Config(err.to_string())
    }
}
