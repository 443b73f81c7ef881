//! Configuration System
//!
//! Immutable generation configuration plus the layered loader that builds it
//! from defaults, the global config file, the workspace file and environment
//! overrides.

use crate::logging::LoggingConfig;
use crate::regeneration::RegenerationPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Target language tag a backend is registered under.
///
/// Tags are compared lowercase, so `Go` and `go` select the same backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SdkLang(String);

impl SdkLang {
    pub fn new(tag: impl AsRef<str>) -> Self {
        SdkLang(tag.as_ref().trim().to_lowercase())
    }

    pub fn go() -> Self {
        SdkLang::new("go")
    }

    pub fn typescript() -> Self {
        SdkLang::new("typescript")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SdkLang {
    fn default() -> Self {
        SdkLang::go()
    }
}

impl From<String> for SdkLang {
    fn from(tag: String) -> Self {
        SdkLang::new(tag)
    }
}

impl From<&str> for SdkLang {
    fn from(tag: &str) -> Self {
        SdkLang::new(tag)
    }
}

impl From<SdkLang> for String {
    fn from(lang: SdkLang) -> Self {
        lang.0
    }
}

impl fmt::Display for SdkLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dependency of the generated module.
///
/// Client backends use the list to serve dependencies automatically when the
/// client connects. Order is preserved exactly as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub kind: String,
    #[serde(rename = "moduleOriginalName", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub pin: String,
    #[serde(rename = "asString", alias = "source")]
    pub source: String,
}

/// Live connection used when no pre-computed introspection payload exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,

    #[serde(default)]
    pub token: Option<String>,

    /// Deadline for the whole introspection call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Also select `__schemaVersion` in the introspection query
    #[serde(default = "default_true")]
    pub request_schema_version: bool,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_schema_version: default_true(),
        }
    }
}

/// How one generation invocation should behave.
///
/// Built once per invocation and shared by reference across passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub lang: SdkLang,

    /// Where generated code is placed
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub module_name: Option<String>,

    /// Subpath of `output_dir` holding the module source
    #[serde(default)]
    pub module_source_path: Option<PathBuf>,

    /// Path from the module source subpath to the project root
    #[serde(default)]
    pub module_parent_path: Option<PathBuf>,

    /// Pre-computed introspection payload; skips live introspection
    #[serde(default)]
    pub introspection_json: Option<String>,

    /// Merge module dependencies into a project descriptor found in a parent directory
    #[serde(default)]
    pub merge: bool,

    /// First-time module initialization
    #[serde(default)]
    pub is_init: bool,

    #[serde(default)]
    pub client_only: bool,

    #[serde(default)]
    pub module_dependencies: Vec<ModuleDependency>,

    /// Produce a bundled standalone client
    #[serde(default)]
    pub bundle: bool,

    #[serde(default)]
    pub connection: Option<ConnectionConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            lang: SdkLang::default(),
            output_dir: default_output_dir(),
            module_name: None,
            module_source_path: None,
            module_parent_path: None,
            introspection_json: None,
            merge: false,
            is_init: false,
            client_only: false,
            module_dependencies: Vec::new(),
            bundle: false,
            connection: None,
        }
    }
}

impl GenerationConfig {
    /// Directory holding the module source: `output_dir` joined with the source subpath.
    pub fn module_root(&self) -> PathBuf {
        match &self.module_source_path {
            Some(sub) => self.output_dir.join(sub),
            None => self.output_dir.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.output_dir.as_os_str().is_empty() {
            errors.push("Output directory cannot be empty".to_string());
        }

        if let Some(sub) = &self.module_source_path {
            let escapes = sub
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                errors.push(format!(
                    "Module source path {:?} must be relative and stay inside the output directory",
                    sub
                ));
            }
        }

        if self.is_init && self.module_name.as_deref().map_or(true, str::is_empty) {
            errors.push("Module initialization requires a module name".to_string());
        }

        for (index, dep) in self.module_dependencies.iter().enumerate() {
            if dep.name.trim().is_empty() {
                errors.push(format!("Module dependency #{} has an empty name", index));
            }
        }

        if let Some(connection) = &self.connection {
            if self.introspection_json.is_none() && connection.endpoint.trim().is_empty() {
                errors.push("Connection endpoint cannot be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodegenSettings {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub regeneration: RegenerationPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Generation(String),
    Regeneration(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Regeneration(msg) => write!(f, "Regeneration: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CodegenSettings {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(msgs) = self.generation.validate() {
            errors.extend(msgs.into_iter().map(ValidationError::Generation));
        }

        if self.regeneration.max_passes == 0 {
            errors.push(ValidationError::Regeneration(
                "max_passes must be at least 1".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Resolve a relative path against a root without touching the filesystem.
pub(crate) fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
