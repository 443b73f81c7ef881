//! Layered configuration loading

use super::merge::merge_policy;
use super::sources::{env, global_file, workspace_file};
use super::CodegenSettings;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`CodegenSettings`].
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`SCHEMAGEN__GENERATION__OUTPUT_DIR`, ...)
/// 2. Workspace file (`<workspace>/schemagen.toml`)
/// 3. Global file (`$XDG_CONFIG_HOME/schemagen/config.toml`)
/// 4. Defaults
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(workspace_root: &Path) -> Result<CodegenSettings, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = env::add_to_builder(builder);

        let settings: CodegenSettings = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            lang = %settings.generation.lang,
            max_passes = settings.regeneration.max_passes,
            "Configuration loaded"
        );
        Ok(settings)
    }

    /// Load a single file over the defaults, ignoring every other source.
    pub fn load_from_file(path: &Path) -> Result<CodegenSettings, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }

    pub fn default() -> CodegenSettings {
        CodegenSettings::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
        workspace_file::workspace_config_path(workspace_root)
    }
}
