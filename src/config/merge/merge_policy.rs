//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("generation.lang", "go")?
        .set_default("generation.output_dir", ".")?
        .set_default("regeneration.max_passes", 2)?
        .set_default("regeneration.on_ceiling", "converge")
}
