//! Generation Contract
//!
//! What every target-language backend must satisfy. A backend reads the
//! linked schema, the configuration and the current output directory, and
//! returns a [`GeneratedState`]. It never writes to disk: all mutation goes
//! through the overlay merge.

pub mod registry;
pub mod state;

pub use registry::GeneratorRegistry;
pub use state::{GeneratedState, PostCommand};

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::overlay::OutputView;
use crate::schema::Schema;
use std::fmt;

/// Which contract operation a run invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Full module: bindings plus the scaffolding the module needs
    #[default]
    Module,
    /// Client bindings only
    Client,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Module => "module",
            GenerationMode::Client => "client",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of one generation pass.
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    pub schema: &'a Schema,
    pub schema_version: &'a str,
    pub config: &'a GenerationConfig,
    /// 1-based pass number
    pub pass: usize,
    /// Output directory as left by the previous pass
    pub output: &'a dyn OutputView,
}

impl fmt::Debug for GenerationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("schema_types", &self.schema.type_count())
            .field("schema_version", &self.schema_version)
            .field("lang", &self.config.lang)
            .field("pass", &self.pass)
            .field("output", &self.output.root())
            .finish()
    }
}

/// A target-language backend.
///
/// Setting `need_regenerate` on the returned state is the only way to ask for
/// another pass. Errors are reported once and never retried here.
pub trait Generator: Send + Sync {
    fn generate_module(&self, ctx: &GenerationContext<'_>)
        -> Result<GeneratedState, GenerationError>;

    fn generate_client(&self, ctx: &GenerationContext<'_>)
        -> Result<GeneratedState, GenerationError>;

    /// Dispatch on `mode`.
    fn generate(
        &self,
        mode: GenerationMode,
        ctx: &GenerationContext<'_>,
    ) -> Result<GeneratedState, GenerationError> {
        match mode {
            GenerationMode::Module => self.generate_module(ctx),
            GenerationMode::Client => self.generate_client(ctx),
        }
    }
}
