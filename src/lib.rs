//! Schemagen: Schema-Driven Code Generation
//!
//! Turns an introspected API schema into source code for a target language,
//! merges the generated tree into a project directory without clobbering
//! untouched files, and regenerates until the output stops changing the
//! inputs to generation.

pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod regeneration;
pub mod schema;

pub use config::{CodegenSettings, ConfigLoader, GenerationConfig, ModuleDependency, SdkLang};
pub use error::{CodegenError, GenerationError, IntrospectionError, MergeError, PostProcessError};
pub use generator::{
    GeneratedState, GenerationContext, GenerationMode, Generator, GeneratorRegistry, PostCommand,
};
pub use overlay::{apply_overlay, FsTarget, MemoryTarget, MergeReport, Overlay, OutputTarget, OutputView};
pub use pipeline::{CodegenPipeline, PipelineReport};
pub use regeneration::{
    run_post_commands, CeilingPolicy, RegenerationController, RegenerationOutcome,
    RegenerationPolicy,
};
pub use schema::{link_parents, Schema};
