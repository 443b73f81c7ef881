//! End-to-end generation: introspect, link, select backend, converge, post-process.

use crate::config::{CodegenSettings, GenerationConfig};
use crate::error::CodegenError;
use crate::generator::{GenerationMode, Generator, GeneratorRegistry};
use crate::overlay::{FsTarget, OutputTarget};
use crate::regeneration::{
    run_post_commands, PostProcessReport, PostProcessor, ProcessExecutor, RegenerationController,
    RegenerationOutcome, RegenerationPolicy,
};
use crate::schema::{link_parents, resolve_schema, Introspector, Schema};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Pass number reported for failures before the first generation pass
pub const BEFORE_FIRST_PASS: usize = 0;

/// Summary of one invocation
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub schema_version: String,
    pub regeneration: RegenerationOutcome,
    pub post_process: PostProcessReport,
}

/// One configured generation invocation.
///
/// The backend is selected when the pipeline is built and never changes.
pub struct CodegenPipeline {
    config: GenerationConfig,
    policy: RegenerationPolicy,
    generator: Arc<dyn Generator>,
}

impl CodegenPipeline {
    pub fn new(
        config: GenerationConfig,
        registry: &GeneratorRegistry,
        policy: RegenerationPolicy,
    ) -> Result<Self, CodegenError> {
        let generator = registry
            .select(&config.lang)
            .map_err(|source| CodegenError::Generation {
                pass: BEFORE_FIRST_PASS,
                source,
            })?;
        Ok(Self {
            config,
            policy,
            generator,
        })
    }

    /// Build from loaded settings, rejecting invalid ones.
    pub fn from_settings(
        settings: &CodegenSettings,
        registry: &GeneratorRegistry,
    ) -> Result<Self, CodegenError> {
        if let Err(errors) = settings.validate() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(CodegenError::Config(messages.join("; ")));
        }
        Self::new(
            settings.generation.clone(),
            registry,
            settings.regeneration.clone(),
        )
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Executor that runs post commands under the output directory.
    pub fn process_executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.config.output_dir.clone())
    }

    /// Obtain the schema, then generate into `output_dir`.
    ///
    /// Dropping the returned future during introspection cancels the run
    /// before anything is written.
    #[instrument(skip_all, fields(lang = %self.config.lang, mode = %mode))]
    pub async fn run(
        &self,
        mode: GenerationMode,
        introspector: Option<&dyn Introspector>,
        executor: &dyn PostProcessor,
        log: &mut dyn Write,
    ) -> Result<PipelineReport, CodegenError> {
        let (schema, schema_version) = resolve_schema(&self.config, introspector).await?;
        let target = FsTarget::create(self.config.output_dir.clone()).map_err(|source| {
            CodegenError::Merge {
                pass: BEFORE_FIRST_PASS,
                source,
            }
        })?;
        self.generate(&schema, &schema_version, mode, &target, executor, log)
    }

    /// Generate from `schema` into `target`, then run the collected post
    /// commands.
    ///
    /// A schema whose field parents are not linked yet is linked on a copy
    /// first, so generators always see owning types.
    pub fn generate<T: OutputTarget>(
        &self,
        schema: &Schema,
        schema_version: &str,
        mode: GenerationMode,
        target: &T,
        executor: &dyn PostProcessor,
        log: &mut dyn Write,
    ) -> Result<PipelineReport, CodegenError> {
        let start = Instant::now();
        let linked;
        let schema = if schema.is_linked() {
            schema
        } else {
            debug!("Linking field parents before generation");
            let mut copy = schema.clone();
            link_parents(&mut copy);
            linked = copy;
            &linked
        };
        schema
            .validate_references()
            .map_err(|source| CodegenError::Generation {
                pass: BEFORE_FIRST_PASS,
                source,
            })?;

        info!(
            types = schema.type_count(),
            fields = schema.field_count(),
            schema_version,
            output = %target.root().display(),
            "Generating"
        );

        let mut controller =
            RegenerationController::new(self.generator.clone(), &self.config, self.policy.clone());
        let regeneration = controller.run(schema, schema_version, mode, target, log)?;
        let post_process = run_post_commands(&regeneration.post_commands, executor)?;

        info!(
            passes = regeneration.passes,
            files_written = regeneration.files_written(),
            post_commands = post_process.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(PipelineReport {
            schema_version: schema_version.to_string(),
            regeneration,
            post_process,
        })
    }
}

impl std::fmt::Debug for CodegenPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodegenPipeline")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
