//! Regeneration Controller
//!
//! Drives generation passes to a fixpoint. Each pass asks the backend for a
//! [`GeneratedState`], merges its overlay, and runs again only while the
//! backend reports that the written output changes its inputs. The number of
//! passes is bounded by [`RegenerationPolicy::max_passes`]. Post commands
//! collected along the way run once, after convergence.

use crate::config::{resolve_under, GenerationConfig};
use crate::error::{CodegenError, PostProcessError};
use crate::generator::{GeneratedState, GenerationContext, GenerationMode, Generator, PostCommand};
use crate::overlay::{apply_overlay, MergeReport, OutputTarget};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// What to do when the pass ceiling is hit and the backend still wants more
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeilingPolicy {
    /// Accept the last merged output and log a warning
    #[default]
    Converge,
    /// Fail with [`CodegenError::NotConverged`]
    Fail,
}

/// Bounds on the fixpoint loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationPolicy {
    /// Total generation passes allowed, the first one included
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    #[serde(default)]
    pub on_ceiling: CeilingPolicy,
}

fn default_max_passes() -> usize {
    2
}

impl Default for RegenerationPolicy {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            on_ceiling: CeilingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Generating,
    Merging,
    Converged,
    Failed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Generating => "generating",
            ControllerState::Merging => "merging",
            ControllerState::Converged => "converged",
            ControllerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a converged run
#[derive(Debug, Clone, Default)]
pub struct RegenerationOutcome {
    /// Generation passes run
    pub passes: usize,
    /// One merge report per pass, in pass order
    pub merges: Vec<MergeReport>,
    /// Post commands of every pass, in emission order
    pub post_commands: Vec<PostCommand>,
    /// The backend still asked for a pass when the ceiling was reached
    pub ceiling_reached: bool,
    /// State transitions, starting at `Idle`
    pub states: Vec<ControllerState>,
}

impl RegenerationOutcome {
    pub fn files_written(&self) -> usize {
        self.merges.iter().map(MergeReport::files_written).sum()
    }

    pub fn dirs_created(&self) -> usize {
        self.merges.iter().map(MergeReport::dirs_created).sum()
    }
}

/// Runs one backend to convergence against one output directory.
pub struct RegenerationController<'a> {
    generator: Arc<dyn Generator>,
    config: &'a GenerationConfig,
    policy: RegenerationPolicy,
    states: Vec<ControllerState>,
}

impl<'a> RegenerationController<'a> {
    pub fn new(
        generator: Arc<dyn Generator>,
        config: &'a GenerationConfig,
        policy: RegenerationPolicy,
    ) -> Self {
        Self {
            generator,
            config,
            policy,
            states: vec![ControllerState::Idle],
        }
    }

    pub fn state(&self) -> ControllerState {
        self.states
            .last()
            .copied()
            .unwrap_or(ControllerState::Idle)
    }

    /// Transitions of the latest run, including a failed one.
    pub fn states(&self) -> &[ControllerState] {
        &self.states
    }

    pub fn policy(&self) -> &RegenerationPolicy {
        &self.policy
    }

    fn transition(&mut self, next: ControllerState) {
        debug!(from = %self.state(), to = %next, "Controller transition");
        self.states.push(next);
    }

    /// Generate and merge until the backend stops asking for another pass.
    ///
    /// Each run starts a fresh state trace from `Idle`. Output merged by
    /// earlier passes stays on disk when a later pass fails.
    #[instrument(skip_all, fields(lang = %self.config.lang, mode = %mode))]
    pub fn run<T: OutputTarget>(
        &mut self,
        schema: &Schema,
        schema_version: &str,
        mode: GenerationMode,
        target: &T,
        log: &mut dyn Write,
    ) -> Result<RegenerationOutcome, CodegenError> {
        let start = Instant::now();
        let max_passes = self.policy.max_passes.max(1);
        let mut outcome = RegenerationOutcome::default();

        self.states = vec![ControllerState::Idle];
        self.transition(ControllerState::Generating);
        loop {
            let pass = outcome.passes + 1;
            info!(pass, max_passes, "Starting generation pass");

            let ctx = GenerationContext {
                schema,
                schema_version,
                config: self.config,
                pass,
                output: target,
            };
            let state: GeneratedState = match self.generator.generate(mode, &ctx) {
                Ok(state) => state,
                Err(source) => {
                    error!(pass, error = %source, "Generation pass failed");
                    self.transition(ControllerState::Failed);
                    return Err(CodegenError::Generation { pass, source });
                }
            };
            outcome.passes = pass;

            self.transition(ControllerState::Merging);
            let report = match apply_overlay(&state.overlay, target, log) {
                Ok(report) => report,
                Err(source) => {
                    error!(pass, error = %source, "Overlay merge failed");
                    self.transition(ControllerState::Failed);
                    return Err(CodegenError::Merge { pass, source });
                }
            };
            info!(
                pass,
                files_written = report.files_written(),
                files_skipped = report.files_skipped(),
                need_regenerate = state.need_regenerate,
                "Generation pass merged"
            );
            outcome.merges.push(report);
            outcome.post_commands.extend(state.post_commands);

            if !state.need_regenerate {
                break;
            }

            if pass >= max_passes {
                match self.policy.on_ceiling {
                    CeilingPolicy::Converge => {
                        warn!(
                            passes = pass,
                            "Backend still requests regeneration at the pass ceiling, keeping last output"
                        );
                        outcome.ceiling_reached = true;
                        break;
                    }
                    CeilingPolicy::Fail => {
                        error!(passes = pass, "Regeneration did not converge");
                        self.transition(ControllerState::Failed);
                        return Err(CodegenError::NotConverged { passes: pass });
                    }
                }
            }

            self.transition(ControllerState::Generating);
        }

        self.transition(ControllerState::Converged);
        outcome.states = self.states.clone();
        info!(
            passes = outcome.passes,
            post_commands = outcome.post_commands.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation converged"
        );
        Ok(outcome)
    }
}

/// How a post command finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub success: bool,
    /// Exit status plus any diagnostics worth surfacing
    pub description: String,
}

impl ExecutionStatus {
    pub fn success() -> Self {
        Self {
            success: true,
            description: "exit status: 0".to_string(),
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            success: false,
            description: description.into(),
        }
    }
}

/// Executes post commands.
///
/// `Err` means the command could not be started; a started command that
/// exits unsuccessfully returns `Ok` with a failed status.
pub trait PostProcessor: Send + Sync {
    fn execute(&self, command: &PostCommand) -> io::Result<ExecutionStatus>;
}

/// Runs post commands as child processes rooted at the output directory
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    root: PathBuf,
}

impl ProcessExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn working_dir(&self, command: &PostCommand) -> PathBuf {
        match &command.working_dir {
            Some(dir) => resolve_under(&self.root, dir),
            None => self.root.clone(),
        }
    }
}

impl PostProcessor for ProcessExecutor {
    fn execute(&self, command: &PostCommand) -> io::Result<ExecutionStatus> {
        let dir = self.working_dir(command);
        debug!(command = %command.command_line(), dir = %dir.display(), "Spawning post command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&dir)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(command = %command.command_line(), stdout = %stdout.trim(), "Post command output");
        }

        if output.status.success() {
            Ok(ExecutionStatus::success())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let description = if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr.trim())
            };
            Ok(ExecutionStatus::failure(description))
        }
    }
}

/// Logs post commands without running them
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl PostProcessor for NoopExecutor {
    fn execute(&self, command: &PostCommand) -> io::Result<ExecutionStatus> {
        info!(command = %command, "Skipping post command (dry run)");
        Ok(ExecutionStatus::success())
    }
}

/// Commands that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostProcessReport {
    pub executed: Vec<String>,
}

impl PostProcessReport {
    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Run post commands in order, stopping at the first failure.
///
/// The error names the failing index and command and lists the commands
/// that already succeeded. Nothing is retried.
pub fn run_post_commands(
    commands: &[PostCommand],
    executor: &dyn PostProcessor,
) -> Result<PostProcessReport, PostProcessError> {
    let mut report = PostProcessReport::default();

    for (index, command) in commands.iter().enumerate() {
        let line = command.command_line();
        let start = Instant::now();

        match executor.execute(command) {
            Ok(status) if status.success => {
                info!(
                    index,
                    command = %line,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Post command finished"
                );
                report.executed.push(line);
            }
            Ok(status) => {
                error!(index, command = %line, status = %status.description, "Post command failed");
                return Err(PostProcessError::Failed {
                    index,
                    command: line,
                    status: status.description,
                    succeeded: report.executed,
                });
            }
            Err(source) => {
                error!(index, command = %line, error = %source, "Post command could not be started");
                return Err(PostProcessError::Spawn {
                    index,
                    command: line,
                    succeeded: report.executed,
                    source,
                });
            }
        }
    }

    Ok(report)
}
