//! Integration tests for the regeneration controller against real directories

use crate::integration::test_utils::{GoLikeGenerator, PAYLOAD};
use schemagen::config::GenerationConfig;
use schemagen::error::{CodegenError, GenerationError};
use schemagen::generator::{GeneratedState, GenerationContext, GenerationMode, Generator};
use schemagen::overlay::{FsTarget, Overlay};
use schemagen::regeneration::{
    CeilingPolicy, ControllerState, RegenerationController, RegenerationPolicy,
};
use schemagen::schema::Schema;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn module_config() -> GenerationConfig {
    GenerationConfig {
        module_name: Some("example.com/ci".to_string()),
        ..GenerationConfig::default()
    }
}

#[test]
fn test_descriptor_backend_converges_in_two_passes() {
    let temp_dir = TempDir::new().unwrap();
    let target = FsTarget::new(temp_dir.path());
    let (schema, version) = Schema::from_introspection_json(PAYLOAD).unwrap();
    let generator = Arc::new(GoLikeGenerator::default());
    let config = module_config();

    let mut controller =
        RegenerationController::new(generator.clone(), &config, RegenerationPolicy::default());
    let mut log = Vec::new();
    let outcome = controller
        .run(&schema, &version, GenerationMode::Module, &target, &mut log)
        .unwrap();

    assert_eq!(generator.calls(), 2);
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.merges.len(), 2);
    assert!(!outcome.ceiling_reached);
    assert!(outcome.merges[1].is_noop());
    // One gofmt per pass, accumulated without deduplication
    assert_eq!(outcome.post_commands.len(), 2);
    assert_eq!(controller.state(), ControllerState::Converged);

    assert_eq!(
        fs::read_to_string(temp_dir.path().join("go.mod")).unwrap(),
        "module example.com/ci\n"
    );
    let container = fs::read_to_string(temp_dir.path().join("gen/container.go")).unwrap();
    assert!(container.contains("func withExec()"));
    assert!(container.contains("v0.12.0"));

    let log = String::from_utf8(log).unwrap();
    assert_eq!(log.matches("writing go.mod").count(), 2);
    assert!(log.contains("writing go.mod [skipped]"));
}

#[test]
fn test_existing_descriptor_needs_one_pass() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("go.mod"), "module example.com/ci\n").unwrap();
    let target = FsTarget::new(temp_dir.path());
    let (schema, version) = Schema::from_introspection_json(PAYLOAD).unwrap();
    let generator = Arc::new(GoLikeGenerator::default());
    let config = module_config();

    let outcome = RegenerationController::new(generator.clone(), &config, RegenerationPolicy::default())
        .run(&schema, &version, GenerationMode::Module, &target, &mut Vec::new())
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.merges[0].files_skipped(), 1);
}

/// Rewrites a counter file on every pass and never settles
struct Restless {
    calls: AtomicUsize,
}

impl Generator for Restless {
    fn generate_module(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<GeneratedState, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut overlay = Overlay::new();
        overlay.add_file("state/pass", ctx.pass.to_string())?;
        Ok(GeneratedState::new(overlay).regenerate(true))
    }

    fn generate_client(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<GeneratedState, GenerationError> {
        self.generate_module(ctx)
    }
}

#[test]
fn test_restless_backend_terminates_at_ceiling() {
    let temp_dir = TempDir::new().unwrap();
    let target = FsTarget::new(temp_dir.path());
    let generator = Arc::new(Restless {
        calls: AtomicUsize::new(0),
    });
    let config = GenerationConfig::default();
    let policy = RegenerationPolicy {
        max_passes: 5,
        on_ceiling: CeilingPolicy::Converge,
    };

    let outcome = RegenerationController::new(generator.clone(), &config, policy)
        .run(&Schema::default(), "", GenerationMode::Client, &target, &mut Vec::new())
        .unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 5);
    assert!(outcome.ceiling_reached);
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("state/pass")).unwrap(),
        "5"
    );
}

#[test]
fn test_restless_backend_fails_under_strict_policy() {
    let temp_dir = TempDir::new().unwrap();
    let target = FsTarget::new(temp_dir.path());
    let config = GenerationConfig::default();
    let policy = RegenerationPolicy {
        max_passes: 2,
        on_ceiling: CeilingPolicy::Fail,
    };

    let err = RegenerationController::new(
        Arc::new(Restless {
            calls: AtomicUsize::new(0),
        }),
        &config,
        policy,
    )
    .run(&Schema::default(), "", GenerationMode::Module, &target, &mut Vec::new())
    .unwrap_err();

    assert!(matches!(err, CodegenError::NotConverged { passes: 2 }));
    // Output of completed passes stays on disk
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("state/pass")).unwrap(),
        "2"
    );
}

#[test]
fn test_missing_module_name_fails_first_pass() {
    let temp_dir = TempDir::new().unwrap();
    let target = FsTarget::new(temp_dir.path());
    let (schema, version) = Schema::from_introspection_json(PAYLOAD).unwrap();
    let config = GenerationConfig::default();

    let err = RegenerationController::new(
        Arc::new(GoLikeGenerator::default()),
        &config,
        RegenerationPolicy::default(),
    )
    .run(&schema, &version, GenerationMode::Module, &target, &mut Vec::new())
    .unwrap_err();

    assert!(matches!(
        err,
        CodegenError::Generation {
            pass: 1,
            source: GenerationError::UnsupportedConfig(_)
        }
    ));
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}
