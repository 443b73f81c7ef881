//! Shared test utilities for integration tests
//!
//! Environment isolation for configuration tests plus a small introspection
//! payload and a backend used across the generation tests.

use schemagen::error::GenerationError;
use schemagen::generator::{GeneratedState, GenerationContext, Generator, PostCommand};
use schemagen::overlay::Overlay;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes XDG and SCHEMAGEN__* environment access across tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with `XDG_CONFIG_HOME` pointed into `test_dir`, restoring it after.
///
/// Variables named in `vars` are set for the duration of `f` and removed after.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let original = std::env::var("XDG_CONFIG_HOME").ok();

    let config_home = test_dir.path().join("config_home");
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, _) in vars {
        std::env::remove_var(key);
    }
    match original {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    result
}

/// Introspection payload with a root query, one object type and a scalar
pub const PAYLOAD: &str = r#"{
    "__schemaVersion": "v0.12.0",
    "__schema": {
        "queryType": {"name": "Query"},
        "mutationType": null,
        "subscriptionType": null,
        "types": [
            {
                "kind": "OBJECT",
                "name": "Query",
                "fields": [
                    {
                        "name": "container",
                        "type": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Container"}},
                        "args": []
                    }
                ]
            },
            {
                "kind": "OBJECT",
                "name": "Container",
                "description": "An OCI-compatible container",
                "fields": [
                    {"name": "id", "type": {"kind": "SCALAR", "name": "String"}, "args": []},
                    {
                        "name": "withExec",
                        "type": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Container"}},
                        "args": [
                            {
                                "name": "args",
                                "type": {"kind": "LIST", "ofType": {"kind": "SCALAR", "name": "String"}}
                            }
                        ]
                    }
                ]
            },
            {"kind": "SCALAR", "name": "String", "fields": null}
        ]
    }
}"#;

/// Go-flavoured backend used by the end-to-end tests.
///
/// Renders one file per object type under `gen/`. In module mode it also
/// emits `go.mod` and asks for a second pass until `go.mod` is on disk, the
/// way a backend that reads its own project descriptor would.
#[derive(Default)]
pub struct GoLikeGenerator {
    pub calls: AtomicUsize,
}

impl GoLikeGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn client_overlay(ctx: &GenerationContext<'_>) -> Result<Overlay, GenerationError> {
        let mut overlay = Overlay::new();
        for (type_id, ty) in ctx.schema.types() {
            if ctx.schema.fields_of(type_id).next().is_none() {
                continue;
            }
            let mut body = format!("package gen\n\n// {} {}\n", ty.name, ctx.schema_version);
            for (_, field) in ctx.schema.fields_of(type_id) {
                body.push_str(&format!("func {}()\n", field.name));
            }
            overlay.add_file(format!("gen/{}.go", ty.name.to_lowercase()), body)?;
        }
        Ok(overlay)
    }
}

impl Generator for GoLikeGenerator {
    fn generate_module(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<GeneratedState, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.schema.validate_references()?;

        let name = ctx
            .config
            .module_name
            .clone()
            .ok_or_else(|| GenerationError::UnsupportedConfig("module name required".into()))?;
        let descriptor_present = ctx.output.exists(Path::new("go.mod"));

        let mut overlay = Self::client_overlay(ctx)?;
        overlay.add_file("go.mod", format!("module {}\n", name))?;

        Ok(GeneratedState::new(overlay)
            .with_post_command(PostCommand::new("gofmt", ["-w", "gen"]))
            .regenerate(!descriptor_present))
    }

    fn generate_client(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<GeneratedState, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedState::new(Self::client_overlay(ctx)?))
    }
}
