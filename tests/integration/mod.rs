//! Integration tests for schema-driven generation

mod http_introspection;
mod regeneration_flow;
mod test_utils;
