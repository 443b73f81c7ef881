//! HTTP introspection against a mock GraphQL endpoint

use crate::integration::test_utils::PAYLOAD;
use schemagen::config::{ConnectionConfig, GenerationConfig};
use schemagen::error::IntrospectionError;
use schemagen::schema::introspection::{introspect_with_timeout, INTROSPECTION_OPERATION};
use schemagen::schema::{resolve_schema, HttpIntrospector, Introspector};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn wrapped_payload() -> String {
    let schema: serde_json::Value = serde_json::from_str(PAYLOAD).unwrap();
    json!({ "data": schema }).to_string()
}

#[tokio::test]
async fn test_introspects_and_links_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_partial_json(json!({ "operationName": INTROSPECTION_OPERATION })))
        .respond_with(ResponseTemplate::new(200).set_body_string(wrapped_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let introspector = HttpIntrospector::new(
        format!("{}/query", server.uri()),
        Some("s3cret".to_string()),
    )
    .unwrap();
    let (schema, version) = introspector.introspect().await.unwrap();

    assert_eq!(version, "v0.12.0");
    let (container_id, _) = schema.type_by_name("Container").unwrap();
    assert!(schema
        .fields_of(container_id)
        .all(|(_, field)| field.parent() == Some(container_id)));
}

#[tokio::test]
async fn test_graphql_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "introspection disabled" }]
        })))
        .mount(&server)
        .await;

    let introspector = HttpIntrospector::new(server.uri(), None).unwrap();
    let err = introspector.introspect().await.unwrap_err();

    assert!(matches!(err, IntrospectionError::Query(ref msg) if msg.contains("introspection disabled")));
}

#[tokio::test]
async fn test_http_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let introspector = HttpIntrospector::new(server.uri(), None).unwrap();
    let err = introspector.introspect().await.unwrap_err();

    assert!(matches!(err, IntrospectionError::Transport(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(wrapped_payload())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let introspector = HttpIntrospector::new(server.uri(), None).unwrap();
    let err = introspect_with_timeout(&introspector, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, IntrospectionError::Timeout(_)));
}

#[tokio::test]
async fn test_resolve_schema_builds_client_from_connection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;

    let config = GenerationConfig {
        connection: Some(ConnectionConfig {
            endpoint: server.uri(),
            ..ConnectionConfig::default()
        }),
        ..GenerationConfig::default()
    };
    let (schema, _) = resolve_schema(&config, None).await.unwrap();

    assert_eq!(schema.query_type().unwrap().name, "Query");
}
