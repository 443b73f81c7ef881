//! Schema introspection
//!
//! The introspection transport is a collaborator behind [`Introspector`]. The
//! pipeline either decodes a pre-computed payload or asks a live introspector,
//! bounded by a timeout. Dropping the returned future cancels the call; since
//! no overlay exists yet, a cancelled introspection leaves the output
//! directory untouched.

use crate::config::{ConnectionConfig, GenerationConfig};
use crate::error::IntrospectionError;
use crate::schema::graph::{decode_introspection, link_parents, Schema};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// GraphQL operation name sent with the introspection query
pub const INTROSPECTION_OPERATION: &str = "IntrospectionQuery";

const TYPE_REF_FRAGMENT: &str = r#"
fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
        }
      }
    }
  }
}

fragment InputValue on __InputValue {
  name
  description
  defaultValue
  type {
    ...TypeRef
  }
}
"#;

const SCHEMA_SELECTION: &str = r#"
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      kind
      name
      description
      fields(includeDeprecated: true) {
        name
        description
        args {
          ...InputValue
        }
        type {
          ...TypeRef
        }
        isDeprecated
        deprecationReason
      }
      inputFields {
        ...InputValue
      }
      enumValues(includeDeprecated: true) {
        name
        description
        isDeprecated
        deprecationReason
      }
    }
  }
"#;

/// Build the introspection query document.
///
/// `with_schema_version` adds the `__schemaVersion` selection some servers
/// expose alongside `__schema`.
pub fn introspection_query(with_schema_version: bool) -> String {
    let version = if with_schema_version {
        "  __schemaVersion\n"
    } else {
        ""
    };
    format!(
        "query {} {{\n{}{}}}\n{}",
        INTROSPECTION_OPERATION, version, SCHEMA_SELECTION, TYPE_REF_FRAGMENT
    )
}

/// Source of a schema graph and its version tag.
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Fetch and link the schema. Fails with the transport cause wrapped.
    async fn introspect(&self) -> Result<(Schema, String), IntrospectionError>;
}

/// Introspector speaking GraphQL over HTTP
pub struct HttpIntrospector {
    client: Client,
    endpoint: String,
    token: Option<String>,
    with_schema_version: bool,
}

impl HttpIntrospector {
    pub fn new(endpoint: String, token: Option<String>) -> Result<Self, IntrospectionError> {
        Self::from_connection(&ConnectionConfig {
            endpoint,
            token,
            ..ConnectionConfig::default()
        })
    }

    pub fn from_connection(connection: &ConnectionConfig) -> Result<Self, IntrospectionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connection.connect_timeout_secs))
            .build()
            .map_err(|e| {
                IntrospectionError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            endpoint: connection.endpoint.clone(),
            token: connection.token.clone(),
            with_schema_version: connection.request_schema_version,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_http_error(error: reqwest::Error) -> IntrospectionError {
    if let Some(status) = error.status() {
        IntrospectionError::Transport(format!("Request failed with status {}: {}", status, error))
    } else if error.is_connect() {
        IntrospectionError::Transport(format!("Connection error: {}", error))
    } else if error.is_decode() {
        IntrospectionError::Decode(error.to_string())
    } else {
        IntrospectionError::Transport(format!("HTTP error: {}", error))
    }
}

#[async_trait]
impl Introspector for HttpIntrospector {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn introspect(&self) -> Result<(Schema, String), IntrospectionError> {
        let body = json!({
            "query": introspection_query(self.with_schema_version),
            "operationName": INTROSPECTION_OPERATION,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?;
        let text = response.text().await.map_err(map_http_error)?;
        debug!(bytes = text.len(), "Received introspection response");

        let decoded = decode_introspection(&text)?;
        let mut schema = Schema::from_raw(decoded.schema);
        link_parents(&mut schema);
        Ok((schema, decoded.schema_version))
    }
}

/// Run an introspector under a deadline.
pub async fn introspect_with_timeout(
    introspector: &dyn Introspector,
    timeout: Duration,
) -> Result<(Schema, String), IntrospectionError> {
    match tokio::time::timeout(timeout, introspector.introspect()).await {
        Ok(result) => result,
        Err(_) => Err(IntrospectionError::Timeout(timeout)),
    }
}

/// Obtain the linked schema for a configuration.
///
/// A pre-computed `introspection_json` wins; otherwise `introspector` is used,
/// falling back to an [`HttpIntrospector`] built from `config.connection`.
pub async fn resolve_schema(
    config: &GenerationConfig,
    introspector: Option<&dyn Introspector>,
) -> Result<(Schema, String), IntrospectionError> {
    if let Some(payload) = config.introspection_json.as_deref() {
        info!("Using pre-computed introspection payload");
        return Schema::from_introspection_json(payload);
    }

    let timeout = config
        .connection
        .as_ref()
        .map(|c| Duration::from_secs(c.timeout_secs))
        .unwrap_or_else(|| Duration::from_secs(ConnectionConfig::default().timeout_secs));

    if let Some(introspector) = introspector {
        info!("Introspecting schema");
        return introspect_with_timeout(introspector, timeout).await;
    }

    let connection = config
        .connection
        .as_ref()
        .ok_or(IntrospectionError::MissingConnection)?;
    let http = HttpIntrospector::from_connection(connection)?;
    info!(endpoint = %http.endpoint(), "Introspecting schema over HTTP");
    introspect_with_timeout(&http, timeout).await
}
