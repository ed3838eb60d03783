//! Admin API HTTP client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::bind::{Route, bind_all};
use crate::config::ClientConfig;
use crate::envelope::{GraphqlPayload, GraphqlResponse};
use crate::error::{ClientError, ConfigError};
use crate::logging::{DEFAULT_REDACT_FIELDS, redact_sensitive};
use crate::multi::CompiledRequest;
use crate::rest::RestRequest;

/// Header carrying the admin API access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-shopify-access-token";

/// Client request metrics.
#[derive(Debug, Default)]
#[allow(clippy::struct_field_names)]
pub struct ClientMetrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_error: AtomicU64,
}

impl ClientMetrics {
    /// Snapshot current metrics.
    #[must_use]
    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
        }
    }

    fn record<T>(&self, result: &Result<T, ClientError>) {
        let counter = if result.is_ok() {
            &self.requests_success
        } else {
            &self.requests_error
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct ClientMetricsSnapshot {
    /// Total requests.
    pub requests_total: u64,
    /// Requests that completed without error.
    pub requests_success: u64,
    /// Requests that failed at any stage.
    pub requests_error: u64,
}

/// Client builder.
#[derive(Debug, Clone)]
pub struct GraphqlClientBuilder {
    config: ClientConfig,
    headers: HeaderMap,
}

impl GraphqlClientBuilder {
    /// Create a builder for `shop` authenticated with `access_token`.
    #[must_use]
    pub fn new(shop: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(shop, access_token))
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            headers: HeaderMap::new(),
        }
    }

    /// Set the admin API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Send requests to `base_url` instead of the shop host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Log request and response bodies at debug level.
    #[must_use]
    pub const fn with_log_bodies(mut self, enabled: bool) -> Self {
        self.config.log_bodies = enabled;
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphqlClient, ClientError> {
        GraphqlClient::with_headers(self.config, self.headers)
    }
}

/// Admin API client for GraphQL and REST requests.
///
/// Cloning is cheap; clones share the connection pool and metrics.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    metrics: Arc<ClientMetrics>,
}

impl GraphqlClient {
    /// Create a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_headers(config, HeaderMap::new())
    }

    /// Create a client from `SHOPIFY_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(
        shop: impl Into<String>,
        access_token: impl Into<String>,
    ) -> GraphqlClientBuilder {
        GraphqlClientBuilder::new(shop, access_token)
    }

    fn with_headers(config: ClientConfig, extra: HeaderMap) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut token = HeaderValue::from_str(&config.access_token).map_err(|_| {
            ConfigError::InvalidHeader {
                name: ACCESS_TOKEN_HEADER.to_string(),
            }
        })?;
        token.set_sensitive(true);
        headers.insert(HeaderName::from_static(ACCESS_TOKEN_HEADER), token);
        headers.extend(extra);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .user_agent(format!("shopify-graphql/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            metrics: Arc::new(ClientMetrics::default()),
        })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Return client metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> ClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Prepare a GraphQL query or mutation.
    pub fn request(&self, query: impl Into<String>) -> GraphqlRequest<'_> {
        GraphqlRequest {
            client: self,
            query: query.into(),
            variables: Map::new(),
            timeout: None,
        }
    }

    /// Send a compiled multi-operation request and populate its routes.
    pub async fn execute_multi(&self, compiled: CompiledRequest<'_>) -> Result<(), ClientError> {
        let (query, variables, routes) = compiled.into_parts();
        self.request(query).variables(variables).send(routes).await
    }

    /// Prepare a REST request for `route` (without the `.json` suffix).
    pub fn rest(&self, method: Method, route: impl Into<String>) -> RestRequest<'_> {
        RestRequest::new(self, method, route.into())
    }

    pub(crate) fn log_bodies(&self) -> bool {
        self.config.log_bodies
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request and return status and body bytes.
    #[instrument(skip(self, request))]
    pub(crate) async fn send_once(
        &self,
        method: &Method,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ClientError> {
        self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), len = bytes.len(), "response received");
        if self.config.log_bodies {
            debug!(body = %String::from_utf8_lossy(&bytes), "response body");
        }
        Ok((status, bytes.to_vec()))
    }

    pub(crate) fn record<T>(&self, result: &Result<T, ClientError>) {
        self.metrics.record(result);
    }

    async fn post_graphql(
        &self,
        query: &str,
        variables: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, ClientError> {
        let payload = GraphqlPayload { query, variables };
        if self.config.log_bodies {
            let logged = redact_sensitive(&serde_json::to_value(&payload)?, DEFAULT_REDACT_FIELDS);
            debug!(body = %logged, "GraphQL request body");
        }

        let url = self.config.endpoint("graphql");
        let mut request = self.http.post(&url).json(&payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let (status, bytes) = self.send_once(&Method::POST, &url, request).await?;
        check_status(status, &bytes)?;
        let response: GraphqlResponse = serde_json::from_slice(&bytes)?;
        response.into_data()
    }
}

/// A prepared GraphQL request.
#[derive(Debug)]
#[must_use = "requests do nothing until sent"]
pub struct GraphqlRequest<'c> {
    client: &'c GraphqlClient,
    query: String,
    variables: Map<String, Value>,
    timeout: Option<Duration>,
}

impl GraphqlRequest<'_> {
    /// Set one variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set variables from ordered `(name, value)` pairs.
    pub fn variables(mut self, variables: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Deadline for this request, overriding the client timeout.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send the request and return the `data` tree (`null` when absent).
    pub async fn send_raw(self) -> Result<Value, ClientError> {
        let client = self.client;
        let result = client
            .post_graphql(&self.query, &self.variables, self.timeout)
            .await;
        client.record(&result);
        result
    }

    /// Send the request and populate `routes` from the `data` tree.
    ///
    /// Paths are relative to `data`. With no routes the response is only
    /// checked for errors.
    pub async fn send(self, routes: Vec<Route<'_>>) -> Result<(), ClientError> {
        let client = self.client;
        let result = async {
            let data = client
                .post_graphql(&self.query, &self.variables, self.timeout)
                .await?;
            if routes.is_empty() {
                return Ok(());
            }
            if data.is_null() {
                return Err(ClientError::MissingData);
            }
            bind_all(routes, &data)?;
            Ok(())
        }
        .await;
        client.record(&result);
        result
    }

    /// Send the request and deserialize the whole `data` tree.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let client = self.client;
        let result = async {
            let data = client
                .post_graphql(&self.query, &self.variables, self.timeout)
                .await?;
            if data.is_null() {
                return Err(ClientError::MissingData);
            }
            Ok(serde_json::from_value(data)?)
        }
        .await;
        client.record(&result);
        result
    }
}

/// Map 401 and other non-success statuses to errors.
pub(crate) fn check_status(status: StatusCode, bytes: &[u8]) -> Result<(), ClientError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
        return Err(ClientError::HttpStatus {
            status,
            body: truncate_body(bytes),
        });
    }
    Ok(())
}

fn truncate_body(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 4096;
    let mut body = String::from_utf8_lossy(bytes).to_string();
    if body.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
