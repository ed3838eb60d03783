//! REST requests routed through the same extraction engine.
//!
//! REST responses have no `data` envelope: routes address the decoded body
//! directly, e.g. `"themes.*"` or `"asset.value"`.

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::bind::{Route, bind_all};
use crate::client::{GraphqlClient, check_status};
use crate::error::ClientError;
use crate::logging::{DEFAULT_REDACT_FIELDS, redact_sensitive};

/// A prepared REST request.
#[derive(Debug)]
#[must_use = "requests do nothing until sent"]
pub struct RestRequest<'c> {
    client: &'c GraphqlClient,
    method: Method,
    route: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    timeout: Option<Duration>,
    error: Option<ClientError>,
}

impl<'c> RestRequest<'c> {
    pub(crate) const fn new(client: &'c GraphqlClient, method: Method, route: String) -> Self {
        Self {
            client,
            method,
            route,
            query: Vec::new(),
            body: None,
            timeout: None,
            error: None,
        }
    }

    /// Append a query-string parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the JSON request body.
    ///
    /// A serialization failure is returned when the request is sent.
    pub fn body<B: Serialize>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(err) => self.error = Some(err.into()),
        }
        self
    }

    /// Deadline for this request, overriding the client timeout.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send the request and populate `routes` from the response body.
    pub async fn send(self, routes: Vec<Route<'_>>) -> Result<(), ClientError> {
        let client = self.client;
        let result = async {
            let body = self.round_trip().await?;
            bind_all(routes, &body)?;
            Ok(())
        }
        .await;
        client.record(&result);
        result
    }

    /// Send the request and deserialize the whole response body.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let client = self.client;
        let result = async { Ok(serde_json::from_value(self.round_trip().await?)?) }.await;
        client.record(&result);
        result
    }

    async fn round_trip(self) -> Result<Value, ClientError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let client = self.client;
        let url = client.config().endpoint(&self.route);

        let mut request = client.http().request(self.method.clone(), &url);
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        if let Some(body) = &self.body {
            if client.log_bodies() {
                debug!(body = %redact_sensitive(body, DEFAULT_REDACT_FIELDS), "REST request body");
            }
            request = request.json(body);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let (status, bytes) = client.send_once(&self.method, &url, request).await?;

        let decoded: Option<Value> = serde_json::from_slice(&bytes).ok();
        if let Some(message) = decoded.as_ref().and_then(error_message) {
            return Err(ClientError::RestErrors { status, message });
        }
        check_status(status, &bytes)?;

        match decoded {
            Some(value) => Ok(value),
            None if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
            None => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

/// Message of a REST error envelope, if the body carries a non-empty `errors`.
///
/// The field may be a string, a list, or a map of field names to messages.
fn error_message(body: &Value) -> Option<String> {
    let message = match body.get("errors")? {
        Value::String(message) => message.clone(),
        Value::Array(items) => items.iter().map(text).collect::<Vec<_>>().join(", "),
        Value::Object(fields) => fields
            .iter()
            .map(|(field, message)| format!("{field}: {}", text(message)))
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!message.is_empty()).then_some(message)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
