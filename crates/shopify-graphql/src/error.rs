//! Error types for the admin API client.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP error information captured from reqwest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// Error message.
    pub message: String,
    /// HTTP status code (if available).
    pub status_code: Option<u16>,
    /// Whether the error was a timeout.
    pub is_timeout: bool,
    /// Whether the error was a connection failure.
    pub is_connect: bool,
}

impl From<reqwest::Error> for HttpErrorInfo {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status().map(|status| status.as_u16()),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
        }
    }
}

/// GraphQL error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// Line number in the query (1-based).
    pub line: u32,
    /// Column number in the query (1-based).
    pub column: u32,
}

/// GraphQL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    /// Field name.
    Key(String),
    /// Array index.
    Index(i64),
}

/// Top-level GraphQL error from the response `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable error message.
    pub message: String,
    /// Location(s) within the query.
    #[serde(default)]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Path within the response where the error occurred.
    #[serde(default)]
    pub path: Vec<GraphqlPathSegment>,
    /// Extensions metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Mutation input error reported under a payload's `userErrors` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    /// Path to the offending input field.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable error message.
    pub message: String,
}

/// Joined messages of a list of GraphQL or user errors.
pub(crate) struct Messages<'a, T>(pub &'a [T]);

impl fmt::Display for Messages<'_, GraphqlError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, self.0.iter().map(|err| err.message.as_str()))
    }
}

impl fmt::Display for Messages<'_, UserError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, self.0.iter().map(|err| err.message.as_str()))
    }
}

fn join<'a>(f: &mut fmt::Formatter<'_>, messages: impl Iterator<Item = &'a str>) -> fmt::Result {
    for (index, message) in messages.enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        f.write_str(message)?;
    }
    Ok(())
}

/// Error raised while compiling a multi-operation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Input count is not a multiple of the argument count.
    #[error(
        "operation `{operation}` has {inputs} inputs, not a multiple of its {arguments} arguments"
    )]
    UnevenInputs {
        /// Operation name.
        operation: String,
        /// Number of inputs supplied.
        inputs: usize,
        /// Number of declared arguments.
        arguments: usize,
    },

    /// Arguments were declared but no inputs supplied.
    #[error("operation `{operation}` declares arguments but has no inputs")]
    MissingInputs {
        /// Operation name.
        operation: String,
    },

    /// Inputs were supplied to an operation without arguments.
    #[error("operation `{operation}` takes no arguments but has {inputs} inputs")]
    UnexpectedInputs {
        /// Operation name.
        operation: String,
        /// Number of inputs supplied.
        inputs: usize,
    },

    /// A typed input could not be converted to JSON.
    #[error("operation `{operation}` input could not be serialized: {message}")]
    InvalidInput {
        /// Operation name.
        operation: String,
        /// Serializer message.
        message: String,
    },

    /// An argument signature had no `name: Type` pairs.
    #[error("operation `{operation}` has an unparseable argument signature: {signature}")]
    InvalidSignature {
        /// Operation name.
        operation: String,
        /// Signature text.
        signature: String,
    },
}

/// Error raised while binding extracted data into a destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A matched value could not be decoded into the destination type.
    #[error("cannot decode `{path}` (at {field}): {message}")]
    Decode {
        /// Route path that produced the value.
        path: String,
        /// Field path inside the matched value.
        field: String,
        /// Deserializer message.
        message: String,
    },
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    /// A value cannot be used as an HTTP header.
    #[error("invalid header value for {name}")]
    InvalidHeader {
        /// Header name.
        name: String,
    },
}

/// Error type for client operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// HTTP/network error.
    #[error("HTTP error: {}", .0.message)]
    Http(HttpErrorInfo),

    /// Access token rejected.
    #[error("401 Unauthorized: incorrect authentication credential")]
    Unauthorized,

    /// Non-success HTTP status.
    #[error("response status is not ok: {status}")]
    HttpStatus {
        /// HTTP status code.
        status: StatusCode,
        /// Response body (truncated if needed).
        body: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Top-level GraphQL errors returned by the server.
    #[error("{}", Messages(.errors.as_slice()))]
    GraphqlErrors {
        /// GraphQL error list.
        errors: Vec<GraphqlError>,
    },

    /// Mutation payload reported user errors.
    #[error("{}", Messages(.errors.as_slice()))]
    UserErrors {
        /// Payload field that carried the errors.
        field: String,
        /// User error list.
        errors: Vec<UserError>,
    },

    /// REST error envelope.
    #[error("{message}")]
    RestErrors {
        /// HTTP status the envelope arrived with.
        status: StatusCode,
        /// Joined error message.
        message: String,
    },

    /// Response carried no `data` while destinations were requested.
    #[error("empty data")]
    MissingData,

    /// Multi-operation compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Binding extracted data failed.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(HttpErrorInfo::from(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl ClientError {
    /// Returns `true` for errors the caller can fix by changing the input.
    ///
    /// A REST envelope counts only when its status is not a rejected
    /// credential or a server failure.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::UserErrors { .. } => true,
            Self::RestErrors { status, .. } => !transport_status(*status),
            _ => false,
        }
    }

    /// Returns `true` for transport-level failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unauthorized | Self::HttpStatus { .. } => true,
            Self::RestErrors { status, .. } => transport_status(*status),
            _ => false,
        }
    }
}

fn transport_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphql_error(message: &str) -> GraphqlError {
        GraphqlError {
            message: message.to_string(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    #[test]
    fn graphql_errors_join_messages() {
        let err = ClientError::GraphqlErrors {
            errors: vec![graphql_error("first"), graphql_error("second")],
        };
        assert_eq!(err.to_string(), "first, second");
        assert!(!err.is_user_error());
        assert!(!err.is_transport());
    }

    #[test]
    fn user_errors_are_distinct() {
        let err = ClientError::UserErrors {
            field: "scriptTagCreate".into(),
            errors: vec![UserError {
                field: Some(vec!["src".into()]),
                message: "Source must be secure (HTTPS)".into(),
            }],
        };
        assert_eq!(err.to_string(), "Source must be secure (HTTPS)");
        assert!(err.is_user_error());
    }

    #[test]
    fn status_errors_are_transport() {
        let err = ClientError::HttpStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "response status is not ok: 502 Bad Gateway");
        assert!(err.is_transport());
        assert!(ClientError::Unauthorized.is_transport());
    }

    #[test]
    fn rest_envelope_is_classified_by_status() {
        let rejected = ClientError::RestErrors {
            status: StatusCode::UNAUTHORIZED,
            message: "[API] Invalid API key or access token".into(),
        };
        assert!(rejected.is_transport());
        assert!(!rejected.is_user_error());

        let invalid = ClientError::RestErrors {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "name: can't be blank".into(),
        };
        assert!(invalid.is_user_error());
        assert!(!invalid.is_transport());

        let unavailable = ClientError::RestErrors {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "try again".into(),
        };
        assert!(unavailable.is_transport());
    }

    #[test]
    fn user_error_field_may_be_null() {
        let err: UserError =
            serde_json::from_value(serde_json::json!({"field": null, "message": "bad"}))
                .expect("decode");
        assert_eq!(err.field, None);
    }
}
