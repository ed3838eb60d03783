//! Shopify admin API client with path-addressed response routing.
//!
//! This crate provides:
//! - Dot-separated path patterns with `*` wildcards over JSON trees.
//! - Typed destinations (scalar, sequence, nested) populated from extracted matches.
//! - A compiler that merges several GraphQL operations into one aliased request.
//! - A GraphQL and REST client for the admin API with error classification.
//! - Structured logging setup with sensitive-field redaction.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

mod bind;
mod client;
mod config;
mod envelope;
mod error;
mod extract;
mod logging;
mod multi;
mod path;
mod rest;

pub use bind::{Route, Shape, Target, bind_all, present};
pub use client::{
    ACCESS_TOKEN_HEADER, ClientMetrics, ClientMetricsSnapshot, GraphqlClient,
    GraphqlClientBuilder, GraphqlRequest,
};
pub use config::{ClientConfig, DEFAULT_API_VERSION};
pub use error::{
    BindError, ClientError, CompileError, ConfigError, GraphqlError, GraphqlErrorLocation,
    GraphqlPathSegment, HttpErrorInfo, UserError,
};
pub use extract::{Match, extract};
pub use logging::{DEFAULT_REDACT_FIELDS, LogConfig, LoggingError, init_logging, redact_sensitive};
pub use multi::{Argument, CompiledRequest, MultiOperation, Operation, OperationKind, Selection};
pub use path::{PathPattern, Segment};
pub use reqwest::Method;
pub use rest::RestRequest;
