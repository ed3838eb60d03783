//! GraphQL request payload and response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, GraphqlError, UserError};

/// GraphQL request payload.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GraphqlPayload<'q> {
    /// Query text.
    pub query: &'q str,
    /// Variables.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: &'q Map<String, Value>,
}

/// GraphQL response container.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphqlResponse {
    /// Response data.
    #[serde(default)]
    pub data: Option<Value>,
    /// GraphQL errors.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// Surface top-level errors, then mutation user errors, and return `data`.
    pub fn into_data(self) -> Result<Value, ClientError> {
        if !self.errors.is_empty() {
            return Err(ClientError::GraphqlErrors {
                errors: self.errors,
            });
        }
        let data = self.data.unwrap_or(Value::Null);
        check_user_errors(&data)?;
        Ok(data)
    }
}

/// Fail on the first payload field carrying a non-empty `userErrors` list.
fn check_user_errors(data: &Value) -> Result<(), ClientError> {
    let Some(fields) = data.as_object() else {
        return Ok(());
    };
    for (field, payload) in fields {
        let Some(user_errors) = payload.get("userErrors") else {
            continue;
        };
        if user_errors.as_array().is_none_or(Vec::is_empty) {
            continue;
        }
        let errors: Vec<UserError> = serde_json::from_value(user_errors.clone())?;
        return Err(ClientError::UserErrors {
            field: field.clone(),
            errors,
        });
    }
    Ok(())
}
