//! GraphQL request/response envelopes.
//!
//! The documents themselves live in [`queries`]; the typed shapes decoded
//! from `data` live in [`types`].

pub mod queries;
pub mod types;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MythicError, Result};

/// A query, mutation or subscription with its variables.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    pub fn var(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(key.to_string(), value.into());
        self
    }

    /// Merge a serialized object into the variables.
    pub fn vars(mut self, value: impl Serialize) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                self.variables.extend(map);
                Ok(self)
            }
            Value::Null => Ok(self),
            other => Err(MythicError::Graphql(format!(
                "GraphQL variables must be an object, got {}",
                other
            ))),
        }
    }

    /// Name of the first operation declared in the document.
    pub fn operation_name(&self) -> Option<&str> {
        let mut tokens = self
            .query
            .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
            .filter(|t| !t.is_empty());
        while let Some(token) = tokens.next() {
            if matches!(token, "query" | "mutation" | "subscription") {
                return tokens.next();
            }
        }
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlErrorEntry {
    pub message: String,
}

/// The `{data, errors}` envelope returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlErrorEntry>>,
}

impl GraphqlResponse {
    /// The `data` object, or the server's error messages joined by newlines.
    pub fn into_data(self) -> Result<Value> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            return Err(MythicError::Graphql(join_errors(&errors)));
        }
        self.data
            .ok_or_else(|| MythicError::Graphql("response contained no data".to_string()))
    }
}

pub fn join_errors(errors: &[GraphqlErrorEntry]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
