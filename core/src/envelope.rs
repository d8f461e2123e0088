// Request/response envelopes exchanged with the Argus REST API
//
// Every endpoint answers with `{ "status": "ok" | "error", "response": ... }`.
// On error the response carries `{ "exception": ..., "arguments": [...] }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verb used by a store request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// A single request produced by a domain from the current ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API base URL, e.g. `/api/v1/stats`
    pub path: String,
    /// Query pairs in insertion order; repeated names are allowed
    pub query: Vec<(String, String)>,
    /// JSON body for POST requests
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Ok,
    Error,
}

/// Uniform response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub status: ApiStatus,
    #[serde(default)]
    pub response: Value,
}

/// Structured application error carried by an `error` envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub exception: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl ApiErrorBody {
    /// First argument rendered as plain text, the way it is shown to users
    pub fn first_argument(&self) -> String {
        match self.arguments.first() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

impl ApiEnvelope {
    pub fn ok(response: Value) -> Self {
        Self {
            status: ApiStatus::Ok,
            response,
        }
    }

    pub fn error(exception: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            status: ApiStatus::Error,
            response: serde_json::json!({
                "exception": exception.into(),
                "arguments": arguments,
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ApiStatus::Ok
    }

    /// Split the envelope into its payload or its structured error
    pub fn into_result(self) -> std::result::Result<Value, ApiErrorBody> {
        match self.status {
            ApiStatus::Ok => Ok(self.response),
            ApiStatus::Error => Err(serde_json::from_value(self.response).unwrap_or_default()),
        }
    }
}
