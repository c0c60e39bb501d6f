//! Logical requests issued by callers and the payloads they get back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method of a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Writes must never be answered with canned offline data.
    pub fn is_write(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical request: what to fetch, never where from.
///
/// Transport details (host, port, headers) are injected by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Path relative to the backend root, e.g. `/api/fields`.
    pub path: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub requires_auth: bool,
    /// Offline resource key; derived from `path` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            path,
            method,
            body: None,
            requires_auth: false,
            resource: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mark the request as needing the stored bearer token.
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Pin the offline resource key instead of deriving it from the path.
    pub fn with_resource(mut self, key: impl Into<String>) -> Self {
        self.resource = Some(key.into());
        self
    }
}

/// Successful outcome of a request.
///
/// Keeps "the backend said there is nothing" apart from "the backend could
/// not be reached and this is bundled data".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "data", rename_all = "lowercase")]
pub enum Payload {
    /// Fresh data from the backend.
    Live(Value),
    /// Substitute from the offline dataset after a soft failure.
    Offline(Value),
    /// The backend answered successfully with no content.
    Empty,
}

impl Payload {
    /// Build a live payload, folding `null` and empty collections into `Empty`.
    pub fn from_live(value: Value) -> Self {
        let empty = match &value {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            Payload::Empty
        } else {
            Payload::Live(value)
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Payload::Offline(_))
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Payload::Live(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Payload::Live(v) | Payload::Offline(v) => Some(v),
            Payload::Empty => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Payload::Live(v) | Payload::Offline(v) => Some(v),
            Payload::Empty => None,
        }
    }
}
