//! Structural validation of response bodies.
//!
//! A misrouted request commonly comes back as a web server's default HTML
//! error page rather than an API error. Bodies are inspected once here and
//! turned into a typed [`BodyShape`]; nothing downstream re-parses text.

use serde_json::Value;

/// What a response body turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    /// Parsed JSON document.
    Json(Value),
    /// Zero bytes or only whitespace.
    Empty,
    /// An HTML document (by content type or by its leading markup).
    Html,
    /// Anything else: wrong content type or a body that does not parse.
    Unparseable(String),
}

impl BodyShape {
    pub fn is_json(&self) -> bool {
        matches!(self, BodyShape::Json(_))
    }

    /// Short description used in error messages and logs.
    pub fn describe(&self) -> String {
        match self {
            BodyShape::Json(_) => "JSON document".to_string(),
            BodyShape::Empty => "empty body".to_string(),
            BodyShape::Html => "HTML document instead of JSON".to_string(),
            BodyShape::Unparseable(reason) => reason.clone(),
        }
    }
}

/// Classify a body given its `Content-Type` header.
///
/// A missing content type is tolerated when the body parses as JSON; an
/// explicit non-JSON content type is not, even if the bytes happen to parse.
pub fn inspect(content_type: Option<&str>, body: &[u8]) -> BodyShape {
    if body.iter().all(u8::is_ascii_whitespace) {
        return BodyShape::Empty;
    }

    let media_type = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .filter(|mt| !mt.is_empty());

    if media_type.as_deref().is_some_and(|mt| mt.contains("html")) || looks_like_html(body) {
        return BodyShape::Html;
    }

    if let Some(mt) = media_type.as_deref() {
        if !is_json_media_type(mt) {
            return BodyShape::Unparseable(format!("unexpected content type {}", mt));
        }
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => BodyShape::Json(value),
        Err(e) => BodyShape::Unparseable(format!("invalid JSON: {}", e)),
    }
}

/// `application/json`, `application/problem+json` and other `+json` types.
fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
}

fn looks_like_html(body: &[u8]) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let head = &body[start..body.len().min(start + 15)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<head")
}
