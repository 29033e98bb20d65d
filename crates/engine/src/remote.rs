//! Boundary to a remote language model.
//!
//! The engine builds prompts and parses replies; a [`RemoteInsightProvider`]
//! only moves one chat completion over the wire. Providers are passed in
//! explicitly, never held in process-wide state.

use std::fmt;

/// One chat-completion call: a system message plus a user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A remote model able to answer a [`CompletionRequest`] with text.
pub trait RemoteInsightProvider: Send + Sync {
    /// Short provider name for logs ("openai", "groq", ...).
    fn name(&self) -> &str;

    /// Returns the content of the first choice's message.
    fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Connection, DNS, TLS or timeout failure
    Network(String),
    /// Non-2xx status from the provider
    Http { status: u16, message: String },
    /// Reply had no choices or empty content
    EmptyResponse,
    /// Reply content was not a JSON object
    Parse(String),
    /// JSON parsed but had the wrong shape
    InvalidResponse(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http { status, message } => write!(f, "provider returned HTTP {status}: {message}"),
            Self::EmptyResponse => write!(f, "provider returned no content"),
            Self::Parse(msg) => write!(f, "failed to parse provider reply: {msg}"),
            Self::InvalidResponse(msg) => write!(f, "invalid provider reply: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Extract the single JSON object in a model reply.
///
/// Accepts a bare object, or an object wrapped in prose or a markdown fence
/// (first `{` through last `}`).
pub fn extract_json_object(content: &str) -> Result<serde_json::Value, RemoteError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::EmptyResponse);
    }

    let parsed = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(v) => v,
        Err(e) => {
            let (start, end) = match (trimmed.find('{'), trimmed.rfind('}')) {
                (Some(s), Some(e)) if s < e => (s, e),
                _ => return Err(RemoteError::Parse(format!("reply is not JSON: {e}"))),
            };
            serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| RemoteError::Parse(e.to_string()))?
        }
    };

    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err(RemoteError::InvalidResponse("expected a JSON object".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        let v = extract_json_object(r#"{"confidence": 0.9}"#).unwrap();
        assert_eq!(v["confidence"], 0.9);
    }

    #[test]
    fn fenced_object() {
        let reply = "Sure!\n```json\n{\"filters\": []}\n```";
        let v = extract_json_object(reply).unwrap();
        assert!(v["filters"].as_array().unwrap().is_empty());
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(extract_json_object("  "), Err(RemoteError::EmptyResponse));
        assert!(matches!(extract_json_object("no json here"), Err(RemoteError::Parse(_))));
        assert!(matches!(extract_json_object("[1, 2]"), Err(RemoteError::InvalidResponse(_))));
    }
}
