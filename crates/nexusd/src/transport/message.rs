//! Request model carried over the worker socket.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::errors::TransportError;

fn default_path() -> String {
    "/".to_owned()
}

fn default_method() -> String {
    "GET".to_owned()
}

/// One decoded request.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    /// Request path, possibly with a query string.
    #[serde(default = "default_path")]
    pub path: String,
    /// Request method.
    #[serde(default = "default_method")]
    pub method: String,
    /// Shared token presented by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Request payload.
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Map<String, Value>,
}

impl Message {
    /// Builds a request without a token or payload.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            auth_token: None,
            data: Map::new(),
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Attaches the shared token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Decodes a framed payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MalformedMessage`] when the payload is not
    /// JSON, is not an object, or has fields of the wrong type.
    pub fn parse(bytes: &[u8]) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|error| TransportError::malformed("payload is not JSON", Some(error)))?;
        if !value.is_object() {
            return Err(TransportError::malformed(
                "payload is not a JSON object",
                None,
            ));
        }
        serde_json::from_value(value)
            .map_err(|error| TransportError::malformed("payload fields are invalid", Some(error)))
    }

    /// Encodes the request for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serialize`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(TransportError::Serialize)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("data", &self.data)
            .finish()
    }
}

/// Accepts an object, `null`, or an empty array (the form some clients emit
/// for an empty map).
fn lenient_data<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected an object for `data`, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn fills_defaults_for_missing_fields() {
        let message = Message::parse(b"{}").expect("parse");
        assert_eq!(message.path, "/");
        assert_eq!(message.method, "GET");
        assert!(message.auth_token.is_none());
        assert!(message.data.is_empty());
    }

    #[rstest]
    #[case(json!({ "data": [] }))]
    #[case(json!({ "data": null }))]
    #[case(json!({ "data": {} }))]
    fn accepts_empty_payload_forms(#[case] body: Value) {
        let bytes = serde_json::to_vec(&body).expect("encode");
        let message = Message::parse(&bytes).expect("parse");
        assert!(message.data.is_empty());
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(b"[1, 2]".as_slice())]
    #[case(b"\"text\"".as_slice())]
    #[case(br#"{"data": [1]}"#.as_slice())]
    #[case(br#"{"path": 7}"#.as_slice())]
    fn rejects_malformed_payloads(#[case] bytes: &[u8]) {
        let error = Message::parse(bytes).expect_err("payload should be rejected");
        assert!(matches!(error, TransportError::MalformedMessage { .. }));
    }

    #[test]
    fn debug_output_redacts_token() {
        let message = Message::new("GET", "/").with_token("secret-value");
        let rendered = format!("{message:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn encoded_request_parses_back() {
        let mut data = Map::new();
        data.insert("name".to_owned(), json!("nexus"));
        let message = Message::new("POST", "/users").with_data(data).with_token("t");
        let bytes = message.to_bytes().expect("encode");
        assert_eq!(Message::parse(&bytes).expect("parse"), message);
    }
}
