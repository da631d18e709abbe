//! WebSocket Message Types
//!
//! Server to client: every reading is wrapped in an [`Envelope`]
//! `{"time": "HH:MM:SS", "value": <reading>}`.
//!
//! Client to server: any JSON document. Its content is not interpreted; a
//! payload that parses is what promotes a connection into the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamped wrapper applied to every broadcast payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    /// Wall-clock time in the hub's timezone, `HH:MM:SS`
    pub time: String,
    /// The reading as supplied by the producer
    pub value: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(time: impl Into<String>, value: T) -> Self {
        Self {
            time: time.into(),
            value,
        }
    }

    /// Serialize to the textual wire message
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Parse an inbound client payload
pub fn parse_client_message(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_envelope_wire_format() {
        let envelope = Envelope::new("09:15:00", json!({"temp": 21.5}));
        let wire = envelope.to_wire().unwrap();
        assert_eq!(wire, r#"{"time":"09:15:00","value":{"temp":21.5}}"#);
    }

    #[test]
    fn test_envelope_borrowed_value() {
        let readings = vec![1, 2, 3];
        let wire = Envelope::new("00:00:01", &readings).to_wire().unwrap();
        let parsed: Envelope<Vec<i32>> = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed.value, readings);
    }

    #[test]
    fn test_envelope_unserializable_value() {
        // JSON object keys must be strings
        let mut value = HashMap::new();
        value.insert(vec![1u8, 2], 0.5);
        assert!(Envelope::new("00:00:00", &value).to_wire().is_err());
    }

    #[test]
    fn test_parse_client_message() {
        assert!(parse_client_message(r#"{"hello": "hub"}"#).is_ok());
        assert!(parse_client_message("42").is_ok());
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message("").is_err());
    }
}
