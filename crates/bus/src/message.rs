use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BusError;

/// Wire-format message envelope for inter-role communication.
///
/// Envelopes are serialized as JSON `{"type": <name>, "payload": {...}}`
/// plus bookkeeping fields. The channel is not part of the envelope — it
/// travels as the ZeroMQ topic frame, which subscribers filter on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind, resolved against a handler table on the consuming side.
    #[serde(rename = "type")]
    pub name: String,

    /// JSON payload; schema depends on `name`.
    pub payload: serde_json::Value,

    /// When this envelope was created.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Correlation ID for request-result tracking across roles.
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
}

impl Envelope {
    /// Create a new envelope, serializing the payload to JSON.
    pub fn new<T: Serialize>(name: impl Into<String>, payload: &T) -> Result<Self, BusError> {
        Ok(Self {
            name: name.into(),
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
        })
    }

    /// Create an envelope that continues an existing correlation.
    pub fn with_correlation<T: Serialize>(
        name: impl Into<String>,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<Self, BusError> {
        Ok(Self {
            name: name.into(),
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
            correlation_id,
        })
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, BusError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Serialize this envelope to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BusError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize an envelope from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BusError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_envelope() {
        let env = Envelope::new("availability_result", &serde_json::json!({"store": "a"})).unwrap();
        let bytes = env.to_bytes().unwrap();
        let back = Envelope::from_bytes(&bytes).unwrap();

        assert_eq!(back.name, "availability_result");
        assert_eq!(back.correlation_id, env.correlation_id);
        assert_eq!(back.payload["store"], "a");
    }

    #[test]
    fn name_serializes_as_type_field() {
        let env = Envelope::new("queue_all_availability_checks", &serde_json::json!({})).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], "queue_all_availability_checks");
        assert!(value.get("name").is_none());
    }

    #[test]
    fn minimal_wire_form_decodes_with_defaults() {
        // Producers outside this crate only need to send type + payload.
        let raw = br#"{"type": "availability_request", "payload": {"username": "kara"}}"#;
        let env = Envelope::from_bytes(raw).unwrap();
        assert_eq!(env.name, "availability_request");
        assert_eq!(env.payload["username"], "kara");
    }

    #[test]
    fn with_correlation_preserves_id() {
        let id = Uuid::new_v4();
        let env = Envelope::with_correlation("reply", &true, id).unwrap();
        assert_eq!(env.correlation_id, id);
        assert_eq!(env.decode::<bool>().unwrap(), true);
    }
}
