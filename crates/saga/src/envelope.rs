//! Command envelope: the wire representation of one hop of a saga instance.

use common::SagaId;
use serde::{Deserialize, Serialize};

/// Opaque business data forwarded between steps.
pub type Payload = serde_json::Value;

/// Which callable of a step a command targets.
///
/// Any string other than `action`/`compensation` decodes to `Unknown` so the
/// controller can report it instead of the transport dropping the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Direction {
    Action,
    Compensation,
    Unknown(String),
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::Action => "action",
            Direction::Compensation => "compensation",
            Direction::Unknown(other) => other,
        }
    }
}

impl From<String> for Direction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "action" => Direction::Action,
            "compensation" => Direction::Compensation,
            _ => Direction::Unknown(value),
        }
    }
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The failure that sent a saga instance backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Error category, e.g. the error type name.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A command for one step of one saga instance.
///
/// The envelope is the only place a running saga's position lives. The
/// controller never mutates an inbound envelope; every hop derives a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Correlation id of the saga instance.
    pub saga_id: SagaId,

    /// Registry key of the saga definition.
    pub saga_name: String,

    /// The step this command targets.
    pub step_name: String,

    /// Whether to run the step's action or its compensation.
    pub direction: Direction,

    /// Business data for the step callable.
    #[serde(default)]
    pub payload: Payload,

    /// Category of the original failure, once one has occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Detail of the original failure, once one has occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CommandEnvelope {
    /// Creates the first command of a saga instance.
    pub fn initial(
        saga_id: SagaId,
        saga_name: impl Into<String>,
        step_name: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            saga_id,
            saga_name: saga_name.into(),
            step_name: step_name.into(),
            direction: Direction::Action,
            payload,
            error_kind: None,
            error_message: None,
        }
    }

    /// Derives the action command for the next step.
    pub fn next_action(&self, step_name: impl Into<String>, payload: Payload) -> Self {
        Self {
            saga_id: self.saga_id.clone(),
            saga_name: self.saga_name.clone(),
            step_name: step_name.into(),
            direction: Direction::Action,
            payload,
            error_kind: None,
            error_message: None,
        }
    }

    /// Derives a compensation command carrying `failure`.
    pub fn compensation(
        &self,
        step_name: impl Into<String>,
        payload: Payload,
        failure: Option<Failure>,
    ) -> Self {
        let (error_kind, error_message) = match failure {
            Some(failure) => (Some(failure.kind), Some(failure.message)),
            None => (None, None),
        };
        Self {
            saga_id: self.saga_id.clone(),
            saga_name: self.saga_name.clone(),
            step_name: step_name.into(),
            direction: Direction::Compensation,
            payload,
            error_kind,
            error_message,
        }
    }

    /// Derives the compensation command for an earlier step, keeping the
    /// error fields exactly as they arrived.
    pub fn continue_compensation(&self, step_name: impl Into<String>, payload: Payload) -> Self {
        Self {
            saga_id: self.saga_id.clone(),
            saga_name: self.saga_name.clone(),
            step_name: step_name.into(),
            direction: Direction::Compensation,
            payload,
            error_kind: self.error_kind.clone(),
            error_message: self.error_message.clone(),
        }
    }

    /// Returns the carried failure, if the saga has failed. A missing field
    /// reads as empty.
    pub fn failure(&self) -> Option<Failure> {
        if self.error_kind.is_none() && self.error_message.is_none() {
            return None;
        }
        Some(Failure {
            kind: self.error_kind.clone().unwrap_or_default(),
            message: self.error_message.clone().unwrap_or_default(),
        })
    }

    /// Serializes the envelope to its JSON wire form.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses an envelope from its JSON wire form.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_format_of_initial_command() {
        let envelope = CommandEnvelope::initial(
            SagaId::from("s-1"),
            "subscribe",
            "reserve_funds",
            json!({"amount": 10}),
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "saga_id": "s-1",
                "saga_name": "subscribe",
                "step_name": "reserve_funds",
                "direction": "action",
                "payload": {"amount": 10}
            })
        );
    }

    #[test]
    fn test_compensation_carries_error_fields() {
        let envelope =
            CommandEnvelope::initial(SagaId::from("s-1"), "saga", "step2", json!(null));
        let compensation = envelope.compensation(
            "step2",
            json!({"x": 1}),
            Some(Failure::new("Declined", "no funds")),
        );
        let value = serde_json::to_value(&compensation).unwrap();
        assert_eq!(value["direction"], "compensation");
        assert_eq!(value["error_kind"], "Declined");
        assert_eq!(value["error_message"], "no funds");
        assert_eq!(
            compensation.failure(),
            Some(Failure::new("Declined", "no funds"))
        );
    }

    #[test]
    fn test_next_action_drops_error_fields() {
        let envelope = CommandEnvelope::initial(SagaId::from("s"), "saga", "step1", json!(1))
            .compensation("step1", json!(1), Some(Failure::new("E", "m")));
        let next = envelope.next_action("step2", json!(2));
        assert_eq!(next.direction, Direction::Action);
        assert_eq!(next.failure(), None);
        assert_eq!(next.saga_id, envelope.saga_id);
    }

    #[test]
    fn test_continue_compensation_keeps_partial_error_context() {
        let raw = br#"{"saga_id":"s","saga_name":"saga","step_name":"step2","direction":"compensation","error_kind":"Declined"}"#;
        let inbound = CommandEnvelope::from_slice(raw).unwrap();

        let outbound = inbound.continue_compensation("step1", json!(null));
        assert_eq!(outbound.direction, Direction::Compensation);
        assert_eq!(outbound.step_name, "step1");
        assert_eq!(outbound.error_kind.as_deref(), Some("Declined"));
        assert_eq!(outbound.error_message, None);

        let value = serde_json::to_value(&outbound).unwrap();
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn test_unknown_direction_decodes() {
        let raw = br#"{"saga_id":"s","saga_name":"saga","step_name":"step1","direction":"sideways","payload":null}"#;
        let envelope = CommandEnvelope::from_slice(raw).unwrap();
        assert_eq!(envelope.direction, Direction::Unknown("sideways".into()));

        let reencoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(reencoded["direction"], "sideways");
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let raw = br#"{"saga_id":"s","saga_name":"saga","step_name":"step1","direction":"action"}"#;
        let envelope = CommandEnvelope::from_slice(raw).unwrap();
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let raw = br#"{"saga_id":"s","step_name":"step1","direction":"action"}"#;
        assert!(CommandEnvelope::from_slice(raw).is_err());
    }
}
