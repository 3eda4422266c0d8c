//! Wire frame types.
//!
//! One self-describing JSON message per WebSocket text frame.
//!
//! # Outbound Format
//!
//! ```json
//! {
//!   "eventType": "tp",
//!   "data": { "command": "tp Steve", "args": { "target": "Steve" } },
//!   "messageId": "18f2c3a-4"
//! }
//! ```
//!
//! # Inbound Format
//!
//! Correlated response:
//!
//! ```json
//! { "messageId": "18f2c3a-4", "success": true, "data": { ... } }
//! ```
//!
//! Generic event:
//!
//! ```json
//! { "type": "tellraw", "message": "hello" }
//! ```
//!
//! The canonical correlation id location is the top-level `messageId`
//! field; a nested `data.messageId` is accepted for compatibility with
//! servers that frame responses that way.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

// ============================================================================
// RequestFrame
// ============================================================================

/// An outbound request from client to server.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame {
    /// Request event type.
    #[serde(rename = "eventType")]
    pub event_type: String,

    /// Request payload.
    pub data: Value,

    /// Correlation id echoed back in the response.
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
}

impl RequestFrame {
    /// Creates a request frame with a fresh correlation id.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self::with_id(event_type, data, MessageId::generate())
    }

    /// Creates a request frame with a specific correlation id.
    #[inline]
    #[must_use]
    pub fn with_id(event_type: impl Into<String>, data: Value, message_id: MessageId) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            message_id,
        }
    }

    /// Serializes the frame to its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    #[inline]
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Json)
    }
}

// ============================================================================
// InboundFrame
// ============================================================================

/// A decoded inbound message, not yet routed.
///
/// Routing decides per frame whether it completes a pending request
/// (correlation id present and matching) or falls through to generic
/// event dispatch. Both views are kept available because an id that
/// matches no pending entry must still dispatch as an event.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    value: Value,
}

impl InboundFrame {
    /// Decodes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] when the frame is not valid JSON, or
    /// [`Error::Protocol`] when it is not a JSON object. Callers drop
    /// malformed frames with a logged side effect.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(Error::protocol("inbound frame is not an object"));
        }
        Ok(Self { value })
    }

    /// Wraps an already-parsed message.
    #[inline]
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    /// Returns the correlation id, if the frame carries one.
    ///
    /// Checks the top-level `messageId` first, then `data.messageId`.
    #[must_use]
    pub fn correlation_id(&self) -> Option<MessageId> {
        let top = self.value.get("messageId").and_then(Value::as_str);
        let nested = self
            .value
            .get("data")
            .and_then(|d| d.get("messageId"))
            .and_then(Value::as_str);

        top.or(nested).map(MessageId::from_wire)
    }

    /// Returns the `type` tag for generic event classification.
    #[inline]
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }

    /// Interprets the frame as a correlated response outcome.
    ///
    /// A response indicates failure when `success` is explicitly
    /// `false` or when an `error` field is present.
    pub fn response_outcome(&self) -> Result<Value> {
        let error = self.value.get("error").and_then(Value::as_str);
        let success = self
            .value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(error.is_none());

        if success && error.is_none() {
            Ok(self.value.get("data").cloned().unwrap_or(Value::Null))
        } else {
            let message = error
                .map(str::to_string)
                .unwrap_or_else(|| "request rejected by server".to_string());
            Err(Error::request_failed(message))
        }
    }

    /// Consumes the frame, returning the raw message value.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns a reference to the raw message value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_frame_serialization() {
        let frame = RequestFrame::with_id(
            "tp",
            json!({"target": "Steve"}),
            MessageId::from_wire("aa-1"),
        );
        let wire = frame.encode().expect("encode");

        assert!(wire.contains("\"eventType\":\"tp\""));
        assert!(wire.contains("\"messageId\":\"aa-1\""));
        assert!(wire.contains("\"target\":\"Steve\""));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(InboundFrame::decode("[1, 2]").is_err());
        assert!(InboundFrame::decode("not json").is_err());
    }

    #[test]
    fn test_correlation_id_top_level() {
        let frame = InboundFrame::decode(r#"{"messageId": "aa-1", "success": true}"#)
            .expect("decode");
        assert_eq!(frame.correlation_id(), Some(MessageId::from_wire("aa-1")));
    }

    #[test]
    fn test_correlation_id_nested_in_data() {
        let frame = InboundFrame::decode(r#"{"data": {"messageId": "bb-2"}, "success": true}"#)
            .expect("decode");
        assert_eq!(frame.correlation_id(), Some(MessageId::from_wire("bb-2")));
    }

    #[test]
    fn test_correlation_id_prefers_top_level() {
        let frame = InboundFrame::decode(
            r#"{"messageId": "top", "data": {"messageId": "nested"}}"#,
        )
        .expect("decode");
        assert_eq!(frame.correlation_id(), Some(MessageId::from_wire("top")));
    }

    #[test]
    fn test_correlation_id_absent() {
        let frame = InboundFrame::decode(r#"{"type": "tellraw"}"#).expect("decode");
        assert_eq!(frame.correlation_id(), None);
    }

    #[test]
    fn test_response_outcome_success() {
        let frame = InboundFrame::decode(
            r#"{"messageId": "aa-1", "success": true, "data": {"ok": 1}}"#,
        )
        .expect("decode");

        let data = frame.response_outcome().expect("success");
        assert_eq!(data, json!({"ok": 1}));
    }

    #[test]
    fn test_response_outcome_success_without_data() {
        let frame = InboundFrame::decode(r#"{"messageId": "aa-1", "success": true}"#)
            .expect("decode");
        assert_eq!(frame.response_outcome().expect("success"), Value::Null);
    }

    #[test]
    fn test_response_outcome_explicit_failure() {
        let frame = InboundFrame::decode(
            r#"{"messageId": "aa-1", "success": false, "error": "no permission"}"#,
        )
        .expect("decode");

        let err = frame.response_outcome().unwrap_err();
        assert!(matches!(err, Error::RequestFailed { .. }));
        assert!(err.to_string().contains("no permission"));
    }

    #[test]
    fn test_response_outcome_error_field_wins() {
        // success missing but error present: failure
        let frame = InboundFrame::decode(r#"{"messageId": "aa-1", "error": "boom"}"#)
            .expect("decode");
        assert!(frame.response_outcome().is_err());
    }
}
