//! Two-layer message envelope
//!
//! Invalidation requests are published through SNS into SQS, so every queue body is
//! an SNS notification whose `Message` field holds the application payload as a
//! serialized JSON string:
//!
//! ```json
//! {"Message": "{\"distribution_id\":\"E2ABC\",\"path\":\"/assets/*\",\"retry_count\":1}"}
//! ```
//!
//! Retries are written back in exactly this shape so a redelivered message goes
//! through the same decode path as a first delivery.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::InvalidationRequest;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Invalid transport envelope: {0}")]
    Transport(#[source] serde_json::Error),

    #[error("Invalid invalidation payload: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Outer SNS-style wrapper. Other SNS fields (`Type`, `TopicArn`, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportEnvelope {
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
}

/// Inner application payload.
///
/// Fields are optional here; presence and emptiness are checked by the decoder so
/// that a missing field is reported as a malformed message rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationPayload {
    #[serde(rename = "distribution_id", alias = "target_id", default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Oversized counts saturate at `u32::MAX` so they still reach the retry budget check
    #[serde(default, deserialize_with = "saturating_count")]
    pub retry_count: Option<u32>,
}

/// Accepts any non-negative integral JSON number (`2`, `2.0`, `5000000000`).
fn saturating_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(count) = number.as_u64() {
        return Ok(Some(u32::try_from(count).unwrap_or(u32::MAX)));
    }

    match number.as_f64() {
        Some(count) if count >= 0.0 && count.fract() == 0.0 => Ok(Some(count.min(u32::MAX as f64) as u32)),
        _ => Err(D::Error::custom(format!(
            "retry_count must be a non-negative integer, got {}",
            number
        ))),
    }
}

impl From<&InvalidationRequest> for InvalidationPayload {
    fn from(request: &InvalidationRequest) -> Self {
        Self {
            target_id: Some(request.target_id.clone()),
            path: Some(request.path_pattern.clone()),
            retry_count: Some(request.retry_count),
        }
    }
}

/// Serialize a request into a queue body.
pub fn seal(request: &InvalidationRequest) -> Result<String, serde_json::Error> {
    let inner = serde_json::to_string(&InvalidationPayload::from(request))?;
    serde_json::to_string(&TransportEnvelope { message: inner })
}

/// Parse both layers of a queue body.
pub fn open(body: &str) -> Result<InvalidationPayload, EnvelopeError> {
    let envelope: TransportEnvelope =
        serde_json::from_str(body).map_err(EnvelopeError::Transport)?;
    serde_json::from_str(&envelope.message).map_err(EnvelopeError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceRoute;

    #[test]
    fn test_sealed_body_has_two_layers() {
        let request = InvalidationRequest::new("E2ABC", "/assets/*", SourceRoute::from("arn"))
            .with_retry_count(3);
        let body = seal(&request).unwrap();

        let outer: serde_json::Value = serde_json::from_str(&body).unwrap();
        let inner_str = outer["Message"].as_str().expect("Message must be a string");
        let inner: serde_json::Value = serde_json::from_str(inner_str).unwrap();

        assert_eq!(inner["distribution_id"], "E2ABC");
        assert_eq!(inner["path"], "/assets/*");
        assert_eq!(inner["retry_count"], 3);
    }

    #[test]
    fn test_open_sns_notification() {
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "a1b2",
            "TopicArn": "arn:aws:sns:us-east-1:123456789012:purge",
            "Message": "{\"distribution_id\":\"E1\",\"path\":\"/index.html\"}"
        })
        .to_string();

        let payload = open(&body).unwrap();
        assert_eq!(payload.target_id.as_deref(), Some("E1"));
        assert_eq!(payload.path.as_deref(), Some("/index.html"));
        assert_eq!(payload.retry_count, None);
    }

    #[test]
    fn test_open_accepts_lowercase_message_key() {
        let body = r#"{"message":"{\"target_id\":\"E9\",\"path\":\"/*\",\"retry_count\":1}"}"#;
        let payload = open(body).unwrap();
        assert_eq!(payload.target_id.as_deref(), Some("E9"));
        assert_eq!(payload.retry_count, Some(1));
    }

    #[test]
    fn test_open_rejects_non_json_body() {
        assert!(matches!(open("not json"), Err(EnvelopeError::Transport(_))));
    }

    #[test]
    fn test_open_rejects_non_json_inner_payload() {
        let body = r#"{"Message":"plain text"}"#;
        assert!(matches!(open(body), Err(EnvelopeError::Payload(_))));
    }

    #[test]
    fn test_open_rejects_negative_retry_count() {
        let body = r#"{"Message":"{\"distribution_id\":\"E1\",\"path\":\"/\",\"retry_count\":-1}"}"#;
        assert!(matches!(open(body), Err(EnvelopeError::Payload(_))));
    }

    #[test]
    fn test_open_accepts_integral_float_retry_count() {
        let body = r#"{"Message":"{\"distribution_id\":\"E1\",\"path\":\"/\",\"retry_count\":2.0}"}"#;
        assert_eq!(open(body).unwrap().retry_count, Some(2));
    }

    #[test]
    fn test_open_rejects_fractional_retry_count() {
        let body = r#"{"Message":"{\"distribution_id\":\"E1\",\"path\":\"/\",\"retry_count\":1.5}"}"#;
        assert!(matches!(open(body), Err(EnvelopeError::Payload(_))));
    }

    #[test]
    fn test_oversized_retry_count_saturates() {
        let body = r#"{"Message":"{\"distribution_id\":\"E1\",\"path\":\"/\",\"retry_count\":5000000000}"}"#;
        assert_eq!(open(body).unwrap().retry_count, Some(u32::MAX));
    }
}
