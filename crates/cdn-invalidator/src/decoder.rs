use cdn_common::{envelope, InboundRecord, InvalidationRequest};

use crate::error::MalformedMessage;

/// Decode a raw queue record into an [`InvalidationRequest`].
///
/// The request inherits the record's source route; a missing `retry_count` means
/// first delivery.
pub fn decode(record: &InboundRecord) -> Result<InvalidationRequest, MalformedMessage> {
    let payload = envelope::open(&record.body)?;

    let target_id = required(payload.target_id, "distribution_id")?;
    let path_pattern = required(payload.path, "path")?;

    Ok(InvalidationRequest {
        target_id,
        path_pattern,
        retry_count: payload.retry_count.unwrap_or(0),
        source_route: record.source_route.clone(),
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MalformedMessage> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MalformedMessage::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdn_common::SourceRoute;

    const ROUTE: &str = "arn:aws:sqs:us-east-1:123456789012:cdn-invalidations";

    fn record(inner: &str) -> InboundRecord {
        let body = serde_json::json!({ "Message": inner }).to_string();
        InboundRecord::new(body, SourceRoute::from(ROUTE))
    }

    #[test]
    fn test_decodes_first_delivery() {
        let request = decode(&record(r#"{"distribution_id":"E2ABC","path":"/assets/*"}"#)).unwrap();

        assert_eq!(request.target_id, "E2ABC");
        assert_eq!(request.path_pattern, "/assets/*");
        assert_eq!(request.retry_count, 0);
        assert_eq!(request.source_route.as_str(), ROUTE);
    }

    #[test]
    fn test_decodes_retry_count() {
        let request =
            decode(&record(r#"{"distribution_id":"E2ABC","path":"/","retry_count":2}"#)).unwrap();
        assert_eq!(request.retry_count, 2);
    }

    #[test]
    fn test_null_retry_count_means_first_delivery() {
        let request =
            decode(&record(r#"{"distribution_id":"E2ABC","path":"/","retry_count":null}"#)).unwrap();
        assert_eq!(request.retry_count, 0);
    }

    #[test]
    fn test_missing_target_is_malformed() {
        let err = decode(&record(r#"{"path":"/assets/*"}"#)).unwrap_err();
        assert!(matches!(err, MalformedMessage::MissingField("distribution_id")));
    }

    #[test]
    fn test_empty_path_is_malformed() {
        let err = decode(&record(r#"{"distribution_id":"E2ABC","path":""}"#)).unwrap_err();
        assert!(matches!(err, MalformedMessage::MissingField("path")));
    }

    #[test]
    fn test_blank_target_is_malformed() {
        let err = decode(&record(r#"{"distribution_id":"   ","path":"/"}"#)).unwrap_err();
        assert!(matches!(err, MalformedMessage::MissingField("distribution_id")));
    }

    #[test]
    fn test_unparseable_body_is_malformed() {
        let bad = InboundRecord::new("{", SourceRoute::from(ROUTE));
        assert!(matches!(decode(&bad), Err(MalformedMessage::Envelope(_))));
    }

    #[test]
    fn test_round_trip_through_sealed_retry() {
        let original = decode(&record(r#"{"distribution_id":"E2ABC","path":"/img/*.png"}"#)).unwrap();
        let retry = original.next_retry();

        let body = envelope::seal(&retry).unwrap();
        let redelivered = decode(&InboundRecord::new(body, SourceRoute::from(ROUTE))).unwrap();

        assert_eq!(redelivered, retry);
        assert_eq!(redelivered.retry_count, 1);
    }
}
