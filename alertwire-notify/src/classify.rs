//! Retry classification of transport outcomes.

use crate::error::{DispatchError, DispatchResult};
use crate::transport::{HttpResponse, TransportError};

/// Check whether a status code is worth retrying.
///
/// Only server errors are. Client errors, redirects and informational
/// codes will fail the same way next time.
pub fn is_retryable_status(status: u16) -> bool {
    (500..=599).contains(&status)
}

/// Classify a completed exchange by status alone.
pub fn classify_status(status: u16, endpoint: &str) -> DispatchResult {
    if (200..=299).contains(&status) {
        Ok(())
    } else {
        Err(DispatchError::Status {
            code: status,
            endpoint: endpoint.to_string(),
        })
    }
}

/// Classify the outcome of [`Transport::execute`](crate::Transport::execute).
///
/// On success the response is handed back so callers can inspect the body
/// for business-level result codes.
pub fn classify(
    outcome: std::result::Result<HttpResponse, TransportError>,
) -> crate::Result<HttpResponse> {
    let response = outcome?;
    classify_status(response.status.as_u16(), &response.endpoint)?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchOutcome;
    use bytes::Bytes;
    use reqwest::StatusCode;

    const ENDPOINT: &str = "https://oapi.example.com/robot/send";

    #[test]
    fn test_success_range() {
        for status in 200..=299 {
            let (retryable, err) = classify_status(status, ENDPOINT).into_parts();
            assert!(!retryable, "status {status}");
            assert!(err.is_none(), "status {status}");
        }
    }

    #[test]
    fn test_server_error_range() {
        for status in 500..=599 {
            let (retryable, err) = classify_status(status, ENDPOINT).into_parts();
            assert!(retryable, "status {status}");
            let message = err.expect("error").to_string();
            assert!(message.contains(&status.to_string()));
            assert!(message.contains(ENDPOINT));
        }
    }

    #[test]
    fn test_other_statuses_are_permanent() {
        for status in (100..200).chain(300..500).chain(600..1000) {
            let (retryable, err) = classify_status(status, ENDPOINT).into_parts();
            assert!(!retryable, "status {status}");
            assert!(err.is_some(), "status {status}");
        }
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(429));
        assert!(!is_retryable_status(408));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn test_transport_failure_is_retryable() {
        let outcome = Err(TransportError::Failed {
            endpoint: ENDPOINT.into(),
            message: "connection refused".into(),
        });
        let err = classify(outcome).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_cancellation_is_retryable() {
        let err = classify(Err(TransportError::Cancelled {
            endpoint: ENDPOINT.into(),
        }))
        .unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_response_passes_through() {
        let response = HttpResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(br#"{"errcode":0}"#),
            endpoint: ENDPOINT.into(),
        };
        let response = classify(Ok(response)).unwrap();
        assert_eq!(response.text(), r#"{"errcode":0}"#);
    }
}
