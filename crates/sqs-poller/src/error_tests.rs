//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        message: "missing".to_string(),
    }
    .is_transient());

    assert!(QueueError::Provider {
        code: "RequestThrottled".to_string(),
        message: "slow down".to_string(),
    }
    .is_transient());

    assert!(!QueueError::Provider {
        code: "AccessDenied".to_string(),
        message: "nope".to_string(),
    }
    .is_transient());

    assert!(!QueueError::required("QueueUrl").is_transient());
}

#[test]
fn test_validation_error_names_field() {
    let error = QueueError::required("MessageBody");

    assert!(error.is_validation());
    assert_eq!(
        error.to_string(),
        "Validation error: Required field missing: MessageBody"
    );
}
