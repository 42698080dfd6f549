//! NATS message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub token: Option<String>,  // JWT access token
    pub payload: T,
}

impl<T> Request<T> {
    pub fn with_token(token: String, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: Some(token),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// Request carrying a single entity id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdRequest {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_without_token() {
        let json = r#"{
            "id": "6f1c6d38-3c55-4a2e-8a8f-0b7f3c1e2d10",
            "timestamp": "2026-03-02T08:00:00Z",
            "payload": {"id": "0b0e4f0e-8a40-4d6f-9d43-6a3a7c2b1f00"}
        }"#;

        let request: Request<IdRequest> = serde_json::from_str(json).unwrap();
        assert!(request.token.is_none());
        assert_eq!(
            request.payload.id.to_string(),
            "0b0e4f0e-8a40-4d6f-9d43-6a3a7c2b1f00"
        );
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let error = ErrorResponse::new(Uuid::nil(), "NOT_FOUND", "Optimization not found");
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert!(value["error"].get("details").is_none());
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ErrorResponse::new(Uuid::nil(), "OPTIMIZATION_FAILED", "Optimization failed")
            .with_details(serde_json::json!({"cause": "connection reset"}));
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["error"]["details"]["cause"], "connection reset");
    }
}
