//! Shared API response types

use axum::Json;
use serde::{Deserialize, Serialize};

/// Success body: a human readable message and, usually, the affected object
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_object(message: impl Into<String>, object: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            object: Some(object),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
            object: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_only_response_omits_object() {
        let Json(body) = ApiResponse::message("Category deleted successfully");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json, serde_json::json!({"message": "Category deleted successfully"}));
    }

    #[test]
    fn test_response_with_object() {
        let Json(body) = ApiResponse::with_object("ok", vec![1, 2]);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["object"], serde_json::json!([1, 2]));
    }
}
