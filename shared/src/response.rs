//! API Response types
//!
//! Envelope used by the canteen backend for every JSON response

use serde::{Deserialize, Serialize};

/// Unified API response structure
///
/// All backend responses follow this format:
/// ```json
/// {
///     "success": true,
///     "message": "Order created",
///     "data": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the backend handled the request
    #[serde(default)]
    pub success: bool,
    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Message text, or an empty string when the backend sent none
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_without_data() {
        let json = r#"{"success":false,"message":"Invalid QR code"}"#;
        let response: ApiResponse<i32> = serde_json::from_str(json).unwrap();
        assert!(!response.success);
        assert_eq!(response.message_or_default(), "Invalid QR code");
        assert!(response.data.is_none());
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let json = serde_json::to_string(&ApiResponse::ok(7)).unwrap();
        assert_eq!(json, r#"{"success":true,"data":7}"#);
    }
}
