use serde::{Deserialize, Serialize};
use validator::Validate;

use super::model::Purpose;

// Missing fields decode as empty strings so `validate()` reports them as
// invalid parameters instead of the extractor rejecting the body.

// =============================================================================
// REGISTER
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

// =============================================================================
// VERIFICATION CODE
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct VerifyCodeQuery {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    pub purpose: Option<Purpose>,
}

// =============================================================================
// LOGIN
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

// =============================================================================
// EMAIL CHANGE
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateMailRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "new_email is required"))]
    pub new_email: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "new_code is required"))]
    pub new_code: String,
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn empty() -> Self {
        Self {
            code: 0,
            message: "ok".to_string(),
            data: None,
        }
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
