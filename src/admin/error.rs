use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::mailer::NotifyError;
use crate::pricing::PricingError;
use crate::settings::SettingsError;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Invalid or expired reset code")]
    InvalidResetCode,

    #[error("Unknown content section: {0}")]
    UnknownSection(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::Unauthorized | AdminError::InvalidCredentials | AdminError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AdminError::InvalidResetCode | AdminError::BadRequest(_) | AdminError::Pricing(_) => {
                StatusCode::BAD_REQUEST
            }
            AdminError::UnknownSection(_) => StatusCode::NOT_FOUND,
            AdminError::Notify(NotifyError::InvalidRecipient(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::Notify(NotifyError::DeliveryFailed(_)) => StatusCode::BAD_GATEWAY,
            AdminError::Notify(NotifyError::Email(_))
            | AdminError::Settings(_)
            | AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Admin request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
