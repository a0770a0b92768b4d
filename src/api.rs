use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::mailer::{BookingRequest, ContactSubmission, NotifyError, PricingRequest};
use crate::settings::{ContentSection, SettingsError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Notify(NotifyError::InvalidRecipient(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "We could not deliver email to that address. Please check your email address and try again."
                    .to_string(),
            ),
            ApiError::Notify(NotifyError::DeliveryFailed(_)) => (
                StatusCode::BAD_GATEWAY,
                "We could not send your confirmation email. Please try again later.".to_string(),
            ),
            ApiError::Notify(NotifyError::Email(_)) | ApiError::Settings(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[derive(Serialize)]
pub struct SubmitResponse {
    success: bool,
    message: String,
}

impl SubmitResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Shape check only; whether the mailbox exists is up to the mail server.
fn require_email(value: &str) -> Result<(), ApiError> {
    require("email", value)?;
    let valid = value
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        });
    if !valid || value.trim().contains(char::is_whitespace) {
        return Err(ApiError::Validation("email is not a valid address".to_string()));
    }
    Ok(())
}

pub async fn contact_handler(
    State(app_state): State<crate::AppState>,
    Json(payload): Json<ContactSubmission>,
) -> Result<Json<SubmitResponse>, ApiError> {
    require("name", &payload.name)?;
    require_email(&payload.email)?;
    require("subject", &payload.subject)?;
    require("message", &payload.message)?;

    app_state.mailer.send_contact_form(&payload).await?;
    Ok(SubmitResponse::ok("Thank you! Your message has been sent."))
}

pub async fn booking_handler(
    State(app_state): State<crate::AppState>,
    Json(payload): Json<BookingRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    require("name", &payload.name)?;
    require_email(&payload.email)?;
    require("service", &payload.service)?;

    app_state.mailer.send_booking_confirmation(&payload).await?;
    Ok(SubmitResponse::ok("Thank you! Your booking request has been received."))
}

pub async fn pricing_request_handler(
    State(app_state): State<crate::AppState>,
    Json(payload): Json<PricingRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    require("name", &payload.name)?;
    require_email(&payload.email)?;
    require("plan", &payload.plan)?;

    app_state.mailer.send_pricing_request(&payload).await?;
    Ok(SubmitResponse::ok("Thank you! We will send you a quote shortly."))
}

/// Visible content sections keyed by name.
pub async fn content_handler(
    State(app_state): State<crate::AppState>,
) -> Result<Json<BTreeMap<String, ContentSection>>, ApiError> {
    let settings = app_state.settings.load().await?;
    let sections = settings
        .sections
        .into_iter()
        .filter(|(_, section)| section.visible)
        .collect();
    Ok(Json(sections))
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
