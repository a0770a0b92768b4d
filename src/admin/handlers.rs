use axum::{
    Json,
    extract::{Path, State},
};
use tracing::{debug, info, warn};

use super::{
    AdminError, AdminSession, ConvertRequest, EmailStatusResponse, EmailTestRequest,
    ForgotPasswordRequest, LoginRequest, LoginResponse, MIN_PASSWORD_LENGTH, MessageResponse,
    ResetPasswordRequest, admin_email, hash_password, issue_token, secrets_match,
    verify_password,
};
use crate::email::{EmailMessage, EmailResult};
use crate::pricing::Conversion;
use crate::settings::{ContentSection, SiteSettings, is_known_section};
use crate::{AdminConfig, AppState};

fn credentials_match(
    settings: &SiteSettings,
    config: &AdminConfig,
    email: &str,
    password: &str,
) -> bool {
    if email.trim().to_lowercase() != admin_email(settings, config) {
        return false;
    }

    match (&settings.admin.password_hash, &config.password) {
        (Some(hash), _) => verify_password(password, hash),
        (None, Some(initial)) => secrets_match(password, initial),
        (None, None) => false,
    }
}

fn redacted(mut settings: SiteSettings) -> SiteSettings {
    settings.admin.password_hash = None;
    settings
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AdminError> {
    let settings = state.settings.load().await?;

    if !credentials_match(&settings, &state.config.admin, &payload.email, &payload.password) {
        warn!("Admin login failed for {}", payload.email.trim());
        return Err(AdminError::InvalidCredentials);
    }

    let (token, expires_at) = issue_token(
        &state.config.app.secret,
        &payload.email,
        state.clock.now(),
    )?;
    info!("Admin {} logged in", payload.email.trim());

    Ok(Json(LoginResponse { token, expires_at }))
}

/// Answers the same way whether or not the email belongs to the admin.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AdminError> {
    let settings = state.settings.load().await?;

    if payload.email.trim().to_lowercase() == admin_email(&settings, &state.config.admin) {
        state.mailer.send_password_reset(&payload.email).await?;
    } else {
        debug!("Password reset requested for unknown email {}", payload.email.trim());
    }

    Ok(Json(MessageResponse::ok(
        "If that email belongs to an admin account, a reset code has been sent.",
    )))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AdminError> {
    if payload.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if !state
        .mailer
        .reset_codes()
        .verify(&payload.email, &payload.code)
        .await
    {
        return Err(AdminError::InvalidResetCode);
    }

    let mut settings = state.settings.load().await?;
    settings.admin.email = Some(payload.email.trim().to_lowercase());
    settings.admin.password_hash = Some(hash_password(&payload.new_password)?);
    state.settings.save(&settings).await?;

    info!("Admin password reset for {}", payload.email.trim());
    Ok(Json(MessageResponse::ok("Password has been reset.")))
}

pub async fn get_settings_handler(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<SiteSettings>, AdminError> {
    Ok(Json(redacted(state.settings.load().await?)))
}

/// Replaces the settings document. The stored password hash is kept.
pub async fn put_settings_handler(
    session: AdminSession,
    State(state): State<AppState>,
    Json(mut payload): Json<SiteSettings>,
) -> Result<Json<SiteSettings>, AdminError> {
    if let Some(unknown) = payload.sections.keys().find(|name| !is_known_section(name)) {
        return Err(AdminError::UnknownSection(unknown.clone()));
    }

    let current = state.settings.load().await?;
    payload.admin.password_hash = current.admin.password_hash;
    if payload.admin.email.is_none() {
        payload.admin.email = current.admin.email;
    }

    state.settings.save(&payload).await?;
    state.mailer.config_service().clear_cache().await;
    info!("Settings updated by {}", session.email);

    Ok(Json(redacted(payload)))
}

pub async fn put_content_handler(
    session: AdminSession,
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(payload): Json<ContentSection>,
) -> Result<Json<ContentSection>, AdminError> {
    if !is_known_section(&section) {
        return Err(AdminError::UnknownSection(section));
    }

    let mut settings = state.settings.load().await?;
    settings.sections.insert(section.clone(), payload.clone());
    state.settings.save(&settings).await?;
    info!("Content section {} updated by {}", section, session.email);

    Ok(Json(payload))
}

pub async fn email_status_handler(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Json<EmailStatusResponse> {
    let config = state.mailer.config_service().get_config().await;
    let providers = state.mailer.provider_statuses().await;

    Json(EmailStatusResponse {
        provider: config.provider,
        provider_priority: config.provider_priority.clone(),
        from: config.format_from(),
        providers,
    })
}

pub async fn email_test_handler(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<EmailTestRequest>,
) -> Json<EmailResult> {
    let result = match payload.to.as_deref().map(str::trim).filter(|to| !to.is_empty()) {
        Some(to) => {
            let message = EmailMessage::new(to, format!("{} test email", state.config.app.name))
                .with_both(
                    "This is a test email. Your email settings are working.",
                    "<p>This is a test email. Your email settings are working.</p>",
                );
            state.mailer.send_email_with_result(&message).await
        }
        None => state.mailer.test_email_provider(payload.provider).await,
    };

    Json(result)
}

pub async fn convert_price_handler(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<ConvertRequest>,
) -> Result<Json<Conversion>, AdminError> {
    let settings = state.settings.load().await?;
    let conversion = state
        .pricing
        .convert_and_verify(payload.amount, &payload.from, &payload.to, &settings.pricing)
        .await?;
    Ok(Json(conversion))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> AdminConfig {
        AdminConfig {
            email: "admin@vyomai.cloud".to_string(),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_initial_password_is_used_until_hash_exists() {
        let mut settings = SiteSettings::default();
        let config = config(Some("initial-pass"));

        assert!(credentials_match(&settings, &config, "Admin@vyomai.cloud", "initial-pass"));
        assert!(!credentials_match(&settings, &config, "other@vyomai.cloud", "initial-pass"));

        settings.admin.password_hash = Some(hash_password("new-password").unwrap());
        assert!(!credentials_match(&settings, &config, "admin@vyomai.cloud", "initial-pass"));
        assert!(credentials_match(&settings, &config, "admin@vyomai.cloud", "new-password"));
    }

    #[test]
    fn test_no_password_means_no_login() {
        let settings = SiteSettings::default();
        assert!(!credentials_match(&settings, &config(None), "admin@vyomai.cloud", ""));
    }

    #[test]
    fn test_settings_email_overrides_config() {
        let mut settings = SiteSettings::default();
        settings.admin.email = Some("Owner@VyomAi.cloud".to_string());
        assert_eq!(admin_email(&settings, &config(None)), "owner@vyomai.cloud");
    }
}
