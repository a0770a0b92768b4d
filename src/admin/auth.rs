use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use super::AdminError;
use crate::settings::SiteSettings;
use crate::{AdminConfig, AppState};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_HOURS: i64 = 12;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn sign_value(secret: &str, value: &str) -> Result<String, AdminError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AdminError::Internal("Invalid secret key".to_string()))?;
    mac.update(value.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

/// Returns the signed value when the signature checks out.
pub fn verify_signed_value<'a>(secret: &str, signed_value: &'a str) -> Option<&'a str> {
    if let Some((value, signature_b64)) = signed_value.rsplit_once(':')
        && let Ok(signature) = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64)
        && let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes())
    {
        mac.update(value.as_bytes());
        if mac.verify_slice(&signature).is_ok() {
            return Some(value);
        }
    }
    None
}

/// Bearer token of the form `<base64 email>.<expiry>:<signature>`.
pub fn issue_token(
    secret: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>), AdminError> {
    let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
    let value = format!(
        "{}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(email.trim().to_lowercase()),
        expires_at.timestamp()
    );
    Ok((sign_value(secret, &value)?, expires_at))
}

/// Returns the admin email the token was issued to.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<String, AdminError> {
    let value = verify_signed_value(secret, token).ok_or(AdminError::Unauthorized)?;
    let (email_b64, expiry) = value.split_once('.').ok_or(AdminError::Unauthorized)?;

    let expiry: i64 = expiry.parse().map_err(|_| AdminError::Unauthorized)?;
    if now.timestamp() >= expiry {
        return Err(AdminError::TokenExpired);
    }

    general_purpose::URL_SAFE_NO_PAD
        .decode(email_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(AdminError::Unauthorized)
}

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> Result<String, AdminError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AdminError::Internal(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Constant-time comparison of two secrets of any length.
pub fn secrets_match(candidate: &str, expected: &str) -> bool {
    let key = rand::rng().random::<[u8; 32]>();
    let (Ok(mut candidate_mac), Ok(mut expected_mac)) = (
        HmacSha256::new_from_slice(&key),
        HmacSha256::new_from_slice(&key),
    ) else {
        return false;
    };
    candidate_mac.update(candidate.as_bytes());
    expected_mac.update(expected.as_bytes());
    candidate_mac
        .verify_slice(&expected_mac.finalize().into_bytes())
        .is_ok()
}

/// The admin email, preferring the one saved in settings.
pub fn admin_email(settings: &SiteSettings, config: &AdminConfig) -> String {
    settings
        .admin
        .email
        .as_deref()
        .unwrap_or(&config.email)
        .trim()
        .to_lowercase()
}

/// An authenticated admin, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub email: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AdminError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AdminError::Unauthorized)?;

        let email = verify_token(&state.config.app.secret, token, state.clock.now())?;

        // Only the current admin email holds a session
        let settings = state.settings.load().await?;
        if email != admin_email(&settings, &state.config.admin) {
            return Err(AdminError::Unauthorized);
        }

        Ok(AdminSession { email })
    }
}
