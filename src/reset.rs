use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::DynClock;

pub const RESET_CODE_TTL_MINUTES: i64 = 15;
/// Wrong guesses allowed before the outstanding code is discarded.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ResetCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

/// Outstanding password-reset codes, at most one per email.
pub struct ResetCodeStore {
    codes: RwLock<HashMap<String, ResetCode>>,
    clock: DynClock,
    ttl: Duration,
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl ResetCodeStore {
    pub fn new(clock: DynClock) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            clock,
            ttl: Duration::minutes(RESET_CODE_TTL_MINUTES),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a fresh 6-digit code, replacing any outstanding one.
    pub async fn issue(&self, email: &str) -> String {
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        self.insert(email, code.clone()).await;
        code
    }

    /// Stores a caller-supplied code.
    pub async fn insert(&self, email: &str, code: String) {
        let email = normalize(email);
        let reset_code = ResetCode {
            email: email.clone(),
            code,
            expires_at: self.clock.now() + self.ttl,
            failed_attempts: 0,
        };
        self.codes.write().await.insert(email, reset_code);
    }

    /// Consumes the code on success. Expired codes are removed and fail, and
    /// the code is discarded after `MAX_FAILED_ATTEMPTS` wrong guesses.
    pub async fn verify(&self, email: &str, code: &str) -> bool {
        let email = normalize(email);
        let now = self.clock.now();
        let mut codes = self.codes.write().await;

        let Some(entry) = codes.get_mut(&email) else {
            return false;
        };

        if entry.expires_at <= now {
            debug!("Reset code for {} has expired", email);
            codes.remove(&email);
            return false;
        }

        if entry.code == code.trim() {
            codes.remove(&email);
            return true;
        }

        entry.failed_attempts += 1;
        if entry.failed_attempts >= MAX_FAILED_ATTEMPTS {
            warn!(
                "Reset code for {} discarded after {} failed attempts",
                email, entry.failed_attempts
            );
            codes.remove(&email);
        }
        false
    }

    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, c| c.expires_at > now);
        before - codes.len()
    }

    pub async fn outstanding(&self) -> usize {
        self.codes.read().await.len()
    }

    pub fn start_background_cleanup(store: Arc<ResetCodeStore>, interval_seconds: u64) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));
            interval.tick().await; // Skip the first immediate tick

            loop {
                interval.tick().await;
                let removed = store.cleanup_expired().await;
                if removed > 0 {
                    info!("Removed {} expired reset codes", removed);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, ResetCodeStore) {
        let clock = Arc::new(ManualClock::default());
        let store = ResetCodeStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_code_is_six_digits() {
        let (_clock, store) = store();
        let code = store.issue("user@example.com").await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_code_verifies_exactly_once() {
        let (_clock, store) = store();
        let code = store.issue("user@example.com").await;

        assert!(store.verify("user@example.com", &code).await);
        assert!(!store.verify("user@example.com", &code).await);
    }

    #[tokio::test]
    async fn test_code_expires_after_fifteen_minutes() {
        let (clock, store) = store();
        let code = store.issue("user@example.com").await;

        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert!(!store.verify("user@example.com", &code).await);
        assert_eq!(store.outstanding().await, 0);
    }

    #[tokio::test]
    async fn test_code_valid_just_before_expiry() {
        let (clock, store) = store();
        store.insert("user@example.com", "123456".to_string()).await;

        clock.advance(Duration::minutes(14));
        assert!(store.verify("User@Example.com ", "123456").await);
    }

    #[tokio::test]
    async fn test_wrong_code_does_not_consume() {
        let (_clock, store) = store();
        store.insert("user@example.com", "123456".to_string()).await;

        assert!(!store.verify("user@example.com", "654321").await);
        assert!(store.verify("user@example.com", "123456").await);
    }

    #[tokio::test]
    async fn test_code_discarded_after_too_many_wrong_guesses() {
        let (_clock, store) = store();
        store.insert("user@example.com", "123456".to_string()).await;

        for guess in 0..MAX_FAILED_ATTEMPTS {
            assert!(!store.verify("user@example.com", &format!("{:06}", guess)).await);
        }

        assert_eq!(store.outstanding().await, 0);
        assert!(!store.verify("user@example.com", "123456").await);
    }

    #[tokio::test]
    async fn test_reissued_code_resets_attempts() {
        let (_clock, store) = store();
        store.insert("user@example.com", "123456".to_string()).await;
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            assert!(!store.verify("user@example.com", "000000").await);
        }

        store.insert("user@example.com", "654321".to_string()).await;
        assert!(!store.verify("user@example.com", "000000").await);
        assert!(store.verify("user@example.com", "654321").await);
    }

    #[tokio::test]
    async fn test_new_request_overwrites_previous_code() {
        let (_clock, store) = store();
        store.insert("user@example.com", "111111".to_string()).await;
        store.insert("user@example.com", "222222".to_string()).await;

        assert_eq!(store.outstanding().await, 1);
        assert!(!store.verify("user@example.com", "111111").await);
        assert!(store.verify("user@example.com", "222222").await);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let (clock, store) = store();
        store.insert("old@example.com", "111111".to_string()).await;
        clock.advance(Duration::minutes(10));
        store.insert("new@example.com", "222222".to_string()).await;
        clock.advance(Duration::minutes(6));

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.outstanding().await, 1);
    }
}
