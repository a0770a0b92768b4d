use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Email configuration error: {0}")]
    ConfigError(String),

    #[error("Email provider error: {0}")]
    ProviderError(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// How a failed delivery should be reported to whoever submitted the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    InvalidRecipient,
}

const BOUNCE_SIGNATURES: [&str; 6] = [
    "recipient address rejected",
    "user unknown",
    "mailbox does not exist",
    "address not found",
    "no such user",
    "tried to reach does not exist",
];

/// Decides from a provider's error text whether the recipient address itself
/// is bad. Upstream wording varies, so every known signature lives here.
pub fn classify_failure(raw_error: &str) -> FailureKind {
    let lowered = raw_error.to_ascii_lowercase();

    let has_550 = lowered
        .split(|c: char| !c.is_ascii_digit())
        .any(|token| token == "550");

    if has_550 || BOUNCE_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
        FailureKind::InvalidRecipient
    } else {
        FailureKind::Transport
    }
}
