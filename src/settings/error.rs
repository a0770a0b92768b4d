use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("Failed to serialize settings: {0}")]
    SerializeError(String),

    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
}
