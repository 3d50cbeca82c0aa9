use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    // Algorithm selection
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    // Crypto
    #[error("Key generation error: {0}")]
    Generation(String),

    #[error("Key decode error: {0}")]
    Decode(String),

    #[error("Key encode error: {0}")]
    Encode(String),

    // Persistence
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt key file {0}: {1}")]
    CorruptStore(String, String),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    // Lifecycle
    #[error("Key manager is not initialized")]
    NotInitialized,

    #[error("Key manager is already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, KeyError>;
