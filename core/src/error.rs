use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Payload too large: {len} bytes (max 65535)")]
    PayloadTooLarge { len: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Payload is not valid UTF-8: {0}")]
    TextDecode(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
