use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secret too short: {len} bytes, need at least {min}")]
    SecretTooShort { len: usize, min: usize },

    #[error("secret is not valid base32")]
    InvalidBase32,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("code length must be 6 to 8 digits, got {0}")]
    InvalidDigits(u32),

    #[error("time step must be non-zero")]
    InvalidStep,
}
