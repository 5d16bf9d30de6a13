//! Error types for the verification engine

use thiserror::Error;

/// Result type alias using the engine error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, serializing, or verifying
#[derive(Debug, Error)]
pub enum Error {
    /// The secret file has no shared secret line
    #[error("shared secret is missing")]
    MissingSecret,

    /// Input or output exceeds the 64 KiB secret-file ceiling
    #[error("secret file exceeds the 64 KiB limit")]
    FileTooLarge,

    /// The secret file is not valid UTF-8
    #[error("secret file is not valid text")]
    InvalidEncoding,

    /// A line that is neither an option nor an eight-digit scratch code
    #[error("invalid scratch code line {0:?}")]
    InvalidScratchLine(String),

    /// An option line with no key
    #[error("malformed option line {0:?}")]
    InvalidOptionLine(String),

    /// A recognized option key with an out-of-range or unparsable value
    #[error("invalid {key} value {value:?}")]
    InvalidOptionValue { key: &'static str, value: String },

    /// RATE_LIMIT needs attempts (1..=100) and an interval (1..=3600)
    #[error("RATE_LIMIT option is malformed")]
    MalformedRateLimit,

    /// The shared secret does not decode as Base32
    #[error("base32 decode failed: {0}")]
    Base32(#[from] data_encoding::DecodeError),

    /// The presented code did not verify
    #[error("verification code does not match")]
    InvalidCode,

    /// Too many attempts inside the rate-limit interval
    #[error("too many login attempts, please try again later")]
    RateLimited,

    /// Neither TOTP_AUTH nor HOTP_COUNTER is present
    #[error("HOTP/TOTP mode is not configured")]
    ModeUnknown,
}
