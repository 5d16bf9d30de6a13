//! gauth - HOTP/TOTP verification engine compatible with the Google
//! Authenticator secret-file format
//!
//! This crate implements the pure verification core: the text codec for the
//! secret file, the in-memory config state with its anti-replay, rate-limit,
//! skew, and login ledgers, and the HOTP/TOTP verification pipeline. File
//! locking, atomic persistence, and the host-binding surface live in the
//! `gauth-pam` crate; enrollment lives in `gauth-cli`.

pub mod config;
pub mod error;
pub mod hotp;
pub mod otp;
pub mod otpauth;
pub mod scratch;
pub mod secretfile;
pub mod totp;
pub mod verify;

pub use config::{Config, LoginRecord, Mode, Options, RateLimit, SkewSample};
pub use error::{Error, Result};
pub use verify::{Verification, VerifyKind, VerifyOptions};

/// Maximum serialized secret-file size in bytes
pub const MAX_FILE_SIZE: usize = 64 * 1024;

/// Default TOTP step length in seconds
pub const DEFAULT_STEP_SIZE: i64 = 30;

/// Default number of adjacent codes considered valid
pub const DEFAULT_WINDOW_SIZE: i64 = 3;

/// Number of login-record slots in the secret file (LAST0..LAST9)
pub const LOGIN_SLOTS: usize = 10;
