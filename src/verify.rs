//! Top-level verification pipeline
//!
//! Order matters: the rate limit is enforced before the token is even
//! looked at, so malformed input still consumes an attempt slot.

use crate::config::{Config, Mode};
use crate::error::{Error, Result};
use crate::{hotp, totp};

/// Which path accepted the code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyKind {
    Totp,
    Hotp,
    Scratch,
}

/// Per-call verification switches supplied by the host binding
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    /// Skip the skew-detection fallback after a failed window search
    pub disable_skew_adjust: bool,
    /// Leave the HOTP counter alone when no code matches
    pub no_increment_hotp: bool,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub kind: VerifyKind,
    /// Matched HOTP counter
    pub counter: Option<i64>,
    /// Matched TOTP counter
    pub timestamp: Option<i64>,
    /// Whether the config mutated between entry and return
    pub config_changed: bool,
}

/// Verify a candidate token against the config at wall-clock `now`.
///
/// Mutates the config along the way: the rate-limit ledger always, the
/// scratch list, anti-replay ledger, HOTP counter, or skew samples
/// depending on the path taken.
pub fn verify_code(
    config: &mut Config,
    raw: &str,
    opts: VerifyOptions,
    now: i64,
) -> Result<Verification> {
    if config.secret.trim().is_empty() {
        return Err(Error::MissingSecret);
    }
    let dirty_before = config.is_dirty();
    config.enforce_rate_limit(now)?;

    let token = raw.trim();
    if token.is_empty() {
        return Err(Error::InvalidCode);
    }
    if token.len() != 6 && token.len() != 8 {
        return Err(Error::InvalidCode);
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidCode);
    }
    let code: u32 = token.parse().map_err(|_| Error::InvalidCode)?;

    if token.len() == 8 {
        // Scratch codes never fall through to the OTP algorithms.
        if config.use_scratch_code(code) {
            return Ok(Verification {
                kind: VerifyKind::Scratch,
                counter: None,
                timestamp: None,
                config_changed: config.is_dirty() != dirty_before,
            });
        }
        return Err(Error::InvalidCode);
    }

    let secret = config.secret_bytes()?;
    let mut verification = match config.mode() {
        Mode::Totp => totp::verify(config, &secret, code, opts, now)?,
        Mode::Hotp => hotp::verify(config, &secret, code, opts)?,
        Mode::Unknown => return Err(Error::ModeUnknown),
    };
    verification.config_changed =
        verification.config_changed || config.is_dirty() != dirty_before;
    Ok(verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimit;
    use crate::otp;

    fn totp_config() -> Config {
        let mut config = Config::new("JBSWY3DPEHPK3PXP");
        config.options.totp_auth = true;
        config
    }

    #[test]
    fn empty_secret_fails_first() {
        let mut config = Config::new("   ");
        let err = verify_code(&mut config, "123456", VerifyOptions::default(), 0).unwrap_err();
        assert!(matches!(err, Error::MissingSecret));
    }

    #[test]
    fn shape_errors_map_to_invalid_code() {
        let mut config = totp_config();
        for token in ["", "   ", "12345", "1234567", "123456789", "12a456", "12345x78"] {
            let err = verify_code(&mut config, token, VerifyOptions::default(), 0).unwrap_err();
            assert!(matches!(err, Error::InvalidCode), "token {token:?}");
        }
    }

    #[test]
    fn malformed_input_still_consumes_a_rate_slot() {
        let mut config = totp_config();
        config.options.rate_limit = Some(RateLimit {
            attempts: 3,
            interval_secs: 30,
            timestamps: Vec::new(),
        });
        for now in [100, 101, 102] {
            let err = verify_code(&mut config, "not-a-code", VerifyOptions::default(), now);
            assert!(matches!(err.unwrap_err(), Error::InvalidCode));
        }
        let err = verify_code(&mut config, "not-a-code", VerifyOptions::default(), 103);
        assert!(matches!(err.unwrap_err(), Error::RateLimited));
        let rl = config.options.rate_limit.as_ref().unwrap();
        assert_eq!(rl.timestamps, vec![101, 102, 103]);
    }

    #[test]
    fn scratch_codes_do_not_reach_the_algorithms() {
        let mut config = totp_config();
        config.scratch_codes = vec![12345678, 87654321];
        let res = verify_code(&mut config, "12345678", VerifyOptions::default(), 0).unwrap();
        assert_eq!(res.kind, VerifyKind::Scratch);
        assert!(res.config_changed);
        assert_eq!(config.scratch_codes, vec![87654321]);

        // A second use of the same code is a plain miss.
        let err = verify_code(&mut config, "12345678", VerifyOptions::default(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
    }

    #[test]
    fn unknown_mode_is_reported() {
        let mut config = Config::new("JBSWY3DPEHPK3PXP");
        let err = verify_code(&mut config, "123456", VerifyOptions::default(), 0).unwrap_err();
        assert!(matches!(err, Error::ModeUnknown));
    }

    #[test]
    fn totp_happy_path() {
        let mut config = totp_config();
        config.options.rate_limit = Some(RateLimit {
            attempts: 3,
            interval_secs: 30,
            timestamps: Vec::new(),
        });
        let now = 1_600_000_000;
        let secret = config.secret_bytes().unwrap();
        let token = format!("{:06}", otp::compute(&secret, 53_333_333));

        let res = verify_code(&mut config, &token, VerifyOptions::default(), now).unwrap();
        assert_eq!(res.kind, VerifyKind::Totp);
        assert_eq!(res.timestamp, Some(53_333_333));
        assert!(res.config_changed);
        let rl = config.options.rate_limit.as_ref().unwrap();
        assert_eq!(rl.timestamps, vec![now]);
    }
}
