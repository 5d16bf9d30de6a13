//! Time-based verification: window search, anti-replay, skew recalibration

use crate::config::Config;
use crate::error::{Error, Result};
use crate::otp;
use crate::verify::{Verification, VerifyKind, VerifyOptions};

/// How far (in steps) skew detection searches around the base counter.
/// Covers 25 hours at the default 30-second step, enough for any time zone
/// misconfiguration plus drift.
const MAX_SKEW_SEARCH: i64 = 25 * 60;

pub(crate) fn verify(
    config: &mut Config,
    secret: &[u8],
    code: u32,
    opts: VerifyOptions,
    now: i64,
) -> Result<Verification> {
    let step = config.step();
    let window = config.window();
    let tm = now.div_euclid(step);
    let skew = config.options.time_skew;

    if config.options.disallow_reuse {
        config.reset_disallow_list(tm + skew, window);
    }

    for offset in -((window - 1) / 2)..=(window / 2) {
        let counter = tm + skew + offset;
        if counter < 0 {
            continue;
        }
        if otp::compute(secret, counter as u64) == code {
            if config.is_disallowed(counter) {
                return Err(Error::InvalidCode);
            }
            config.record_used_timestamp(counter);
            return Ok(Verification {
                kind: VerifyKind::Totp,
                counter: None,
                timestamp: Some(counter),
                config_changed: false,
            });
        }
    }

    if opts.disable_skew_adjust {
        return Err(Error::InvalidCode);
    }
    if let Some(candidate) = detect_skew(secret, tm, code) {
        if config.record_skew_observation(tm, candidate) {
            return Ok(Verification {
                kind: VerifyKind::Totp,
                counter: None,
                timestamp: Some(tm + candidate),
                config_changed: true,
            });
        }
    }
    Err(Error::InvalidCode)
}

/// Search outward from the base counter for a counter matching `code`.
fn detect_skew(secret: &[u8], tm: i64, code: u32) -> Option<i64> {
    for i in 1..MAX_SKEW_SEARCH {
        if tm - i >= 0 && otp::compute(secret, (tm - i) as u64) == code {
            return Some(-i);
        }
        if otp::compute(secret, (tm + i) as u64) == code {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totp_config() -> Config {
        let mut config = Config::new("JBSWY3DPEHPK3PXP");
        config.options.totp_auth = true;
        config
    }

    fn code_at(config: &Config, counter: i64) -> u32 {
        let secret = config.secret_bytes().unwrap();
        otp::compute(&secret, counter as u64)
    }

    #[test]
    fn accepts_codes_across_the_window() {
        let mut config = totp_config();
        let now = 1_600_000_000;
        let tm = now / 30;
        let secret = config.secret_bytes().unwrap().to_vec();
        for offset in [-1, 0, 1] {
            let code = otp::compute(&secret, (tm + offset) as u64);
            let res = verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap();
            assert_eq!(res.timestamp, Some(tm + offset));
        }
    }

    #[test]
    fn rejects_code_outside_the_window() {
        let mut config = totp_config();
        let now = 1_600_000_000;
        let tm = now / 30;
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = otp::compute(&secret, (tm + 2) as u64);
        let opts = VerifyOptions {
            disable_skew_adjust: true,
            ..Default::default()
        };
        assert!(matches!(
            verify(&mut config, &secret, code, opts, now).unwrap_err(),
            Error::InvalidCode
        ));
    }

    #[test]
    fn replayed_counter_is_rejected() {
        let mut config = totp_config();
        config.options.disallow_reuse = true;
        let now = 1_600_000_000;
        let tm = now / 30;
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = otp::compute(&secret, tm as u64);

        let res = verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap();
        assert_eq!(res.timestamp, Some(tm));
        assert_eq!(config.options.disallowed_timestamps, vec![tm]);

        let err = verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
    }

    #[test]
    fn replay_ledger_is_purged_as_time_moves_on() {
        let mut config = totp_config();
        config.options.disallow_reuse = true;
        config.options.disallowed_timestamps = vec![100, 53_333_333];
        let now = 1_600_000_000;
        let secret = config.secret_bytes().unwrap().to_vec();
        let opts = VerifyOptions {
            disable_skew_adjust: true,
            ..Default::default()
        };
        let _ = verify(&mut config, &secret, 0, opts, now);
        assert_eq!(config.options.disallowed_timestamps, vec![53_333_333]);
    }

    #[test]
    fn skew_recalibration_commits_on_third_observation() {
        let mut config = totp_config();
        let skew = 4;
        let mut now = 1_700_000_000;
        let secret = config.secret_bytes().unwrap().to_vec();

        for _ in 0..2 {
            let code = code_at(&config, now / 30 + skew);
            let err =
                verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap_err();
            assert!(matches!(err, Error::InvalidCode));
            assert!(config.is_dirty());
            now += 30;
        }

        let code = code_at(&config, now / 30 + skew);
        let res = verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap();
        assert_eq!(res.kind, VerifyKind::Totp);
        assert_eq!(res.timestamp, Some(now / 30 + skew));
        assert!(res.config_changed);
        assert_eq!(config.options.time_skew, 4);
        assert!(config.options.resetting_time_skew.is_empty());
    }

    #[test]
    fn committed_skew_shifts_the_window() {
        let mut config = totp_config();
        config.options.time_skew = 4;
        let now = 1_700_000_000;
        let tm = now / 30;
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = otp::compute(&secret, (tm + 4) as u64);
        let res = verify(&mut config, &secret, code, VerifyOptions::default(), now).unwrap();
        assert_eq!(res.timestamp, Some(tm + 4));
    }

    #[test]
    fn noskewadj_skips_sample_recording() {
        let mut config = totp_config();
        let now = 1_700_000_000;
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = code_at(&config, now / 30 + 4);
        let opts = VerifyOptions {
            disable_skew_adjust: true,
            ..Default::default()
        };
        let err = verify(&mut config, &secret, code, opts, now).unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
        assert!(config.options.resetting_time_skew.is_empty());
        assert!(!config.is_dirty());
    }
}
