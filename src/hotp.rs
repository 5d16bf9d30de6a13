//! Counter-based verification: forward window search with forced advance

use crate::config::Config;
use crate::error::{Error, Result};
use crate::otp;
use crate::verify::{Verification, VerifyKind, VerifyOptions};

pub(crate) fn verify(
    config: &mut Config,
    secret: &[u8],
    code: u32,
    opts: VerifyOptions,
) -> Result<Verification> {
    let Some(start) = config.options.hotp_counter else {
        return Err(Error::ModeUnknown);
    };
    let window = config.window();

    for i in 0..window {
        let counter = start + i;
        if counter < 0 {
            continue;
        }
        if otp::compute(secret, counter as u64) == code {
            config.options.hotp_counter = Some(counter + 1);
            config.mark_dirty();
            return Ok(Verification {
                kind: VerifyKind::Hotp,
                counter: Some(counter),
                timestamp: None,
                config_changed: false,
            });
        }
    }

    // A miss still burns the current counter so observed codes go stale.
    if !opts.no_increment_hotp {
        config.options.hotp_counter = Some(start + 1);
        config.mark_dirty();
    }
    Err(Error::InvalidCode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotp_config(counter: i64) -> Config {
        let mut config = Config::new("JBSWY3DPEHPK3PXP");
        config.options.hotp_counter = Some(counter);
        config
    }

    fn code_at(config: &Config, counter: u64) -> u32 {
        let secret = config.secret_bytes().unwrap();
        otp::compute(&secret, counter)
    }

    #[test]
    fn match_at_offset_advances_past_it() {
        let mut config = hotp_config(7);
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = code_at(&config, 9);
        let res = verify(&mut config, &secret, code, VerifyOptions::default()).unwrap();
        assert_eq!(res.kind, VerifyKind::Hotp);
        assert_eq!(res.counter, Some(9));
        assert_eq!(config.options.hotp_counter, Some(10));
        assert!(config.is_dirty());
    }

    #[test]
    fn miss_advances_by_one() {
        let mut config = hotp_config(7);
        let secret = config.secret_bytes().unwrap().to_vec();
        // A code from far outside the window cannot match.
        let code = code_at(&config, 1000);
        let err = verify(&mut config, &secret, code, VerifyOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
        assert_eq!(config.options.hotp_counter, Some(8));
    }

    #[test]
    fn no_increment_leaves_counter_alone() {
        let mut config = hotp_config(7);
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = code_at(&config, 1000);
        let opts = VerifyOptions {
            no_increment_hotp: true,
            ..Default::default()
        };
        let err = verify(&mut config, &secret, code, opts).unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
        assert_eq!(config.options.hotp_counter, Some(7));
        assert!(!config.is_dirty());
    }

    #[test]
    fn stale_code_behind_counter_is_rejected() {
        let mut config = hotp_config(7);
        let secret = config.secret_bytes().unwrap().to_vec();
        let code = code_at(&config, 6);
        assert!(verify(&mut config, &secret, code, VerifyOptions::default()).is_err());
        assert_eq!(config.options.hotp_counter, Some(8));
    }
}
