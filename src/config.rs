//! In-memory secret-file state and its mutation accessors
//!
//! Every mutating accessor marks the config dirty; only the persistence
//! layer clears the flag after a successful atomic replace.

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::{DEFAULT_STEP_SIZE, DEFAULT_WINDOW_SIZE, LOGIN_SLOTS};

/// Verification mode derived from the option flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Neither TOTP_AUTH nor HOTP_COUNTER is present; verification fails
    Unknown,
    /// Time-based codes (TOTP_AUTH)
    Totp,
    /// Counter-based codes (HOTP_COUNTER)
    Hotp,
}

/// Sliding-window attempt ledger (RATE_LIMIT)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    /// Attempts allowed per interval (1..=100)
    pub attempts: usize,
    /// Interval length in seconds (1..=3600)
    pub interval_secs: i64,
    /// Wall-clock seconds of recent attempts
    pub timestamps: Vec<i64>,
}

/// One in-flight skew observation awaiting commit (RESETTING_TIME_SKEW)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkewSample {
    /// Base counter at observation time
    pub timestamp: i64,
    /// Observed offset in steps
    pub skew: i64,
}

/// Host-labelled login record (LAST0..LAST9)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRecord {
    pub host: String,
    /// Unix seconds of the login
    pub when: i64,
}

/// Parsed option lines of the secret file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub totp_auth: bool,
    /// Next counter to try; presence selects HOTP mode
    pub hotp_counter: Option<i64>,
    pub step_size: i64,
    pub window_size: i64,
    pub disallow_reuse: bool,
    /// Recently accepted TOTP counters, meaningful with `disallow_reuse`
    pub disallowed_timestamps: Vec<i64>,
    pub rate_limit: Option<RateLimit>,
    /// Committed clock offset in steps
    pub time_skew: i64,
    pub resetting_time_skew: Vec<SkewSample>,
    pub last_logins: [Option<LoginRecord>; LOGIN_SLOTS],
    /// Unrecognized option keys, preserved verbatim
    pub additional: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            totp_auth: false,
            hotp_counter: None,
            step_size: DEFAULT_STEP_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            disallow_reuse: false,
            disallowed_timestamps: Vec::new(),
            rate_limit: None,
            time_skew: 0,
            resetting_time_skew: Vec::new(),
            last_logins: Default::default(),
            additional: BTreeMap::new(),
        }
    }
}

/// In-memory representation of one secret file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Shared secret exactly as it appeared on the first line
    pub secret: String,
    /// Unconsumed emergency codes, in file order
    pub scratch_codes: Vec<u32>,
    pub options: Options,
    dirty: bool,
}

impl Config {
    /// Create a config around a Base32 secret with default options.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Verification mode; HOTP wins when both flags are present.
    pub fn mode(&self) -> Mode {
        if self.options.hotp_counter.is_some() {
            Mode::Hotp
        } else if self.options.totp_auth {
            Mode::Totp
        } else {
            Mode::Unknown
        }
    }

    /// TOTP step in seconds, falling back to the default.
    pub fn step(&self) -> i64 {
        if self.options.step_size > 0 {
            self.options.step_size
        } else {
            DEFAULT_STEP_SIZE
        }
    }

    /// Window size, falling back to the default.
    pub fn window(&self) -> i64 {
        if self.options.window_size > 0 {
            self.options.window_size
        } else {
            DEFAULT_WINDOW_SIZE
        }
    }

    /// Decode the shared secret: trimmed, uppercased, internal spaces
    /// stripped, Base32 without padding.
    pub fn secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let normalized: String = self
            .secret
            .trim()
            .chars()
            .filter(|c| *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let decoded = data_encoding::BASE32_NOPAD.decode(normalized.as_bytes())?;
        Ok(Zeroizing::new(decoded))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by the persistence layer after a successful replace.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Consume one matching scratch code. Order of the remainder is kept.
    pub fn use_scratch_code(&mut self, code: u32) -> bool {
        if let Some(idx) = self.scratch_codes.iter().position(|&c| c == code) {
            self.scratch_codes.remove(idx);
            self.dirty = true;
            return true;
        }
        false
    }

    /// Record an attempt at `now` and enforce the sliding window.
    ///
    /// Every call consumes a slot, whether or not the code later verifies.
    pub fn enforce_rate_limit(&mut self, now: i64) -> Result<()> {
        let Some(rl) = self.options.rate_limit.as_mut() else {
            return Ok(());
        };
        let window_start = now - rl.interval_secs;
        rl.timestamps.push(now);
        rl.timestamps.sort_unstable();
        rl.timestamps.retain(|&ts| ts >= window_start && ts <= now);
        let exceeded = rl.timestamps.len() > rl.attempts;
        if exceeded {
            let overflow = rl.timestamps.len() - rl.attempts;
            rl.timestamps.drain(..overflow);
        }
        self.dirty = true;
        if exceeded {
            Err(Error::RateLimited)
        } else {
            Ok(())
        }
    }

    /// Drop anti-replay entries that can no longer fall inside the window
    /// around `center`.
    pub fn reset_disallow_list(&mut self, center: i64, window: i64) {
        if !self.options.disallow_reuse {
            return;
        }
        self.options
            .disallowed_timestamps
            .retain(|&ts| (ts - center).abs() < window);
        self.dirty = true;
    }

    /// Whether `counter` was already accepted since the last purge.
    pub fn is_disallowed(&self, counter: i64) -> bool {
        self.options.disallow_reuse && self.options.disallowed_timestamps.contains(&counter)
    }

    /// Remember an accepted counter so it cannot be replayed.
    pub fn record_used_timestamp(&mut self, counter: i64) {
        if !self.options.disallow_reuse {
            return;
        }
        self.options.disallowed_timestamps.push(counter);
        self.dirty = true;
    }

    /// Record a candidate skew observation at base counter `ts`.
    ///
    /// Keeps a three-slot FIFO of samples. Returns `true` when three
    /// consistent observations commit a new `time_skew`: strictly
    /// increasing timestamps all within two steps of the first, and
    /// successive skews differing by at most one. On commit the committed
    /// value is `floor(sum / 3)` and the sample list is cleared.
    pub fn record_skew_observation(&mut self, ts: i64, skew: i64) -> bool {
        if skew == 0 {
            return false;
        }
        if let Some(last) = self.options.resetting_time_skew.last() {
            // Same absolute counter as the previous sample: already observed.
            if last.timestamp + last.skew == ts + skew {
                return false;
            }
        }
        let samples = &mut self.options.resetting_time_skew;
        if samples.len() == 3 {
            samples.remove(0);
        }
        samples.push(SkewSample { timestamp: ts, skew });
        self.dirty = true;
        if samples.len() < 3 {
            return false;
        }

        let first = samples[0];
        let mut prev = first;
        let mut total = first.skew;
        for sample in samples[1..].to_vec() {
            if sample.timestamp <= prev.timestamp || sample.timestamp > first.timestamp + 2 {
                return false;
            }
            if (prev.skew - sample.skew).abs() > 1 {
                return false;
            }
            total += sample.skew;
            prev = sample;
        }
        self.options.time_skew = total.div_euclid(3);
        self.options.resetting_time_skew.clear();
        true
    }

    /// Whether `host` authenticated less than `grace_secs` ago.
    pub fn within_grace_period(&self, host: &str, grace_secs: i64, now: i64) -> bool {
        if grace_secs <= 0 || host.is_empty() {
            return false;
        }
        self.options
            .last_logins
            .iter()
            .flatten()
            .any(|rec| rec.host == host && rec.when + grace_secs > now)
    }

    /// Record a successful login from `host` at `now`.
    ///
    /// Overwrites an existing record for the host, otherwise takes the
    /// lowest free slot, otherwise evicts the eldest record.
    pub fn update_login_record(&mut self, host: &str, now: i64) {
        if host.is_empty() {
            return;
        }
        let record = LoginRecord {
            host: host.to_string(),
            when: now,
        };
        if let Some(slot) = self
            .options
            .last_logins
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|rec| rec.host == host))
        {
            *slot = Some(record);
            self.dirty = true;
            return;
        }
        if let Some(slot) = self.options.last_logins.iter_mut().find(|s| s.is_none()) {
            *slot = Some(record);
            self.dirty = true;
            return;
        }
        let eldest = self
            .options
            .last_logins
            .iter_mut()
            .min_by_key(|slot| slot.as_ref().map_or(i64::MAX, |rec| rec.when));
        if let Some(slot) = eldest {
            *slot = Some(record);
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited_config() -> Config {
        let mut config = Config::new("JBSWY3DPEHPK3PXP");
        config.options.totp_auth = true;
        config.options.rate_limit = Some(RateLimit {
            attempts: 3,
            interval_secs: 30,
            timestamps: Vec::new(),
        });
        config
    }

    #[test]
    fn mode_prefers_hotp() {
        let mut config = Config::new("SECRET");
        assert_eq!(config.mode(), Mode::Unknown);
        config.options.totp_auth = true;
        assert_eq!(config.mode(), Mode::Totp);
        config.options.hotp_counter = Some(1);
        assert_eq!(config.mode(), Mode::Hotp);
    }

    #[test]
    fn secret_bytes_normalizes() {
        let config = Config::new("  jbsw y3dp ehpk 3pxp  ");
        let bytes = config.secret_bytes().unwrap();
        assert_eq!(&bytes[..], b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn rate_limit_truncates_to_newest() {
        let mut config = rate_limited_config();
        config.options.rate_limit.as_mut().unwrap().timestamps = vec![1990, 1995, 1998];
        let err = config.enforce_rate_limit(2000).unwrap_err();
        assert!(matches!(err, Error::RateLimited));
        let rl = config.options.rate_limit.as_ref().unwrap();
        assert_eq!(rl.timestamps, vec![1995, 1998, 2000]);
        assert!(config.is_dirty());
    }

    #[test]
    fn rate_limit_drops_stale_entries() {
        let mut config = rate_limited_config();
        config.options.rate_limit.as_mut().unwrap().timestamps = vec![100, 200, 1995];
        config.enforce_rate_limit(2000).unwrap();
        let rl = config.options.rate_limit.as_ref().unwrap();
        assert_eq!(rl.timestamps, vec![1995, 2000]);
    }

    #[test]
    fn scratch_consumption_preserves_order() {
        let mut config = Config::new("SECRET");
        config.scratch_codes = vec![11111111, 22222222, 33333333];
        assert!(config.use_scratch_code(22222222));
        assert_eq!(config.scratch_codes, vec![11111111, 33333333]);
        assert!(config.is_dirty());
        assert!(!config.use_scratch_code(22222222));
    }

    #[test]
    fn disallow_list_purges_outside_window() {
        let mut config = Config::new("SECRET");
        config.options.disallow_reuse = true;
        config.options.disallowed_timestamps = vec![95, 99, 100, 103, 200];
        config.reset_disallow_list(100, 3);
        assert_eq!(config.options.disallowed_timestamps, vec![99, 100]);
    }

    #[test]
    fn skew_commits_after_three_consistent_samples() {
        let mut config = Config::new("SECRET");
        assert!(!config.record_skew_observation(1000, 4));
        assert!(!config.record_skew_observation(1001, 4));
        assert!(config.record_skew_observation(1002, 4));
        assert_eq!(config.options.time_skew, 4);
        assert!(config.options.resetting_time_skew.is_empty());
        assert!(config.is_dirty());
    }

    #[test]
    fn skew_rejects_spread_out_samples() {
        let mut config = Config::new("SECRET");
        assert!(!config.record_skew_observation(1000, 4));
        assert!(!config.record_skew_observation(1002, 4));
        assert!(!config.record_skew_observation(1004, 4));
        assert_eq!(config.options.time_skew, 0);
        assert_eq!(config.options.resetting_time_skew.len(), 3);
    }

    #[test]
    fn skew_rejects_jitter_beyond_one_step() {
        let mut config = Config::new("SECRET");
        assert!(!config.record_skew_observation(1000, 4));
        assert!(!config.record_skew_observation(1001, 6));
        assert!(!config.record_skew_observation(1002, 4));
        assert_eq!(config.options.time_skew, 0);
    }

    #[test]
    fn skew_skips_duplicate_absolute_counter() {
        let mut config = Config::new("SECRET");
        assert!(!config.record_skew_observation(1000, 4));
        // 1001 + 3 lands on the same absolute counter as 1000 + 4.
        assert!(!config.record_skew_observation(1001, 3));
        assert_eq!(config.options.resetting_time_skew.len(), 1);
    }

    #[test]
    fn skew_fifo_keeps_last_three() {
        let mut config = Config::new("SECRET");
        for (ts, skew) in [(1000, 9), (1004, 4), (1005, 4)] {
            assert!(!config.record_skew_observation(ts, skew));
        }
        assert!(config.record_skew_observation(1006, 4));
        assert_eq!(config.options.time_skew, 4);
    }

    #[test]
    fn grace_period_matches_host_and_age() {
        let mut config = Config::new("SECRET");
        let now = 2_000_000;
        config.update_login_record("example.com", now - 10);
        assert!(config.within_grace_period("example.com", 20, now));
        assert!(!config.within_grace_period("example.com", 5, now));
        assert!(!config.within_grace_period("other.net", 20, now));
        assert!(!config.within_grace_period("", 20, now));
    }

    #[test]
    fn login_record_evicts_eldest_when_full() {
        let mut config = Config::new("SECRET");
        for i in 0..LOGIN_SLOTS {
            config.update_login_record(&format!("host{i}"), 1000 + i as i64);
        }
        config.update_login_record("newcomer", 5000);
        let hosts: Vec<&str> = config
            .options
            .last_logins
            .iter()
            .flatten()
            .map(|rec| rec.host.as_str())
            .collect();
        assert!(hosts.contains(&"newcomer"));
        assert!(!hosts.contains(&"host0"));
        assert_eq!(hosts.len(), LOGIN_SLOTS);
    }

    #[test]
    fn login_record_overwrites_existing_host() {
        let mut config = Config::new("SECRET");
        config.update_login_record("example.com", 100);
        config.update_login_record("example.com", 200);
        let occupied: Vec<&LoginRecord> = config.options.last_logins.iter().flatten().collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].when, 200);
    }
}
