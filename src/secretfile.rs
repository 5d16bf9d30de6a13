//! Text codec for the Google Authenticator secret-file format
//!
//! A secret file is the Base32 shared secret on the first line, followed by
//! option lines (`" KEY [value]`) and eight-digit scratch codes, LF
//! terminated, at most 64 KiB.

use crate::config::{Config, LoginRecord, RateLimit, SkewSample};
use crate::error::{Error, Result};
use crate::{DEFAULT_STEP_SIZE, DEFAULT_WINDOW_SIZE, LOGIN_SLOTS, MAX_FILE_SIZE};

/// Parse a secret file.
pub fn parse(data: &[u8]) -> Result<Config> {
    if data.len() > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge);
    }
    let text = std::str::from_utf8(data).map_err(|_| Error::InvalidEncoding)?;

    let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));
    let secret = lines.next().map(str::trim).unwrap_or_default();
    if secret.is_empty() {
        return Err(Error::MissingSecret);
    }

    let mut config = Config::new(secret);
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(payload) = line.strip_prefix("\" ") {
            parse_option(&mut config, payload)?;
        } else {
            config.scratch_codes.push(parse_scratch(line)?);
        }
    }
    Ok(config)
}

fn parse_scratch(line: &str) -> Result<u32> {
    if line.len() != 8 || !line.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidScratchLine(line.to_string()));
    }
    line.parse()
        .map_err(|_| Error::InvalidScratchLine(line.to_string()))
}

fn parse_option(config: &mut Config, payload: &str) -> Result<()> {
    let payload = payload.trim();
    let Some(key) = payload.split_whitespace().next() else {
        return Err(Error::InvalidOptionLine(payload.to_string()));
    };
    let value = payload[key.len()..].trim();
    let opts = &mut config.options;

    match key {
        "TOTP_AUTH" => opts.totp_auth = true,
        "HOTP_COUNTER" => {
            let counter = value.parse().map_err(|_| Error::InvalidOptionValue {
                key: "HOTP_COUNTER",
                value: value.to_string(),
            })?;
            opts.hotp_counter = Some(counter);
        }
        "STEP_SIZE" => {
            opts.step_size = parse_ranged(value, 1, 60, "STEP_SIZE")?;
        }
        "WINDOW_SIZE" => {
            opts.window_size = parse_ranged(value, 1, 100, "WINDOW_SIZE")?;
        }
        "RATE_LIMIT" => opts.rate_limit = Some(parse_rate_limit(value)?),
        "DISALLOW_REUSE" => {
            opts.disallow_reuse = true;
            for token in value.split_whitespace() {
                let ts = token.parse().map_err(|_| Error::InvalidOptionValue {
                    key: "DISALLOW_REUSE",
                    value: token.to_string(),
                })?;
                opts.disallowed_timestamps.push(ts);
            }
        }
        "TIME_SKEW" => {
            // An empty value reads as "option absent".
            if !value.is_empty() {
                opts.time_skew = value.parse().map_err(|_| Error::InvalidOptionValue {
                    key: "TIME_SKEW",
                    value: value.to_string(),
                })?;
            }
        }
        "RESETTING_TIME_SKEW" => {
            opts.resetting_time_skew = parse_skew_samples(value)?;
        }
        _ => {
            if let Some(idx) = parse_last_index(key) {
                let record = parse_last_login(value)?;
                opts.last_logins[idx] = Some(record);
            } else {
                opts.additional.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(())
}

fn parse_ranged(value: &str, min: i64, max: i64, key: &'static str) -> Result<i64> {
    value
        .parse()
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| Error::InvalidOptionValue {
            key,
            value: value.to_string(),
        })
}

fn parse_last_index(key: &str) -> Option<usize> {
    let digit = key.strip_prefix("LAST")?;
    if digit.len() != 1 {
        return None;
    }
    let idx = digit.parse::<usize>().ok()?;
    (idx < LOGIN_SLOTS).then_some(idx)
}

fn parse_last_login(value: &str) -> Result<LoginRecord> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(Error::InvalidOptionValue {
            key: "LAST",
            value: value.to_string(),
        });
    }
    let when = fields[fields.len() - 1]
        .parse()
        .map_err(|_| Error::InvalidOptionValue {
            key: "LAST",
            value: value.to_string(),
        })?;
    Ok(LoginRecord {
        host: fields[..fields.len() - 1].join(" "),
        when,
    })
}

/// Skew-sample tokens look like `<timestamp><sign><skew>`, e.g. `1000+4`.
fn parse_skew_samples(value: &str) -> Result<Vec<SkewSample>> {
    let mut samples = Vec::new();
    for token in value.split_whitespace() {
        let split = token.bytes().take_while(|b| b.is_ascii_digit()).count();
        if split == 0 || split >= token.len() {
            return Err(Error::InvalidOptionValue {
                key: "RESETTING_TIME_SKEW",
                value: token.to_string(),
            });
        }
        let invalid = || Error::InvalidOptionValue {
            key: "RESETTING_TIME_SKEW",
            value: token.to_string(),
        };
        let timestamp = token[..split].parse().map_err(|_| invalid())?;
        let skew = token[split..].parse().map_err(|_| invalid())?;
        samples.push(SkewSample { timestamp, skew });
    }
    Ok(samples)
}

fn parse_rate_limit(value: &str) -> Result<RateLimit> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(Error::MalformedRateLimit);
    }
    let attempts: usize = fields[0]
        .parse()
        .ok()
        .filter(|n| (1..=100).contains(n))
        .ok_or(Error::MalformedRateLimit)?;
    let interval_secs: i64 = fields[1]
        .parse()
        .ok()
        .filter(|n| (1..=3600).contains(n))
        .ok_or(Error::MalformedRateLimit)?;
    let mut timestamps = Vec::with_capacity(fields.len() - 2);
    for field in &fields[2..] {
        timestamps.push(field.parse().map_err(|_| Error::MalformedRateLimit)?);
    }
    Ok(RateLimit {
        attempts,
        interval_secs,
        timestamps,
    })
}

/// Serialize a config back to the file format.
///
/// Defaulted and unused options are omitted; pass-through keys come out
/// sorted; scratch codes keep their in-memory order, zero-padded to eight
/// digits.
pub fn serialize(config: &Config) -> Result<Vec<u8>> {
    let mut out = String::with_capacity(512);
    out.push_str(config.secret.trim());
    out.push('\n');

    let opts = &config.options;
    if opts.totp_auth {
        write_option(&mut out, "TOTP_AUTH", "");
    }
    if let Some(counter) = opts.hotp_counter {
        write_option(&mut out, "HOTP_COUNTER", &counter.to_string());
    }
    if opts.step_size != DEFAULT_STEP_SIZE {
        write_option(&mut out, "STEP_SIZE", &opts.step_size.to_string());
    }
    if opts.window_size != DEFAULT_WINDOW_SIZE {
        write_option(&mut out, "WINDOW_SIZE", &opts.window_size.to_string());
    }
    if let Some(rl) = &opts.rate_limit {
        let mut parts = vec![rl.attempts.to_string(), rl.interval_secs.to_string()];
        parts.extend(rl.timestamps.iter().map(i64::to_string));
        write_option(&mut out, "RATE_LIMIT", &parts.join(" "));
    }
    if opts.disallow_reuse {
        let parts: Vec<String> = opts.disallowed_timestamps.iter().map(i64::to_string).collect();
        write_option(&mut out, "DISALLOW_REUSE", &parts.join(" "));
    }
    if opts.time_skew != 0 {
        write_option(&mut out, "TIME_SKEW", &opts.time_skew.to_string());
    }
    if !opts.resetting_time_skew.is_empty() {
        let parts: Vec<String> = opts
            .resetting_time_skew
            .iter()
            .map(|s| format!("{}{:+}", s.timestamp, s.skew))
            .collect();
        write_option(&mut out, "RESETTING_TIME_SKEW", &parts.join(" "));
    }
    for (idx, slot) in opts.last_logins.iter().enumerate() {
        let Some(record) = slot else { continue };
        if record.host.is_empty() || record.when == 0 {
            continue;
        }
        write_option(
            &mut out,
            &format!("LAST{idx}"),
            &format!("{} {}", record.host, record.when),
        );
    }
    for (key, value) in &opts.additional {
        write_option(&mut out, key, value);
    }
    for code in &config.scratch_codes {
        out.push_str(&format!("{code:08}\n"));
    }

    if out.len() > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge);
    }
    Ok(out.into_bytes())
}

fn write_option(out: &mut String, key: &str, value: &str) {
    out.push_str("\" ");
    out.push_str(key);
    let value = value.trim();
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push('\n');
}
