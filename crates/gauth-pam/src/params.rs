//! Host-binding parameter tuple and credential extraction

use crate::error::{PamError, Result};

/// Default user-facing prompt
pub const DEFAULT_PROMPT: &str = "Verification code: ";

/// Prompt used when forward_pass is active and no override was given
pub const FORWARD_PASS_PROMPT: &str = "Password & verification code: ";

/// First byte of the host-supplied dummy password sentinel
pub const DUMMY_AUTHTOK_BYTE: u8 = 0x08;

/// How the verification code is obtained from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassMode {
    /// Always prompt the user
    #[default]
    Prompt,
    /// Try the host-supplied credential first, prompt on failure
    TryFirst,
    /// Use the host-supplied credential or fail
    UseFirst,
}

/// Parsed host-binding options (the space-separated module argument list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// Template for the secret path (%u, %h, ~, env vars)
    pub secret_spec: String,
    pub prompt: String,
    /// Whether authtok_prompt= was given explicitly
    pub prompt_override: bool,
    /// Template file rendered with {user}, {host}, {service}
    pub prompt_template: Option<String>,
    pub pass_mode: PassMode,
    /// Push the password remainder back to the host after extraction
    pub forward_pass: bool,
    pub echo_code: bool,
    pub nullok: bool,
    pub debug: bool,
    pub no_skew_adjust: bool,
    pub no_increment_hotp: bool,
    pub allow_readonly: bool,
    pub no_strict_owner: bool,
    /// Maximum permitted secret-file mode bits
    pub allowed_perm: u32,
    /// Grace-period length in seconds; 0 disables
    pub grace_period_secs: i64,
    pub forced_user: Option<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            secret_spec: String::new(),
            prompt: DEFAULT_PROMPT.to_string(),
            prompt_override: false,
            prompt_template: None,
            pass_mode: PassMode::default(),
            forward_pass: false,
            echo_code: false,
            nullok: false,
            debug: false,
            no_skew_adjust: false,
            no_increment_hotp: false,
            allow_readonly: false,
            no_strict_owner: false,
            allowed_perm: 0o600,
            grace_period_secs: 0,
            forced_user: None,
        }
    }
}

/// Parse the option tuple. Unknown tokens are fatal.
pub fn parse_params<I, S>(args: I) -> Result<Params>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = Params::default();
    for arg in args {
        let arg = arg.as_ref();
        if let Some(value) = arg.strip_prefix("secret=") {
            params.secret_spec = value.to_string();
        } else if let Some(value) = arg.strip_prefix("authtok_prompt=") {
            params.prompt = value.to_string();
            params.prompt_override = true;
        } else if let Some(value) = arg
            .strip_prefix("prompt_file=")
            .or_else(|| arg.strip_prefix("prompt_template="))
        {
            if value.is_empty() {
                return Err(PamError::InvalidParameter {
                    key: "prompt_file",
                    value: arg.to_string(),
                });
            }
            params.prompt_template = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("user=") {
            params.forced_user = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("allowed_perm=") {
            let perm = u32::from_str_radix(value, 8).ok().filter(|&p| p != 0);
            params.allowed_perm = perm.ok_or_else(|| PamError::InvalidParameter {
                key: "allowed_perm",
                value: value.to_string(),
            })?;
        } else if let Some(value) = arg.strip_prefix("grace_period=") {
            let secs = value.parse::<i64>().ok().filter(|&s| s >= 0);
            params.grace_period_secs = secs.ok_or_else(|| PamError::InvalidParameter {
                key: "grace_period",
                value: value.to_string(),
            })?;
        } else {
            match arg {
                "try_first_pass" => params.pass_mode = PassMode::TryFirst,
                "use_first_pass" => params.pass_mode = PassMode::UseFirst,
                "forward_pass" => params.forward_pass = true,
                "echo_verification_code" | "echo-verification-code" => params.echo_code = true,
                "nullok" => params.nullok = true,
                "debug" => params.debug = true,
                "noskewadj" => params.no_skew_adjust = true,
                "no_increment_hotp" => params.no_increment_hotp = true,
                "no_strict_owner" => params.no_strict_owner = true,
                "allow_readonly" => params.allow_readonly = true,
                other => return Err(PamError::UnknownParameter(other.to_string())),
            }
        }
    }
    if params.forward_pass && !params.prompt_override {
        params.prompt = FORWARD_PASS_PROMPT.to_string();
    }
    Ok(params)
}

/// Split a host-supplied credential into (code, password remainder).
///
/// The code is the all-digit suffix of the authtok, six digits tried
/// before eight.
pub fn extract_otp(raw: &str) -> Option<(String, String)> {
    split_digits(raw, 6).or_else(|| split_digits(raw, 8))
}

fn split_digits(raw: &str, length: usize) -> Option<(String, String)> {
    if raw.len() < length || !raw.is_char_boundary(raw.len() - length) {
        return None;
    }
    let (rest, code) = raw.split_at(raw.len() - length);
    code.bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| (code.to_string(), rest.to_string()))
}

/// Whether the host handed over its dummy-password sentinel.
pub fn is_dummy_authtok(raw: &str) -> bool {
    raw.as_bytes().first() == Some(&DUMMY_AUTHTOK_BYTE)
}
