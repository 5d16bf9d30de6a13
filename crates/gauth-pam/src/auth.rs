//! Authentication driver
//!
//! Composes the pieces the way the host binding runs them: resolve the
//! secret path, load under lock, honor the grace period, obtain a code
//! (host credential or prompt), verify, push the password remainder back
//! when forwarding, and persist dirty state atomically. The host framework
//! itself only supplies a [`Conversation`] and maps the returned
//! [`Outcome`] to its own status codes.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use gauth::{verify, Config, Error, VerifyOptions};
use tracing::{debug, error, info, warn};

use crate::account::Account;
use crate::error::PamError;
use crate::params::{self, Params, PassMode};
use crate::path;
use crate::prompt::{self, PromptContext};
use crate::store::{self, SecretGuard};

/// What the binding reports back to the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Authentication succeeded
    Success,
    /// Bad code or scratch miss
    InvalidCode,
    /// Rate-limit window exceeded
    RateLimited,
    /// Secret file missing and nullok is set
    Ignore,
    /// Parse error, I/O error, or internal failure
    ServiceError,
    /// Optimistic-concurrency abort; the caller may retry
    SecretModified,
}

/// Prompt and item carrier provided by the host framework
pub trait Conversation {
    /// Ask the user for a line; `echo` controls whether input is shown.
    fn prompt(&mut self, text: &str, echo: bool) -> io::Result<String>;

    /// Emit one user-facing error line.
    fn error_line(&mut self, text: &str);

    /// The credential collected by an earlier module, if any.
    fn authtok(&mut self) -> Option<String>;

    /// Replace the stored credential (forward_pass).
    fn set_authtok(&mut self, value: &str);
}

/// Inputs the host framework hands over for one authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct Session<'a> {
    /// Remote host attribute, empty when local
    pub rhost: &'a str,
    /// Service name, for prompt templates
    pub service: &'a str,
}

/// Run one authentication for `account` at the current wall clock.
pub fn authenticate(
    conv: &mut dyn Conversation,
    account: &Account,
    params: &Params,
    session: Session<'_>,
) -> Outcome {
    authenticate_at(conv, account, params, session, unix_now())
}

/// Like [`authenticate`], with an explicit clock for tests.
pub fn authenticate_at(
    conv: &mut dyn Conversation,
    account: &Account,
    params: &Params,
    session: Session<'_>,
    now: i64,
) -> Outcome {
    let secret_path = path::resolve_secret_path(&params.secret_spec, account);
    debug!(user = %account.username, path = %secret_path.display(), "starting verification");

    let (mut config, guard) = match store::load(&secret_path, account, params) {
        Ok(loaded) => loaded,
        Err(err) if err.is_not_found() && params.nullok => {
            info!(user = %account.username, "no secret file, nullok set, ignoring");
            return Outcome::Ignore;
        }
        Err(err) => {
            error!(user = %account.username, %err, "failed to load secret file");
            return Outcome::ServiceError;
        }
    };

    let prompt_text = match resolve_prompt(account, params, session) {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "failed to render prompt template");
            return Outcome::ServiceError;
        }
    };

    if params.grace_period_secs > 0
        && config.within_grace_period(session.rhost, params.grace_period_secs, now)
    {
        info!(user = %account.username, rhost = session.rhost, "within grace period, skipping code");
        config.update_login_record(session.rhost, now);
        return persist(&mut config, &guard, params, Outcome::Success);
    }

    let Some((code, remainder)) = obtain_code(conv, params, &prompt_text) else {
        return Outcome::InvalidCode;
    };

    let opts = VerifyOptions {
        disable_skew_adjust: params.no_skew_adjust,
        no_increment_hotp: params.no_increment_hotp,
    };
    let result = verify::verify_code(&mut config, &code, opts, now);

    let outcome = match result {
        Ok(res) => {
            info!(user = %account.username, kind = ?res.kind, "verification succeeded");
            if params.forward_pass && !remainder.is_empty() {
                conv.set_authtok(&remainder);
            }
            if params.grace_period_secs > 0 && !session.rhost.is_empty() {
                config.update_login_record(session.rhost, now);
            }
            Outcome::Success
        }
        Err(Error::RateLimited) => {
            conv.error_line(&Error::RateLimited.to_string());
            warn!(user = %account.username, "rate limited");
            Outcome::RateLimited
        }
        Err(err @ (Error::InvalidCode | Error::ModeUnknown | Error::MissingSecret)) => {
            conv.error_line(&Error::InvalidCode.to_string());
            warn!(user = %account.username, %err, "verification failed");
            Outcome::InvalidCode
        }
        Err(err) => {
            conv.error_line("internal error");
            error!(user = %account.username, %err, "verification error");
            Outcome::ServiceError
        }
    };

    persist(&mut config, &guard, params, outcome)
}

fn resolve_prompt(
    account: &Account,
    params: &Params,
    session: Session<'_>,
) -> crate::error::Result<String> {
    let Some(spec) = &params.prompt_template else {
        return Ok(params.prompt.clone());
    };
    let template_path = path::resolve_secret_path(spec, account);
    let ctx = PromptContext {
        user: &account.username,
        host: session.rhost,
        service: session.service,
    };
    prompt::render_template(&template_path, &ctx)
}

/// Get the candidate code, either from the host credential or by
/// prompting. Returns the code and the non-code remainder.
fn obtain_code(
    conv: &mut dyn Conversation,
    params: &Params,
    prompt_text: &str,
) -> Option<(String, String)> {
    match params.pass_mode {
        PassMode::UseFirst => {
            let authtok = conv.authtok()?;
            note_dummy(&authtok);
            params::extract_otp(&authtok)
        }
        PassMode::TryFirst => {
            if let Some(authtok) = conv.authtok() {
                note_dummy(&authtok);
                if let Some(split) = params::extract_otp(&authtok) {
                    return Some(split);
                }
            }
            prompt_for_code(conv, params, prompt_text)
        }
        PassMode::Prompt => prompt_for_code(conv, params, prompt_text),
    }
}

fn prompt_for_code(
    conv: &mut dyn Conversation,
    params: &Params,
    prompt_text: &str,
) -> Option<(String, String)> {
    let line = conv.prompt(prompt_text, params.echo_code).ok()?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return None;
    }
    Some((code, String::new()))
}

fn note_dummy(authtok: &str) {
    if params::is_dummy_authtok(authtok) {
        info!("host supplied the dummy-password sentinel");
    }
}

/// Write the config back when dirty, degrading per params.
fn persist(
    config: &mut Config,
    guard: &SecretGuard,
    params: &Params,
    outcome: Outcome,
) -> Outcome {
    if !config.is_dirty() {
        return outcome;
    }
    match guard.store(config, params.allowed_perm) {
        Ok(()) => {
            config.clear_dirty();
            outcome
        }
        Err(PamError::SecretModified) => {
            error!("secret file changed while authenticating, discarding update");
            Outcome::SecretModified
        }
        Err(err) if params.allow_readonly && err.is_readonly_failure() => {
            warn!(%err, "ignoring write failure on read-only secret file");
            outcome
        }
        Err(err) => {
            error!(%err, "failed to update secret file");
            Outcome::ServiceError
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
