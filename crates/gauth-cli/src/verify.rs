//! `gauth verify` - check a code against the secret file

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Args;

use gauth::{verify, Error, VerifyKind, VerifyOptions};
use gauth_pam::{store, Account, Params};

use crate::common;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// The six-digit or scratch code to verify
    code: Option<String>,

    /// The code, as a flag instead of a positional
    #[arg(long = "code", value_name = "CODE")]
    code_flag: Option<String>,

    /// Secret file location
    #[arg(long)]
    path: Option<PathBuf>,

    /// Do not record or apply time-skew adjustments
    #[arg(long)]
    no_skew_adjust: bool,

    /// Leave the HOTP counter alone when no code matches
    #[arg(long)]
    no_increment_hotp: bool,

    /// Suppress success output
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: VerifyArgs) -> Result<()> {
    let Some(code) = args.code_flag.clone().or_else(|| args.code.clone()) else {
        bail!("a verification code is required");
    };
    let path = args.path.clone().unwrap_or_else(common::default_secret_path);
    let path = common::expand_path(&path)?;

    let account = Account::current().context("resolving the current user")?;
    let params = Params::default();
    tracing::debug!(path = %path.display(), user = %account.username, "verifying code");
    let (mut config, guard) =
        store::load(&path, &account, &params).context("loading the secret file")?;

    let opts = VerifyOptions {
        disable_skew_adjust: args.no_skew_adjust,
        no_increment_hotp: args.no_increment_hotp,
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let result = verify::verify_code(&mut config, &code, opts, now);

    // The attempt ledger changes even on failure; write it back first.
    if config.is_dirty() {
        guard
            .store(&config, params.allowed_perm)
            .context("updating the secret file")?;
        config.clear_dirty();
    }

    match result {
        Ok(res) => {
            if !args.quiet {
                match res.kind {
                    VerifyKind::Scratch => {
                        println!("Scratch code accepted; it cannot be used again.")
                    }
                    VerifyKind::Hotp => println!(
                        "Code accepted at counter {}.",
                        res.counter.unwrap_or_default()
                    ),
                    VerifyKind::Totp => println!("Code accepted."),
                }
            }
            Ok(())
        }
        Err(Error::RateLimited) => bail!("{}", Error::RateLimited),
        Err(err) => bail!("verification failed: {err}"),
    }
}
