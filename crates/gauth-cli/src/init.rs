//! `gauth init` - create a new secret file

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;

use gauth::config::{Config, Mode, RateLimit};
use gauth::otpauth::OtpauthUri;
use gauth::{otp, scratch, DEFAULT_STEP_SIZE, DEFAULT_WINDOW_SIZE};
use gauth_pam::store;

use crate::common;

const DEFAULT_SCRATCH_CODES: usize = 5;
const SECRET_BYTES: usize = 20;
/// Window offered when the user asks for tolerant time matching
const RELAXED_WINDOW: i64 = 17;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Secret file location
    #[arg(long)]
    path: Option<PathBuf>,

    /// Alternative secret file location (overrides --path)
    #[arg(short, long)]
    secret: Option<PathBuf>,

    /// Overwrite an existing file without asking
    #[arg(short, long)]
    force: bool,

    /// Verification mode: totp or hotp
    #[arg(long, value_parser = ["totp", "hotp"])]
    mode: Option<String>,

    /// Shorthand for --mode totp
    #[arg(short = 't', long, conflicts_with = "counter_based")]
    time_based: bool,

    /// Shorthand for --mode hotp
    #[arg(short = 'c', long)]
    counter_based: bool,

    /// TOTP step length in seconds (1..=60)
    #[arg(short = 'S', long, default_value_t = DEFAULT_STEP_SIZE)]
    step_size: i64,

    /// Number of adjacent codes accepted (1..=21)
    #[arg(short = 'w', long)]
    window_size: Option<i64>,

    /// Use the smallest safe window
    #[arg(short = 'W', long)]
    minimal_window: bool,

    /// Attempts allowed per rate-limit interval
    #[arg(short = 'r', long)]
    rate_limit: Option<usize>,

    /// Rate-limit interval in seconds
    #[arg(short = 'R', long)]
    rate_time: Option<i64>,

    /// Disable rate limiting entirely
    #[arg(short = 'u', long)]
    no_rate_limit: bool,

    /// Number of emergency scratch codes (0..=10)
    #[arg(short = 'e', long, alias = "scratch-codes", default_value_t = DEFAULT_SCRATCH_CODES)]
    emergency_codes: usize,

    /// Refuse reuse of a TOTP code within its window
    #[arg(short = 'd', long, conflicts_with = "allow_reuse")]
    disallow_reuse: bool,

    /// Allow reuse of a TOTP code within its window
    #[arg(short = 'D', long)]
    allow_reuse: bool,

    /// Account label for the otpauth URI
    #[arg(short, long)]
    label: Option<String>,

    /// Issuer for the otpauth URI
    #[arg(short, long, default_value = "")]
    issuer: String,

    /// Suppress setup output
    #[arg(short, long)]
    quiet: bool,

    /// Skip the first-code confirmation step
    #[arg(short = 'C', long)]
    no_confirm: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    if args.counter_based && args.time_based {
        bail!("--time-based and --counter-based are mutually exclusive");
    }
    if !(1..=60).contains(&args.step_size) {
        bail!("--step-size must be between 1 and 60 seconds");
    }
    if args.emergency_codes > scratch::MAX_SCRATCH_CODES {
        bail!(
            "--emergency-codes must be at most {}",
            scratch::MAX_SCRATCH_CODES
        );
    }

    let path = args
        .secret
        .clone()
        .or_else(|| args.path.clone())
        .unwrap_or_else(common::default_secret_path);
    let path = common::expand_path(&path)?;
    if path.exists() && !args.force {
        println!(
            "Warning: {} already exists and will be replaced if you continue.",
            path.display()
        );
    }

    let use_totp = determine_mode(&args)?;
    let disallow = determine_reuse(&args, use_totp)?;
    let window = determine_window(&args, use_totp)?;
    if !(1..=21).contains(&window) {
        bail!("--window-size must be between 1 and 21");
    }
    let rate_limit = determine_rate_limit(&args)?;

    let mut secret_bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut secret_bytes);
    let secret = BASE32_NOPAD.encode(&secret_bytes);
    let scratch_codes = scratch::generate(args.emergency_codes, &mut OsRng);

    let mut config = Config::new(secret);
    config.options.step_size = args.step_size;
    config.options.window_size = window;
    config.options.disallow_reuse = disallow;
    config.options.rate_limit = rate_limit;
    if use_totp {
        config.options.totp_auth = true;
    } else {
        config.options.hotp_counter = Some(1);
    }
    config.scratch_codes = scratch_codes;

    if !args.quiet {
        let label = args.label.clone().unwrap_or_else(common::default_label);
        print_setup_info(&config, &label, &args.issuer);
        if !args.no_confirm && config.mode() == Mode::Totp {
            confirm_code(&config)?;
        }
    }

    if !args.force {
        let question = format!("Update {}?", path.display());
        if !common::prompt_yes_no(&question) {
            println!("Left {} untouched.", path.display());
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(common::DEFAULT_SECRET_DIR_PERM)
            .create(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    store::save(&path, &config, common::DEFAULT_SECRET_FILE_PERM)?;
    if !args.quiet {
        println!("New secret written to {}.", path.display());
    }
    Ok(())
}

fn determine_mode(args: &InitArgs) -> Result<bool> {
    if args.time_based {
        return Ok(true);
    }
    if args.counter_based {
        return Ok(false);
    }
    match args.mode.as_deref() {
        Some("totp") => Ok(true),
        Some("hotp") => Ok(false),
        Some(other) => bail!("unknown mode {other:?}"),
        None => Ok(common::prompt_yes_no(
            "Do you want authentication tokens to be time-based?",
        )),
    }
}

fn determine_reuse(args: &InitArgs, use_totp: bool) -> Result<bool> {
    if !use_totp {
        if args.disallow_reuse || args.allow_reuse {
            bail!("reuse flags only apply to time-based mode");
        }
        return Ok(false);
    }
    if args.disallow_reuse {
        return Ok(true);
    }
    if args.allow_reuse {
        return Ok(false);
    }
    Ok(common::prompt_yes_no(
        "Disallow multiple uses of the same authentication token?",
    ))
}

fn determine_window(args: &InitArgs, use_totp: bool) -> Result<i64> {
    if args.minimal_window {
        return Ok(if use_totp {
            args.window_size.unwrap_or(0).max(DEFAULT_WINDOW_SIZE)
        } else {
            1
        });
    }
    if let Some(window) = args.window_size {
        if window < 1 {
            bail!("--window-size must be positive");
        }
        return Ok(window);
    }
    let question = if use_totp {
        "Allow codes up to 4 minutes around the current time (poor clock sync)?"
    } else {
        "Widen the counter window to tolerate skipped codes?"
    };
    Ok(if common::prompt_yes_no(question) {
        RELAXED_WINDOW
    } else {
        DEFAULT_WINDOW_SIZE
    })
}

fn determine_rate_limit(args: &InitArgs) -> Result<Option<RateLimit>> {
    if args.no_rate_limit {
        return Ok(None);
    }
    match (args.rate_limit, args.rate_time) {
        (Some(attempts), Some(interval_secs)) => {
            if !(1..=10).contains(&attempts) {
                bail!("--rate-limit must be between 1 and 10 attempts");
            }
            if !(15..=600).contains(&interval_secs) {
                bail!("--rate-time must be between 15 and 600 seconds");
            }
            Ok(Some(RateLimit {
                attempts,
                interval_secs,
                timestamps: Vec::new(),
            }))
        }
        (None, None) => {
            if common::prompt_yes_no("Enable rate-limiting (3 attempts per 30s)?") {
                Ok(Some(RateLimit {
                    attempts: 3,
                    interval_secs: 30,
                    timestamps: Vec::new(),
                }))
            } else {
                Ok(None)
            }
        }
        _ => bail!("--rate-limit and --rate-time must be given together"),
    }
}

fn print_setup_info(config: &Config, label: &str, issuer: &str) {
    let uri = build_otpauth_uri(config, label, issuer);
    println!("Add this account to your authenticator app:");
    println!("  {uri}");
    println!("Secret key: {}", config.secret);
    match config.mode() {
        Mode::Hotp => println!("Mode: counter-based (HOTP)"),
        _ => println!("Mode: time-based (TOTP)"),
    }
    if !config.scratch_codes.is_empty() {
        println!("Emergency scratch codes:");
        for code in &config.scratch_codes {
            println!("  {code:08}");
        }
    }
}

fn build_otpauth_uri(config: &Config, label: &str, issuer: &str) -> String {
    let issuer = if issuer.is_empty() { label } else { issuer };
    let mut uri = OtpauthUri::new(label, issuer, config.mode())
        .param("secret", &config.secret)
        .param("issuer", issuer)
        .param("digits", "6")
        .param("algorithm", "SHA1");
    uri = match config.mode() {
        Mode::Hotp => uri.param(
            "counter",
            config.options.hotp_counter.unwrap_or(1).to_string(),
        ),
        _ => uri.param("period", config.step().to_string()),
    };
    uri.build()
}

/// Ask the user to type the first code so a mis-scanned secret is caught
/// immediately. Entering `-1` skips the check.
fn confirm_code(config: &Config) -> Result<()> {
    let secret = config.secret_bytes()?;
    loop {
        let input = common::read_line("Enter the code from your app (-1 to skip): ")?;
        if input == "-1" {
            println!("Code confirmation skipped.");
            return Ok(());
        }
        if input.is_empty() {
            continue;
        }
        if input.len() != 6 || !input.bytes().all(|b| b.is_ascii_digit()) {
            println!("Codes are six digits.");
            continue;
        }
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let base = (now.div_euclid(config.step()) + config.options.time_skew).max(0);
        let window = config.window();
        let expected = format!("{:06}", otp::compute(&secret, base as u64));
        let matched = (-((window - 1) / 2)..=(window / 2)).any(|offset| {
            let counter = base + offset;
            counter >= 0 && format!("{:06}", otp::compute(&secret, counter as u64)) == input
        });
        if matched {
            println!("Code confirmed.");
            return Ok(());
        }
        println!("Code incorrect (expected {expected}). Try again.");
    }
}
