//! Shared CLI helpers: paths, prompts, identity

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable overriding the default secret path
pub const ENV_SECRET_PATH: &str = "GPAM_SECRET_PATH";

/// Secret file name under the home directory
pub const DEFAULT_SECRET_FILENAME: &str = ".google_authenticator";

/// Mode for newly created secret files
pub const DEFAULT_SECRET_FILE_PERM: u32 = 0o600;

/// Mode for created parent directories
pub const DEFAULT_SECRET_DIR_PERM: u32 = 0o700;

pub fn default_secret_path() -> PathBuf {
    if let Ok(path) = std::env::var(ENV_SECRET_PATH) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => Path::new(&home).join(DEFAULT_SECRET_FILENAME),
        _ => Path::new("~").join(DEFAULT_SECRET_FILENAME),
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let Some(text) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    let Some(rest) = text.strip_prefix('~') else {
        return Ok(path.to_path_buf());
    };
    let home = std::env::var("HOME").context("cannot expand ~: HOME is not set")?;
    Ok(Path::new(&home).join(rest.trim_start_matches('/')))
}

/// Ask a yes/no question on stdin. Empty input means yes.
pub fn prompt_yes_no(question: &str) -> bool {
    print!("{question} (y/n) ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "" | "y" | "Y" | "yes" | "YES" | "Yes")
}

/// Read one trimmed line from stdin.
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin")?;
    Ok(line.trim().to_string())
}

/// `user@host` label for enrollment output.
pub fn default_label() -> String {
    let user = std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .or_else(|| {
            gauth_pam::Account::current()
                .ok()
                .map(|account| account.username)
        })
        .unwrap_or_else(|| "user".to_string());
    format!("{user}@{}", hostname())
}

fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "unix".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match std::str::from_utf8(&buf[..end]) {
        Ok(name) if !name.is_empty() => name.to_string(),
        _ => "unix".to_string(),
    }
}
