//! Secret-path template resolution

use std::path::PathBuf;

use crate::account::Account;

/// Default secret-file name under the account's home
pub const DEFAULT_SECRET_FILENAME: &str = ".google_authenticator";

/// Resolve a `secret=` template for an account.
///
/// `%u` expands to the username, `%h` to the home directory, a leading `~`
/// to the home directory, and `$VAR` / `${VAR}` to environment variables.
/// An empty spec resolves to `<home>/.google_authenticator`.
pub fn resolve_secret_path(spec: &str, account: &Account) -> PathBuf {
    if spec.is_empty() {
        return account.home.join(DEFAULT_SECRET_FILENAME);
    }
    let home = account.home.to_string_lossy();
    let mut path = spec.replace("%u", &account.username);
    path = path.replace("%h", &home);
    if let Some(rest) = path.strip_prefix('~') {
        path = format!("{}{}", home, rest);
    }
    PathBuf::from(expand_env(&path))
}

/// Expand `$VAR` and `${VAR}` references from the environment. Unset
/// variables expand to the empty string.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &input[idx + 1..];
        if let Some(stripped) = rest.strip_prefix('{') {
            if let Some(end) = stripped.find('}') {
                let name = &stripped[..end];
                out.push_str(&std::env::var(name).unwrap_or_default());
                for _ in 0..end + 2 {
                    chars.next();
                }
                continue;
            }
            out.push(c);
            continue;
        }
        let len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        if len == 0 {
            out.push(c);
            continue;
        }
        let name: String = rest.chars().take(len).collect();
        out.push_str(&std::env::var(&name).unwrap_or_default());
        for _ in 0..len {
            chars.next();
        }
    }
    out
}
