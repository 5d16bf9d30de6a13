//! otpauth:// URI builder (enrollment output)
//!
//! The core never parses these; enrollment emits them for external QR
//! renderers and authenticator apps.

use std::collections::BTreeMap;

use crate::config::Mode;

/// Builds `otpauth://{totp|hotp}/{label}?{query}` with a stable,
/// lexicographically ordered query. Empty parameter values are dropped.
#[derive(Debug)]
pub struct OtpauthUri {
    label: String,
    issuer: String,
    mode: Mode,
    params: BTreeMap<String, String>,
}

impl OtpauthUri {
    pub fn new(label: impl Into<String>, issuer: impl Into<String>, mode: Mode) -> Self {
        Self {
            label: label.into(),
            issuer: issuer.into(),
            mode,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn build(&self) -> String {
        let label = if self.issuer.is_empty() {
            urlencoding::encode(&self.label).into_owned()
        } else {
            urlencoding::encode(&format!("{}:{}", self.issuer, self.label)).into_owned()
        };
        let scheme = match self.mode {
            Mode::Hotp => "hotp",
            _ => "totp",
        };
        let query: Vec<String> = self
            .params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("otpauth://{scheme}/{label}?{}", query.join("&"))
    }
}
