//! Environment-driven tracing setup
//!
//! Level comes from `GGPAM_LOG_LEVEL` (an `EnvFilter` directive, default
//! `info`); when `GGPAM_LOG_FILE` names a writable path, output is appended
//! there instead of stderr. Initialization is idempotent: later calls keep
//! the first subscriber.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log-level environment variable
pub const ENV_LOG_LEVEL: &str = "GGPAM_LOG_LEVEL";

/// Log-file environment variable
pub const ENV_LOG_FILE: &str = "GGPAM_LOG_FILE";

/// Install the global subscriber from the environment.
pub fn init() {
    let directive = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = std::env::var_os(ENV_LOG_FILE).and_then(|path| {
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match file {
        Some(file) => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }
}
