//! Error types for the host-binding layer

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the binding error type
pub type Result<T> = std::result::Result<T, PamError>;

/// Errors raised around the verification core: parameter parsing, secret
/// lookup, and persistence. Kept granular so the caller can make the
/// nullok / allow_readonly / retry decisions.
#[derive(Debug, Error)]
pub enum PamError {
    /// Unknown token in the host-binding parameter list
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    /// A parameter with an unusable value
    #[error("invalid value for {key}: {value:?}")]
    InvalidParameter { key: &'static str, value: String },

    /// No account with the given name or uid
    #[error("unknown user {0:?}")]
    UnknownUser(String),

    /// The secret path is not a regular file
    #[error("secret file {} is not a regular file", .0.display())]
    NotRegularFile(PathBuf),

    /// Secret-file permission bits exceed allowed_perm
    #[error("secret file permissions {mode:04o} exceed allowed {allowed:04o}")]
    PermissionsTooOpen { mode: u32, allowed: u32 },

    /// The secret file belongs to somebody else
    #[error("secret file owned by uid {actual}, expected uid {expected}")]
    WrongOwner { actual: u32, expected: u32 },

    /// The file changed between load and store; the caller may retry
    #[error("secret file was modified by another process")]
    SecretModified,

    /// Prompt template beyond the 4 KiB ceiling
    #[error("prompt template is {0} bytes, limit is 4096")]
    PromptTemplateTooLarge(u64),

    /// Engine-level failure (parse, verify, serialize)
    #[error(transparent)]
    Core(#[from] gauth::Error),

    /// Filesystem failure with the path it happened on
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PamError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a missing-secret-file condition (the nullok case).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Whether a store failure may be swallowed under `allow_readonly`.
    pub fn is_readonly_failure(&self) -> bool {
        match self {
            Self::Io { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
                    || matches!(source.raw_os_error(), Some(libc::EROFS) | Some(libc::EPERM))
            }
            _ => false,
        }
    }
}
