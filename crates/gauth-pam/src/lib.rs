//! gauth-pam - host-binding support for the gauth verification engine
//!
//! Everything the host authentication framework needs around the core:
//! the option-tuple parser, secret-path resolution, the locked and atomic
//! persistence layer with its optimistic-concurrency guard, prompt-template
//! rendering, credential extraction, and the authentication driver that
//! composes them over a [`Conversation`].

pub mod account;
pub mod auth;
pub mod error;
pub mod logging;
pub mod params;
pub mod path;
pub mod prompt;
pub mod store;

pub use account::Account;
pub use auth::{authenticate, Conversation, Outcome};
pub use error::{PamError, Result};
pub use params::{Params, PassMode};
pub use store::{FileState, SecretGuard};
