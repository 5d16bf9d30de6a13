//! Prompt-template loading and rendering

use std::fs;
use std::path::Path;

use crate::error::{PamError, Result};

/// Templates larger than this are refused
pub const MAX_PROMPT_TEMPLATE_SIZE: u64 = 4096;

/// Values substituted into a prompt template
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptContext<'a> {
    pub user: &'a str,
    pub host: &'a str,
    pub service: &'a str,
}

/// Load a template file (≤ 4 KiB) and substitute `{user}`, `{host}`, and
/// `{service}`.
pub fn render_template(path: &Path, ctx: &PromptContext<'_>) -> Result<String> {
    let meta = fs::metadata(path).map_err(|e| PamError::io(path, e))?;
    if meta.len() > MAX_PROMPT_TEMPLATE_SIZE {
        return Err(PamError::PromptTemplateTooLarge(meta.len()));
    }
    let raw = fs::read_to_string(path).map_err(|e| PamError::io(path, e))?;
    Ok(render(&raw, ctx))
}

fn render(template: &str, ctx: &PromptContext<'_>) -> String {
    template
        .replace("{user}", ctx.user)
        .replace("{host}", ctx.host)
        .replace("{service}", ctx.service)
}
