//! Text completion service seam.
//!
//! Language-model providers live outside the kernel.  Anything that can turn
//! a prompt into text implements [`TextCompletion`]; semantic functions hold
//! one behind an `Arc` and call it after rendering their prompt.

use async_trait::async_trait;

use crate::error::Result;
use crate::settings::RequestSettings;

/// A service that completes a rendered prompt.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt`, honoring whichever of `settings` the provider
    /// understands.
    async fn complete(&self, prompt: &str, settings: &RequestSettings) -> Result<String>;
}
