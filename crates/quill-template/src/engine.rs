//! Template engine: tokenize, validate, render.
//!
//! Rendering fans the blocks of a template out over a bounded number of
//! concurrent renders and stitches the results back together in source
//! order.

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use quill_kernel::SkContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blocks::Block;
use crate::error::{Result, TemplateError};
use crate::template_tokenizer::TemplateTokenizer;

/// Default number of blocks rendered concurrently.
pub const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 8;

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateEngineConfig {
    /// Upper bound on blocks rendered at the same time.  Zero is treated as
    /// one.
    pub max_concurrent_renders: usize,
}

impl Default for TemplateEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: DEFAULT_MAX_CONCURRENT_RENDERS,
        }
    }
}

/// Renders prompt templates against a context.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    config: TemplateEngineConfig,
}

impl TemplateEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TemplateEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemplateEngineConfig {
        &self.config
    }

    /// Tokenize `template`, optionally validating every block.
    ///
    /// Validation stops at the first invalid block.
    pub fn extract_blocks(&self, template: &str, validate: bool) -> Result<Vec<Block>> {
        let blocks = TemplateTokenizer::tokenize(template)?;

        if validate {
            for block in &blocks {
                block.is_valid().map_err(|reason| {
                    warn!(block = %block.raw_content(), reason = %reason, "invalid template block");
                    TemplateError::validation(reason, block.raw_content())
                })?;
            }
        }

        Ok(blocks)
    }

    /// Tokenize, validate and render `template`.
    pub async fn render(&self, template: &str, context: &SkContext) -> Result<String> {
        debug!(length = template.len(), "rendering template");
        let blocks = self.extract_blocks(template, true)?;
        self.render_blocks(&blocks, context).await
    }

    /// Render already tokenized blocks, concatenated in their original order.
    pub async fn render_blocks(&self, blocks: &[Block], context: &SkContext) -> Result<String> {
        let limit = self.config.max_concurrent_renders.max(1);

        let renders: Vec<BoxFuture<'_, Result<String>>> = blocks
            .iter()
            .map(|block| render_block(block, context).boxed())
            .collect();

        let parts: Vec<String> = stream::iter(renders)
            .buffered(limit)
            .try_collect()
            .await?;

        Ok(parts.concat())
    }
}

async fn render_block(block: &Block, context: &SkContext) -> Result<String> {
    match block {
        Block::Text(text) => Ok(text.clone()),
        Block::Value(value) => Ok(value.render(&context.variables)),
        Block::Variable(variable) => Ok(variable.render(&context.variables)),
        Block::NamedArg(arg) => Ok(arg.render(&context.variables)),
        Block::FunctionId(id) => Ok(id.raw_content().to_owned()),
        Block::Code(code) => code.render(context).await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
