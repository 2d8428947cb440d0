//! Quill prompt templates.
//!
//! Templates are plain text with embedded `{{ ... }}` expressions:
//!
//! - `{{$name}}` inserts a context variable (empty when missing).
//! - `{{'text'}}` inserts a literal.
//! - `{{plugin.function}}`, `{{plugin.function $arg}}` and
//!   `{{plugin.function 'arg' name='value' other=$var}}` call a function
//!   through the context's registry and insert its result.
//!
//! The pieces:
//!
//! - **[`template_tokenizer`]** -- Splits a template into text and code blocks.
//! - **[`code_tokenizer`]** -- Splits a code expression into tokens.
//! - **[`blocks`]** -- The [`Block`] AST and the code block evaluator.
//! - **[`engine`]** -- [`TemplateEngine`]: tokenize, validate, render.
//! - **[`semantic`]** -- [`SemanticFunction`], a prompt template bound to a
//!   [`quill_kernel::TextCompletion`] service.
//! - **[`error`]** -- [`TemplateError`].

pub mod blocks;
pub mod code_tokenizer;
pub mod engine;
pub mod error;
pub mod semantic;
pub mod template_tokenizer;

pub use blocks::{
    Block, BlockKind, CodeBlock, FunctionIdBlock, NamedArgBlock, NamedArgValue, ValueBlock,
    VariableBlock,
};
pub use code_tokenizer::CodeTokenizer;
pub use engine::{DEFAULT_MAX_CONCURRENT_RENDERS, TemplateEngine, TemplateEngineConfig};
pub use error::{Result, TemplateError};
pub use semantic::{PromptConfig, PromptInputConfig, SemanticFunction};
pub use template_tokenizer::TemplateTokenizer;
