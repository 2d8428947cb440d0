//! Template engine error types.
//!
//! Tokenizing, validating and rendering a template all surface failures
//! through [`TemplateError`].  Syntax and validation variants carry the
//! offending source text so callers can point at it.

use quill_kernel::KernelError;

/// Unified error type for the template engine.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    // -- Tokenizer errors ----------------------------------------------------
    /// The template or code expression is syntactically malformed.
    #[error("syntax error in `{content}`: {reason}")]
    Tokenize { reason: String, content: String },

    // -- Validation errors ---------------------------------------------------
    /// A block was tokenized but its shape is not allowed.
    #[error("invalid block `{content}`: {reason}")]
    Validation { reason: String, content: String },

    // -- Render errors -------------------------------------------------------
    /// A code block calls a function the registry cannot resolve.
    #[error("function not found: {function}")]
    FunctionNotFound { function: String },

    /// A function called from a code block failed.
    #[error("function `{function}` failed: {source}")]
    FunctionFailed {
        function: String,
        #[source]
        source: KernelError,
    },

    // -- Configuration -------------------------------------------------------
    /// Prompt configuration could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal template error: {0}")]
    Internal(String),
}

impl TemplateError {
    pub(crate) fn tokenize(reason: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tokenize {
            reason: reason.into(),
            content: content.into(),
        }
    }

    pub(crate) fn validation(reason: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            content: content.into(),
        }
    }
}

/// Convenience alias used throughout the template crate.
pub type Result<T> = std::result::Result<T, TemplateError>;
