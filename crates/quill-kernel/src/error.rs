//! Kernel error types.
//!
//! Every function invocation, registry lookup and pipeline run surfaces its
//! failure through [`KernelError`].  Function implementations living in other
//! crates convert their own errors into this type at the invocation boundary,
//! so callers only ever handle one error type per call.

/// Unified error type for the Quill kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Registry errors ----------------------------------------------------
    /// No function is registered under the given plugin and name.
    #[error("function not found: {plugin}.{function}")]
    FunctionNotFound { plugin: String, function: String },

    // -- Invocation errors --------------------------------------------------
    /// A function ran but reported a failure.
    #[error("function `{function}` failed: {reason}")]
    InvocationFailed { function: String, reason: String },

    /// The text completion service could not produce a completion.
    #[error("text completion failed: {reason}")]
    CompletionFailed { reason: String },

    /// A caller supplied an argument the kernel cannot work with.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    // -- Serialization ------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.  Prefer a typed variant whenever possible.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
