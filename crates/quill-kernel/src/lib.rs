//! Quill kernel.
//!
//! This crate provides the runtime pieces every other Quill crate builds on:
//!
//! - **[`context`]** -- [`ContextVariables`], the case-insensitive ordered
//!   variable bag with its reserved INPUT entry, and [`SkContext`], the
//!   per-invocation context.
//! - **[`function`]** -- The [`SkFunction`] capability trait, its
//!   [`FunctionView`] descriptor, and closure-backed [`NativeFunction`]s.
//! - **[`registry`]** -- The [`FunctionRegistry`] lookup seam and the
//!   concurrent [`FunctionCollection`] backed by [`dashmap::DashMap`].
//! - **[`completion`]** -- The [`TextCompletion`] seam for language-model
//!   providers.
//! - **[`settings`]** -- Opaque [`RequestSettings`] forwarded to functions.
//! - **[`kernel`]** -- The [`Kernel`] facade and function pipelines.
//! - **[`error`]** -- Unified kernel error types via [`thiserror`].
//!
//! All public types are `Send + Sync` and designed for use within a
//! multi-threaded tokio runtime.

pub mod completion;
pub mod context;
pub mod error;
pub mod function;
pub mod kernel;
pub mod registry;
pub mod settings;

// Re-export the most commonly used types at the crate root for convenience.
pub use completion::TextCompletion;
pub use context::{ContextVariables, DEFAULT_LOCALE, INPUT_KEY, SkContext};
pub use error::{KernelError, Result};
pub use function::{FunctionView, NativeFunction, NativeHandler, ParameterView, SkFunction};
pub use kernel::Kernel;
pub use registry::{FunctionCollection, FunctionRegistry, GLOBAL_PLUGIN};
pub use settings::RequestSettings;
