//! Function capability trait and descriptors.
//!
//! A function is anything the kernel can invoke with a context: a native Rust
//! callback, a prompt-backed semantic function, or a whole plan.  Callers only
//! see the [`SkFunction`] trait and the [`FunctionView`] descriptor it
//! exposes.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::context::{INPUT_KEY, SkContext};
use crate::error::Result;
use crate::registry::GLOBAL_PLUGIN;
use crate::settings::RequestSettings;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A declared function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterView {
    /// Parameter name, matched case-insensitively against context variables.
    pub name: String,

    /// Human-readable description, shown to planners.
    #[serde(default)]
    pub description: String,

    /// Value used when the caller supplies nothing.
    #[serde(default)]
    pub default_value: String,
}

impl ParameterView {
    /// A parameter with no description and an empty default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            default_value: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }
}

/// Snapshot of a function's identity and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionView {
    pub name: String,
    pub plugin_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterView>,
}

impl FunctionView {
    /// `plugin.name`, or just `name` for global functions.
    pub fn qualified_name(&self) -> String {
        if self.plugin_name.is_empty() || self.plugin_name == GLOBAL_PLUGIN {
            self.name.clone()
        } else {
            format!("{}.{}", self.plugin_name, self.name)
        }
    }
}

// ---------------------------------------------------------------------------
// Function trait
// ---------------------------------------------------------------------------

/// An invocable capability.
///
/// Implementations take ownership of the context they are given and return
/// the context holding their result; the result itself is the INPUT variable
/// of the returned context.
#[async_trait]
pub trait SkFunction: Send + Sync {
    /// Describe the function's identity and parameters.
    fn describe(&self) -> FunctionView;

    /// Run the function.
    async fn invoke(&self, context: SkContext, settings: &RequestSettings) -> Result<SkContext>;
}

// ---------------------------------------------------------------------------
// Native functions
// ---------------------------------------------------------------------------

/// Boxed async handler backing a [`NativeFunction`].
///
/// The future is boxed so callers can supply arbitrary async work without
/// leaking concrete types into the registry.
pub type NativeHandler =
    Arc<dyn Fn(SkContext, RequestSettings) -> BoxFuture<'static, Result<SkContext>> + Send + Sync>;

/// A function implemented by a Rust closure.
#[derive(Clone)]
pub struct NativeFunction {
    view: FunctionView,
    handler: NativeHandler,
}

impl NativeFunction {
    /// Wrap an async handler.
    ///
    /// An empty `plugin` registers the function in the global plugin.
    pub fn new<F, Fut>(
        plugin: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterView>,
        handler: F,
    ) -> Self
    where
        F: Fn(SkContext, RequestSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SkContext>> + Send + 'static,
    {
        let plugin = plugin.into();
        let plugin_name = if plugin.is_empty() {
            GLOBAL_PLUGIN.to_owned()
        } else {
            plugin
        };

        Self {
            view: FunctionView {
                name: name.into(),
                plugin_name,
                description: description.into(),
                parameters,
            },
            handler: Arc::new(move |context: SkContext, settings: RequestSettings| {
                handler(context, settings).boxed()
            }),
        }
    }

    /// Wrap a synchronous `input -> output` transform.
    ///
    /// The function declares a single INPUT parameter and replaces the
    /// context's INPUT with the transform's return value.
    pub fn from_fn<F>(
        plugin: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        transform: F,
    ) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        Self::new(
            plugin,
            name,
            description,
            vec![ParameterView::new(INPUT_KEY).with_description("Input text")],
            move |mut context: SkContext, _settings| {
                let transform = Arc::clone(&transform);
                async move {
                    let output = (*transform)(context.variables.input());
                    context.variables.update(output);
                    Ok::<_, crate::error::KernelError>(context)
                }
            },
        )
    }

    /// Append a declared parameter.
    pub fn with_parameter(mut self, parameter: ParameterView) -> Self {
        self.view.parameters.push(parameter);
        self
    }
}

#[async_trait]
impl SkFunction for NativeFunction {
    fn describe(&self) -> FunctionView {
        self.view.clone()
    }

    async fn invoke(&self, context: SkContext, settings: &RequestSettings) -> Result<SkContext> {
        tracing::trace!(function = %self.view.qualified_name(), "invoking native function");
        (self.handler)(context, settings.clone()).await
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
