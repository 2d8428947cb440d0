//! Kernel facade.
//!
//! [`Kernel`] owns the function collection and hands out contexts bound to
//! it.  Its one piece of behavior is the pipeline: a list of functions run in
//! order where each function's result becomes the next function's INPUT.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{ContextVariables, DEFAULT_LOCALE, SkContext};
use crate::error::Result;
use crate::function::SkFunction;
use crate::registry::{FunctionCollection, FunctionRegistry};
use crate::settings::RequestSettings;

/// Entry point owning the function collection.
#[derive(Debug, Clone)]
pub struct Kernel {
    functions: FunctionCollection,
    locale: String,
}

impl Kernel {
    /// Create a kernel with an empty function collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionCollection::new(),
            locale: DEFAULT_LOCALE.to_owned(),
        }
    }

    /// Set the locale stamped onto every context this kernel creates.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Register a function with the kernel's collection.
    pub fn register(&self, function: Arc<dyn SkFunction>) {
        self.functions.register(function);
    }

    /// The kernel's function collection.
    pub fn functions(&self) -> &FunctionCollection {
        &self.functions
    }

    /// The kernel's collection as a shareable registry handle.
    pub fn registry(&self) -> Arc<dyn FunctionRegistry> {
        Arc::new(self.functions.clone())
    }

    /// Look up a function, failing when it is not registered.
    pub fn function(&self, plugin_name: Option<&str>, function_name: &str) -> Result<Arc<dyn SkFunction>> {
        self.functions.get(plugin_name, function_name)
    }

    /// Create a context over `variables` bound to this kernel.
    pub fn create_context(&self, variables: ContextVariables) -> SkContext {
        SkContext::new(variables, self.registry()).with_locale(self.locale.clone())
    }

    /// Run `pipeline` in order, piping each result into the next function.
    ///
    /// The returned context is the one produced by the last function.  The
    /// first failure aborts the pipeline.
    pub async fn run_pipeline(
        &self,
        variables: ContextVariables,
        pipeline: &[Arc<dyn SkFunction>],
        settings: &RequestSettings,
    ) -> Result<SkContext> {
        info!(functions = pipeline.len(), "running pipeline");

        let mut context = self.create_context(variables);
        for (index, function) in pipeline.iter().enumerate() {
            let name = function.describe().qualified_name();
            debug!(index, function = %name, "pipeline step");

            context = function.invoke(context, settings).await.map_err(|e| {
                warn!(index, function = %name, error = %e, "pipeline step failed");
                e
            })?;
        }

        Ok(context)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
