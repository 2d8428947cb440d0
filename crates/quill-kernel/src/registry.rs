//! Function registry.
//!
//! The registry resolves `(plugin, function)` pairs to invocable
//! [`SkFunction`] handles.  Template rendering, plan parsing and plan
//! execution all go through the [`FunctionRegistry`] trait, so hosts can plug
//! in their own lookup; [`FunctionCollection`] is the in-memory
//! implementation.
//!
//! Internally the collection is backed by [`DashMap`] which provides lock-free
//! concurrent reads and fine-grained write locking, making it safe to share
//! across tasks without a global `RwLock`.
//!
//! # Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use quill_kernel::{FunctionCollection, FunctionRegistry, NativeFunction};
//! let functions = FunctionCollection::new();
//! functions.register(Arc::new(NativeFunction::from_fn(
//!     "text",
//!     "upper",
//!     "Uppercase the input",
//!     |s| s.to_uppercase(),
//! )));
//!
//! assert!(functions.resolve(Some("Text"), "UPPER").is_some());
//! assert!(functions.resolve(None, "upper").is_none());
//! ```

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{KernelError, Result};
use crate::function::{FunctionView, SkFunction};

/// Plugin name under which functions registered without a plugin live.
pub const GLOBAL_PLUGIN: &str = "_GLOBAL_FUNCTIONS_";

// ---------------------------------------------------------------------------
// Registry trait
// ---------------------------------------------------------------------------

/// Resolves functions by plugin and name.
pub trait FunctionRegistry: Send + Sync {
    /// Look up a function.  `None` or an empty plugin name means the global
    /// plugin.  Matching ignores case.
    fn resolve(&self, plugin_name: Option<&str>, function_name: &str)
    -> Option<Arc<dyn SkFunction>>;

    /// Descriptors of every function the registry can resolve.
    fn views(&self) -> Vec<FunctionView>;
}

// ---------------------------------------------------------------------------
// FunctionCollection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FunctionKey {
    plugin: String,
    function: String,
}

impl FunctionKey {
    fn new(plugin_name: Option<&str>, function_name: &str) -> Self {
        let plugin = match plugin_name {
            None | Some("") => GLOBAL_PLUGIN,
            Some(plugin) => plugin,
        };
        Self {
            plugin: plugin.to_lowercase(),
            function: function_name.to_lowercase(),
        }
    }
}

/// Concurrent function registry backed by [`DashMap`].
///
/// The collection is cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone)]
pub struct FunctionCollection {
    inner: Arc<DashMap<FunctionKey, Arc<dyn SkFunction>>>,
}

impl FunctionCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Register a function under the plugin and name it describes.
    ///
    /// If a function with the same plugin and name already exists, it is
    /// overwritten.
    pub fn register(&self, function: Arc<dyn SkFunction>) {
        let view = function.describe();
        let key = FunctionKey::new(Some(&view.plugin_name), &view.name);

        if self.inner.insert(key, function).is_some() {
            tracing::warn!(
                plugin = %view.plugin_name,
                function = %view.name,
                "function re-registered, previous definition replaced"
            );
        } else {
            tracing::info!(plugin = %view.plugin_name, function = %view.name, "function registered");
        }
    }

    /// Remove a function from the collection.
    ///
    /// Returns the removed function if it existed.
    pub fn unregister(
        &self,
        plugin_name: Option<&str>,
        function_name: &str,
    ) -> Option<Arc<dyn SkFunction>> {
        let removed = self
            .inner
            .remove(&FunctionKey::new(plugin_name, function_name))
            .map(|(_, function)| function);
        if removed.is_some() {
            tracing::info!(
                plugin = plugin_name.unwrap_or(GLOBAL_PLUGIN),
                function = %function_name,
                "function unregistered"
            );
        }
        removed
    }

    /// Retrieve a function, failing with [`KernelError::FunctionNotFound`].
    pub fn get(&self, plugin_name: Option<&str>, function_name: &str) -> Result<Arc<dyn SkFunction>> {
        self.resolve(plugin_name, function_name)
            .ok_or_else(|| KernelError::FunctionNotFound {
                plugin: plugin_name.unwrap_or(GLOBAL_PLUGIN).to_owned(),
                function: function_name.to_owned(),
            })
    }

    /// Whether a function is registered under this plugin and name.
    pub fn contains(&self, plugin_name: Option<&str>, function_name: &str) -> bool {
        self.inner
            .contains_key(&FunctionKey::new(plugin_name, function_name))
    }

    /// Descriptors of every function in one plugin.
    pub fn plugin_views(&self, plugin_name: &str) -> Vec<FunctionView> {
        let plugin = plugin_name.to_lowercase();
        let mut views: Vec<FunctionView> = self
            .inner
            .iter()
            .filter(|e| e.key().plugin == plugin)
            .map(|e| e.value().describe())
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    /// Return the total number of registered functions.
    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

impl Default for FunctionCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry for FunctionCollection {
    fn resolve(
        &self,
        plugin_name: Option<&str>,
        function_name: &str,
    ) -> Option<Arc<dyn SkFunction>> {
        let found = self
            .inner
            .get(&FunctionKey::new(plugin_name, function_name))
            .map(|entry| Arc::clone(entry.value()));
        if found.is_none() {
            tracing::debug!(
                plugin = plugin_name.unwrap_or(GLOBAL_PLUGIN),
                function = %function_name,
                "function lookup missed"
            );
        }
        found
    }

    fn views(&self) -> Vec<FunctionView> {
        let mut views: Vec<FunctionView> =
            self.inner.iter().map(|e| e.value().describe()).collect();
        views.sort_by(|a, b| {
            a.plugin_name
                .cmp(&b.plugin_name)
                .then_with(|| a.name.cmp(&b.name))
        });
        views
    }
}

impl std::fmt::Debug for FunctionCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCollection")
            .field("count", &self.inner.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
