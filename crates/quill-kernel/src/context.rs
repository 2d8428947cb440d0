//! Context variables and the per-invocation function context.
//!
//! [`ContextVariables`] is the named string bag passed into and returned from
//! every render and every function invocation.  Names are matched
//! case-insensitively but keep the spelling they were first inserted with, and
//! iteration follows insertion order.  One reserved key, [`INPUT_KEY`], always
//! exists and holds the "main" value.
//!
//! [`SkContext`] pairs one set of variables with the function registry and a
//! locale.  Contexts are cheap to clone: the registry is shared behind an
//! `Arc`, the variables are deep-copied.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::registry::FunctionRegistry;

/// The reserved variable holding the main input/output value.
pub const INPUT_KEY: &str = "INPUT";

/// Locale used when a context is created without an explicit one.
pub const DEFAULT_LOCALE: &str = "en-US";

// ---------------------------------------------------------------------------
// Case-insensitive key
// ---------------------------------------------------------------------------

/// Variable name wrapper whose equality and hash ignore case.
#[derive(Debug, Clone)]
struct VariableKey(String);

impl VariableKey {
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for VariableKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for VariableKey {}

impl Hash for VariableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

// ---------------------------------------------------------------------------
// ContextVariables
// ---------------------------------------------------------------------------

/// Ordered, case-insensitive `name -> value` map with a reserved INPUT entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVariables {
    inner: IndexMap<VariableKey, String>,
}

impl ContextVariables {
    /// Create a variable set whose INPUT is empty.
    #[must_use]
    pub fn new() -> Self {
        Self::with_input("")
    }

    /// Create a variable set seeded with the given INPUT value.
    pub fn with_input(input: impl Into<String>) -> Self {
        let mut inner = IndexMap::new();
        inner.insert(VariableKey(INPUT_KEY.to_owned()), input.into());
        Self { inner }
    }

    /// The current INPUT value.
    pub fn input(&self) -> &str {
        self.get(INPUT_KEY).unwrap_or_default()
    }

    /// Look up a variable by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&VariableKey(name.to_owned()))
            .map(String::as_str)
    }

    /// Whether a variable with this name exists, ignoring case.
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.contains_key(&VariableKey(name.to_owned()))
    }

    /// Set a variable, overwriting any previous value stored under a name
    /// that differs only in case.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(VariableKey(name.into()), value.into());
    }

    /// Set a variable, or remove it when `value` is `None`.
    ///
    /// This keeps "absent" distinct from "empty".  INPUT cannot be removed;
    /// passing `None` for it resets it to an empty string.
    pub fn set_optional(&mut self, name: impl Into<String>, value: Option<String>) {
        match value {
            Some(value) => self.set(name, value),
            None => self.remove(&name.into()),
        }
    }

    /// Remove a variable.  Removing INPUT resets it to an empty string.
    pub fn remove(&mut self, name: &str) {
        let key = VariableKey(name.to_owned());
        if key == VariableKey(INPUT_KEY.to_owned()) {
            self.inner.insert(key, String::new());
        } else {
            self.inner.shift_remove(&key);
        }
    }

    /// Replace the INPUT value.
    pub fn update(&mut self, value: impl Into<String>) {
        self.set(INPUT_KEY, value);
    }

    /// Copy every variable of `other` into `self`.
    ///
    /// With `merge == false` the current contents are discarded first, so
    /// `self` ends up an independent copy of `other`.
    pub fn update_from(&mut self, other: &ContextVariables, merge: bool) {
        if !merge {
            self.inner.clear();
        }
        for (key, value) in &other.inner {
            self.inner.insert(key.clone(), value.clone());
        }
        if !self.contains_key(INPUT_KEY) {
            self.inner.insert(VariableKey(INPUT_KEY.to_owned()), String::new());
        }
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|(key, value)| (key.0.as_str(), value.as_str()))
    }

    /// Number of variables, INPUT included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the set carries nothing but an empty INPUT.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 1 && self.input().is_empty()
    }
}

impl Default for ContextVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.input())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Self::new();
        for (name, value) in iter {
            variables.set(name, value);
        }
        variables
    }
}

impl Serialize for ContextVariables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ContextVariables {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, String>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// SkContext
// ---------------------------------------------------------------------------

/// The context a function runs in: its variables, the registry it may use to
/// reach other functions, and the caller's locale.
#[derive(Clone)]
pub struct SkContext {
    /// Variables visible to the function.
    pub variables: ContextVariables,
    registry: Arc<dyn FunctionRegistry>,
    locale: String,
}

impl SkContext {
    /// Create a context over the given variables and registry.
    pub fn new(variables: ContextVariables, registry: Arc<dyn FunctionRegistry>) -> Self {
        Self {
            variables,
            registry,
            locale: DEFAULT_LOCALE.to_owned(),
        }
    }

    /// Replace the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// A new context sharing this one's registry and locale but carrying a
    /// different set of variables.
    pub fn with_variables(&self, variables: ContextVariables) -> Self {
        Self {
            variables,
            registry: Arc::clone(&self.registry),
            locale: self.locale.clone(),
        }
    }

    /// The function registry reachable from this context.
    pub fn registry(&self) -> &Arc<dyn FunctionRegistry> {
        &self.registry
    }

    /// The caller's locale (e.g. `en-US`).
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The function result, i.e. the INPUT variable.
    pub fn result(&self) -> &str {
        self.variables.input()
    }
}

impl fmt::Debug for SkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkContext")
            .field("variables", &self.variables)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_always_exists() {
        let vars = ContextVariables::new();
        assert!(vars.contains_key("input"));
        assert_eq!(vars.input(), "");
        assert!(vars.is_empty());
    }

    #[test]
    fn lookup_ignores_case() {
        let mut vars = ContextVariables::new();
        vars.set("Foo", "1");
        assert_eq!(vars.get("foo"), Some("1"));
        assert_eq!(vars.get("FOO"), Some("1"));

        vars.set("fOO", "2");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("Foo"), Some("2"));
        // The first spelling wins.
        assert!(vars.iter().any(|(name, _)| name == "Foo"));
    }

    #[test]
    fn set_none_removes_key() {
        let mut vars = ContextVariables::new();
        vars.set("city", "");
        assert!(vars.contains_key("city"));

        vars.set_optional("city", None);
        assert!(!vars.contains_key("city"));
    }

    #[test]
    fn removing_input_resets_it() {
        let mut vars = ContextVariables::with_input("hello");
        vars.set_optional(INPUT_KEY, None);
        assert!(vars.contains_key(INPUT_KEY));
        assert_eq!(vars.input(), "");
    }

    #[test]
    fn clone_is_independent() {
        let mut original = ContextVariables::with_input("a");
        let copy = original.clone();
        original.update("b");
        original.set("x", "1");
        assert_eq!(copy.input(), "a");
        assert!(!copy.contains_key("x"));
    }

    #[test]
    fn update_from_merge_and_replace() {
        let mut base = ContextVariables::with_input("base");
        base.set("keep", "1");

        let mut other = ContextVariables::with_input("other");
        other.set("new", "2");

        let mut merged = base.clone();
        merged.update_from(&other, true);
        assert_eq!(merged.input(), "other");
        assert_eq!(merged.get("keep"), Some("1"));
        assert_eq!(merged.get("new"), Some("2"));

        let mut replaced = base.clone();
        replaced.update_from(&other, false);
        assert_eq!(replaced.input(), "other");
        assert!(!replaced.contains_key("keep"));
        assert_eq!(replaced.get("new"), Some("2"));
    }

    #[test]
    fn display_renders_input() {
        let vars = ContextVariables::with_input("main value");
        assert_eq!(vars.to_string(), "main value");
    }

    #[test]
    fn serde_keeps_order() {
        let mut vars = ContextVariables::with_input("in");
        vars.set("b", "2");
        vars.set("a", "1");

        let json = serde_json::to_string(&vars).unwrap();
        assert_eq!(json, r#"{"INPUT":"in","b":"2","a":"1"}"#);

        let back: ContextVariables = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vars);
    }

    #[test]
    fn deserialize_without_input_adds_it() {
        let vars: ContextVariables = serde_json::from_str(r#"{"x":"1"}"#).unwrap();
        assert_eq!(vars.input(), "");
        assert_eq!(vars.get("x"), Some("1"));
    }
}
