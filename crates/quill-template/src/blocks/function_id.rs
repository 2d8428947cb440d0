use super::is_valid_name;
use crate::error::{Result, TemplateError};

/// A `plugin.function` or bare `function` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionIdBlock {
    content: String,
    plugin_name: Option<String>,
    function_name: String,
}

impl FunctionIdBlock {
    /// Split `content` on its (at most one) dot.
    pub fn new(content: &str) -> Result<Self> {
        let content = content.trim();
        let parts: Vec<&str> = content.split('.').collect();
        let (plugin_name, function_name) = match parts.as_slice() {
            [function] => (None, *function),
            [plugin, function] => (Some((*plugin).to_owned()), *function),
            _ => {
                return Err(TemplateError::tokenize(
                    "a function identifier can contain at most one dot separating the plugin name from the function name",
                    content,
                ));
            }
        };

        Ok(Self {
            content: content.to_owned(),
            plugin_name,
            function_name: function_name.to_owned(),
        })
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin_name.as_deref()
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn is_valid(&self) -> std::result::Result<(), String> {
        let plugin_ok = self.plugin_name.as_deref().is_none_or(is_valid_name);
        if !plugin_ok || !is_valid_name(&self.function_name) {
            return Err(format!(
                "the function identifier `{}` contains invalid characters; only alphanumeric chars, underscore and a single dot are allowed",
                self.content
            ));
        }
        Ok(())
    }
}
