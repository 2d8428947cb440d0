use quill_kernel::ContextVariables;

use super::{VAR_PREFIX, is_valid_name};
use crate::error::{Result, TemplateError};

/// A `$name` reference to a context variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBlock {
    content: String,
    name: String,
}

impl VariableBlock {
    /// Build from `$name` source text.
    ///
    /// A bare `$` is accepted here and rejected by [`is_valid`](Self::is_valid).
    pub fn new(content: &str) -> Result<Self> {
        let content = content.trim();
        let Some(name) = content.strip_prefix(VAR_PREFIX) else {
            return Err(TemplateError::tokenize(
                format!("a variable must start with `{VAR_PREFIX}`"),
                content,
            ));
        };
        Ok(Self {
            name: name.to_owned(),
            content: content.to_owned(),
        })
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    /// The variable name without its `$`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look the variable up; a missing variable renders as an empty string.
    pub fn render(&self, variables: &ContextVariables) -> String {
        match variables.get(&self.name) {
            Some(value) => value.to_owned(),
            None => {
                tracing::debug!(variable = %self.name, "variable not found, rendering empty");
                String::new()
            }
        }
    }

    pub fn is_valid(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("the variable name is empty after `{VAR_PREFIX}`"));
        }
        if !is_valid_name(&self.name) {
            return Err(format!(
                "the variable name `{}` contains invalid characters; only alphanumeric chars and underscore are allowed",
                self.name
            ));
        }
        Ok(())
    }
}
