use quill_kernel::ContextVariables;

use super::{NAMED_ARG_SEPARATOR, VAR_PREFIX, ValueBlock, VariableBlock, is_quote, is_valid_name};
use crate::error::{Result, TemplateError};

/// The value side of a named argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedArgValue {
    Value(ValueBlock),
    Variable(VariableBlock),
}

/// A `name='value'` or `name=$variable` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArgBlock {
    content: String,
    name: String,
    value: NamedArgValue,
}

impl NamedArgBlock {
    /// Split `content` at its first `=`.
    pub fn new(content: &str) -> Result<Self> {
        let content = content.trim();
        let Some((name, value)) = content.split_once(NAMED_ARG_SEPARATOR) else {
            return Err(TemplateError::tokenize(
                format!(
                    "a named argument must contain a name and a value separated by `{NAMED_ARG_SEPARATOR}`"
                ),
                content,
            ));
        };

        let value = match value.chars().next() {
            Some(VAR_PREFIX) => NamedArgValue::Variable(VariableBlock::new(value)?),
            Some(c) if is_quote(c) => NamedArgValue::Value(ValueBlock::new(value)),
            _ => {
                return Err(TemplateError::tokenize(
                    "a named argument value must start with a quote or `$`",
                    content,
                ));
            }
        };

        Ok(Self {
            content: content.to_owned(),
            name: name.trim().to_owned(),
            value,
        })
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &NamedArgValue {
        &self.value
    }

    /// The referenced variable, when the value is a `$variable`.
    pub fn variable_name(&self) -> Option<&str> {
        match &self.value {
            NamedArgValue::Variable(variable) => Some(variable.name()),
            NamedArgValue::Value(_) => None,
        }
    }

    pub fn render(&self, variables: &ContextVariables) -> String {
        match &self.value {
            NamedArgValue::Value(value) => value.render(variables),
            NamedArgValue::Variable(variable) => variable.render(variables),
        }
    }

    pub fn is_valid(&self) -> std::result::Result<(), String> {
        if !is_valid_name(&self.name) {
            return Err(format!(
                "the argument name `{}` contains invalid characters; only alphanumeric chars and underscore are allowed",
                self.name
            ));
        }
        match &self.value {
            NamedArgValue::Value(value) => value.is_valid(),
            NamedArgValue::Variable(variable) => variable.is_valid(),
        }
        .map_err(|reason| format!("argument `{}`: {reason}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_value() {
        let arg = NamedArgBlock::new("lang='fr'").unwrap();
        assert_eq!(arg.name(), "lang");
        assert_eq!(arg.variable_name(), None);
        assert_eq!(arg.render(&ContextVariables::new()), "fr");
        assert!(arg.is_valid().is_ok());
    }

    #[test]
    fn variable_value() {
        let mut variables = ContextVariables::new();
        variables.set("target", "de");
        let arg = NamedArgBlock::new("lang=$target").unwrap();
        assert_eq!(arg.variable_name(), Some("target"));
        assert_eq!(arg.render(&variables), "de");
    }

    #[test]
    fn requires_separator() {
        assert!(matches!(
            NamedArgBlock::new("lang"),
            Err(TemplateError::Tokenize { .. })
        ));
    }

    #[test]
    fn requires_value_prefix() {
        assert!(matches!(
            NamedArgBlock::new("lang=fr"),
            Err(TemplateError::Tokenize { .. })
        ));
    }

    #[test]
    fn second_separator_lands_in_value() {
        let arg = NamedArgBlock::new("a=$b=c").unwrap();
        assert_eq!(arg.name(), "a");
        assert!(arg.is_valid().is_err());

        let arg = NamedArgBlock::new("a='b=c'").unwrap();
        assert!(arg.is_valid().is_ok());
        assert_eq!(arg.render(&ContextVariables::new()), "b=c");
    }

    #[test]
    fn empty_name_is_invalid() {
        assert!(NamedArgBlock::new("='x'").unwrap().is_valid().is_err());
    }
}
