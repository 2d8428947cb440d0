use quill_kernel::ContextVariables;

use super::is_quote;

/// A quoted literal such as `'hello'` or `"world"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBlock {
    content: String,
    value: String,
}

impl ValueBlock {
    /// Build from quoted source text.  Escapes have already been resolved by
    /// the tokenizer.
    pub fn new(content: &str) -> Self {
        let content = content.trim().to_owned();
        let value = unquote(&content).unwrap_or_default().to_owned();
        Self { content, value }
    }

    /// Whether `text` starts like a value.
    pub fn has_value_prefix(text: &str) -> bool {
        text.chars().next().is_some_and(is_quote)
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    /// The literal without its delimiters.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn render(&self, _variables: &ContextVariables) -> String {
        self.value.clone()
    }

    pub fn is_valid(&self) -> Result<(), String> {
        let mut chars = self.content.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return Err("a value must have single quotes or double quotes on both sides".into());
        };
        if !is_quote(first) {
            return Err("a value must be delimited by single quotes or double quotes".into());
        }
        if first != last {
            return Err(
                "a value must be defined using either single quotes or double quotes, not both"
                    .into(),
            );
        }
        Ok(())
    }
}

fn unquote(content: &str) -> Option<&str> {
    let mut chars = content.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if !is_quote(first) || !is_quote(last) {
        return None;
    }
    Some(&content[first.len_utf8()..content.len() - last.len_utf8()])
}
