//! Code blocks: the tokenized body of a `{{ ... }}` expression, plus the
//! evaluator that validates and renders it.
//!
//! The grammar is small:
//!
//! ```text
//! code     := value | variable | call
//! call     := function_id [ positional ] { named_arg }
//! positional := value | variable | named_arg
//! ```

use quill_kernel::{RequestSettings, SkContext};
use tracing::debug;

use super::Block;
use crate::code_tokenizer::CodeTokenizer;
use crate::error::{Result, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    content: String,
    tokens: Vec<Block>,
    terminated: bool,
}

impl CodeBlock {
    /// Tokenize the interior of a `{{ ... }}` expression.
    pub fn new(content: &str) -> Result<Self> {
        let content = content.trim();
        Ok(Self {
            tokens: CodeTokenizer::tokenize(content)?,
            content: content.to_owned(),
            terminated: true,
        })
    }

    /// Build from already tokenized parts.
    pub fn from_tokens(tokens: Vec<Block>, content: &str) -> Self {
        Self {
            content: content.trim().to_owned(),
            tokens,
            terminated: true,
        }
    }

    /// Mark the block as missing its closing `}}`.
    pub(crate) fn unterminated(mut self) -> Self {
        self.terminated = false;
        self
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    pub fn tokens(&self) -> &[Block] {
        &self.tokens
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn is_valid(&self) -> std::result::Result<(), String> {
        if !self.terminated {
            return Err("the code block is missing its closing `}}`".into());
        }

        let Some(first) = self.tokens.first() else {
            return Err("the code block is empty".into());
        };

        for token in &self.tokens {
            token.is_valid()?;
        }

        if matches!(first, Block::NamedArg(_)) {
            return Err("unexpected named argument found; expected a function name first".into());
        }

        if self.tokens.len() > 1 {
            if !matches!(first, Block::FunctionId(_)) {
                return Err(format!(
                    "unexpected second token found: `{}`",
                    self.tokens[1].raw_content()
                ));
            }

            match &self.tokens[1] {
                Block::Value(_) | Block::Variable(_) | Block::NamedArg(_) => {}
                other => {
                    return Err(format!(
                        "functions support only one parameter: `{}` is not a value, variable or named argument",
                        other.raw_content()
                    ));
                }
            }

            if let Some(extra) = self.tokens[2..]
                .iter()
                .find(|token| !matches!(token, Block::NamedArg(_)))
            {
                return Err(format!(
                    "functions only support named arguments after the first argument; `{}` is not named",
                    extra.raw_content()
                ));
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render against `context`.
    ///
    /// Values and variables render directly.  A function call resolves the
    /// function through the context's registry and invokes it with a copy of
    /// the context whose variables carry the call's arguments.
    pub async fn render(&self, context: &SkContext) -> Result<String> {
        match self.tokens.first() {
            None => Err(TemplateError::validation("the code block is empty", &self.content)),
            Some(Block::Value(value)) => Ok(value.value().to_owned()),
            Some(Block::Variable(variable)) => Ok(variable.render(&context.variables)),
            Some(Block::FunctionId(_)) => self.render_function_call(context).await,
            Some(other) => Err(TemplateError::validation(
                format!("unexpected first token `{}`", other.raw_content()),
                &self.content,
            )),
        }
    }

    async fn render_function_call(&self, context: &SkContext) -> Result<String> {
        let Some(Block::FunctionId(id)) = self.tokens.first() else {
            return Err(TemplateError::Internal(
                "function call without a function id".into(),
            ));
        };

        let function = context
            .registry()
            .resolve(id.plugin_name(), id.function_name())
            .ok_or_else(|| TemplateError::FunctionNotFound {
                function: id.raw_content().to_owned(),
            })?;

        let mut call_context = context.clone();
        self.bind_arguments(context, &mut call_context)?;

        debug!(function = %id.raw_content(), args = self.tokens.len() - 1, "calling function from template");

        let result = function
            .invoke(call_context, &RequestSettings::default())
            .await
            .map_err(|source| TemplateError::FunctionFailed {
                function: id.raw_content().to_owned(),
                source,
            })?;

        Ok(result.result().to_owned())
    }

    /// Copy the call's arguments into `call_context`.  Argument values are
    /// rendered against the caller's variables, not the copy being filled.
    fn bind_arguments(&self, context: &SkContext, call_context: &mut SkContext) -> Result<()> {
        let caller = &context.variables;
        let mut named_start = 1;

        match self.tokens.get(1) {
            None => return Ok(()),
            Some(Block::Value(value)) => {
                call_context.variables.update(value.render(caller));
                named_start = 2;
            }
            Some(Block::Variable(variable)) => {
                call_context.variables.update(variable.render(caller));
                named_start = 2;
            }
            Some(Block::NamedArg(_)) => {}
            Some(other) => {
                return Err(TemplateError::validation(
                    format!("unexpected argument `{}`", other.raw_content()),
                    &self.content,
                ));
            }
        }

        for token in &self.tokens[named_start..] {
            let Block::NamedArg(arg) = token else {
                return Err(TemplateError::validation(
                    format!("argument `{}` must be named", token.raw_content()),
                    &self.content,
                ));
            };
            call_context.variables.set(arg.name(), arg.render(caller));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quill_kernel::{ContextVariables, FunctionCollection, NativeFunction};

    use super::*;

    fn context_with(functions: FunctionCollection, variables: ContextVariables) -> SkContext {
        SkContext::new(variables, Arc::new(functions))
    }

    #[test]
    fn token_reason_propagates() {
        let block = CodeBlock::new("f $bad-name").unwrap();
        let reason = block.is_valid().unwrap_err();
        assert!(reason.contains("bad-name"), "{reason}");
        assert_eq!(Block::Code(block).is_valid().unwrap_err(), reason);
    }

    #[test]
    fn empty_block_is_invalid() {
        let block = CodeBlock::new("  ").unwrap();
        assert!(block.tokens().is_empty());
        assert!(block.is_valid().is_err());
    }

    #[test]
    fn leading_named_arg_is_invalid() {
        let block = CodeBlock::new("a='b'").unwrap();
        assert!(block.is_valid().is_err());
    }

    #[test]
    fn non_function_first_token_with_arguments_is_invalid() {
        assert!(CodeBlock::new("$x 'y'").unwrap().is_valid().is_err());
        assert!(CodeBlock::new("'x' $y").unwrap().is_valid().is_err());
    }

    #[test]
    fn second_positional_argument_is_invalid() {
        assert!(CodeBlock::new("f 'a' 'b'").unwrap().is_valid().is_err());
        assert!(CodeBlock::new("f 'a' b='c'").unwrap().is_valid().is_ok());
        assert!(CodeBlock::new("f a='b' c=$d").unwrap().is_valid().is_ok());
    }

    #[test]
    fn unterminated_block_is_invalid() {
        let block = CodeBlock::new("echo").unwrap().unterminated();
        assert!(block.is_valid().is_err());
    }

    #[tokio::test]
    async fn renders_value_and_variable() {
        let mut variables = ContextVariables::new();
        variables.set("name", "Ada");
        let context = context_with(FunctionCollection::new(), variables);

        assert_eq!(CodeBlock::new("'hi'").unwrap().render(&context).await.unwrap(), "hi");
        assert_eq!(CodeBlock::new("$name").unwrap().render(&context).await.unwrap(), "Ada");
    }

    #[tokio::test]
    async fn calls_function_with_arguments() {
        let functions = FunctionCollection::new();
        functions.register(Arc::new(NativeFunction::new(
            "text",
            "greet",
            "",
            vec![],
            |mut context: SkContext, _settings| async move {
                let greeting = format!(
                    "{}, {}",
                    context.variables.get("greeting").unwrap_or("hello"),
                    context.variables.input()
                );
                context.variables.update(greeting);
                Ok::<_, quill_kernel::KernelError>(context)
            },
        )));

        let mut variables = ContextVariables::with_input("caller input");
        variables.set("who", "world");
        let context = context_with(functions, variables);

        let block = CodeBlock::new("text.greet $who greeting='hey'").unwrap();
        assert!(block.is_valid().is_ok());
        assert_eq!(block.render(&context).await.unwrap(), "hey, world");

        // The caller's context is untouched.
        assert_eq!(context.variables.input(), "caller input");
    }

    #[tokio::test]
    async fn missing_function_fails() {
        let context = context_with(FunctionCollection::new(), ContextVariables::new());
        let err = CodeBlock::new("nope.missing").unwrap().render(&context).await.unwrap_err();
        assert!(matches!(err, TemplateError::FunctionNotFound { .. }));
    }
}
