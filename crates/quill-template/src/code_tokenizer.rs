//! Tokenizer for the interior of a `{{ ... }}` expression.
//!
//! A single left-to-right scan over the characters, tracking which kind of
//! token is being accumulated.  Quoted text (a value, or the quoted side of a
//! named argument) honors `\` escapes for quotes and backslashes; everywhere
//! else a blank ends the current token.

use crate::blocks::{
    Block, ESCAPE_CHAR, FunctionIdBlock, NAMED_ARG_SEPARATOR, NamedArgBlock, VAR_PREFIX,
    ValueBlock, VariableBlock, can_be_escaped, is_blank, is_quote,
};
use crate::error::{Result, TemplateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    None,
    Variable,
    Value,
    FunctionId,
    NamedArg,
}

/// Splits a code expression into value, variable, function id and named
/// argument tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeTokenizer;

impl CodeTokenizer {
    pub fn tokenize(text: &str) -> Result<Vec<Block>> {
        let text = text.trim();
        let chars: Vec<char> = text.chars().collect();

        match chars.as_slice() {
            [] => return Ok(Vec::new()),
            [single] => return Ok(vec![Self::single_char_token(*single, text)?]),
            _ => {}
        }

        let mut blocks = Vec::new();
        let mut kind = TokenKind::None;
        let mut content = String::new();
        // Closing delimiter while inside quotes.
        let mut delimiter: Option<char> = None;
        // Set once a named argument has seen its `=` and value prefix.
        let mut named_arg_prefix: Option<char> = None;
        let mut separated = false;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if let Some(quote) = delimiter {
                if c == ESCAPE_CHAR && next.is_some_and(can_be_escaped) {
                    content.push(chars[i + 1]);
                    i += 2;
                    continue;
                }

                content.push(c);
                if c == quote {
                    blocks.push(Self::emit(kind, &content, text)?);
                    content.clear();
                    kind = TokenKind::None;
                    delimiter = None;
                    named_arg_prefix = None;
                    separated = false;
                }
                i += 1;
                continue;
            }

            if is_blank(c) {
                if kind != TokenKind::None {
                    blocks.push(Self::emit(kind, &content, text)?);
                    content.clear();
                    kind = TokenKind::None;
                    named_arg_prefix = None;
                }
                separated = true;
                i += 1;
                continue;
            }

            match kind {
                TokenKind::None => {
                    if !blocks.is_empty() && !separated {
                        return Err(TemplateError::tokenize(
                            "tokens must be separated by at least one space",
                            text,
                        ));
                    }
                    content.push(c);
                    kind = if is_quote(c) {
                        delimiter = Some(c);
                        TokenKind::Value
                    } else if c == VAR_PREFIX {
                        TokenKind::Variable
                    } else if blocks.is_empty() {
                        TokenKind::FunctionId
                    } else {
                        TokenKind::NamedArg
                    };
                    separated = false;
                }
                TokenKind::FunctionId | TokenKind::NamedArg
                    if c == NAMED_ARG_SEPARATOR && named_arg_prefix.is_none() =>
                {
                    let Some(prefix) = next.filter(|n| is_quote(*n) || *n == VAR_PREFIX) else {
                        return Err(TemplateError::tokenize(
                            "a named argument value must start with a quote or `$`",
                            text,
                        ));
                    };
                    content.push(c);
                    content.push(prefix);
                    named_arg_prefix = Some(prefix);
                    if is_quote(prefix) {
                        delimiter = Some(prefix);
                    }
                    kind = TokenKind::NamedArg;
                    i += 2;
                    continue;
                }
                _ => content.push(c),
            }
            i += 1;
        }

        if delimiter.is_some() {
            return Err(TemplateError::tokenize(
                format!("unterminated quote in `{content}`"),
                text,
            ));
        }
        if kind != TokenKind::None {
            blocks.push(Self::emit(kind, &content, text)?);
        }

        Ok(blocks)
    }

    /// A one-character expression is a token of its own, whatever it is.
    fn single_char_token(c: char, text: &str) -> Result<Block> {
        Ok(if c == VAR_PREFIX {
            Block::Variable(VariableBlock::new(text)?)
        } else if is_quote(c) {
            Block::Value(ValueBlock::new(text))
        } else {
            Block::FunctionId(FunctionIdBlock::new(text)?)
        })
    }

    fn emit(kind: TokenKind, content: &str, text: &str) -> Result<Block> {
        Ok(match kind {
            TokenKind::Variable => Block::Variable(VariableBlock::new(content)?),
            TokenKind::Value => Block::Value(ValueBlock::new(content)),
            TokenKind::FunctionId => Block::FunctionId(FunctionIdBlock::new(content)?),
            TokenKind::NamedArg => Block::NamedArg(NamedArgBlock::new(content)?),
            TokenKind::None => {
                return Err(TemplateError::Internal(format!(
                    "attempted to emit an empty token while tokenizing `{text}`"
                )));
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
