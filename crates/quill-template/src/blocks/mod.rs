//! Template block AST.
//!
//! A template tokenizes into a flat list of [`Block`]s.  Text and code blocks
//! appear at the top level; the remaining kinds only appear as tokens inside
//! a [`CodeBlock`].
//!
//! Construction rejects shape-independent syntax errors (a variable without
//! its `$`, a function id with two dots).  Everything else is deferred to
//! [`Block::is_valid`], so a template can be inspected before it is judged.

mod code;
mod function_id;
mod named_arg;
mod value;
mod variable;

pub use code::CodeBlock;
pub use function_id::FunctionIdBlock;
pub use named_arg::{NamedArgBlock, NamedArgValue};
pub use value::ValueBlock;
pub use variable::VariableBlock;

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

pub(crate) const BLOCK_STARTER: char = '{';
pub(crate) const BLOCK_ENDER: char = '}';
pub(crate) const VAR_PREFIX: char = '$';
pub(crate) const DBL_QUOTE: char = '"';
pub(crate) const SGL_QUOTE: char = '\'';
pub(crate) const ESCAPE_CHAR: char = '\\';
pub(crate) const NAMED_ARG_SEPARATOR: char = '=';

pub(crate) fn is_quote(c: char) -> bool {
    c == DBL_QUOTE || c == SGL_QUOTE
}

pub(crate) fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Characters that may follow [`ESCAPE_CHAR`] inside a quoted value.
pub(crate) fn can_be_escaped(c: char) -> bool {
    is_quote(c) || c == ESCAPE_CHAR
}

/// Whether `name` is a legal variable, argument, plugin or function name:
/// one or more ASCII alphanumerics or underscores.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Discriminant of a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Value,
    Variable,
    FunctionId,
    NamedArg,
    Code,
}

/// One node of a tokenized template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Literal text, kept exactly as written.
    Text(String),
    Value(ValueBlock),
    Variable(VariableBlock),
    FunctionId(FunctionIdBlock),
    NamedArg(NamedArgBlock),
    Code(CodeBlock),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Text(_) => BlockKind::Text,
            Self::Value(_) => BlockKind::Value,
            Self::Variable(_) => BlockKind::Variable,
            Self::FunctionId(_) => BlockKind::FunctionId,
            Self::NamedArg(_) => BlockKind::NamedArg,
            Self::Code(_) => BlockKind::Code,
        }
    }

    /// The source text this block was built from.
    ///
    /// Text blocks keep their whitespace; every other kind is trimmed.
    pub fn raw_content(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Value(block) => block.raw_content(),
            Self::Variable(block) => block.raw_content(),
            Self::FunctionId(block) => block.raw_content(),
            Self::NamedArg(block) => block.raw_content(),
            Self::Code(block) => block.raw_content(),
        }
    }

    /// Shape-dependent validation.  Returns the reason on failure.
    pub fn is_valid(&self) -> Result<(), String> {
        match self {
            Self::Text(_) => Ok(()),
            Self::Value(block) => block.is_valid(),
            Self::Variable(block) => block.is_valid(),
            Self::FunctionId(block) => block.is_valid(),
            Self::NamedArg(block) => block.is_valid(),
            Self::Code(block) => block.is_valid(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
