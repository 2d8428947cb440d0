//! Splits a template into text and code blocks.
//!
//! Code blocks are delimited by `{{` and `}}`.  Inside a code block the scan
//! tracks quotes, so `}}` inside a quoted value does not close the block.
//! A second `{{` outside quotes restarts the block, leaving what came before
//! it as text.

use crate::blocks::{
    BLOCK_ENDER, BLOCK_STARTER, Block, CodeBlock, ESCAPE_CHAR, can_be_escaped, is_quote,
};
use crate::error::Result;

/// Template to block list tokenizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateTokenizer;

impl TemplateTokenizer {
    pub fn tokenize(template: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        if template.is_empty() {
            return Ok(blocks);
        }

        let chars: Vec<(usize, char)> = template.char_indices().collect();
        let mut text_start = 0;
        let mut block_start: Option<usize> = None;
        let mut quote: Option<char> = None;

        let mut i = 0;
        while i < chars.len() {
            let (pos, c) = chars[i];
            let next = chars.get(i + 1).map(|&(_, n)| n);

            if let Some(open) = quote {
                if c == ESCAPE_CHAR && next.is_some_and(can_be_escaped) {
                    i += 2;
                    continue;
                }
                if c == open {
                    quote = None;
                }
                i += 1;
                continue;
            }

            if c == BLOCK_STARTER && next == Some(BLOCK_STARTER) {
                block_start = Some(pos);
                i += 2;
                continue;
            }

            if let Some(start) = block_start {
                if is_quote(c) {
                    quote = Some(c);
                } else if c == BLOCK_ENDER && next == Some(BLOCK_ENDER) {
                    let end = pos + 2;
                    push_text(&mut blocks, &template[text_start..start]);
                    push_code(&mut blocks, &template[start..end], &template[start + 2..pos], true)?;
                    text_start = end;
                    block_start = None;
                    i += 2;
                    continue;
                }
            }

            i += 1;
        }

        match block_start {
            Some(start) => {
                push_text(&mut blocks, &template[text_start..start]);
                push_code(&mut blocks, &template[start..], &template[start + 2..], false)?;
            }
            None => push_text(&mut blocks, &template[text_start..]),
        }

        Ok(blocks)
    }
}

/// Append text, merging with a preceding text block.
fn push_text(blocks: &mut Vec<Block>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Block::Text(previous)) = blocks.last_mut() {
        previous.push_str(text);
    } else {
        blocks.push(Block::Text(text.to_owned()));
    }
}

/// Append a code block.  A closed expression with nothing but blanks inside
/// stays literal text; an unclosed one is always kept as code so validation
/// rejects it.
fn push_code(blocks: &mut Vec<Block>, raw: &str, inner: &str, terminated: bool) -> Result<()> {
    if !terminated {
        let code = if inner.trim().is_empty() {
            CodeBlock::from_tokens(Vec::new(), inner)
        } else {
            CodeBlock::new(inner)?
        };
        blocks.push(Block::Code(code.unterminated()));
        return Ok(());
    }
    if inner.trim().is_empty() {
        push_text(blocks, raw);
        return Ok(());
    }
    blocks.push(Block::Code(CodeBlock::new(inner)?));
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockKind;
    use crate::error::TemplateError;

    fn kinds(blocks: &[Block]) -> Vec<BlockKind> {
        blocks.iter().map(Block::kind).collect()
    }

    #[test]
    fn empty_template() {
        assert!(TemplateTokenizer::tokenize("").unwrap().is_empty());
    }

    #[test]
    fn plain_text() {
        let blocks = TemplateTokenizer::tokenize("just { some } text").unwrap();
        assert_eq!(blocks, vec![Block::Text("just { some } text".into())]);
    }

    #[test]
    fn short_templates_are_text() {
        for template in ["{", "}}", "a}"] {
            let blocks = TemplateTokenizer::tokenize(template).unwrap();
            assert_eq!(kinds(&blocks), vec![BlockKind::Text], "{template}");
        }
    }

    #[test]
    fn text_and_code_alternate() {
        let blocks = TemplateTokenizer::tokenize("Hello {{$name}}, see {{ f 'x' }}!").unwrap();
        assert_eq!(
            kinds(&blocks),
            vec![
                BlockKind::Text,
                BlockKind::Code,
                BlockKind::Text,
                BlockKind::Code,
                BlockKind::Text,
            ]
        );
        assert_eq!(blocks[1].raw_content(), "$name");
        assert_eq!(blocks[3].raw_content(), "f 'x'");
    }

    #[test]
    fn empty_code_is_text() {
        let blocks = TemplateTokenizer::tokenize("a {{}} b {{  }} c").unwrap();
        assert_eq!(blocks, vec![Block::Text("a {{}} b {{  }} c".into())]);
    }

    #[test]
    fn closing_braces_inside_quotes() {
        let blocks = TemplateTokenizer::tokenize("{{ f '}}' }} tail").unwrap();
        assert_eq!(kinds(&blocks), vec![BlockKind::Code, BlockKind::Text]);
        assert_eq!(blocks[0].raw_content(), "f '}}'");
        assert_eq!(blocks[1].raw_content(), " tail");
    }

    #[test]
    fn escaped_quote_inside_code() {
        let blocks = TemplateTokenizer::tokenize(r"{{ f 'a\'}}' }}").unwrap();
        assert_eq!(kinds(&blocks), vec![BlockKind::Code]);
    }

    #[test]
    fn braces_in_text_outside_blocks() {
        let blocks = TemplateTokenizer::tokenize("'}}' {{$x}}").unwrap();
        assert_eq!(kinds(&blocks), vec![BlockKind::Text, BlockKind::Code]);
        assert_eq!(blocks[0].raw_content(), "'}}' ");
    }

    #[test]
    fn second_opener_restarts_block() {
        let blocks = TemplateTokenizer::tokenize("{{ a {{$b}}").unwrap();
        assert_eq!(kinds(&blocks), vec![BlockKind::Text, BlockKind::Code]);
        assert_eq!(blocks[0].raw_content(), "{{ a ");
        assert_eq!(blocks[1].raw_content(), "$b");
    }

    #[test]
    fn unmatched_opener_becomes_invalid_code() {
        let blocks = TemplateTokenizer::tokenize("hello {{ world").unwrap();
        assert_eq!(kinds(&blocks), vec![BlockKind::Text, BlockKind::Code]);
        assert!(blocks[1].is_valid().is_err());
    }

    #[test]
    fn unmatched_blank_opener_is_still_code() {
        for template in ["{{", "Hello {{", "Hello {{   "] {
            let blocks = TemplateTokenizer::tokenize(template).unwrap();
            let last = blocks.last().unwrap();
            assert_eq!(last.kind(), BlockKind::Code, "{template:?}");
            assert!(last.is_valid().is_err(), "{template:?}");
        }
    }

    #[test]
    fn code_syntax_errors_surface() {
        let err = TemplateTokenizer::tokenize("{{ f 'a''b' }}").unwrap_err();
        assert!(matches!(err, TemplateError::Tokenize { .. }));
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let template = "héllo {{$wörld}} ✓";
        let blocks = TemplateTokenizer::tokenize(template).unwrap();
        let rebuilt: String = blocks
            .iter()
            .map(|b| match b {
                Block::Code(code) => format!("{{{{{}}}}}", code.raw_content()),
                other => other.raw_content().to_owned(),
            })
            .collect();
        assert_eq!(rebuilt, template);
    }
}
