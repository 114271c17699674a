//! Closes `[*]` list items that the author left open.
//!
//! Within a matched `[list]...[/list]` pair, an item runs until the next
//! `[*]` or the end of its list. Inner lists are tracked on their own
//! frame, so nested lists close their items before the outer list does.
use std::collections::HashMap;

use crate::registry::{TagRegistry, STAR_TAG};

use super::{Token, TokenKind};

const LIST_TAG: &str = "list";

/// For every no-parse open token, the index of the first close token of the
/// same name after it. Built in one right-to-left pass.
pub(crate) fn no_parse_closes(tokens: &[Token<'_>], registry: &TagRegistry) -> Vec<Option<usize>> {
    let mut closes = vec![None; tokens.len()];
    let mut nearest: HashMap<String, usize> = HashMap::new();

    for (idx, token) in tokens.iter().enumerate().rev() {
        match token.kind {
            TokenKind::CloseBBTag(tag) if registry.is_no_parse(tag.tag) => {
                nearest.insert(tag.tag.to_ascii_lowercase(), idx);
            }
            TokenKind::OpenBBTag(tag) if registry.is_no_parse(tag.tag) => {
                closes[idx] = nearest.get(&tag.tag.to_ascii_lowercase()).copied();
            }
            _ => {}
        }
    }

    closes
}

/// Marks which list tags have a partner, ignoring no-parse spans.
fn pair_lists(tokens: &[Token<'_>], closes: &[Option<usize>]) -> Vec<bool> {
    let mut paired = vec![false; tokens.len()];
    let mut open = Vec::new();

    let mut idx = 0;
    while idx < tokens.len() {
        if let Some(close) = closes[idx] {
            idx = close + 1;
            continue;
        }
        let token = &tokens[idx];
        if token.is_open(LIST_TAG) {
            open.push(idx);
        } else if token.is_close(LIST_TAG) {
            if let Some(start) = open.pop() {
                paired[start] = true;
                paired[idx] = true;
            }
        }
        idx += 1;
    }

    paired
}

/// Rewrite the token stream so every list item inside a list has a close token.
pub(crate) fn expand_star_lists<'a>(tokens: Vec<Token<'a>>, registry: &TagRegistry) -> Vec<Token<'a>> {
    if !tokens.iter().any(|x| x.is_open(STAR_TAG)) {
        return tokens;
    }

    let closes = no_parse_closes(&tokens, registry);
    let paired = pair_lists(&tokens, &closes);
    let mut out = Vec::with_capacity(tokens.len() + 8);
    // One entry per open list: whether it currently has an open item.
    let mut frames: Vec<bool> = Vec::new();

    let mut idx = 0;
    while idx < tokens.len() {
        if let Some(close) = closes[idx] {
            out.extend_from_slice(&tokens[idx..=close]);
            idx = close + 1;
            continue;
        }

        let token = tokens[idx];
        if token.is_open(LIST_TAG) && paired[idx] {
            frames.push(false);
        } else if token.is_close(LIST_TAG) && paired[idx] {
            if frames.pop() == Some(true) {
                out.push(Token::synthetic_close(STAR_TAG, token.start));
            }
        } else if let Some(item_open) = frames.last_mut() {
            if token.is_open(STAR_TAG) {
                if *item_open {
                    out.push(Token::synthetic_close(STAR_TAG, token.start));
                }
                *item_open = true;
            } else if token.is_close(STAR_TAG) {
                *item_open = false;
            }
        }

        out.push(token);
        idx += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::BBParser, registry::TagDefinition};

    fn registry() -> TagRegistry {
        let plain = |name: &str| TagDefinition::from_fns(name, |_, _| String::new(), |_, _| String::new());
        TagRegistry::with_tags([plain("list"), plain("*"), plain("b"), plain("code").no_parse()]).unwrap()
    }

    /// Re-serialize tokens so the expansion is easy to read.
    fn expand(input: &str) -> String {
        let registry = registry();
        let tokens = BBParser::new(input, &registry).collect();
        expand_star_lists(tokens, &registry)
            .iter()
            .map(|x| if x.is_synthetic() { "[/*]" } else { x.span })
            .collect()
    }

    #[test]
    fn flat_list() {
        assert_eq!(expand("[list][*]a[*]b[/list]"), "[list][*]a[/*][*]b[/*][/list]");
    }

    #[test]
    fn explicit_close_kept() {
        assert_eq!(expand("[list][*]a[/*][*]b[/list]"), "[list][*]a[/*][*]b[/*][/list]");
    }

    #[test]
    fn nested_lists() {
        assert_eq!(
            expand("[list][*]x[list][*]c[*]d[/list][*]y[/list]"),
            "[list][*]x[list][*]c[/*][*]d[/*][/list][/*][*]y[/*][/list]"
        );
        assert_eq!(
            expand("[list][*][list][*]c[/list][/*][/list]"),
            "[list][*][list][*]c[/*][/list][/*][/list]"
        );
    }

    #[test]
    fn outside_list_untouched() {
        assert_eq!(expand("[*]a[*]b"), "[*]a[*]b");
        assert_eq!(expand("[list][*]a"), "[list][*]a");
    }

    #[test]
    fn no_parse_close_table() {
        let registry = registry();
        let tokens: Vec<_> = BBParser::new("[code]a[CODE]b[/code]c[/Code][code]", &registry).collect();
        let closes = no_parse_closes(&tokens, &registry);
        // [code] a [CODE] b [/code] c [/Code] [code]
        assert_eq!(closes, vec![Some(4), None, Some(4), None, None, None, None, None]);
    }

    #[test]
    fn unclosed_no_parse_tags_in_list() {
        let input = format!("[list][*]{}", "[code]".repeat(20_000));
        let expanded = expand(&input);
        assert_eq!(expanded, input);
    }

    #[test]
    fn no_parse_span_untouched() {
        assert_eq!(
            expand("[list][*][code][*]x[/code][/list]"),
            "[list][*][code][*]x[/code][/*][/list]"
        );
    }
}
