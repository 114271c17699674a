//! Tokenizer for bracket-tag markup.
//!
//! Only tags known to the [`TagRegistry`] become tag tokens. Any other
//! bracket run, including typo'd tag names, stays in a [`TokenKind::Text`]
//! token and is entity-escaped later by [`escape_text`].
use std::borrow::Cow;

use crate::registry::TagRegistry;

pub(crate) mod stars;

/// A recognised tag, as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBTag<'a> {
    /// Lowercased tag name, as registered.
    pub tag: &'a str,
    /// Everything after the `=` on an open tag, verbatim.
    pub args: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    OpenBBTag(BBTag<'a>),
    CloseBBTag(BBTag<'a>),
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Source text of the token. Empty for tokens synthesized by the parser.
    pub span: &'a str,
    /// Byte offset of the token in the input.
    pub start: usize,
    pub kind: TokenKind<'a>,
}

impl<'a> Token<'a> {
    pub(crate) fn synthetic_close(tag: &'a str, start: usize) -> Self {
        Self {
            span: "",
            start,
            kind: TokenKind::CloseBBTag(BBTag { tag, args: None }),
        }
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.start + self.span.len()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Text)
    }

    pub fn is_synthetic(&self) -> bool {
        self.span.is_empty() && !self.is_text()
    }

    pub fn tag_name(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::OpenBBTag(t) | TokenKind::CloseBBTag(t) => Some(t.tag),
            TokenKind::Text => None,
        }
    }

    pub fn args(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::OpenBBTag(t) => t.args,
            _ => None,
        }
    }

    pub fn is_open(&self, tag: &str) -> bool {
        matches!(self.kind, TokenKind::OpenBBTag(t) if t.tag.eq_ignore_ascii_case(tag))
    }

    pub fn is_open_argless(&self, tag: &str) -> bool {
        self.is_open(tag) && self.args().is_none()
    }

    pub fn is_close(&self, tag: &str) -> bool {
        matches!(self.kind, TokenKind::CloseBBTag(t) if t.tag.eq_ignore_ascii_case(tag))
    }
}

/// Splits input into text and tag tokens.
#[doc(alias = "tokenizer")]
pub struct BBParser<'a> {
    input: &'a str,
    registry: &'a TagRegistry,
    loc: usize,
}

impl<'a> BBParser<'a> {
    pub fn new(input: &'a str, registry: &'a TagRegistry) -> Self {
        Self {
            input,
            registry,
            loc: 0,
        }
    }

    /// Returns all input text left to parse
    pub fn remaining(&self) -> &'a str {
        &self.input[self.loc..]
    }

    /// Try to read a tag at the start of `rem`, which begins with `[`.
    /// Returns the tag and the length of its source text.
    fn match_tag(&self, rem: &'a str) -> Option<(TokenKind<'a>, usize)> {
        let inner = &rem["[".len()..];
        let end = inner.find(['[', ']'])?;
        if inner.as_bytes()[end] != b']' {
            return None;
        }
        let contents = &inner[..end];
        let span_len = end + "[]".len();

        if let Some(name) = contents.strip_prefix('/') {
            let def = self.registry.resolve(name)?;
            let tag = BBTag {
                tag: def.name(),
                args: None,
            };
            return Some((TokenKind::CloseBBTag(tag), span_len));
        }

        let (name, args) = match contents.find(['=', ' ']) {
            None => (contents, None),
            Some(idx) if contents.as_bytes()[idx] == b'=' => {
                (&contents[..idx], Some(&contents[(idx + 1)..]))
            }
            Some(idx) => {
                // `[tag attr=value]`; the attribute name itself is not kept.
                let attr = contents[(idx + 1)..].trim_start();
                let eq = attr.find('=')?;
                let key = &attr[..eq];
                if key.is_empty() || key.contains(char::is_whitespace) {
                    return None;
                }
                (&contents[..idx], Some(&attr[(eq + 1)..]))
            }
        };

        let def = self.registry.resolve(name)?;
        let tag = BBTag {
            tag: def.name(),
            args,
        };
        Some((TokenKind::OpenBBTag(tag), span_len))
    }
}

impl<'a> Iterator for BBParser<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        const TAG_OPENER: char = '[';

        let rem = self.remaining();
        if rem.is_empty() {
            return None;
        }

        if rem.starts_with(TAG_OPENER) {
            if let Some((kind, len)) = self.match_tag(rem) {
                let start = self.loc;
                self.loc += len;
                return Some(Token {
                    span: &rem[..len],
                    start,
                    kind,
                });
            }
        }

        // Not a tag: run to the next opener, skipping one we may be sitting on.
        let skip = usize::from(rem.starts_with(TAG_OPENER));
        let segment_end = rem[skip..]
            .find(TAG_OPENER)
            .map(|x| x + skip)
            .unwrap_or(rem.len());

        let start = self.loc;
        self.loc += segment_end;
        Some(Token {
            span: &rem[..segment_end],
            start,
            kind: TokenKind::Text,
        })
    }
}

/// Entity-escape angle and square brackets so that text can never be read as markup.
///
/// Nothing else is touched: existing entities pass through unchanged.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    const SPECIAL: [char; 4] = ['<', '>', '[', ']'];

    let Some(first) = text.find(SPECIAL) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..first]);
    for c in text[first..].chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '[' => out.push_str("&#91;"),
            ']' => out.push_str("&#93;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests;
