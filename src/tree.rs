//! Builds a node tree from the token stream.
//!
//! Open tags go on an explicit stack and are popped by the nearest close
//! tag of the same name, so same-named tags pair innermost first. A tag
//! that never pairs is kept as an [`Node::Unmatched`] leaf holding its
//! source text, and its children are spliced into its parent.
use crate::{
    error::Diagnostic,
    parser::{escape_text, stars::no_parse_closes, Token, TokenKind},
    registry::TagRegistry,
};

/// Default limit on how many tags may be open at once.
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Escaped text, ready for output.
    Text(String),
    Tag(TagNode),
    /// Raw source of a tag token that never found its partner.
    Unmatched(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    /// Lowercased tag name.
    pub name: String,
    /// The `=value` suffix of the open tag, verbatim.
    pub params: Option<String>,
    pub children: Vec<Node>,
}

/// A parsed document: the children of the implicit root plus what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    /// Between a no-parse open tag and its close tag, both token indices.
    InsideNoParseTag { open: usize, close: usize },
    Done,
}

struct Frame<'t> {
    open: Token<'t>,
    children: Vec<Node>,
}

pub struct TreeBuilder<'a> {
    input: &'a str,
    registry: &'a TagRegistry,
    max_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    /// `input` must be the text the tokens were read from.
    pub fn new(input: &'a str, registry: &'a TagRegistry) -> Self {
        Self {
            input,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(&self, tokens: &[Token<'_>]) -> Document {
        let mut root = Vec::new();
        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut diagnostics = Vec::new();
        let closes = no_parse_closes(tokens, self.registry);

        let mut idx = 0;
        let mut state = State::Scanning;
        loop {
            state = match state {
                State::Scanning if idx >= tokens.len() => State::Done,
                State::Scanning => {
                    let token = &tokens[idx];
                    idx += 1;

                    match token.kind {
                        TokenKind::Text => {
                            push_text(current(&mut stack, &mut root), &escape_text(token.span));
                            State::Scanning
                        }
                        TokenKind::OpenBBTag(tag) if stack.len() >= self.max_depth => {
                            tracing::trace!(tag = tag.tag, offset = token.start, "nesting limit reached");
                            diagnostics.push(Diagnostic::DepthLimit {
                                tag: tag.tag.to_owned(),
                                offset: token.start,
                                max: self.max_depth,
                            });
                            current(&mut stack, &mut root).push(Node::Unmatched(token.span.to_owned()));
                            State::Scanning
                        }
                        TokenKind::OpenBBTag(_) => {
                            match closes[idx - 1] {
                                Some(close) => State::InsideNoParseTag {
                                    open: idx - 1,
                                    close,
                                },
                                None => {
                                    stack.push(Frame {
                                        open: *token,
                                        children: Vec::new(),
                                    });
                                    State::Scanning
                                }
                            }
                        }
                        TokenKind::CloseBBTag(tag) => {
                            match stack.iter().rposition(|x| x.open.is_open(tag.tag)) {
                                Some(pos) => {
                                    while stack.len() > pos + 1 {
                                        unwind(&mut stack, &mut root, &mut diagnostics);
                                    }
                                    if let Some(frame) = stack.pop() {
                                        let node = Node::Tag(TagNode {
                                            name: tag.tag.to_owned(),
                                            params: frame.open.args().map(str::to_owned),
                                            children: frame.children,
                                        });
                                        current(&mut stack, &mut root).push(node);
                                    }
                                }
                                // Closes inserted for list items carry no source text.
                                None if token.is_synthetic() => {}
                                None => {
                                    tracing::trace!(tag = tag.tag, offset = token.start, "unmatched close tag");
                                    diagnostics.push(Diagnostic::UnmatchedClose {
                                        tag: tag.tag.to_owned(),
                                        offset: token.start,
                                    });
                                    current(&mut stack, &mut root).push(Node::Unmatched(token.span.to_owned()));
                                }
                            }
                            State::Scanning
                        }
                    }
                }
                State::InsideNoParseTag { open, close } => {
                    let open_token = tokens[open];
                    let body = &self.input[open_token.end()..tokens[close].start];
                    let mut children = Vec::new();
                    push_text(&mut children, &escape_text(body));

                    let node = Node::Tag(TagNode {
                        name: open_token.tag_name().unwrap_or_default().to_owned(),
                        params: open_token.args().map(str::to_owned),
                        children,
                    });
                    current(&mut stack, &mut root).push(node);
                    idx = close + 1;
                    State::Scanning
                }
                State::Done => break,
            };
        }

        while !stack.is_empty() {
            unwind(&mut stack, &mut root, &mut diagnostics);
        }

        Document {
            children: root,
            diagnostics,
        }
    }
}

/// Pop the top frame as unmatched, giving its children to the frame below.
fn unwind(stack: &mut Vec<Frame<'_>>, root: &mut Vec<Node>, diagnostics: &mut Vec<Diagnostic>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let tag = frame.open.tag_name().unwrap_or_default();
    tracing::trace!(tag, offset = frame.open.start, "unmatched open tag");
    diagnostics.push(Diagnostic::UnmatchedOpen {
        tag: tag.to_owned(),
        offset: frame.open.start,
    });

    let parent = current(stack, root);
    parent.push(Node::Unmatched(frame.open.span.to_owned()));
    for child in frame.children {
        match child {
            Node::Text(text) => push_text(parent, &text),
            other => parent.push(other),
        }
    }
}

/// Children of the innermost open tag, or of the root.
fn current<'s>(stack: &'s mut [Frame<'_>], root: &'s mut Vec<Node>) -> &'s mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.children,
        None => root,
    }
}

/// Append text, merging with a preceding text node.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_owned()));
    }
}
