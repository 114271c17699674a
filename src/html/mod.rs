//! HTML rendering of a parsed document.
//!
//! Tags render post-order: a tag's children are rendered first and the
//! resulting HTML is handed to its [`HtmlTagWriter`]. State that has to
//! flow between tags (row numbers, tab indices) lives in a per-render
//! [`RenderContext`] rather than in the writers.
use bitflags::bitflags;
use static_assertions::assert_obj_safe;

use crate::{
    error::{Diagnostic, Error, Result},
    parser::{escape_text, stars::expand_star_lists, BBParser},
    registry::TagRegistry,
    tree::{Document, Node, TagNode, TreeBuilder, DEFAULT_MAX_DEPTH},
    validate::validate,
};

/// The primary trait for converting BBCode tags to HTML.
pub trait HtmlTagWriter: Send + Sync {
    /// Called before the tag's children are rendered, with the tag's scope
    /// already on the context. Use it to claim positions that children need.
    fn enter(&self, _ctx: &mut RenderContext, _params: Option<&str>) {}

    /// Produce the opening HTML for a tag, pushing it into the given buffer.
    /// # Remarks
    /// `children` is the already rendered content of the tag. The `out` buffer
    /// may already have contents, an implementation must not overwrite them.
    fn open_tag(&self, ctx: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String);

    /// Produce the closing HTML for a tag, pushing it into the given buffer.
    /// # Remarks
    /// The `out` buffer may already have contents, an implementation must not overwrite them.
    fn close_tag(&self, ctx: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String);
}

assert_obj_safe!(HtmlTagWriter);

/// A tag writer built from two plain functions of `(params, children)`.
pub struct FnTagWriter<O, C> {
    open: O,
    close: C,
}

impl<O, C> FnTagWriter<O, C>
where
    O: Fn(Option<&str>, &str) -> String + Send + Sync,
    C: Fn(Option<&str>, &str) -> String + Send + Sync,
{
    pub fn new(open: O, close: C) -> Self {
        Self { open, close }
    }
}

impl<O, C> HtmlTagWriter for FnTagWriter<O, C>
where
    O: Fn(Option<&str>, &str) -> String + Send + Sync,
    C: Fn(Option<&str>, &str) -> String + Send + Sync,
{
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String) {
        out.push_str(&(self.open)(params, children));
    }

    fn close_tag(&self, _: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String) {
        out.push_str(&(self.close)(params, children));
    }
}

/// Render-time state of one tag node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    tag: String,
    index: Option<usize>,
    claims: usize,
    id: Option<usize>,
}

impl Scope {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Position claimed within an ancestor, see [`RenderContext::claim_index`].
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// How many descendants have claimed a position in this scope so far.
    pub fn claims(&self) -> usize {
        self.claims
    }

    pub fn id(&self) -> Option<usize> {
        self.id
    }
}

/// Mutable state threaded through a single render.
///
/// Holds one [`Scope`] per tag currently being rendered, innermost last.
#[derive(Debug, Default)]
pub struct RenderContext {
    scopes: Vec<Scope>,
    next_id: usize,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, tag: &str) {
        self.scopes.push(Scope {
            tag: tag.to_owned(),
            ..Default::default()
        });
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Scope of the tag being rendered.
    pub fn current(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    /// Nearest ancestor of the current tag with the given name.
    pub fn enclosing(&self, tag: &str) -> Option<&Scope> {
        let (_, ancestors) = self.scopes.split_last()?;
        ancestors.iter().rev().find(|x| x.tag == tag)
    }

    /// Number the current tag among the tags that claimed a position in the
    /// nearest `ancestor`, starting at zero. The result is also stored as the
    /// current scope's [`Scope::index`].
    pub fn claim_index(&mut self, ancestor: &str) -> Option<usize> {
        let (current, ancestors) = self.scopes.split_last_mut()?;
        let owner = ancestors.iter_mut().rev().find(|x| x.tag == ancestor)?;
        let index = owner.claims;
        owner.claims += 1;
        current.index = Some(index);
        Some(index)
    }

    /// Give the current tag an id unique within this render, or return the one it has.
    pub fn assign_id(&mut self) -> usize {
        if let Some(id) = self.current().and_then(Scope::id) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.id = Some(id);
        }
        id
    }
}

bitflags! {
    /// Optional output transformations.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct RenderFeature: u32 {
        /// Wrap the output in a whitespace-preserving block.
        const ADD_LINE_BREAKS = 1 << 0;
        /// Drop unmatched tags and leftover bracket runs from the output.
        const STRIP_MISALIGNED_TAGS = 1 << 1;
    }
}

/// Per-render configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RenderOptions {
    pub features: RenderFeature,
    /// Reject input longer than this many bytes before parsing.
    pub max_input_len: Option<usize>,
    /// Maximum number of simultaneously open tags.
    pub max_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            features: RenderFeature::empty(),
            max_input_len: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RenderOptions {
    pub fn with_line_breaks(mut self) -> Self {
        self.features |= RenderFeature::ADD_LINE_BREAKS;
        self
    }

    pub fn with_strip_misaligned_tags(mut self) -> Self {
        self.features |= RenderFeature::STRIP_MISALIGNED_TAGS;
        self
    }

    pub fn with_max_input_len(mut self, max: usize) -> Self {
        self.max_input_len = Some(max);
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub fn add_line_breaks(&self) -> bool {
        self.features.contains(RenderFeature::ADD_LINE_BREAKS)
    }

    pub fn strip_misaligned_tags(&self) -> bool {
        self.features.contains(RenderFeature::STRIP_MISALIGNED_TAGS)
    }
}

/// Rendered HTML plus everything that looked wrong along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderOutput {
    /// Diagnostics as display strings, in the order they were found.
    pub fn errors(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Renders markup against a fixed registry.
#[derive(Debug, Clone, Copy)]
pub struct HtmlRenderer<'r> {
    registry: &'r TagRegistry,
}

impl<'r> HtmlRenderer<'r> {
    pub fn new(registry: &'r TagRegistry) -> Self {
        Self { registry }
    }

    /// Run the whole pipeline: tokenize, close list items, build, validate, render.
    ///
    /// Bad markup never fails; the only error is input over `max_input_len`.
    pub fn render(&self, text: &str, options: &RenderOptions) -> Result<RenderOutput> {
        if let Some(max) = options.max_input_len {
            if text.len() > max {
                return Err(Error::InputTooLarge {
                    len: text.len(),
                    max,
                });
            }
        }

        let tokens = BBParser::new(text, self.registry).collect();
        let tokens = expand_star_lists(tokens, self.registry);
        let mut doc = TreeBuilder::new(text, self.registry)
            .with_max_depth(options.max_depth)
            .build(&tokens);
        validate(&doc.children, self.registry, &mut doc.diagnostics);

        Ok(self.render_document(doc, options))
    }

    /// Render an already built document.
    pub fn render_document(&self, doc: Document, options: &RenderOptions) -> RenderOutput {
        let Document {
            children,
            mut diagnostics,
        } = doc;

        let strip = options.strip_misaligned_tags();
        let mut ctx = RenderContext::new();
        let mut body = String::new();
        self.render_nodes(&children, &mut ctx, strip, &mut body);

        if body.contains(['[', ']']) {
            diagnostics.push(Diagnostic::Misaligned);
            if strip {
                body = strip_bracket_runs(&body);
            }
        }

        let html = if options.add_line_breaks() {
            format!("<div style=\"white-space: pre-wrap;\">{body}</div>")
        } else {
            body
        };

        RenderOutput { html, diagnostics }
    }

    fn render_nodes(&self, nodes: &[Node], ctx: &mut RenderContext, strip: bool, out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Unmatched(raw) if !strip => out.push_str(&escape_text(raw)),
                Node::Unmatched(_) => {}
                Node::Tag(tag) => self.render_tag(tag, ctx, strip, out),
            }
        }
    }

    fn render_tag(&self, node: &TagNode, ctx: &mut RenderContext, strip: bool, out: &mut String) {
        let Some(def) = self.registry.resolve(&node.name) else {
            // Built against another registry; keep the content at least.
            self.render_nodes(&node.children, ctx, strip, out);
            return;
        };
        let writer = def.writer();
        let params = node.params.as_deref();

        ctx.push(def.name());
        writer.enter(ctx, params);

        let mut children = String::new();
        if def.is_no_parse() {
            for child in &node.children {
                match child {
                    Node::Text(text) => children.push_str(text),
                    Node::Unmatched(raw) => children.push_str(&escape_text(raw)),
                    Node::Tag(_) => {}
                }
            }
        } else {
            self.render_nodes(&node.children, ctx, strip, &mut children);
        }

        writer.open_tag(ctx, params, &children, out);
        if def.display_content() {
            out.push_str(&children);
        }
        writer.close_tag(ctx, params, &children, out);
        ctx.pop();
    }
}

/// Remove every `[...]` run; a bracket without a partner is dropped alone.
fn strip_bracket_runs(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(idx) = rest.find(['[', ']']) {
        out.push_str(&rest[..idx]);
        let after = &rest[(idx + 1)..];
        rest = match (rest.as_bytes()[idx], after.find(']')) {
            (b'[', Some(end)) => &after[(end + 1)..],
            _ => after,
        };
    }
    out.push_str(rest);
    out
}

/// Escape a tag parameter or rendered body for use inside a double-quoted attribute.
///
/// Entities already present are decoded first so they are not escaped twice.
pub fn escape_attribute(value: &str) -> String {
    let decoded = html_escape::decode_html_entities(value);
    escape_text(&html_escape::encode_double_quoted_attribute(&decoded)).into_owned()
}

/// Escape a tag parameter for use as element content.
pub fn escape_param(value: &str) -> String {
    let decoded = html_escape::decode_html_entities(value);
    escape_text(&html_escape::encode_text(&decoded)).into_owned()
}

#[cfg(feature = "builtins")]
pub mod builtins;
