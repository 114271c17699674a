//! BBCode to HTML rendering with nesting rules and caller-defined tags.
//!
//! Input goes through a fixed pipeline:
//!
//! 1. [`BBParser`] splits text into tokens, recognising only registered tags.
//! 2. `[*]` list items left open inside a `[list]` get their close tags.
//! 3. [`TreeBuilder`] pairs open and close tags on a stack into a [`Node`] tree.
//!    `no_parse` tags keep their body as text.
//! 4. Nesting restrictions are checked, producing [`Diagnostic`]s.
//! 5. [`HtmlRenderer`] walks the tree and asks each tag's [`HtmlTagWriter`] for HTML.
//!
//! Bad markup never fails a render. Whatever could not be matched is shown
//! as escaped text and reported in [`RenderOutput::diagnostics`].
//!
//! ```
//! use bbrender::{BBCode, RenderOptions};
//!
//! let bbcode = BBCode::with_builtins();
//! let out = bbcode.render("[b]Hello[/b] <world>", &RenderOptions::default()).unwrap();
//! assert_eq!(out.html, "<b>Hello</b> &lt;world&gt;");
//! assert!(!out.has_errors());
//! ```

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use static_assertions::assert_impl_all;

mod error;
pub mod html;
mod parser;
pub mod registry;
mod tree;
mod validate;

pub use error::{Diagnostic, DuplicateTagError, Error, Result};
#[cfg(feature = "builtins")]
pub use html::builtins;
pub use html::{
    escape_attribute, escape_param, FnTagWriter, HtmlRenderer, HtmlTagWriter, RenderContext,
    RenderFeature, RenderOptions, RenderOutput, Scope,
};
pub use parser::{escape_text, BBParser, BBTag, Token, TokenKind};
pub use registry::{TagDefinition, TagFlags, TagRegistry, ROOT_TAG, STAR_TAG};
pub use tree::{Document, Node, TagNode, TreeBuilder, DEFAULT_MAX_DEPTH};
pub use validate::validate;

/// A renderer with a registry that can be extended while renders are running.
///
/// Renders work on a snapshot of the registry. Registration builds a new
/// registry and swaps it in, so a render never sees a half-rebuilt one.
#[derive(Debug, Default)]
pub struct BBCode {
    registry: RwLock<Arc<TagRegistry>>,
}

assert_impl_all!(BBCode: Send, Sync);

impl BBCode {
    /// A renderer with no tags: every bracket is literal text.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: TagRegistry) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    /// A renderer with every tag from [`builtins::all_tags`].
    #[cfg(feature = "builtins")]
    pub fn with_builtins() -> Self {
        let mut registry = TagRegistry::new();
        if let Err(err) = registry.register_all(builtins::all_tags(), true) {
            tracing::error!(%err, "built-in tags rejected");
        }
        Self::with_registry(registry)
    }

    /// The registry as of now. Later registrations do not affect the snapshot.
    pub fn registry(&self) -> Arc<TagRegistry> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render `text` to HTML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputTooLarge`] if `options.max_input_len` is set and exceeded.
    /// Problems in the markup itself are reported as diagnostics, never as errors.
    #[tracing::instrument(skip_all, fields(len = text.len()))]
    pub fn render(&self, text: &str, options: &RenderOptions) -> Result<RenderOutput> {
        let registry = self.registry();
        let out = HtmlRenderer::new(&registry).render(text, options)?;
        if out.has_errors() {
            tracing::debug!(diagnostics = out.diagnostics.len(), "rendered with diagnostics");
        }
        Ok(out)
    }

    /// Register caller-defined tags. Nothing is registered if any name is taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTag`] on a name collision and
    /// [`Error::InvalidTagName`] for names the tokenizer could never match.
    pub fn register_tags(&self, defs: impl IntoIterator<Item = TagDefinition>) -> Result<()> {
        self.update(defs, false)
    }

    /// Register caller-defined tags, replacing existing definitions of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTagName`] for names the tokenizer could never match,
    /// or [`Error::DuplicateTag`] if the batch names a tag twice.
    pub fn register_tags_override(&self, defs: impl IntoIterator<Item = TagDefinition>) -> Result<()> {
        self.update(defs, true)
    }

    fn update(&self, defs: impl IntoIterator<Item = TagDefinition>, replace: bool) -> Result<()> {
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = TagRegistry::clone(&guard);
        next.register_all(defs, replace)?;
        *guard = Arc::new(next);
        Ok(())
    }

    /// A snapshot of every registered tag, keyed by name.
    pub fn list_tags(&self) -> BTreeMap<String, TagDefinition> {
        self.registry()
            .iter()
            .map(|x| (x.name().to_owned(), x.clone()))
            .collect()
    }
}
