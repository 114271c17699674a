//! Tag definitions and the registry that resolves them.
use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
    sync::Arc,
};

use bitflags::bitflags;
use static_assertions::assert_impl_all;

use crate::{
    error::{DuplicateTagError, Error, Result},
    html::{FnTagWriter, HtmlTagWriter},
};

/// Name of the implicit container wrapping a whole document.
/// Only meaningful for parent restrictions; it never renders.
pub const ROOT_TAG: &str = "bbcode";

/// Name of the list-item tag, which may omit its close tag inside a list.
pub const STAR_TAG: &str = "*";

bitflags! {
    /// Behaviour switches for a single tag.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagFlags: u32 {
        /// Children are opaque text and never parsed as markup.
        const NO_PARSE = 1 << 0;
        /// Rendered children are passed to the writer but left out of the output.
        const HIDE_CONTENT = 1 << 1;
    }
}

/// A single tag: its name, how it renders and where it may appear.
#[derive(Clone)]
pub struct TagDefinition {
    name: String,
    writer: Arc<dyn HtmlTagWriter>,
    flags: TagFlags,
    allowed_children: BTreeSet<String>,
    allowed_parents: BTreeSet<String>,
}

impl TagDefinition {
    /// Create a definition rendered by `writer`. The name is stored lowercased.
    pub fn new(name: &str, writer: impl HtmlTagWriter + 'static) -> Self {
        Self::with_writer(name, Arc::new(writer))
    }

    /// Create a definition sharing an existing writer, e.g. for tag aliases.
    pub fn with_writer(name: &str, writer: Arc<dyn HtmlTagWriter>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            writer,
            flags: TagFlags::empty(),
            allowed_children: BTreeSet::new(),
            allowed_parents: BTreeSet::new(),
        }
    }

    /// Create a definition from a pair of plain render functions.
    ///
    /// Both receive the tag parameter (the `=value` suffix) and the rendered children.
    pub fn from_fns<O, C>(name: &str, open: O, close: C) -> Self
    where
        O: Fn(Option<&str>, &str) -> String + Send + Sync + 'static,
        C: Fn(Option<&str>, &str) -> String + Send + Sync + 'static,
    {
        Self::new(name, FnTagWriter::new(open, close))
    }

    /// Treat the tag's body as literal text.
    pub fn no_parse(mut self) -> Self {
        self.flags |= TagFlags::NO_PARSE;
        self
    }

    /// Keep the rendered body out of the output; the writer still sees it.
    pub fn hide_content(mut self) -> Self {
        self.flags |= TagFlags::HIDE_CONTENT;
        self
    }

    /// Restrict which tags may appear as direct children. Empty means unrestricted.
    pub fn allow_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_children
            .extend(children.into_iter().map(|x| x.as_ref().to_ascii_lowercase()));
        self
    }

    /// Restrict which tags may directly contain this one. Use [`ROOT_TAG`] for top level.
    pub fn allow_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_parents
            .extend(parents.into_iter().map(|x| x.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> TagFlags {
        self.flags
    }

    pub fn writer(&self) -> &dyn HtmlTagWriter {
        self.writer.as_ref()
    }

    pub fn is_no_parse(&self) -> bool {
        self.flags.contains(TagFlags::NO_PARSE)
    }

    pub fn display_content(&self) -> bool {
        !self.flags.contains(TagFlags::HIDE_CONTENT)
    }

    pub fn allowed_children(&self) -> &BTreeSet<String> {
        &self.allowed_children
    }

    pub fn allowed_parents(&self) -> &BTreeSet<String> {
        &self.allowed_parents
    }
}

impl fmt::Debug for TagDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDefinition")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("allowed_children", &self.allowed_children)
            .field("allowed_parents", &self.allowed_parents)
            .finish_non_exhaustive()
    }
}

/// Nesting restrictions resolved for one tag. `None` means unrestricted.
#[derive(Debug, Clone, Default)]
struct Restrictions {
    children: Option<HashSet<String>>,
    parents: Option<HashSet<String>>,
}

/// The set of known tags plus lookup tables derived from them.
///
/// Derived tables are rebuilt after every change, so a registry is always
/// internally consistent. Share it read-only across renders; see
/// [`BBCode`][crate::BBCode] for registering at runtime.
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, TagDefinition>,
    no_parse: HashSet<String>,
    restrictions: HashMap<String, Restrictions>,
    longest_name: usize,
}

assert_impl_all!(TagRegistry: Send, Sync);

impl TagRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the given definitions, failing on the first collision.
    pub fn with_tags(defs: impl IntoIterator<Item = TagDefinition>) -> Result<Self> {
        let mut registry = Self::new();
        registry.insert_all(defs, false)?;
        Ok(registry)
    }

    /// Register a tag. Fails if a tag with the same name already exists.
    pub fn register(&mut self, def: TagDefinition) -> Result<()> {
        self.insert_all([def], false)
    }

    /// Register a tag, replacing any existing definition with the same name.
    pub fn register_override(&mut self, def: TagDefinition) -> Result<()> {
        self.insert_all([def], true)
    }

    /// Register a batch of tags. Nothing is registered if any of them is rejected.
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = TagDefinition>,
        replace: bool,
    ) -> Result<()> {
        self.insert_all(defs, replace)
    }

    fn insert_all(
        &mut self,
        defs: impl IntoIterator<Item = TagDefinition>,
        replace: bool,
    ) -> Result<()> {
        let defs: Vec<TagDefinition> = defs.into_iter().collect();

        let mut batch = HashSet::with_capacity(defs.len());
        for def in &defs {
            check_name(&def.name)?;
            let taken = !replace && self.tags.contains_key(&def.name);
            if taken || !batch.insert(def.name.as_str()) {
                return Err(DuplicateTagError {
                    name: def.name.clone(),
                }
                .into());
            }
        }

        for def in defs {
            tracing::debug!(tag = %def.name, replace, "registering tag");
            self.tags.insert(def.name.clone(), def);
        }
        self.rebuild();
        Ok(())
    }

    /// Recompute every derived table from the definitions.
    fn rebuild(&mut self) {
        self.no_parse = self
            .tags
            .values()
            .filter(|x| x.is_no_parse())
            .map(|x| x.name.clone())
            .collect();

        self.restrictions = self
            .tags
            .values()
            .map(|def| {
                let resolve = |set: &BTreeSet<String>| {
                    (!set.is_empty()).then(|| set.iter().cloned().collect::<HashSet<_>>())
                };
                let restrictions = Restrictions {
                    children: resolve(&def.allowed_children),
                    parents: resolve(&def.allowed_parents),
                };
                (def.name.clone(), restrictions)
            })
            .collect();

        self.longest_name = self.tags.keys().map(|x| x.len()).max().unwrap_or(0);
        tracing::debug!(tags = self.tags.len(), "tag registry rebuilt");
    }

    /// Look up a tag by name, ignoring ASCII case.
    pub fn resolve(&self, name: &str) -> Option<&TagDefinition> {
        if name.is_empty() || name.len() > self.longest_name {
            return None;
        }
        self.tags.get(lowercase(name).as_ref())
    }

    pub fn is_no_parse(&self, name: &str) -> bool {
        self.no_parse.contains(lowercase(name).as_ref())
    }

    /// Whether `child` may appear directly inside `parent` according to `parent`.
    pub fn child_allowed(&self, parent: &str, child: &str) -> bool {
        match self.restrictions.get(parent).and_then(|x| x.children.as_ref()) {
            Some(allowed) => allowed.contains(child),
            None => true,
        }
    }

    /// Whether `child` accepts `parent` as its direct container.
    pub fn parent_allowed(&self, parent: &str, child: &str) -> bool {
        match self.restrictions.get(child).and_then(|x| x.parents.as_ref()) {
            Some(allowed) => allowed.contains(parent),
            None => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.values()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TagRegistry").field("tags", &names).finish()
    }
}

fn lowercase(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|x| x.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

fn check_name(name: &str) -> Result<()> {
    let bad_char = |c: char| c.is_whitespace() || matches!(c, '=' | '[' | ']' | '/');
    if name.is_empty() || name == ROOT_TAG || name.contains(bad_char) {
        return Err(Error::InvalidTagName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> TagDefinition {
        TagDefinition::from_fns(name, |_, _| "<x>".into(), |_, _| "</x>".into())
    }

    #[test]
    fn resolve_ignores_case() {
        let registry = TagRegistry::with_tags([plain("Quote")]).unwrap();
        assert_eq!(registry.resolve("QUOTE").unwrap().name(), "quote");
        assert!(registry.resolve("quotes").is_none());
    }

    #[test]
    fn duplicate_rejected() {
        let mut registry = TagRegistry::with_tags([plain("b")]).unwrap();
        let err = registry.register(plain("B")).unwrap_err();
        assert!(matches!(err, Error::DuplicateTag(DuplicateTagError { ref name }) if name == "b"));
        registry.register_override(plain("b").no_parse()).unwrap();
        assert!(registry.is_no_parse("b"));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut registry = TagRegistry::with_tags([plain("b")]).unwrap();
        assert!(registry.register_all([plain("i"), plain("b")], false).is_err());
        assert!(registry.resolve("i").is_none());

        assert!(registry.register_all([plain("u"), plain("u")], true).is_err());
        assert!(registry.resolve("u").is_none());
    }

    #[test]
    fn bad_names_rejected() {
        let mut registry = TagRegistry::new();
        for name in ["", "a b", "x=y", "[", "/b", "a/b", ROOT_TAG] {
            assert!(
                matches!(registry.register(plain(name)), Err(Error::InvalidTagName { .. })),
                "{name:?} should be rejected"
            );
        }
        registry.register(plain(STAR_TAG)).unwrap();
    }

    #[test]
    fn restrictions_rebuilt() {
        let mut registry = TagRegistry::with_tags([
            plain("list").allow_children([STAR_TAG]),
            plain(STAR_TAG).allow_parents(["LIST"]),
            plain("code").no_parse(),
        ])
        .unwrap();

        assert!(registry.child_allowed("list", "*"));
        assert!(!registry.child_allowed("list", "b"));
        assert!(registry.child_allowed("b", "list"));
        assert!(registry.parent_allowed("list", "*"));
        assert!(!registry.parent_allowed(ROOT_TAG, "*"));
        assert!(registry.is_no_parse("CODE"));

        registry.register_override(plain("list")).unwrap();
        assert!(registry.child_allowed("list", "b"));
    }
}
