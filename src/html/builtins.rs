//! Built-in implementations of common (i.e. used by many forums, subjectively) BBCode tags.
use std::sync::Arc;

use crate::registry::{TagDefinition, STAR_TAG};

use super::{escape_attribute, escape_param, HtmlTagWriter, RenderContext, Scope};

macro_rules! simple_tag {
    ($doc:expr, $name:ident, $tags:expr, $open:expr, $close:expr) => {
        #[derive(Copy, Clone, Debug, Default)]
        #[doc = $doc]
        #[doc = "<br/>"]
        #[doc = "This matches the following BBCode tags: `"]
        #[doc = stringify!($tags)]
        #[doc = "`"]
        #[doc = "# Exact output"]
        #[doc = "This tag converts exactly to"]
        #[doc = "```html"]
        #[doc = $open]
        #[doc = " contents"]
        #[doc = $close]
        #[doc = "```"]
        pub struct $name;

        impl $name {
            pub const TAGS: &'static [&'static str] = &$tags;
        }

        impl HtmlTagWriter for $name {
            fn open_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
                out.push_str($open);
            }

            fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
                out.push_str($close);
            }
        }
    };
}

simple_tag!{
    "A bold tag with no arguments, which converts directly to HTML5 `<b>`.",
    BoldTag, ["b", "bold"], "<b>", "</b>"
}
simple_tag!{
    "An italic tag with no arguments, which converts directly to HTML5 `<i>`.",
    ItalicTag, ["i", "italic"], "<i>", "</i>"
}
simple_tag!{
    "An underline tag no arguments, which converts directly to HTML5 `<u>`.",
    UnderlineTag, ["u", "underline"], "<u>", "</u>"
}
simple_tag!{
    "A strikethrough tag with no arguments, which converts directly to HTML5 `<s>`.",
    StrikeTag, ["s", "strike"], "<s>", "</s>"
}
simple_tag!{
    "Inline quote tag with no arguments, which converts directly to HTML5 `<q>`.",
    InlineQuoteTag, ["q"], "<q>", "</q>"
}
simple_tag!{
    "Subscript tag with no arguments, which converts directly to HTML5 `<sub>`.",
    SubscriptTag, ["sub", "subscript"], "<sub>", "</sub>"
}
simple_tag!{
    "Superscript tag with no arguments, which converts directly to HTML5 `<sup>`.",
    SuperscriptTag, ["sup", "superscript"], "<sup>", "</sup>"
}
simple_tag!{
    "Header (tier 1) tag with no arguments, which converts directly to HTML5 `<h1>`.",
    Header1Tag, ["h1"], "<h1>", "</h1>"
}
simple_tag!{
    "Header (tier 2) tag with no arguments, which converts directly to HTML5 `<h2>`.",
    Header2Tag, ["h2"], "<h2>", "</h2>"
}
simple_tag!{
    "Header (tier 3) tag with no arguments, which converts directly to HTML5 `<h3>`.",
    Header3Tag, ["h3"], "<h3>", "</h3>"
}
simple_tag!{
    "Header (tier 4) tag with no arguments, which converts directly to HTML5 `<h4>`.",
    Header4Tag, ["h4"], "<h4>", "</h4>"
}
simple_tag!{
    "Header (tier 5) tag with no arguments, which converts directly to HTML5 `<h5>`.",
    Header5Tag, ["h5"], "<h5>", "</h5>"
}
simple_tag!{
    "Header (tier 6) tag with no arguments, which converts directly to HTML5 `<h6>`.",
    Header6Tag, ["h6"], "<h6>", "</h6>"
}
simple_tag!{
    "Centering tag with no arguments, which converts to a div with styling to horizontally center it.",
    CenterTag, ["center"], "<div style=\"display: flex; justify-content: center;\"><div>", "</div></div>"
}
simple_tag!{
    "Left-align tag with no arguments, which converts to a div with styling to left-align it.",
    LeftTag, ["left"], "<div style=\"display: flex; justify-content: left;\"><div>", "</div></div>"
}
simple_tag!{
    "Right-align tag with no arguments, which converts to a div with styling to right-align it.",
    RightTag, ["right"], "<div style=\"display: flex; justify-content: right;\"><div>", "</div></div>"
}
simple_tag!{
    "Preformatted styling tag with no arguments, which converts directly to HTML5 `<pre>`.",
    PreformattedTag, ["pre"], "<pre>", "</pre>"
}
simple_tag!{
    "Keypress styling tag with no arguments, which converts directly to HTML5 `<kbd>`.",
    KbdTag, ["kbd"], "<kbd>", "</kbd>"
}
simple_tag!{
    "Inline code tag. Registered as no-parse, so its body is shown verbatim.",
    InlineCodeTag, ["icode"], "<code>", "</code>"
}
simple_tag!{
    "Disables markup for its body without adding any HTML.",
    NoParseTag, ["noparse"], "", ""
}
simple_tag!{
    "List item. The close tag may be omitted inside a `[list]`.",
    ListItemTag, ["*"], "<li>", "</li>"
}
simple_tag!{
    "Table wrapper. Only accepts `[tr]` children.",
    TableTag, ["table"], "<table>", "</table>"
}
simple_tag!{
    "Explicit table header cell.",
    HeaderCellTag, ["th"], "<th>", "</th>"
}

/// Block quote, `[quote]` or `[quote=author]`.
#[derive(Copy, Clone, Debug, Default)]
pub struct QuoteTag;

impl HtmlTagWriter for QuoteTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        out.push_str("<blockquote>");
        if let Some(author) = params.filter(|x| !x.trim().is_empty()) {
            out.push_str("<cite>");
            out.push_str(&escape_param(author.trim()));
            out.push_str("</cite>");
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</blockquote>");
    }
}

/// Check a link target and prepare it for an attribute.
/// Anything with a scheme other than http(s), mailto or ftp is refused.
pub fn safe_url(url: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(url);
    let url = decoded.trim();
    if url.is_empty() {
        return None;
    }

    if let Some(idx) = url.find([':', '/', '?', '#']) {
        if url.as_bytes()[idx] == b':' {
            let scheme = url[..idx].to_ascii_lowercase();
            if !matches!(scheme.as_str(), "http" | "https" | "mailto" | "ftp") {
                return None;
            }
        }
    }
    Some(escape_attribute(url))
}

/// Hyperlink, `[url]target[/url]` or `[url=target]text[/url]`.
#[derive(Copy, Clone, Debug, Default)]
pub struct UrlTag;

impl HtmlTagWriter for UrlTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String) {
        // A body holding markup is never a link target.
        let target = params.or(Some(children).filter(|x| !x.contains('<')));
        match target.and_then(safe_url) {
            Some(href) => {
                out.push_str("<a href=\"");
                out.push_str(&href);
                out.push_str("\" rel=\"nofollow noopener\">");
            }
            None => out.push_str("<a rel=\"nofollow\">"),
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</a>");
    }
}

/// Image, `[img]src[/img]` or `[img=src][/img]`. Registered with hidden content:
/// the body is the source, never visible text.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImageTag;

impl HtmlTagWriter for ImageTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, children: &str, out: &mut String) {
        if let Some(src) = safe_url(params.unwrap_or(children)) {
            out.push_str("<img src=\"");
            out.push_str(&src);
            out.push_str("\" alt=\"\">");
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, _: &mut String) {}
}

/// Text color, `[color=red]` or `[color=#ff8800]`. Unknown values render an unstyled span.
#[derive(Copy, Clone, Debug, Default)]
pub struct ColorTag;

fn css_color(value: &str) -> Option<&str> {
    let value = value.trim();
    let valid = match value.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|x| x.is_ascii_hexdigit()),
        None => (1..=20).contains(&value.len()) && value.chars().all(|x| x.is_ascii_alphabetic()),
    };
    valid.then_some(value)
}

impl HtmlTagWriter for ColorTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        match params.and_then(css_color) {
            Some(color) => {
                out.push_str("<span style=\"color: ");
                out.push_str(color);
                out.push_str(";\">");
            }
            None => out.push_str("<span>"),
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</span>");
    }
}

/// Font size on the classic 1 to 7 scale, `[size=5]`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SizeTag;

const SIZE_PERCENT: [u32; 7] = [60, 80, 100, 120, 150, 200, 300];

impl HtmlTagWriter for SizeTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        let percent = params
            .and_then(|x| x.trim().parse::<usize>().ok())
            .and_then(|x| x.checked_sub(1))
            .and_then(|x| SIZE_PERCENT.get(x));
        match percent {
            Some(percent) => out.push_str(&format!("<span style=\"font-size: {percent}%;\">")),
            None => out.push_str("<span>"),
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</span>");
    }
}

/// Collapsible spoiler, `[spoiler]` or `[spoiler=summary]`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpoilerTag;

impl HtmlTagWriter for SpoilerTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        let summary = params
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(escape_param)
            .unwrap_or_else(|| "Spoiler".to_owned());
        out.push_str("<details class=\"spoiler\"><summary>");
        out.push_str(&summary);
        out.push_str("</summary>");
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</details>");
    }
}

/// Code block, `[code]` or `[code=language]`. Registered as no-parse.
#[derive(Copy, Clone, Debug, Default)]
pub struct CodeTag;

impl HtmlTagWriter for CodeTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        let language = params.map(str::trim).filter(|x| {
            !x.is_empty() && x.chars().all(|c| c.is_ascii_alphanumeric() || "+#-_".contains(c))
        });
        match language {
            Some(language) => {
                out.push_str("<pre><code class=\"language-");
                out.push_str(&language.to_ascii_lowercase());
                out.push_str("\">");
            }
            None => out.push_str("<pre><code>"),
        }
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</code></pre>");
    }
}

/// List, `[list]` for bullets or `[list=1|a|A|i|I]` for an ordered list.
#[derive(Copy, Clone, Debug, Default)]
pub struct ListTag;

fn ordered_type(params: Option<&str>) -> Option<&'static str> {
    match params?.trim() {
        "1" => Some("1"),
        "a" => Some("a"),
        "A" => Some("A"),
        "i" => Some("i"),
        "I" => Some("I"),
        _ => None,
    }
}

impl HtmlTagWriter for ListTag {
    fn open_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        match ordered_type(params) {
            Some("1") => out.push_str("<ol>"),
            Some(kind) => out.push_str(&format!("<ol type=\"{kind}\">")),
            None => out.push_str("<ul>"),
        }
    }

    fn close_tag(&self, _: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        match ordered_type(params) {
            Some(_) => out.push_str("</ol>"),
            None => out.push_str("</ul>"),
        }
    }
}

/// Table row. Rows are numbered per table so each table has its own header row.
#[derive(Copy, Clone, Debug, Default)]
pub struct RowTag;

impl HtmlTagWriter for RowTag {
    fn enter(&self, ctx: &mut RenderContext, _: Option<&str>) {
        ctx.claim_index("table");
    }

    fn open_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("<tr>");
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</tr>");
    }
}

/// Table cell. Cells in the first row of a table render as header cells.
#[derive(Copy, Clone, Debug, Default)]
pub struct CellTag;

fn in_header_row(ctx: &RenderContext) -> bool {
    ctx.enclosing("tr").and_then(Scope::index) == Some(0)
}

impl HtmlTagWriter for CellTag {
    fn open_tag(&self, ctx: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str(if in_header_row(ctx) { "<th>" } else { "<td>" });
    }

    fn close_tag(&self, ctx: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str(if in_header_row(ctx) { "</th>" } else { "</td>" });
    }
}

/// Tab group. Gets a document-unique id; its tabs are numbered within it.
#[derive(Copy, Clone, Debug, Default)]
pub struct TabsTag;

impl HtmlTagWriter for TabsTag {
    fn enter(&self, ctx: &mut RenderContext, _: Option<&str>) {
        ctx.assign_id();
    }

    fn open_tag(&self, ctx: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        let id = ctx.assign_id();
        let count = ctx.current().map_or(0, Scope::claims);
        out.push_str(&format!(
            "<div class=\"tabs\" id=\"tabs-{id}\" data-tab-count=\"{count}\">"
        ));
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</div>");
    }
}

/// One tab of a `[tabs]` group, `[tab=label]`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TabTag;

impl HtmlTagWriter for TabTag {
    fn enter(&self, ctx: &mut RenderContext, _: Option<&str>) {
        ctx.claim_index("tabs");
    }

    fn open_tag(&self, ctx: &mut RenderContext, params: Option<&str>, _: &str, out: &mut String) {
        let group = ctx.enclosing("tabs").and_then(Scope::id);
        let index = ctx.current().and_then(Scope::index);
        let (Some(group), Some(index)) = (group, index) else {
            out.push_str("<section class=\"tab\">");
            return;
        };

        let label = params
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(escape_attribute)
            .unwrap_or_else(|| format!("Tab {}", index + 1));
        out.push_str(&format!(
            "<section class=\"tab\" id=\"tabs-{group}-{index}\" data-tab-index=\"{index}\" data-label=\"{label}\">"
        ));
    }

    fn close_tag(&self, _: &mut RenderContext, _: Option<&str>, _: &str, out: &mut String) {
        out.push_str("</section>");
    }
}

macro_rules! tag_list {
    ($($tag:ident),*) => {
        {
            let mut v: Vec<TagDefinition> = Vec::new();
            $(
                let writer: Arc<dyn HtmlTagWriter> = Arc::new($tag);
                for name in $tag::TAGS {
                    v.push(TagDefinition::with_writer(name, writer.clone()));
                }
            )*
            v
        }
    };
}

/// Returns every built-in tag, with nesting rules and parse flags applied.
/// # Included tags
/// - Simple wrappers: [BoldTag], [ItalicTag], [UnderlineTag], [StrikeTag], [InlineQuoteTag],
///   [SubscriptTag], [SuperscriptTag], [Header1Tag] to [Header6Tag], [CenterTag], [LeftTag],
///   [RightTag], [PreformattedTag], [KbdTag]
/// - With parameters: [QuoteTag], [UrlTag], [ImageTag], [ColorTag], [SizeTag], [SpoilerTag]
/// - No-parse: [CodeTag], [InlineCodeTag], [NoParseTag]
/// - Structured: [ListTag] with [ListItemTag], [TableTag] with [RowTag], [CellTag] and
///   [HeaderCellTag], [TabsTag] with [TabTag]
pub fn all_tags() -> Vec<TagDefinition> {
    let mut tags = tag_list!{
        BoldTag,
        ItalicTag,
        UnderlineTag,
        StrikeTag,
        InlineQuoteTag,
        SubscriptTag,
        SuperscriptTag,
        Header1Tag,
        Header2Tag,
        Header3Tag,
        Header4Tag,
        Header5Tag,
        Header6Tag,
        CenterTag,
        LeftTag,
        RightTag,
        PreformattedTag,
        KbdTag
    };

    tags.extend([
        TagDefinition::new("quote", QuoteTag),
        TagDefinition::new("url", UrlTag),
        TagDefinition::new("img", ImageTag).hide_content(),
        TagDefinition::new("color", ColorTag),
        TagDefinition::new("size", SizeTag),
        TagDefinition::new("spoiler", SpoilerTag),
        TagDefinition::new("code", CodeTag).no_parse(),
        TagDefinition::new("icode", InlineCodeTag).no_parse(),
        TagDefinition::new("noparse", NoParseTag).no_parse(),
        TagDefinition::new("list", ListTag).allow_children([STAR_TAG]),
        TagDefinition::new(STAR_TAG, ListItemTag).allow_parents(["list"]),
        TagDefinition::new("table", TableTag).allow_children(["tr"]),
        TagDefinition::new("tr", RowTag)
            .allow_parents(["table"])
            .allow_children(["td", "th"]),
        TagDefinition::new("td", CellTag).allow_parents(["tr"]),
        TagDefinition::new("th", HeaderCellTag).allow_parents(["tr"]),
        TagDefinition::new("tabs", TabsTag).allow_children(["tab"]),
        TagDefinition::new("tab", TabTag).allow_parents(["tabs"]),
    ]);

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_schemes() {
        assert_eq!(safe_url("https://example.com/a?b=c&d").as_deref(), Some("https://example.com/a?b=c&amp;d"));
        assert_eq!(safe_url("/relative/path").as_deref(), Some("/relative/path"));
        assert_eq!(safe_url("#anchor").as_deref(), Some("#anchor"));
        assert!(safe_url("javascript:alert(1)").is_none());
        assert!(safe_url(" JaVaScRiPt:alert(1)").is_none());
        assert!(safe_url("data:text/html,x").is_none());
        assert!(safe_url("").is_none());
    }

    #[test]
    fn url_quotes_escaped() {
        assert_eq!(
            safe_url("https://x.com/\" onmouseover=\"x").as_deref(),
            Some("https://x.com/&quot; onmouseover=&quot;x")
        );
    }

    #[test]
    fn colors() {
        assert_eq!(css_color("red"), Some("red"));
        assert_eq!(css_color(" #FF8800 "), Some("#FF8800"));
        assert_eq!(css_color("#ff88"), None);
        assert_eq!(css_color("red;background:url(x)"), None);
    }

    #[test]
    fn names_are_unique() {
        let tags = all_tags();
        let mut names: Vec<_> = tags.iter().map(|x| x.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tags.len());
    }
}
