use crate::{
    registry::{TagDefinition, TagRegistry},
    BBParser, Token, TokenKind,
};

use super::escape_text;

const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. In lorem quam, fermentum id porttitor ac, iaculis eu arcu. Aliquam vulputate tempus felis consequat elementum. Cras auctor nunc a cursus lobortis. Fusce venenatis quam nec eleifend porta.";

fn registry() -> TagRegistry {
    let plain = |name: &str| TagDefinition::from_fns(name, |_, _| String::new(), |_, _| String::new());
    TagRegistry::with_tags(["bold", "url", "quote", "*"].map(plain)).unwrap()
}

fn spans(input: &str) -> Vec<String> {
    let registry = registry();
    BBParser::new(input, &registry).map(|x| x.span.to_owned()).collect()
}

#[test]
pub fn just_text() {
    let registry = registry();
    let mut parser = BBParser::new(LOREM_IPSUM, &registry);
    let tok = parser.next().unwrap();
    assert!(tok.is_text());
    assert!(tok.args().is_none());
    assert_eq!(tok.span, LOREM_IPSUM);
    assert!(parser.next().is_none())
}

const SIMPLE: &str = "[bold]This is a test![/BOLD] and it's very cool.";

#[test]
pub fn simple_tags() {
    let registry = registry();
    let mut parser = BBParser::new(SIMPLE, &registry);
    let bold_tag = parser.next().unwrap();
    assert!(bold_tag.is_open("bold"));
    assert!(bold_tag.is_open_argless("bold"));
    assert!(!bold_tag.is_close("bold"));

    assert!(parser.next().unwrap().is_text());

    let close = parser.next().unwrap();
    assert!(close.is_close("bold"));
    assert_eq!(close.tag_name(), Some("bold"));
    assert_eq!(close.start, 21);

    assert!(matches!(
        parser.next(),
        Some(Token {
            kind: TokenKind::Text,
            ..
        })
    ));

    assert!(parser.next().is_none());
}

#[test]
pub fn tag_args() {
    let registry = registry();
    let tokens: Vec<_> = BBParser::new(
        "[url=https://example.com/?a=b]x[/url][quote name=Some One]y[/quote]",
        &registry,
    )
    .collect();

    assert!(tokens[0].is_open("url"));
    assert_eq!(tokens[0].args(), Some("https://example.com/?a=b"));
    assert!(tokens[3].is_open("quote"));
    assert_eq!(tokens[3].args(), Some("Some One"));
}

#[test]
pub fn unknown_tags_are_text() {
    assert_eq!(spans("[blod]x[/blod]"), ["[blod]x", "[/blod]"]);
    let registry = registry();
    assert!(BBParser::new("[blod]x[/blod]", &registry).all(|x| x.is_text()));
}

#[test]
pub fn malformed_tags_are_text() {
    let registry = registry();
    for input in ["[bold ]", "[/bold=x]", "[/ bold]", "[quote name]", "[bold"] {
        assert!(
            BBParser::new(input, &registry).all(|x| x.is_text()),
            "{input} should be text"
        );
    }
}

#[test]
pub fn nested_opener_breaks_tag() {
    // The first `[` never reaches a `]` without another `[` in the way.
    assert_eq!(spans("[[bold]x"), ["[", "[bold]", "x"]);
    assert_eq!(spans("[url=a[bold]"), ["[url=a", "[bold]"]);
}

const UNCLOSED_TAG: &str = "[not_a_tag=real ";

#[test]
pub fn unclosed_tag() {
    let registry = registry();
    let mut parser = BBParser::new(UNCLOSED_TAG, &registry);

    assert!(parser.next().unwrap().is_text());
    assert!(parser.next().is_none());
}

#[test]
pub fn star_tag() {
    let registry = registry();
    let tokens: Vec<_> = BBParser::new("[*]a[/*]", &registry).collect();
    assert!(tokens[0].is_open("*"));
    assert!(tokens[2].is_close("*"));
}

#[test]
pub fn escape_brackets() {
    assert_eq!(escape_text("plain & simple"), "plain & simple");
    assert_eq!(escape_text("<b>[x]</b>"), "&lt;b&gt;&#91;x&#93;&lt;/b&gt;");
    assert_eq!(escape_text("&lt;"), "&lt;");
}
