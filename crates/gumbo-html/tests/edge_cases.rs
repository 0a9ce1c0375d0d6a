//! Edge case tests for the built-in engine
//!
//! Malformed markup, raw text elements and unusual input decoded through the
//! public record decoder.

use gumbo_html::decode::{NodeData, RawNode, decode_attribute, decode_node, decode_output};
use gumbo_html::diagnostic::decode_error;
use gumbo_html::ffi::OutputRecord;
use gumbo_html::{BuiltinEngine, Engine, ErrorType, NodeType, ParseDiagnostic, ParseOptions, Tag};
use std::ptr::NonNull;

struct Parsed {
    input: Vec<u8>,
    output: NonNull<OutputRecord>,
}

impl Parsed {
    fn new(html: &str) -> Self {
        let input = html.as_bytes().to_vec();
        let output = BuiltinEngine.parse(&input, &ParseOptions::default()).unwrap();
        Self { input, output }
    }

    fn document(&self) -> RawNode {
        unsafe { decode_output(self.output).unwrap().document }
    }

    /// Every node in document order with its depth
    fn walk(&self) -> Vec<(usize, NodeType, Option<Tag>)> {
        let mut nodes = Vec::new();
        let mut stack = vec![(0, self.document())];
        while let Some((depth, raw)) = stack.pop() {
            let node = unsafe { decode_node(raw).unwrap() };
            let (tag, children) = match node.data {
                NodeData::Document(document) => (None, document.children),
                NodeData::Element(element) => (Some(element.tag), element.children),
                NodeData::Text(_) => (None, Vec::new()),
            };
            nodes.push((depth, node.node_type, tag));
            stack.extend(children.into_iter().rev().map(|child| (depth + 1, child)));
        }
        nodes
    }

    fn tags(&self) -> Vec<Tag> {
        self.walk().into_iter().filter_map(|(_, _, tag)| tag).collect()
    }

    fn texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        let mut stack = vec![self.document()];
        while let Some(raw) = stack.pop() {
            match unsafe { decode_node(raw).unwrap() }.data {
                NodeData::Document(document) => stack.extend(document.children.into_iter().rev()),
                NodeData::Element(element) => stack.extend(element.children.into_iter().rev()),
                NodeData::Text(text) => texts.extend(text.text),
            }
        }
        texts
    }

    fn diagnostics(&self) -> Vec<ParseDiagnostic> {
        unsafe {
            decode_output(self.output)
                .unwrap()
                .errors
                .into_iter()
                .map(|error| decode_error(error, &self.input))
                .collect()
        }
    }
}

impl Drop for Parsed {
    fn drop(&mut self) {
        unsafe { BuiltinEngine.destroy_output(&ParseOptions::default(), self.output) }
    }
}

// ============================================================================
// EMPTY AND MINIMAL INPUT
// ============================================================================

#[test]
fn test_parse_empty_input() {
    let parsed = Parsed::new("");
    assert_eq!(parsed.tags(), vec![Tag::Html, Tag::Head, Tag::Body]);
}

#[test]
fn test_parse_only_whitespace() {
    let parsed = Parsed::new("   \t\n\r\n   ");
    assert_eq!(parsed.tags(), vec![Tag::Html, Tag::Head, Tag::Body]);
}

#[test]
fn test_parse_only_doctype() {
    let parsed = Parsed::new("<!DOCTYPE html>");
    let document = unsafe { decode_node(parsed.document()).unwrap() };
    let NodeData::Document(document) = document.data else {
        panic!("expected document");
    };
    assert!(document.has_doctype);
    assert_eq!(document.children.len(), 1);
}

#[test]
fn test_parse_null_bytes() {
    let parsed = Parsed::new("Hello\0World");
    assert!(parsed.walk().len() > 3);
}

// ============================================================================
// MALFORMED HTML
// ============================================================================

#[test]
fn test_parse_unclosed_tags() {
    let parsed = Parsed::new("<div><p><span>text");
    assert_eq!(
        parsed.tags(),
        vec![Tag::Html, Tag::Head, Tag::Body, Tag::Div, Tag::P, Tag::Span]
    );
    assert_eq!(parsed.texts(), vec!["text".to_string()]);
}

#[test]
fn test_parse_mismatched_tags() {
    let parsed = Parsed::new("<div><p></div></p>");
    assert!(parsed.tags().contains(&Tag::Div));
    assert!(
        parsed
            .diagnostics()
            .iter()
            .any(|diagnostic| diagnostic.error_type == Some(ErrorType::Parser))
    );
}

#[test]
fn test_parse_extra_closing_tags() {
    let parsed = Parsed::new("<div></div></div></div>");
    let divs = parsed.tags().into_iter().filter(|&tag| tag == Tag::Div).count();
    assert_eq!(divs, 1);
}

#[test]
fn test_parse_nested_paragraphs_close_each_other() {
    let parsed = Parsed::new("<p><p><p>text");
    let depths: Vec<usize> = parsed
        .walk()
        .into_iter()
        .filter(|(_, _, tag)| *tag == Some(Tag::P))
        .map(|(depth, _, _)| depth)
        .collect();
    assert_eq!(depths, vec![3, 3, 3]);
}

#[test]
fn test_parse_misnested_formatting() {
    let parsed = Parsed::new("<b><i>one</b>two</i>");
    assert_eq!(parsed.texts(), vec!["one".to_string(), "two".to_string()]);
}

// ============================================================================
// SPECIAL TAGS
// ============================================================================

#[test]
fn test_parse_script_content_is_text() {
    let parsed = Parsed::new("<script>if (a < b) { x = \"<div>\"; }</script>");
    assert!(!parsed.tags().contains(&Tag::Div));
    assert_eq!(parsed.texts(), vec!["if (a < b) { x = \"<div>\"; }".to_string()]);
}

#[test]
fn test_parse_textarea_content() {
    let parsed = Parsed::new("<textarea><div>not a div</div></textarea>");
    assert!(!parsed.tags().contains(&Tag::Div));
}

#[test]
fn test_parse_plaintext() {
    let parsed = Parsed::new("<plaintext><div>literal");
    assert!(parsed.tags().contains(&Tag::Plaintext));
    assert!(!parsed.tags().contains(&Tag::Div));
}

#[test]
fn test_parse_template_kind() {
    let parsed = Parsed::new("<template><p>inside</p></template>");
    let template = parsed
        .walk()
        .into_iter()
        .find(|(_, _, tag)| *tag == Some(Tag::Template))
        .unwrap();
    assert_eq!(template.1, NodeType::Template);
}

// ============================================================================
// COMMENTS
// ============================================================================

#[test]
fn test_parse_comment_kinds() {
    let parsed = Parsed::new("<!----><!-- <div>commented out</div> -->");
    let comments = parsed
        .walk()
        .into_iter()
        .filter(|(_, kind, _)| *kind == NodeType::Comment)
        .count();
    assert_eq!(comments, 2);
    assert!(!parsed.tags().contains(&Tag::Div));
}

#[test]
fn test_parse_unterminated_comment_is_reported() {
    let parsed = Parsed::new("<p>a<!-- never closed");
    assert!(
        parsed
            .diagnostics()
            .iter()
            .any(|diagnostic| diagnostic.error_type == Some(ErrorType::CommentEof))
    );
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

fn first_attribute_of(parsed: &Parsed, tag: Tag) -> Vec<(Option<String>, Option<String>)> {
    let mut stack = vec![parsed.document()];
    while let Some(raw) = stack.pop() {
        match unsafe { decode_node(raw).unwrap() }.data {
            NodeData::Document(document) => stack.extend(document.children.into_iter().rev()),
            NodeData::Element(element) if element.tag == tag => {
                return element
                    .attributes
                    .into_iter()
                    .map(|raw| {
                        let attribute = unsafe { decode_attribute(raw).unwrap() };
                        (attribute.name, attribute.original_value)
                    })
                    .collect();
            }
            NodeData::Element(element) => stack.extend(element.children.into_iter().rev()),
            NodeData::Text(_) => {}
        }
    }
    Vec::new()
}

#[test]
fn test_parse_attribute_quoting_styles() {
    let parsed = Parsed::new(r#"<div id="double" class='single' data-x=unquoted hidden>"#);
    assert_eq!(
        first_attribute_of(&parsed, Tag::Div),
        vec![
            (Some("id".to_string()), Some("\"double\"".to_string())),
            (Some("class".to_string()), Some("'single'".to_string())),
            (Some("data-x".to_string()), Some("unquoted".to_string())),
            (Some("hidden".to_string()), None),
        ]
    );
}

#[test]
fn test_parse_attribute_names_are_lowercased() {
    let parsed = Parsed::new(r#"<div ID="Main">"#);
    let attributes = first_attribute_of(&parsed, Tag::Div);
    assert_eq!(attributes[0].0.as_deref(), Some("id"));
}

// ============================================================================
// INTERNATIONAL CONTENT
// ============================================================================

#[test]
fn test_parse_utf8_content() {
    let parsed = Parsed::new("<p>日本語 中文 한국어</p>");
    assert_eq!(parsed.texts(), vec!["日本語 中文 한국어".to_string()]);
}

#[test]
fn test_parse_named_entities_are_decoded() {
    let parsed = Parsed::new("<p>&lt;&amp;&gt;</p>");
    assert_eq!(parsed.texts(), vec!["<&>".to_string()]);
}

// ============================================================================
// STRESS
// ============================================================================

#[test]
fn test_parse_deeply_nested() {
    let html = "<div>".repeat(200) + &"</div>".repeat(200);
    let parsed = Parsed::new(&html);
    let divs = parsed.tags().into_iter().filter(|&tag| tag == Tag::Div).count();
    assert_eq!(divs, 200);
}

#[test]
fn test_parse_many_siblings() {
    let html: String = (0..500).map(|i| format!("<span>{i}</span>")).collect();
    let parsed = Parsed::new(&html);
    let spans = parsed.tags().into_iter().filter(|&tag| tag == Tag::Span).count();
    assert_eq!(spans, 500);
}
