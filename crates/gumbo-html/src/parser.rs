//! Built-in Engine
//!
//! Runs html5ever with a custom `TreeSink` and lays the resulting tree out
//! as engine records, so the tree layer consumes the same output blob it
//! would get from a foreign engine. Original tag text, source positions and
//! parse flags come from matching the tree builder's callbacks against a
//! scan of the input (see `source`).

use crate::blob::{
    AttributeSpec, BlobBuilder, DoctypeSpec, ElementSpec, ErrorPayloadSpec, ErrorSpec, NodeId,
    Piece,
};
use crate::engine::Engine;
use crate::ffi::OutputRecord;
use crate::source::{ScannedAttribute, SourceMap};
use crate::{
    AttrNamespace, EngineError, ErrorType, FragmentContext, InsertionMode, Namespace, NodeType,
    ParseFlags, ParseOptions, QuirksMode, Tag, TokenType, TokenizerState,
};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tokenizer::TokenizerOpts;
use html5ever::tree_builder::{
    ElemName, ElementFlags, NodeOrText, QuirksMode as TreeQuirksMode, TreeBuilderOpts, TreeSink,
};
use html5ever::{
    Attribute, LocalName, Namespace as NamespaceUrl, ParseOpts, QualName, parse_document,
    parse_fragment,
};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Tags the tree builder recreates from the list of active formatting
/// elements
const FORMATTING: &[Tag] = &[
    Tag::A,
    Tag::B,
    Tag::Big,
    Tag::Code,
    Tag::Em,
    Tag::Font,
    Tag::I,
    Tag::Nobr,
    Tag::S,
    Tag::Small,
    Tag::Strike,
    Tag::Strong,
    Tag::Tt,
    Tag::U,
];

/// HTML elements that never have content or an end tag
const VOID: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// html5ever-backed engine
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

impl BuiltinEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for BuiltinEngine {
    fn parse(
        &self,
        input: &[u8],
        options: &ParseOptions,
    ) -> Result<NonNull<OutputRecord>, EngineError> {
        // positions are stored as 32-bit offsets
        if u32::try_from(input.len()).is_err() {
            return Err(EngineError::InputTooLarge(input.len()));
        }
        tracing::debug!("Parsing HTML input: {} bytes", input.len());

        let sink = BlobSink::new(input, options);
        sink.report_invalid_utf8(input);

        let opts = ParseOpts {
            // the inexact tokenizer messages name the state, which
            // classifies end-of-file and bad-character errors
            tokenizer: TokenizerOpts::default(),
            tree_builder: TreeBuilderOpts {
                exact_errors: true,
                ..Default::default()
            },
        };
        let text = StrTendril::from(String::from_utf8_lossy(input).as_ref());
        let builder = match options.fragment_context {
            None => parse_document(sink, opts).one(text),
            Some(context) => {
                parse_fragment(sink, opts, context_name(context), Vec::new(), false).one(text)
            }
        };

        tracing::debug!("Parsed {} nodes", builder.node_count());
        Ok(builder.finish().into_raw())
    }

    unsafe fn destroy_output(&self, _options: &ParseOptions, output: NonNull<OutputRecord>) {
        // SAFETY: forwarded from the caller; `parse` produced it with `into_raw`
        unsafe { crate::blob::destroy(output) }
    }
}

fn context_name(context: FragmentContext) -> QualName {
    let ns = match context.namespace {
        Namespace::Html => HTML_NS,
        Namespace::Svg => SVG_NS,
        Namespace::Mathml => MATHML_NS,
    };
    QualName::new(
        None,
        NamespaceUrl::from(ns),
        LocalName::from(context.tag.normalized_name()),
    )
}

fn namespace_of(url: &NamespaceUrl) -> Namespace {
    match url.as_ref() {
        SVG_NS => Namespace::Svg,
        MATHML_NS => Namespace::Mathml,
        _ => Namespace::Html,
    }
}

fn attr_namespace_of(url: &NamespaceUrl) -> AttrNamespace {
    match url.as_ref() {
        XLINK_NS => AttrNamespace::Xlink,
        XML_NS => AttrNamespace::Xml,
        XMLNS_NS => AttrNamespace::Xmlns,
        _ => AttrNamespace::None,
    }
}

fn is_whitespace(text: &str) -> bool {
    text.bytes()
        .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C'))
}

/// Element name handed back to the tree builder
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &NamespaceUrl {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// Where an element was opened in the source
#[derive(Debug, Clone, Copy)]
struct Opened {
    /// Index of the matched start tag token
    token: Option<usize>,
    /// First token that may close the element
    search_from: usize,
    start_offset: usize,
}

/// Tree sink writing straight into a `BlobBuilder`
struct BlobSink<'a> {
    builder: RefCell<BlobBuilder>,
    document: NodeId,
    names: RefCell<HashMap<NodeId, QualName>>,
    opened: RefCell<HashMap<NodeId, Opened>>,
    /// Approximate current node of the tree builder
    current: Cell<Option<NodeId>>,
    integration_points: RefCell<HashSet<NodeId>>,
    source: RefCell<SourceMap<'a>>,
    options: &'a ParseOptions,
    recorded: Cell<usize>,
    line: Cell<u64>,
    /// Set until the fragment context element has been created
    awaiting_context: Cell<bool>,
}

impl<'a> BlobSink<'a> {
    fn new(input: &'a [u8], options: &'a ParseOptions) -> Self {
        let mut builder = BlobBuilder::with_input(input);
        let document = builder.document(None);
        Self {
            builder: RefCell::new(builder),
            document,
            names: RefCell::new(HashMap::new()),
            opened: RefCell::new(HashMap::new()),
            current: Cell::new(None),
            integration_points: RefCell::new(HashSet::new()),
            source: RefCell::new(SourceMap::new(input, options.tab_stop)),
            options,
            recorded: Cell::new(0),
            line: Cell::new(1),
            awaiting_context: Cell::new(options.fragment_context.is_some()),
        }
    }

    /// Record a diagnostic unless the configured limits are reached
    fn push_error(&self, builder: &mut BlobBuilder, spec: ErrorSpec) {
        let recorded = self.recorded.get();
        if !self.options.accepts_error(recorded) {
            return;
        }
        self.recorded.set(recorded + 1);
        builder.error(spec);
    }

    fn report_invalid_utf8(&self, input: &[u8]) {
        let source = self.source.borrow();
        let mut builder = self.builder.borrow_mut();
        let mut rest = 0;
        while let Err(error) = std::str::from_utf8(&input[rest..]) {
            let at = rest + error.valid_up_to();
            let (error_type, next) = match error.error_len() {
                Some(len) => (ErrorType::Utf8Invalid, Some(at + len)),
                None => (ErrorType::Utf8Truncated, None),
            };
            let mut spec = ErrorSpec::new(error_type, ErrorPayloadSpec::Codepoint(u64::from(input[at])));
            spec.position = source.position(at);
            spec.original_offset = Some(at);
            self.push_error(&mut builder, spec);
            match next {
                Some(next) => rest = next,
                None => break,
            }
        }
    }

    fn tag_of(&self, node: NodeId) -> Tag {
        self.names
            .borrow()
            .get(&node)
            .map_or(Tag::Unknown, |name| Tag::from_name(&name.local))
    }

    /// Attach attributes, taking original text and positions from the
    /// matching scanned attribute. Repeated names in the source are
    /// reported as duplicate-attribute diagnostics.
    fn attach_attributes(
        &self,
        builder: &mut BlobBuilder,
        source: &SourceMap<'_>,
        node: NodeId,
        attrs: Vec<Attribute>,
        scanned: &[ScannedAttribute],
    ) {
        let mut kept: Vec<&str> = Vec::new();
        for attribute in scanned {
            if let Some(original_index) = kept.iter().position(|&name| name == attribute.name) {
                let mut spec = ErrorSpec::new(
                    ErrorType::DuplicateAttr,
                    ErrorPayloadSpec::DuplicateAttribute {
                        name: attribute.name.clone(),
                        original_index: original_index as u32,
                        new_index: kept.len() as u32,
                    },
                );
                spec.position = source.position(attribute.name_range.start);
                spec.original_offset = Some(attribute.name_range.start);
                self.push_error(builder, spec);
            } else {
                kept.push(&attribute.name);
            }
        }

        for attr in attrs {
            let qualified = match &attr.name.prefix {
                Some(prefix) => format!("{prefix}:{}", attr.name.local),
                None => attr.name.local.to_string(),
            };
            let mut spec = AttributeSpec::new(attr.name.local.as_ref(), attr.value.as_ref());
            spec.namespace = attr_namespace_of(&attr.name.ns);
            spec.original_name = None;
            spec.original_value = None;
            if let Some(found) = scanned
                .iter()
                .find(|scanned| scanned.name.eq_ignore_ascii_case(&qualified))
            {
                spec.original_name = Some(Piece::Input(found.name_range.clone()));
                spec.name_start = source.position(found.name_range.start);
                spec.name_end = source.position(found.name_range.end);
                match &found.value_range {
                    Some(range) => {
                        spec.original_value = Some(Piece::Input(range.clone()));
                        spec.value_start = source.position(range.start);
                        spec.value_end = source.position(range.end);
                    }
                    None => {
                        spec.value_start = spec.name_end;
                        spec.value_end = spec.name_end;
                    }
                }
            }
            builder.attribute(node, spec);
        }
    }

    /// Append text to `parent`, before `before` if given, merging with an
    /// adjacent text node. Returns the node holding the text.
    fn insert_text(&self, parent: NodeId, before: Option<NodeId>, text: &str) -> NodeId {
        let mut builder = self.builder.borrow_mut();
        let siblings = builder.children(parent);
        let previous = match before {
            Some(before) => siblings
                .iter()
                .position(|&child| child == before)
                .and_then(|at| at.checked_sub(1))
                .map(|at| siblings[at]),
            None => siblings.last().copied(),
        };

        if let Some(previous) = previous {
            if matches!(
                builder.kind(previous),
                Some(NodeType::Text | NodeType::Whitespace)
            ) {
                let merged = builder.text_mut(previous).map(|existing| {
                    existing.push_str(text);
                    is_whitespace(existing)
                });
                if merged == Some(false) {
                    builder.set_text_kind(previous, NodeType::Text);
                }
                return previous;
            }
        }

        let kind = if is_whitespace(text) {
            NodeType::Whitespace
        } else {
            NodeType::Text
        };
        let node = builder.create_text(kind, text);
        builder.set_start_position(node, self.source.borrow_mut().take_text_position());
        match before {
            Some(before) => builder.insert_before(before, node),
            None => builder.append_child(parent, node),
        }
        node
    }

    fn insert_before(&self, sibling: NodeId, child: NodeOrText<NodeId>) -> Option<NodeId> {
        match child {
            NodeOrText::AppendNode(node) => {
                self.builder.borrow_mut().insert_before(sibling, node);
                Some(node)
            }
            NodeOrText::AppendText(text) => {
                let parent = self.builder.borrow().parent(sibling)?;
                Some(self.insert_text(parent, Some(sibling), &text))
            }
        }
    }

    fn record_parse_error(&self, message: &str) {
        // reported from the source scan with exact indices instead
        if message.contains("Duplicate attribute") {
            return;
        }
        let (error_type, payload) = classify_error(message, &self.stack_tags());
        let mut spec = ErrorSpec::new(error_type, payload);
        {
            let source = self.source.borrow();
            spec.position = source.next_position();
            spec.original_offset = Some(spec.position.offset as usize);
        }
        let mut builder = self.builder.borrow_mut();
        self.push_error(&mut builder, spec);
    }

    /// Tags from the root element down to the current node
    fn stack_tags(&self) -> Vec<Tag> {
        let builder = self.builder.borrow();
        let mut stack = Vec::new();
        let mut node = self.current.get();
        while let Some(id) = node.filter(|&id| id != self.document) {
            stack.push(self.tag_of(id));
            node = builder.parent(id);
        }
        stack.reverse();
        stack
    }

    /// Pair every element with its end tag, top down, or mark its end tag
    /// as implicit. An element's end tag must come before its parent's.
    fn close_elements(&self) {
        let source = self.source.borrow();
        let opened = self.opened.borrow();
        let names = self.names.borrow();
        let mut builder = self.builder.borrow_mut();
        let mut claimed = HashSet::new();
        let input_end = source.input_len();

        // (parent, token limit, fallback end offset)
        let mut pending = vec![(self.document, source.token_count(), input_end)];
        while let Some((parent, limit, fallback)) = pending.pop() {
            let children = builder.children(parent).to_vec();
            for (at, &child) in children.iter().enumerate() {
                let Some(name) = names.get(&child).map(|name| name.local.clone()) else {
                    continue;
                };
                let Some(&open) = opened.get(&child) else {
                    pending.push((child, limit, fallback));
                    continue;
                };

                let next_start = children[at + 1..]
                    .iter()
                    .filter_map(|sibling| opened.get(sibling).and_then(|next| next.token))
                    .find(|&token| token >= open.search_from);
                let start_offset = open.start_offset;

                if VOID.contains(&name.as_ref()) {
                    builder.add_parse_flags(child, ParseFlags::IMPLICIT_END_TAG);
                    builder.set_end_position(child, source.position(start_offset));
                    continue;
                }

                match source.find_closing(&name, open.search_from, limit, &claimed) {
                    Some(index) => {
                        claimed.insert(index);
                        let range = source.token(index).range.clone();
                        builder.set_end_position(child, source.position(range.start));
                        builder.set_original_end_tag(child, Piece::Input(range.clone()));
                        pending.push((child, index, range.start));
                    }
                    None => {
                        let end = next_start
                            .map_or(fallback, |token| source.token(token).range.start)
                            .max(start_offset);
                        builder.add_parse_flags(child, ParseFlags::IMPLICIT_END_TAG);
                        builder.set_end_position(child, source.position(end));
                        pending.push((child, next_start.unwrap_or(limit), end));
                    }
                }
            }
        }
    }
}

impl TreeSink for BlobSink<'_> {
    type Handle = NodeId;
    type Output = BlobBuilder;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> BlobBuilder {
        self.close_elements();
        self.builder.into_inner()
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.record_parse_error(&msg);
    }

    fn set_current_line(&self, line_number: u64) {
        self.line.set(line_number);
    }

    fn get_document(&self) -> NodeId {
        self.document
    }

    fn elem_name<'a>(&'a self, target: &'a NodeId) -> OwnedElemName {
        let name = self.names.borrow().get(target).cloned();
        OwnedElemName(name.unwrap_or_else(|| {
            QualName::new(None, NamespaceUrl::from(HTML_NS), LocalName::from(""))
        }))
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> NodeId {
        let tag = Tag::from_name(&name.local);
        let mut spec = ElementSpec::new(tag).namespace(namespace_of(&name.ns));
        if flags.template {
            spec.kind = NodeType::Template;
        }

        // the context element never appears in the input or the tree
        if self.awaiting_context.replace(false) {
            let node = self.builder.borrow_mut().create_element(spec);
            self.names.borrow_mut().insert(node, name);
            return node;
        }

        let mut source = self.source.borrow_mut();
        let line = self.line.get();
        let mut parse_flags = ParseFlags::NORMAL;
        let mut token = source.match_start_tag(&name.local, line);
        if token.is_none() && tag == Tag::Img {
            token = source.match_start_tag("image", line);
            if token.is_some() {
                parse_flags |= ParseFlags::FROM_IMAGE;
            }
        }

        let search_from = token.map_or(source.cursor(), |index| index + 1);
        let (start, scanned) = match token {
            Some(index) => {
                let token = source.token(index);
                spec = spec.original_tag(Piece::Input(token.range.clone()));
                (source.position(token.range.start), token.attributes.clone())
            }
            None => {
                parse_flags |= ParseFlags::BY_PARSER;
                parse_flags |= if FORMATTING.contains(&tag) {
                    ParseFlags::RECONSTRUCTED_FORMATTING_ELEMENT
                } else {
                    ParseFlags::IMPLIED
                };
                (source.next_position(), Vec::new())
            }
        };

        let mut builder = self.builder.borrow_mut();
        let node = builder.create_element(spec);
        builder.set_parse_flags(node, parse_flags);
        builder.set_start_position(node, start);
        self.attach_attributes(&mut builder, &source, node, attrs, &scanned);

        if flags.mathml_annotation_xml_integration_point {
            self.integration_points.borrow_mut().insert(node);
        }
        self.names.borrow_mut().insert(node, name);
        self.opened.borrow_mut().insert(
            node,
            Opened {
                token,
                search_from,
                start_offset: start.offset as usize,
            },
        );
        node
    }

    fn create_comment(&self, text: StrTendril) -> NodeId {
        let mut source = self.source.borrow_mut();
        let token = source.match_comment(self.line.get());
        let mut builder = self.builder.borrow_mut();
        let node = builder.create_text(NodeType::Comment, text.as_ref());
        match token {
            Some(index) => {
                let range = source.token(index).range.clone();
                builder.set_start_position(node, source.position(range.start));
                builder.set_original_text(node, Piece::Input(range));
            }
            None => builder.set_start_position(node, source.next_position()),
        }
        node
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> NodeId {
        self.create_comment(data)
    }

    fn append(&self, parent: &NodeId, child: NodeOrText<NodeId>) {
        match child {
            NodeOrText::AppendNode(node) => {
                self.builder.borrow_mut().append_child(*parent, node);
                // inserted elements are pushed onto the open stack
                let is_element = self.names.borrow().contains_key(&node);
                self.current.set(Some(if is_element { node } else { *parent }));
            }
            NodeOrText::AppendText(text) => {
                self.insert_text(*parent, None, &text);
                self.current.set(Some(*parent));
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        let has_parent = self.builder.borrow().parent(*element).is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_before_sibling(&self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        // only used for foster parenting
        if let Some(node) = self.insert_before(*sibling, new_node) {
            self.builder
                .borrow_mut()
                .add_parse_flags(node, ParseFlags::FOSTER_PARENTED);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        self.source.borrow_mut().match_doctype();
        self.builder.borrow_mut().document(Some(DoctypeSpec {
            name: name.to_string(),
            public_identifier: Some(public_id.to_string()),
            system_identifier: Some(system_id.to_string()),
        }));
    }

    fn get_template_contents(&self, target: &NodeId) -> NodeId {
        // template children are stored on the template element itself
        *target
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, mode: TreeQuirksMode) {
        let mode = match mode {
            TreeQuirksMode::Quirks => QuirksMode::Quirks,
            TreeQuirksMode::LimitedQuirks => QuirksMode::LimitedQuirks,
            TreeQuirksMode::NoQuirks => QuirksMode::NoQuirks,
        };
        self.builder.borrow_mut().set_quirks_mode(mode);
    }

    fn add_attrs_if_missing(&self, target: &NodeId, attrs: Vec<Attribute>) {
        let mut builder = self.builder.borrow_mut();
        for attr in attrs {
            if !builder.has_attribute(*target, &attr.name.local) {
                let mut spec = AttributeSpec::new(attr.name.local.as_ref(), attr.value.as_ref());
                spec.namespace = attr_namespace_of(&attr.name.ns);
                spec.original_name = None;
                spec.original_value = None;
                builder.attribute(*target, spec);
            }
        }
    }

    fn remove_from_parent(&self, target: &NodeId) {
        self.builder.borrow_mut().detach(*target);
    }

    fn reparent_children(&self, node: &NodeId, new_parent: &NodeId) {
        let mut builder = self.builder.borrow_mut();
        let children = builder.children(*node).to_vec();
        for child in children {
            builder.append_child(*new_parent, child);
        }
    }

    fn pop(&self, node: &NodeId) {
        let parent = self.builder.borrow().parent(*node);
        self.current.set(parent);
    }

    fn is_mathml_annotation_xml_integration_point(&self, handle: &NodeId) -> bool {
        self.integration_points.borrow().contains(handle)
    }
}

/// Classify an html5ever error message into an engine error kind and
/// payload. Tokenizer messages name the tokenizer state, tree builder
/// messages the insertion mode; anything unrecognized is a parser error.
fn classify_error(message: &str, stack: &[Tag]) -> (ErrorType, ErrorPayloadSpec) {
    let lower = message.to_ascii_lowercase();

    if lower.contains("character reference") {
        let error_type = if lower.contains("numeric") {
            if lower.contains("semicolon") {
                ErrorType::NumericCharRefWithoutSemicolon
            } else if lower.contains("digits") {
                ErrorType::NumericCharRefNoDigits
            } else {
                ErrorType::NumericCharRefInvalid
            }
        } else if lower.contains("semicolon") {
            ErrorType::NamedCharRefWithoutSemicolon
        } else {
            ErrorType::NamedCharRefInvalid
        };
        let payload = match error_type {
            ErrorType::NumericCharRefNoDigits => ErrorPayloadSpec::Tokenizer {
                codepoint: 0,
                state: TokenizerState::CharRef,
            },
            ErrorType::NamedCharRefWithoutSemicolon | ErrorType::NamedCharRefInvalid => {
                ErrorPayloadSpec::NamedCharacter(None)
            }
            _ => ErrorPayloadSpec::Codepoint(0),
        };
        return (error_type, payload);
    }

    if let Some(at) = message.find(" in state ") {
        let state = &message[at + " in state ".len()..];
        let eof = message.starts_with("Saw EOF") || lower.contains("eof");
        let codepoint = message
            .strip_prefix("Saw ")
            .and_then(|rest| rest.chars().next())
            .filter(|_| !eof)
            .map_or(-1, |c| c as i32);
        let (state, error_type) = tokenizer_error(state, eof, codepoint);
        return (error_type, ErrorPayloadSpec::Tokenizer { codepoint, state });
    }

    let error_type = if lower.contains("self-closing") {
        ErrorType::UnacknowledgedSelfClosingTag
    } else {
        ErrorType::Parser
    };
    let parser_state = message
        .find("insertion mode ")
        .map(|at| &message[at + "insertion mode ".len()..])
        .and_then(|rest| {
            let name: String = rest.chars().take_while(char::is_ascii_alphanumeric).collect();
            InsertionMode::ALL
                .iter()
                .copied()
                .find(|mode| format!("{mode:?}") == name)
        })
        .unwrap_or(InsertionMode::Initial);
    let (input_type, input_tag) = token_of(message);

    (
        error_type,
        ErrorPayloadSpec::Parser {
            input_type,
            input_tag,
            parser_state,
            tag_stack: stack.to_vec(),
        },
    )
}

fn tokenizer_error(state: &str, eof: bool, codepoint: i32) -> (TokenizerState, ErrorType) {
    let pick = |at_eof: ErrorType, otherwise: ErrorType| if eof { at_eof } else { otherwise };
    if state.contains("CommentEndBang") {
        (
            TokenizerState::Comment,
            pick(ErrorType::CommentEndBangEof, ErrorType::CommentBangAfterDoubleDash),
        )
    } else if state.contains("Comment") {
        (
            TokenizerState::Comment,
            pick(ErrorType::CommentEof, ErrorType::CommentInvalid),
        )
    } else if state.contains("Doctype") {
        (
            TokenizerState::Doctype,
            pick(ErrorType::DoctypeEof, ErrorType::DoctypeInvalid),
        )
    } else if state.contains("AfterAttributeValue") {
        (
            TokenizerState::AttrValue,
            pick(ErrorType::AttrAfterEof, ErrorType::AttrAfterInvalid),
        )
    } else if state.contains("BeforeAttributeValue") {
        (
            TokenizerState::AttrValue,
            pick(ErrorType::AttrUnquotedEof, ErrorType::AttrUnquotedRightBracket),
        )
    } else if state.contains("DoubleQuoted") {
        (
            TokenizerState::AttrValue,
            pick(ErrorType::AttrDoubleQuoteEof, ErrorType::AttrAfterInvalid),
        )
    } else if state.contains("SingleQuoted") {
        (
            TokenizerState::AttrValue,
            pick(ErrorType::AttrSingleQuoteEof, ErrorType::AttrAfterInvalid),
        )
    } else if state.contains("AttributeValue") {
        (
            TokenizerState::AttrValue,
            pick(ErrorType::AttrUnquotedEof, ErrorType::AttrUnquotedEquals),
        )
    } else if state.contains("AttributeName") {
        (
            TokenizerState::AttrName,
            pick(ErrorType::AttrNameEof, ErrorType::AttrNameInvalid),
        )
    } else if state.contains("SelfClosingStartTag") {
        (
            TokenizerState::SelfClosingTag,
            pick(ErrorType::SolidusEof, ErrorType::SolidusInvalid),
        )
    } else if state.contains("MarkupDeclarationOpen") {
        (TokenizerState::MarkupDeclaration, ErrorType::DashesOrDoctype)
    } else if state.contains("EndTagOpen") {
        (
            TokenizerState::Tag,
            pick(ErrorType::CloseTagEof, ErrorType::CloseTagInvalid),
        )
    } else if state.contains("Tag") {
        (TokenizerState::Tag, pick(ErrorType::TagEof, ErrorType::TagInvalid))
    } else if state.contains("Script") {
        (TokenizerState::Script, pick(ErrorType::ScriptEof, ErrorType::TagInvalid))
    } else {
        let state = if state.contains("Rcdata") {
            TokenizerState::Rcdata
        } else if state.contains("Rawtext") {
            TokenizerState::Rawtext
        } else if state.contains("Plaintext") {
            TokenizerState::Plaintext
        } else if state.contains("Cdata") {
            TokenizerState::Cdata
        } else if state.contains("CharRef") || state.contains("CharacterReference") {
            TokenizerState::CharRef
        } else {
            TokenizerState::Data
        };
        let error_type = if codepoint == 0 {
            ErrorType::Utf8Null
        } else {
            pick(ErrorType::TagEof, ErrorType::TagInvalid)
        };
        (state, error_type)
    }
}

/// Token kind and tag named in a tree builder message
fn token_of(message: &str) -> (TokenType, Tag) {
    let input_type = if message.contains("kind: StartTag") {
        TokenType::StartTag
    } else if message.contains("kind: EndTag") {
        TokenType::EndTag
    } else if message.contains("CommentToken") {
        TokenType::Comment
    } else if message.contains("NullCharacterToken") {
        TokenType::Null
    } else if message.contains("EOFToken") {
        TokenType::Eof
    } else if message.contains("DoctypeToken") {
        TokenType::Doctype
    } else {
        TokenType::Character
    };
    let input_tag = message
        .find("Atom('")
        .map(|at| &message[at + "Atom('".len()..])
        .and_then(|rest| rest.split('\'').next())
        .map_or(Tag::Unknown, Tag::from_name);
    (input_type, input_tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedNode, NodeData, RawNode, decode_node, decode_output};
    use crate::diagnostic::{ErrorDetail, ParseDiagnostic, decode_error};
    use crate::ffi::SourcePosition;
    use pretty_assertions::assert_eq;

    struct Parsed {
        output: NonNull<OutputRecord>,
        input: Vec<u8>,
    }

    impl Parsed {
        fn new(html: &str, options: &ParseOptions) -> Self {
            let input = html.as_bytes().to_vec();
            let output = BuiltinEngine.parse(&input, options).unwrap();
            Self { output, input }
        }

        fn root(&self) -> RawNode {
            unsafe { decode_output(self.output).unwrap().root.unwrap() }
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

    fn node(raw: RawNode) -> DecodedNode {
        unsafe { decode_node(raw).unwrap() }
    }

    fn children(raw: RawNode) -> Vec<RawNode> {
        match node(raw).data {
            NodeData::Document(document) => document.children,
            NodeData::Element(element) => element.children,
            NodeData::Text(_) => Vec::new(),
        }
    }

    fn element_children(raw: RawNode) -> Vec<(DecodedNode, RawNode)> {
        children(raw)
            .into_iter()
            .map(|child| (node(child), child))
            .filter(|(decoded, _)| decoded.node_type.is_element())
            .collect()
    }

    fn tag(decoded: &DecodedNode) -> Tag {
        match &decoded.data {
            NodeData::Element(element) => element.tag,
            _ => Tag::Last,
        }
    }

    #[test]
    fn test_first_and_last_tags() {
        let parsed = Parsed::new(
            "<html><head><head><body><title></title><base></base><tt></tt><unknown123></unknown123></body></html>",
            &ParseOptions::default(),
        );
        let top = element_children(parsed.root());
        assert_eq!(tag(&top[0].0), Tag::Head);
        let NodeData::Element(head) = &top[0].0.data else {
            panic!("expected head element");
        };
        assert_eq!(head.original_tag.as_deref(), Some("<head>"));

        let body: Vec<Tag> = element_children(top[1].1)
            .iter()
            .map(|(decoded, _)| tag(decoded))
            .collect();
        assert_eq!(body, vec![Tag::Title, Tag::Base, Tag::Tt, Tag::Unknown]);
    }

    #[test]
    fn test_implied_head_has_no_original_tag() {
        let parsed = Parsed::new(
            "<html><body class=\"gumbo\">привет!</body></html>",
            &ParseOptions::default(),
        );
        let top = element_children(parsed.root());
        let NodeData::Element(head) = &top[0].0.data else {
            panic!("expected head element");
        };
        assert_eq!(head.tag, Tag::Head);
        assert_eq!(head.original_tag, None);
        assert!(top[0].0.parse_flags.contains(ParseFlags::BY_PARSER | ParseFlags::IMPLIED));

        let NodeData::Element(body) = &top[1].0.data else {
            panic!("expected body element");
        };
        assert_eq!(body.original_tag.as_deref(), Some("<body class=\"gumbo\">"));
        assert_eq!(body.original_end_tag.as_deref(), Some("</body>"));
        let class = unsafe { crate::decode::decode_attribute(body.attributes[0]).unwrap() };
        assert_eq!(class.name.as_deref(), Some("class"));
        assert_eq!(class.value.as_deref(), Some("gumbo"));
        assert_eq!(class.original_value.as_deref(), Some("\"gumbo\""));
    }

    #[test]
    fn test_text_and_whitespace_kinds() {
        let parsed = Parsed::new("<p>a</p>\n<!-- note -->", &ParseOptions::default());
        let body = element_children(parsed.root())[1].1;
        let kinds: Vec<NodeType> = children(body)
            .into_iter()
            .map(|child| node(child).node_type)
            .collect();
        assert_eq!(kinds, vec![NodeType::Element, NodeType::Whitespace, NodeType::Comment]);
    }

    #[test]
    fn test_positions_and_implicit_end_tags() {
        let parsed = Parsed::new("<div>\n  <p>one\n  <p>two\n</div>", &ParseOptions::default());
        let body = element_children(parsed.root())[1].1;
        let div = element_children(body)[0].1;
        let paragraphs = element_children(div);
        assert_eq!(paragraphs.len(), 2);

        let (first, _) = &paragraphs[0];
        let NodeData::Element(p) = &first.data else {
            panic!("expected p element");
        };
        assert_eq!((p.start_position.line, p.start_position.column), (2, 3));
        assert_eq!(p.start_position.offset, 8);
        assert!(first.parse_flags.contains(ParseFlags::IMPLICIT_END_TAG));
        assert_eq!(p.original_end_tag, None);
    }

    #[test]
    fn test_explicit_end_tags_are_recorded() {
        let parsed = Parsed::new("<div id=a>x</div><p>y</p><br>", &ParseOptions::default());
        let body = element_children(parsed.root())[1].1;
        let elements = element_children(body);

        let (div, _) = &elements[0];
        let NodeData::Element(data) = &div.data else {
            panic!("expected div element");
        };
        assert_eq!(data.original_end_tag.as_deref(), Some("</div>"));
        assert_eq!(
            data.end_position,
            SourcePosition {
                line: 1,
                column: 12,
                offset: 11
            }
        );
        assert!(!div.parse_flags.contains(ParseFlags::IMPLICIT_END_TAG));

        let NodeData::Element(p) = &elements[1].0.data else {
            panic!("expected p element");
        };
        assert_eq!(p.original_end_tag.as_deref(), Some("</p>"));
        assert_eq!(p.end_position.offset, 21);

        let (br, _) = &elements[2];
        assert!(br.parse_flags.contains(ParseFlags::IMPLICIT_END_TAG));
    }

    #[test]
    fn test_nested_end_tags_pair_inside_out() {
        let parsed = Parsed::new("<div><div>in</div>out</div>", &ParseOptions::default());
        let body = element_children(parsed.root())[1].1;
        let (outer, outer_raw) = &element_children(body)[0];
        let (inner, _) = &element_children(*outer_raw)[0];
        let (NodeData::Element(outer), NodeData::Element(inner)) = (&outer.data, &inner.data)
        else {
            panic!("expected div elements");
        };
        assert_eq!(inner.end_position.offset, 12);
        assert_eq!(outer.end_position.offset, 21);
    }

    #[test]
    fn test_end_of_file_in_comment_is_a_tokenizer_error() {
        let parsed = Parsed::new("<p>a<!-- never closed", &ParseOptions::default());
        let comment_eof = parsed
            .diagnostics()
            .into_iter()
            .find(|diagnostic| diagnostic.error_type == Some(ErrorType::CommentEof))
            .unwrap();
        assert!(matches!(comment_eof.detail, ErrorDetail::Tokenizer { .. }));
    }

    #[test]
    fn test_foster_parented_text() {
        let parsed = Parsed::new("<table>oops<tr><td>x</td></tr></table>", &ParseOptions::default());
        let body = element_children(parsed.root())[1].1;
        let first = node(children(body)[0]);
        assert_eq!(first.node_type, NodeType::Text);
        assert!(first.parse_flags.contains(ParseFlags::FOSTER_PARENTED));
    }

    #[test]
    fn test_duplicate_attribute_diagnostic() {
        let parsed = Parsed::new("<p class=a class=b>", &ParseOptions::default());
        let duplicate = parsed
            .diagnostics()
            .into_iter()
            .find(|diagnostic| diagnostic.error_type == Some(ErrorType::DuplicateAttr))
            .unwrap();
        assert_eq!(
            duplicate.detail,
            ErrorDetail::DuplicateAttribute {
                name: Some("class".to_string()),
                original_index: 0,
                new_index: 1,
            }
        );
        assert_eq!(duplicate.original_offset, Some(11));
    }

    #[test]
    fn test_error_limits() {
        let html = "<p class=a class=b class=c class=d>";
        let all = Parsed::new(html, &ParseOptions::default()).diagnostics();
        assert!(all.len() >= 3);

        let options = ParseOptions {
            max_errors: Some(1),
            ..ParseOptions::default()
        };
        assert_eq!(Parsed::new(html, &options).diagnostics().len(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let input = b"<p>a\xffb</p>".to_vec();
        let output = BuiltinEngine.parse(&input, &ParseOptions::default()).unwrap();
        let diagnostics: Vec<ParseDiagnostic> = unsafe {
            decode_output(output)
                .unwrap()
                .errors
                .into_iter()
                .map(|error| decode_error(error, &input))
                .collect()
        };
        assert_eq!(diagnostics[0].error_type, Some(ErrorType::Utf8Invalid));
        assert_eq!(diagnostics[0].original_offset, Some(4));
        assert_eq!(diagnostics[0].detail, ErrorDetail::Codepoint(0xFF));
        unsafe { BuiltinEngine.destroy_output(&ParseOptions::default(), output) };
    }

    #[test]
    fn test_fragment_parsing() {
        let parsed = Parsed::new("<td>cell</td>", &ParseOptions::fragment(Tag::Tr));
        let root = node(parsed.root());
        assert_eq!(tag(&root), Tag::Html);
        let cells = element_children(parsed.root());
        assert_eq!(tag(&cells[0].0), Tag::Td);
    }

    #[test]
    fn test_doctype_and_quirks() {
        let parsed = Parsed::new("<!DOCTYPE html><p>", &ParseOptions::default());
        let document = unsafe { decode_output(parsed.output).unwrap().document };
        let NodeData::Document(document) = node(document).data else {
            panic!("expected document");
        };
        assert!(document.has_doctype);
        assert_eq!(document.name.as_deref(), Some("html"));
        assert_eq!(document.quirks_mode, QuirksMode::NoQuirks);

        let quirky = Parsed::new("<p>", &ParseOptions::default());
        let document = unsafe { decode_output(quirky.output).unwrap().document };
        let NodeData::Document(document) = node(document).data else {
            panic!("expected document");
        };
        assert!(!document.has_doctype);
        assert_eq!(document.quirks_mode, QuirksMode::Quirks);
    }

    #[test]
    fn test_classify_tokenizer_messages() {
        let (error_type, payload) = classify_error("Saw EOF in state Comment", &[]);
        assert_eq!(error_type, ErrorType::CommentEof);
        assert_eq!(
            payload,
            ErrorPayloadSpec::Tokenizer {
                codepoint: -1,
                state: TokenizerState::Comment,
            }
        );

        let (error_type, _) = classify_error("Saw = in state BeforeAttributeName", &[]);
        assert_eq!(error_type, ErrorType::AttrNameInvalid);
    }

    #[test]
    fn test_classify_tree_builder_messages() {
        let message = "Unexpected token TagToken(Tag { kind: StartTag, name: Atom('head' type=static), self_closing: false, attrs: [] }) in insertion mode InBody";
        let (error_type, payload) = classify_error(message, &[Tag::Html, Tag::Body]);
        assert_eq!(error_type, ErrorType::Parser);
        assert_eq!(
            payload,
            ErrorPayloadSpec::Parser {
                input_type: TokenType::StartTag,
                input_tag: Tag::Head,
                parser_state: InsertionMode::InBody,
                tag_stack: vec![Tag::Html, Tag::Body],
            }
        );
    }

    #[test]
    fn test_builder_output_without_input() {
        let mut builder = BlobBuilder::new();
        let doc = builder.document(None);
        builder.text(doc, NodeType::Text, "x");
        let blob = builder.finish();
        let document = unsafe { decode_output(blob.output()).unwrap().document };
        assert_eq!(children(document).len(), 1);
    }
}
