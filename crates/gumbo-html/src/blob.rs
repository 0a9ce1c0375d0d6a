//! Output Blob Builder
//!
//! Lays a tree out as engine records on the heap, in the same shape a foreign
//! engine hands out. The built-in engine uses it to send html5ever output
//! across the engine boundary. It can also store children out of document
//! order and write raw discriminants, which is how decoder edge cases are
//! produced in tests.

use crate::engine::Engine;
use crate::ffi::{
    AttributeRecord, DocumentRecord, DuplicateAttrRecord, ElementRecord, ErrorHeader,
    ErrorPayload, ErrorRecord, NodeHeader, NodePayload, NodeRecord, OutputRecord,
    ParserErrorRecord, SourcePosition, StringPiece, TextRecord, TokenizerErrorRecord, Vector,
};
use crate::{
    AttrNamespace, EngineError, ErrorType, InsertionMode, Namespace, NodeType, ParseFlags,
    ParseOptions, QuirksMode, Tag, TokenType, TokenizerState,
};
use std::ffi::CString;
use std::fmt;
use std::mem;
use std::ops::Range;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr::{self, NonNull};

/// Node handle, valid for the builder that returned it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Text placed in a record span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Text copied into the blob
    Owned(String),
    /// Byte range of the input given to `BlobBuilder::with_input`
    Input(Range<usize>),
}

impl Piece {
    pub fn owned(text: impl Into<String>) -> Self {
        Piece::Owned(text.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctypeSpec {
    pub name: String,
    pub public_identifier: Option<String>,
    pub system_identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    /// `Element` or `Template`
    pub kind: NodeType,
    pub tag: Tag,
    pub namespace: Namespace,
    pub original_tag: Option<Piece>,
    pub original_end_tag: Option<Piece>,
}

impl ElementSpec {
    pub fn new(tag: Tag) -> Self {
        Self {
            kind: if tag == Tag::Template {
                NodeType::Template
            } else {
                NodeType::Element
            },
            tag,
            namespace: Namespace::Html,
            original_tag: None,
            original_end_tag: None,
        }
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn original_tag(mut self, piece: Piece) -> Self {
        self.original_tag = Some(piece);
        self
    }

    pub fn original_end_tag(mut self, piece: Piece) -> Self {
        self.original_end_tag = Some(piece);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub namespace: AttrNamespace,
    pub name: String,
    pub value: String,
    pub original_name: Option<Piece>,
    pub original_value: Option<Piece>,
    pub name_start: SourcePosition,
    pub name_end: SourcePosition,
    pub value_start: SourcePosition,
    pub value_end: SourcePosition,
}

impl AttributeSpec {
    /// Attribute written as `name="value"`
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self {
            namespace: AttrNamespace::None,
            original_name: Some(Piece::Owned(name.clone())),
            original_value: Some(Piece::Owned(format!("\"{value}\""))),
            name,
            value,
            name_start: SourcePosition::default(),
            name_end: SourcePosition::default(),
            value_start: SourcePosition::default(),
            value_end: SourcePosition::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSpec {
    /// Discriminant written to the record, normally an `ErrorType`
    pub raw_type: u32,
    pub position: SourcePosition,
    /// Offset into the input given to `BlobBuilder::with_input`
    pub original_offset: Option<usize>,
    pub payload: ErrorPayloadSpec,
}

impl ErrorSpec {
    pub fn new(error_type: ErrorType, payload: ErrorPayloadSpec) -> Self {
        Self {
            raw_type: error_type.as_raw(),
            position: SourcePosition::default(),
            original_offset: None,
            payload,
        }
    }
}

/// Error payload arm to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayloadSpec {
    Codepoint(u64),
    Tokenizer {
        codepoint: i32,
        state: TokenizerState,
    },
    NamedCharacter(Option<Piece>),
    DuplicateAttribute {
        name: String,
        original_index: u32,
        new_index: u32,
    },
    Parser {
        input_type: TokenType,
        input_tag: Tag,
        parser_state: InsertionMode,
        tag_stack: Vec<Tag>,
    },
}

#[derive(Debug)]
enum DraftPayload {
    Document {
        doctype: Option<DoctypeSpec>,
        quirks_mode: QuirksMode,
    },
    Element {
        spec: ElementSpec,
        attributes: Vec<AttributeSpec>,
    },
    Text {
        text: String,
        original_text: Option<Piece>,
    },
}

#[derive(Debug)]
struct NodeDraft {
    raw_type: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    index_override: Option<usize>,
    reversed: bool,
    parse_flags: ParseFlags,
    start_position: SourcePosition,
    end_position: SourcePosition,
    payload: DraftPayload,
}

impl NodeDraft {
    fn new(raw_type: u32, parent: Option<NodeId>, payload: DraftPayload) -> Self {
        Self {
            raw_type,
            parent,
            children: Vec::new(),
            index_override: None,
            reversed: false,
            parse_flags: ParseFlags::NORMAL,
            start_position: SourcePosition::default(),
            end_position: SourcePosition::default(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InputSpan {
    base: *const u8,
    len: usize,
}

/// Assembles an output blob
#[derive(Debug, Default)]
pub struct BlobBuilder {
    input: Option<InputSpan>,
    nodes: Vec<NodeDraft>,
    errors: Vec<ErrorSpec>,
    document: Option<NodeId>,
}

impl BlobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose `Piece::Input` spans and error offsets point into
    /// `input`. The blob holds raw pointers into `input`; it must stay alive
    /// and unmoved while the blob is decoded.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: Some(InputSpan {
                base: input.as_ptr(),
                len: input.len(),
            }),
            ..Self::default()
        }
    }

    /// The document node, created on first call
    pub fn document(&mut self, doctype: Option<DoctypeSpec>) -> NodeId {
        let id = self.ensure_document();
        if let DraftPayload::Document { doctype: slot, .. } = &mut self.nodes[id.0].payload {
            *slot = doctype;
        }
        id
    }

    fn ensure_document(&mut self) -> NodeId {
        if let Some(id) = self.document {
            return id;
        }
        let id = self.push(NodeDraft::new(
            NodeType::Document.as_raw(),
            None,
            DraftPayload::Document {
                doctype: None,
                quirks_mode: QuirksMode::NoQuirks,
            },
        ));
        self.document = Some(id);
        id
    }

    pub fn set_quirks_mode(&mut self, mode: QuirksMode) {
        let id = self.ensure_document();
        if let DraftPayload::Document { quirks_mode, .. } = &mut self.nodes[id.0].payload {
            *quirks_mode = mode;
        }
    }

    /// Append an element to `parent`
    pub fn element(&mut self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let node = self.create_element(spec);
        self.append_child(parent, node);
        node
    }

    /// Append a text-shaped node (text, CDATA, comment, whitespace)
    pub fn text(&mut self, parent: NodeId, kind: NodeType, text: impl Into<String>) -> NodeId {
        let node = self.create_text(kind, text);
        self.append_child(parent, node);
        node
    }

    /// Element not yet attached to the tree
    pub fn create_element(&mut self, spec: ElementSpec) -> NodeId {
        self.push(NodeDraft::new(
            spec.kind.as_raw(),
            None,
            DraftPayload::Element {
                spec,
                attributes: Vec::new(),
            },
        ))
    }

    /// Text-shaped node not yet attached to the tree
    pub fn create_text(&mut self, kind: NodeType, text: impl Into<String>) -> NodeId {
        self.push(NodeDraft::new(
            kind.as_raw(),
            None,
            DraftPayload::Text {
                text: text.into(),
                original_text: None,
            },
        ))
    }

    /// Append an attribute to an element; ignored for other nodes
    pub fn attribute(&mut self, element: NodeId, spec: AttributeSpec) {
        if let DraftPayload::Element { attributes, .. } = &mut self.nodes[element.0].payload {
            attributes.push(spec);
        }
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> bool {
        match &self.nodes[element.0].payload {
            DraftPayload::Element { attributes, .. } => {
                attributes.iter().any(|attribute| attribute.name == name)
            }
            _ => false,
        }
    }

    pub fn error(&mut self, spec: ErrorSpec) {
        self.errors.push(spec);
    }

    /// Move `node` to the end of `parent`'s children
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) {
        self.detach(node);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.push(node);
    }

    /// Move `node` right before `sibling`; no-op if `sibling` is detached
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        let Some(parent) = self.nodes[sibling.0].parent else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        let at = children
            .iter()
            .position(|&child| child == sibling)
            .unwrap_or(children.len());
        children.insert(at, node);
        self.nodes[node.0].parent = Some(parent);
    }

    /// Remove `node` from its parent
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Kind of `node` as written by the builder
    pub fn kind(&self, node: NodeId) -> Option<NodeType> {
        NodeType::from_raw(self.nodes[node.0].raw_type)
    }

    /// Mutable text of a text-shaped node
    pub fn text_mut(&mut self, node: NodeId) -> Option<&mut String> {
        match &mut self.nodes[node.0].payload {
            DraftPayload::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Change the kind of a text-shaped node
    pub fn set_text_kind(&mut self, node: NodeId, kind: NodeType) {
        if kind.is_text() && matches!(self.nodes[node.0].payload, DraftPayload::Text { .. }) {
            self.nodes[node.0].raw_type = kind.as_raw();
        }
    }

    pub fn set_original_text(&mut self, node: NodeId, piece: Piece) {
        if let DraftPayload::Text { original_text, .. } = &mut self.nodes[node.0].payload {
            *original_text = Some(piece);
        }
    }

    pub fn set_original_end_tag(&mut self, node: NodeId, piece: Piece) {
        if let DraftPayload::Element { spec, .. } = &mut self.nodes[node.0].payload {
            spec.original_end_tag = Some(piece);
        }
    }

    pub fn set_parse_flags(&mut self, node: NodeId, flags: ParseFlags) {
        self.nodes[node.0].parse_flags = flags;
    }

    pub fn add_parse_flags(&mut self, node: NodeId, flags: ParseFlags) {
        self.nodes[node.0].parse_flags |= flags;
    }

    pub fn set_start_position(&mut self, node: NodeId, position: SourcePosition) {
        self.nodes[node.0].start_position = position;
    }

    pub fn set_end_position(&mut self, node: NodeId, position: SourcePosition) {
        self.nodes[node.0].end_position = position;
    }

    /// Write `index` as the node's logical index instead of its position
    pub fn set_index_within_parent(&mut self, node: NodeId, index: usize) {
        self.nodes[node.0].index_override = Some(index);
    }

    /// Store `parent`'s children vector in reverse document order
    pub fn reverse_storage(&mut self, parent: NodeId) {
        self.nodes[parent.0].reversed = true;
    }

    /// Write an arbitrary node discriminant. Only meant for values no node
    /// kind uses; the payload is left as written.
    pub fn set_raw_node_type(&mut self, node: NodeId, raw: u32) {
        self.nodes[node.0].raw_type = raw;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, draft: NodeDraft) -> NodeId {
        self.nodes.push(draft);
        NodeId(self.nodes.len() - 1)
    }

    /// Lay the tree out as records
    pub fn finish(mut self) -> OwnedBlob {
        let document = self.ensure_document();
        let mut storage = Storage::default();

        // SAFETY: all-zero is a valid node record (null pointers, zero ints)
        let records: Vec<*mut NodeRecord> = self
            .nodes
            .iter()
            .map(|_| Box::into_raw(Box::new(unsafe { mem::zeroed::<NodeRecord>() })))
            .collect();
        storage.nodes.extend(records.iter().copied());

        let mut logical = vec![0; self.nodes.len()];
        for draft in &self.nodes {
            for (index, child) in draft.children.iter().enumerate() {
                logical[child.0] = index;
            }
        }

        for (index, draft) in self.nodes.iter().enumerate() {
            let header = NodeHeader {
                node_type: draft.raw_type as c_int,
                parent: draft.parent.map_or(ptr::null_mut(), |p| records[p.0]),
                index_within_parent: draft.index_override.unwrap_or(logical[index]),
                parse_flags: draft.parse_flags.bits() as c_int,
            };

            let mut slots: Vec<*mut c_void> = draft
                .children
                .iter()
                .map(|child| records[child.0].cast())
                .collect();
            if draft.reversed {
                slots.reverse();
            }
            let children = storage.vector(slots);

            // SAFETY: all-zero is a valid payload for every arm
            let mut payload: NodePayload = unsafe { mem::zeroed() };
            match &draft.payload {
                DraftPayload::Document {
                    doctype,
                    quirks_mode,
                } => {
                    let (name, public_identifier, system_identifier) = match doctype {
                        Some(doctype) => (
                            storage.c_string(&doctype.name).0,
                            storage.optional_c_string(doctype.public_identifier.as_deref()),
                            storage.optional_c_string(doctype.system_identifier.as_deref()),
                        ),
                        None => (ptr::null(), ptr::null(), ptr::null()),
                    };
                    payload.document = DocumentRecord {
                        children,
                        has_doctype: doctype.is_some(),
                        name,
                        public_identifier,
                        system_identifier,
                        doc_type_quirks_mode: quirks_mode.as_raw() as c_int,
                    };
                }
                DraftPayload::Element { spec, attributes } => {
                    let attributes = attributes
                        .iter()
                        .map(|attribute| storage.attribute(attribute, self.input).cast())
                        .collect();
                    payload.element = ElementRecord {
                        children,
                        tag: spec.tag.as_raw() as c_int,
                        tag_namespace: spec.namespace.as_raw() as c_int,
                        original_tag: storage.piece(spec.original_tag.as_ref(), self.input),
                        original_end_tag: storage.piece(spec.original_end_tag.as_ref(), self.input),
                        start_pos: draft.start_position,
                        end_pos: draft.end_position,
                        attributes: storage.vector(attributes),
                    };
                }
                DraftPayload::Text {
                    text,
                    original_text,
                } => {
                    payload.text = TextRecord {
                        text: storage.c_string(text).0,
                        original_text: storage.piece(original_text.as_ref(), self.input),
                        start_pos: draft.start_position,
                    };
                }
            }

            // SAFETY: freshly allocated above and owned by `storage`
            unsafe { records[index].write(NodeRecord { header, v: payload }) };
        }

        let errors = self
            .errors
            .iter()
            .map(|spec| storage.error(spec, self.input).cast())
            .collect();
        let root = self.nodes[document.0]
            .children
            .iter()
            .find(|child| {
                NodeType::from_raw(self.nodes[child.0].raw_type).is_some_and(NodeType::is_element)
            })
            .map_or(ptr::null_mut(), |child| records[child.0]);

        let output = OutputRecord {
            document: records[document.0],
            root,
            errors: storage.vector(errors),
        };
        let blob = Box::new(Blob { output, storage });
        OwnedBlob {
            blob: NonNull::from(Box::leak(blob)),
        }
    }
}

/// Heap allocations behind one blob, freed together
#[derive(Default)]
struct Storage {
    nodes: Vec<*mut NodeRecord>,
    attributes: Vec<*mut AttributeRecord>,
    errors: Vec<*mut ErrorRecord>,
    strings: Vec<*mut c_char>,
    arrays: Vec<*mut [*mut c_void]>,
}

impl Storage {
    /// NUL-terminated copy of `text`; interior NULs become U+FFFD
    fn c_string(&mut self, text: &str) -> (*const c_char, usize) {
        let text = text.replace('\0', "\u{fffd}");
        let length = text.len();
        let raw = CString::new(text).unwrap_or_default().into_raw();
        self.strings.push(raw);
        (raw.cast_const(), length)
    }

    fn optional_c_string(&mut self, text: Option<&str>) -> *const c_char {
        text.map_or(ptr::null(), |text| self.c_string(text).0)
    }

    fn piece(&mut self, piece: Option<&Piece>, input: Option<InputSpan>) -> StringPiece {
        match (piece, input) {
            (None, _) => StringPiece::EMPTY,
            (Some(Piece::Owned(text)), _) => {
                let (data, length) = self.c_string(text);
                StringPiece::new(data, length)
            }
            (Some(Piece::Input(range)), Some(input))
                if range.start <= range.end && range.end <= input.len =>
            {
                StringPiece::new(input.base.wrapping_add(range.start).cast(), range.len())
            }
            (Some(Piece::Input(_)), _) => StringPiece::EMPTY,
        }
    }

    fn vector(&mut self, slots: Vec<*mut c_void>) -> Vector {
        if slots.is_empty() {
            return Vector::EMPTY;
        }
        let length = slots.len() as c_uint;
        let raw = Box::into_raw(slots.into_boxed_slice());
        self.arrays.push(raw);
        Vector {
            data: raw.cast::<*mut c_void>(),
            length,
            capacity: length,
        }
    }

    fn attribute(&mut self, spec: &AttributeSpec, input: Option<InputSpan>) -> *mut AttributeRecord {
        let record = AttributeRecord {
            attr_namespace: spec.namespace.as_raw() as c_int,
            name: self.c_string(&spec.name).0,
            original_name: self.piece(spec.original_name.as_ref(), input),
            value: self.c_string(&spec.value).0,
            original_value: self.piece(spec.original_value.as_ref(), input),
            name_start: spec.name_start,
            name_end: spec.name_end,
            value_start: spec.value_start,
            value_end: spec.value_end,
        };
        let raw = Box::into_raw(Box::new(record));
        self.attributes.push(raw);
        raw
    }

    fn error(&mut self, spec: &ErrorSpec, input: Option<InputSpan>) -> *mut ErrorRecord {
        let original_text = match (spec.original_offset, input) {
            (Some(offset), Some(input)) if offset <= input.len => {
                input.base.wrapping_add(offset).cast::<c_char>()
            }
            _ => ptr::null(),
        };

        // SAFETY: all-zero is a valid payload for every arm
        let mut payload: ErrorPayload = unsafe { mem::zeroed() };
        match &spec.payload {
            ErrorPayloadSpec::Codepoint(codepoint) => payload.codepoint = *codepoint,
            ErrorPayloadSpec::Tokenizer { codepoint, state } => {
                payload.tokenizer = TokenizerErrorRecord {
                    codepoint: *codepoint,
                    state: state.as_raw() as c_int,
                };
            }
            ErrorPayloadSpec::NamedCharacter(text) => {
                payload.text = self.piece(text.as_ref(), input);
            }
            ErrorPayloadSpec::DuplicateAttribute {
                name,
                original_index,
                new_index,
            } => {
                payload.duplicate_attr = DuplicateAttrRecord {
                    name: self.c_string(name).0.cast_mut(),
                    original_index: *original_index,
                    new_index: *new_index,
                };
            }
            ErrorPayloadSpec::Parser {
                input_type,
                input_tag,
                parser_state,
                tag_stack,
            } => {
                let stack = tag_stack
                    .iter()
                    .map(|tag| ptr::without_provenance_mut(tag.as_raw() as usize))
                    .collect();
                payload.parser = ParserErrorRecord {
                    input_type: input_type.as_raw() as c_int,
                    input_tag: input_tag.as_raw() as c_int,
                    parser_state: parser_state.as_raw() as c_int,
                    tag_stack: self.vector(stack),
                };
            }
        }

        let record = ErrorRecord {
            header: ErrorHeader {
                error_type: spec.raw_type as c_int,
                position: spec.position,
                original_text,
            },
            v: payload,
        };
        let raw = Box::into_raw(Box::new(record));
        self.errors.push(raw);
        raw
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        // SAFETY: every pointer was produced by `Box::into_raw` or
        // `CString::into_raw` in this storage and is freed exactly once
        unsafe {
            for node in self.nodes.drain(..) {
                drop(Box::from_raw(node));
            }
            for attribute in self.attributes.drain(..) {
                drop(Box::from_raw(attribute));
            }
            for error in self.errors.drain(..) {
                drop(Box::from_raw(error));
            }
            for string in self.strings.drain(..) {
                drop(CString::from_raw(string));
            }
            for array in self.arrays.drain(..) {
                drop(Box::from_raw(array));
            }
        }
    }
}

/// A blob allocation. `output` is first so a blob pointer is also a
/// pointer to its output record.
#[repr(C)]
struct Blob {
    output: OutputRecord,
    storage: Storage,
}

/// Exclusive owner of a finished blob
pub struct OwnedBlob {
    blob: NonNull<Blob>,
}

// SAFETY: the blob is uniquely owned heap memory; nothing else holds
// pointers into it until `into_raw` hands ownership away
unsafe impl Send for OwnedBlob {}
unsafe impl Sync for OwnedBlob {}

impl OwnedBlob {
    pub fn output(&self) -> NonNull<OutputRecord> {
        self.blob.cast()
    }

    /// Give up ownership; free later with `destroy`
    pub fn into_raw(self) -> NonNull<OutputRecord> {
        let output = self.output();
        mem::forget(self);
        output
    }
}

impl Drop for OwnedBlob {
    fn drop(&mut self) {
        // SAFETY: the blob is still owned here
        unsafe { destroy(self.output()) }
    }
}

impl fmt::Debug for OwnedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedBlob").field(&self.blob).finish()
    }
}

/// Free a blob released with `OwnedBlob::into_raw`.
///
/// # Safety
/// `output` must come from `OwnedBlob::into_raw` and not be freed already.
pub unsafe fn destroy(output: NonNull<OutputRecord>) {
    // SAFETY: guaranteed by the caller; `Blob` starts with its output record
    drop(unsafe { Box::from_raw(output.cast::<Blob>().as_ptr()) });
}

/// Engine serving blobs assembled by a closure
pub struct BuilderEngine<F> {
    build: F,
}

impl<F> BuilderEngine<F>
where
    F: Fn(&[u8], &ParseOptions) -> BlobBuilder + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self { build }
    }
}

impl<F> fmt::Debug for BuilderEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderEngine").finish_non_exhaustive()
    }
}

impl<F> Engine for BuilderEngine<F>
where
    F: Fn(&[u8], &ParseOptions) -> BlobBuilder + Send + Sync,
{
    fn parse(
        &self,
        input: &[u8],
        options: &ParseOptions,
    ) -> Result<NonNull<OutputRecord>, EngineError> {
        Ok((self.build)(input, options).finish().into_raw())
    }

    unsafe fn destroy_output(&self, _options: &ParseOptions, output: NonNull<OutputRecord>) {
        // SAFETY: forwarded from the caller; `parse` produced it with `into_raw`
        unsafe { destroy(output) }
    }
}
