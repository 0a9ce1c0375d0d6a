//! Native Record Decoder
//!
//! Turns engine records into owned Rust values. Union-shaped records are
//! decoded in two steps: the common header is read first, its discriminant
//! is validated, and only then is the payload arm that the discriminant
//! names read. Strings are copied out of foreign memory so decoded values
//! outlive the output blob; child and attribute vectors stay as raw handles
//! so they can be decoded later, on demand.
//!
//! All decode functions are `unsafe`: the caller guarantees the record
//! handle points into an output blob that has not been destroyed.

use crate::ffi::{
    AttributeRecord, DocumentRecord, ElementRecord, ErrorRecord, NodeHeader, NodeRecord,
    OutputRecord, SourcePosition, StringPiece, TextRecord, Vector,
};
use crate::{AttrNamespace, DecodeError, Namespace, NodeType, ParseFlags, QuirksMode, Tag};
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr::NonNull;
use std::slice;

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident => $record:ty, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonNull<$record>);

        // SAFETY: the handle is only an address. Dereferencing happens in the
        // unsafe decode functions, whose callers guarantee the blob is alive.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            /// Wrap a record pointer; `None` for null
            pub fn new(ptr: *mut $record) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            fn from_slot(slot: *mut c_void) -> Result<Self, DecodeError> {
                Self::new(slot.cast()).ok_or(DecodeError::NullRecord { record: $label })
            }

            pub fn as_ptr(self) -> *mut $record {
                self.0.as_ptr()
            }
        }
    };
}

raw_handle!(
    /// Handle to a node record inside an output blob
    RawNode => NodeRecord, "node"
);
raw_handle!(
    /// Handle to an attribute record inside an output blob
    RawAttribute => AttributeRecord, "attribute"
);
raw_handle!(
    /// Handle to an error record inside an output blob
    RawError => ErrorRecord, "error"
);

/// A decoded node: header fields plus the variant payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNode {
    pub node_type: NodeType,
    pub parse_flags: ParseFlags,
    /// Logical position among the parent's children
    pub index_within_parent: usize,
    pub data: NodeData,
}

/// Variant payload of a decoded node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document(DocumentData),
    Element(ElementData),
    Text(TextData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentData {
    /// Children in raw storage order
    pub children: Vec<RawNode>,
    pub has_doctype: bool,
    pub name: Option<String>,
    pub public_identifier: Option<String>,
    pub system_identifier: Option<String>,
    pub quirks_mode: QuirksMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Children in raw storage order
    pub children: Vec<RawNode>,
    pub tag: Tag,
    pub namespace: Namespace,
    pub original_tag: Option<String>,
    /// Raw span of the original start tag, for `Engine::tag_from_original_text`
    pub original_tag_span: StringPiece,
    pub original_end_tag: Option<String>,
    pub start_position: SourcePosition,
    pub end_position: SourcePosition,
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextData {
    pub text: Option<String>,
    pub start_position: SourcePosition,
}

/// A decoded attribute record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttribute {
    pub namespace: AttrNamespace,
    pub name: Option<String>,
    pub value: Option<String>,
    pub original_name: Option<String>,
    pub original_value: Option<String>,
    pub name_start: SourcePosition,
    pub name_end: SourcePosition,
    pub value_start: SourcePosition,
    pub value_end: SourcePosition,
}

/// Top-level pointers of an output blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOutput {
    pub document: RawNode,
    pub root: Option<RawNode>,
    pub errors: Vec<RawError>,
}

/// Decode the output record.
///
/// # Safety
/// `output` must point to a live output record.
pub unsafe fn decode_output(output: NonNull<OutputRecord>) -> Result<DecodedOutput, DecodeError> {
    // SAFETY: guaranteed live by the caller
    let record = unsafe { output.as_ptr().read() };
    let document =
        RawNode::new(record.document).ok_or(DecodeError::NullRecord { record: "document" })?;
    // SAFETY: the error vector belongs to the same live blob
    let errors = unsafe { read_vector(&record.errors) }
        .into_iter()
        .map(RawError::from_slot)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedOutput {
        document,
        root: RawNode::new(record.root),
        errors,
    })
}

/// Read only the common node header.
///
/// # Safety
/// `node` must point to a live node record.
pub unsafe fn read_node_header(node: RawNode) -> NodeHeader {
    // SAFETY: the header is the first field of every node record
    unsafe { node.as_ptr().cast::<NodeHeader>().read() }
}

/// Decode a node record: discriminant first, then the matching payload.
///
/// # Safety
/// `node` must point to a live node record.
pub unsafe fn decode_node(node: RawNode) -> Result<DecodedNode, DecodeError> {
    // SAFETY: guaranteed live by the caller
    let header = unsafe { read_node_header(node) };
    let raw_type = header.node_type as u32;
    let node_type = NodeType::from_raw(raw_type).ok_or(DecodeError::UnknownNodeType(raw_type))?;

    // SAFETY: `v` follows the header in every node record
    let payload = unsafe { &raw const (*node.as_ptr()).v };
    let data = match node_type {
        // SAFETY (all arms): the validated discriminant names the arm read
        NodeType::Document => {
            let record = unsafe { payload.cast::<DocumentRecord>().read() };
            NodeData::Document(unsafe { decode_document(&record) }?)
        }
        NodeType::Element | NodeType::Template => {
            let record = unsafe { payload.cast::<ElementRecord>().read() };
            NodeData::Element(unsafe { decode_element(&record) }?)
        }
        NodeType::Text | NodeType::Cdata | NodeType::Comment | NodeType::Whitespace => {
            let record = unsafe { payload.cast::<TextRecord>().read() };
            NodeData::Text(unsafe { decode_text(&record) })
        }
    };

    Ok(DecodedNode {
        node_type,
        parse_flags: ParseFlags::from_bits(header.parse_flags as u32),
        index_within_parent: header.index_within_parent,
        data,
    })
}

unsafe fn decode_document(record: &DocumentRecord) -> Result<DocumentData, DecodeError> {
    let raw_quirks = record.doc_type_quirks_mode as u32;
    let quirks_mode = QuirksMode::from_raw(raw_quirks).ok_or(DecodeError::UnknownValue {
        field: "quirks mode",
        raw: raw_quirks,
    })?;
    // SAFETY: all pointers belong to the caller's live blob
    unsafe {
        Ok(DocumentData {
            children: node_vector(&record.children)?,
            has_doctype: record.has_doctype,
            name: read_c_str(record.name),
            public_identifier: read_c_str(record.public_identifier),
            system_identifier: read_c_str(record.system_identifier),
            quirks_mode,
        })
    }
}

unsafe fn decode_element(record: &ElementRecord) -> Result<ElementData, DecodeError> {
    let raw_tag = record.tag as u32;
    let tag = Tag::from_raw(raw_tag).ok_or(DecodeError::UnknownTag(raw_tag))?;
    let raw_ns = record.tag_namespace as u32;
    let namespace = Namespace::from_raw(raw_ns).ok_or(DecodeError::UnknownValue {
        field: "tag namespace",
        raw: raw_ns,
    })?;
    // SAFETY: all pointers belong to the caller's live blob
    unsafe {
        Ok(ElementData {
            children: node_vector(&record.children)?,
            tag,
            namespace,
            original_tag: read_piece(record.original_tag),
            original_tag_span: record.original_tag,
            original_end_tag: read_piece(record.original_end_tag),
            start_position: record.start_pos,
            end_position: record.end_pos,
            attributes: read_vector(&record.attributes)
                .into_iter()
                .map(RawAttribute::from_slot)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

unsafe fn decode_text(record: &TextRecord) -> TextData {
    TextData {
        // SAFETY: the text pointer belongs to the caller's live blob
        text: unsafe { read_c_str(record.text) },
        start_position: record.start_pos,
    }
}

/// Decode an attribute record.
///
/// # Safety
/// `attribute` must point to a live attribute record.
pub unsafe fn decode_attribute(attribute: RawAttribute) -> Result<DecodedAttribute, DecodeError> {
    // SAFETY: guaranteed live by the caller
    let record = unsafe { attribute.as_ptr().read() };
    let raw_ns = record.attr_namespace as u32;
    let namespace = AttrNamespace::from_raw(raw_ns).ok_or(DecodeError::UnknownValue {
        field: "attribute namespace",
        raw: raw_ns,
    })?;
    // SAFETY: string pointers belong to the same live blob
    unsafe {
        Ok(DecodedAttribute {
            namespace,
            name: read_c_str(record.name),
            value: read_c_str(record.value),
            original_name: read_piece(record.original_name),
            original_value: read_piece(record.original_value),
            name_start: record.name_start,
            name_end: record.name_end,
            value_start: record.value_start,
            value_end: record.value_end,
        })
    }
}

unsafe fn node_vector(vector: &Vector) -> Result<Vec<RawNode>, DecodeError> {
    // SAFETY: forwarded from the caller
    unsafe { read_vector(vector) }
        .into_iter()
        .map(RawNode::from_slot)
        .collect()
}

/// Copy the pointer slots of a vector. A null data pointer is an empty vector.
///
/// # Safety
/// `vector.data` must be null or point to `vector.length` readable slots.
pub unsafe fn read_vector(vector: &Vector) -> Vec<*mut c_void> {
    if vector.data.is_null() || vector.length == 0 {
        return Vec::new();
    }
    // SAFETY: guaranteed by the caller
    unsafe { slice::from_raw_parts(vector.data, vector.length as usize) }.to_vec()
}

/// Decode a NUL-terminated UTF-8 string. Null decodes to `None`.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated byte string.
pub unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller; the length is found before copying
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Decode a length-prefixed UTF-8 span. A null span decodes to `None`.
///
/// # Safety
/// `piece.data` must be null or point to `piece.length` readable bytes.
pub unsafe fn read_piece(piece: StringPiece) -> Option<String> {
    if piece.data.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller
    let bytes = unsafe { slice::from_raw_parts(piece.data.cast::<u8>(), piece.length) };
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{AttributeSpec, BlobBuilder, ElementSpec};
    use pretty_assertions::assert_eq;
    use std::ptr;

    #[test]
    fn test_null_strings_decode_to_none() {
        unsafe {
            assert_eq!(read_c_str(ptr::null()), None);
            assert_eq!(read_piece(StringPiece::EMPTY), None);
        }
    }

    #[test]
    fn test_piece_reads_exact_length() {
        let text = b"<div class=x>";
        let piece = StringPiece::new(text.as_ptr().cast(), 4);
        assert_eq!(unsafe { read_piece(piece) }.as_deref(), Some("<div"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let bytes = b"a\xffb\0";
        let text = unsafe { read_c_str(bytes.as_ptr().cast()) };
        assert_eq!(text.as_deref(), Some("a\u{fffd}b"));
    }

    #[test]
    fn test_decode_is_pure() {
        let mut builder = BlobBuilder::new();
        let doc = builder.document(None);
        let html = builder.element(doc, ElementSpec::new(Tag::Html));
        builder.attribute(html, AttributeSpec::new("lang", "en"));
        builder.text(html, NodeType::Text, "hi");
        let blob = builder.finish();

        unsafe {
            let output = decode_output(blob.output()).unwrap();
            let first = decode_node(output.document).unwrap();
            let second = decode_node(output.document).unwrap();
            assert_eq!(first, second);

            let root = decode_node(output.root.unwrap()).unwrap();
            let NodeData::Element(element) = root.data else {
                panic!("root should be an element");
            };
            assert_eq!(element.tag, Tag::Html);
            let attr = decode_attribute(element.attributes[0]).unwrap();
            assert_eq!(attr.name.as_deref(), Some("lang"));
            assert_eq!(attr, decode_attribute(element.attributes[0]).unwrap());
        }
    }

    #[test]
    fn test_unknown_node_type_is_an_error() {
        let mut builder = BlobBuilder::new();
        let doc = builder.document(None);
        let node = builder.element(doc, ElementSpec::new(Tag::Div));
        builder.set_raw_node_type(node, 99);
        let blob = builder.finish();

        unsafe {
            let output = decode_output(blob.output()).unwrap();
            let NodeData::Document(document) = decode_node(output.document).unwrap().data else {
                panic!("expected document");
            };
            assert_eq!(
                decode_node(document.children[0]),
                Err(DecodeError::UnknownNodeType(99))
            );
        }
    }

    #[test]
    fn test_text_kinds_share_text_payload() {
        let mut builder = BlobBuilder::new();
        let doc = builder.document(None);
        builder.text(doc, NodeType::Comment, " note ");
        let blob = builder.finish();

        unsafe {
            let output = decode_output(blob.output()).unwrap();
            let NodeData::Document(document) = decode_node(output.document).unwrap().data else {
                panic!("expected document");
            };
            let comment = decode_node(document.children[0]).unwrap();
            assert_eq!(comment.node_type, NodeType::Comment);
            assert_eq!(
                comment.data,
                NodeData::Text(TextData {
                    text: Some(" note ".to_string()),
                    start_position: SourcePosition::default(),
                })
            );
        }
    }
}
