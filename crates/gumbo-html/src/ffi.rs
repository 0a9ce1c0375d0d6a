//! Engine Record Layouts
//!
//! `#[repr(C)]` mirrors of the records the engine hands out. Enumerated
//! fields are kept as raw `c_int`s: a value coming from foreign memory is
//! only turned into a Rust enum after the decoder has checked it.
//!
//! Nodes and errors are tagged unions. Each starts with a common header
//! (`NodeHeader`, `ErrorHeader`) whose discriminant selects the payload arm.

use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;

/// Position in the source text.
///
/// `line` and `column` are 1-based, `offset` is a 0-based byte offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: c_uint,
    pub column: c_uint,
    pub offset: c_uint,
}

/// Length-prefixed byte span. `data` is null iff `length` is zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringPiece {
    pub data: *const c_char,
    pub length: usize,
}

impl StringPiece {
    /// The empty span
    pub const EMPTY: StringPiece = StringPiece {
        data: ptr::null(),
        length: 0,
    };

    /// Span over `len` bytes starting at `data`
    pub fn new(data: *const c_char, length: usize) -> Self {
        Self { data, length }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }
}

impl Default for StringPiece {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Growable array of untyped pointers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vector {
    pub data: *mut *mut c_void,
    pub length: c_uint,
    pub capacity: c_uint,
}

impl Vector {
    /// Vector with no backing storage
    pub const EMPTY: Vector = Vector {
        data: ptr::null_mut(),
        length: 0,
        capacity: 0,
    };
}

impl Default for Vector {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Attribute record
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AttributeRecord {
    pub attr_namespace: c_int,
    /// Normalized name, NUL-terminated
    pub name: *const c_char,
    pub original_name: StringPiece,
    /// Unescaped value, NUL-terminated
    pub value: *const c_char,
    /// Value as written, including quotes
    pub original_value: StringPiece,
    pub name_start: SourcePosition,
    pub name_end: SourcePosition,
    pub value_start: SourcePosition,
    pub value_end: SourcePosition,
}

/// Payload of a document node
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DocumentRecord {
    pub children: Vector,
    pub has_doctype: bool,
    pub name: *const c_char,
    pub public_identifier: *const c_char,
    pub system_identifier: *const c_char,
    pub doc_type_quirks_mode: c_int,
}

/// Payload of an element or template node
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ElementRecord {
    pub children: Vector,
    pub tag: c_int,
    pub tag_namespace: c_int,
    pub original_tag: StringPiece,
    pub original_end_tag: StringPiece,
    pub start_pos: SourcePosition,
    pub end_pos: SourcePosition,
    pub attributes: Vector,
}

/// Payload of text, CDATA, comment and whitespace nodes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TextRecord {
    pub text: *const c_char,
    pub original_text: StringPiece,
    pub start_pos: SourcePosition,
}

/// Fields shared by every node record.
///
/// `node_type` is the discriminant of `NodeRecord::v`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    pub node_type: c_int,
    pub parent: *mut NodeRecord,
    pub index_within_parent: usize,
    pub parse_flags: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union NodePayload {
    pub document: DocumentRecord,
    pub element: ElementRecord,
    pub text: TextRecord,
}

/// Full node record: header followed by the union payload
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NodeRecord {
    pub header: NodeHeader,
    pub v: NodePayload,
}

/// Fields shared by every error record; `error_type` selects `ErrorRecord::v`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ErrorHeader {
    pub error_type: c_int,
    pub position: SourcePosition,
    /// Points at the offending byte inside the caller's input buffer
    pub original_text: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TokenizerErrorRecord {
    pub codepoint: c_int,
    pub state: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DuplicateAttrRecord {
    pub name: *mut c_char,
    pub original_index: c_uint,
    pub new_index: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ParserErrorRecord {
    pub input_type: c_int,
    pub input_tag: c_int,
    pub parser_state: c_int,
    /// Tags stored by value in the pointer slots
    pub tag_stack: Vector,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union ErrorPayload {
    pub codepoint: u64,
    pub tokenizer: TokenizerErrorRecord,
    pub text: StringPiece,
    pub duplicate_attr: DuplicateAttrRecord,
    pub parser: ParserErrorRecord,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ErrorRecord {
    pub header: ErrorHeader,
    pub v: ErrorPayload,
}

/// Top-level record returned by a parse call
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OutputRecord {
    pub document: *mut NodeRecord,
    pub root: *mut NodeRecord,
    pub errors: Vector,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_header_is_prefix_of_node_record() {
        assert_eq!(offset_of!(NodeRecord, header), 0);
        assert_eq!(offset_of!(NodeRecord, v), size_of::<NodeHeader>());
        assert_eq!(offset_of!(NodeHeader, node_type), 0);
    }

    #[test]
    fn test_error_header_is_prefix_of_error_record() {
        assert_eq!(offset_of!(ErrorRecord, header), 0);
        assert_eq!(offset_of!(ErrorHeader, error_type), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_layout_matches_c_headers() {
        assert_eq!(size_of::<SourcePosition>(), 12);
        assert_eq!(size_of::<StringPiece>(), 16);
        assert_eq!(size_of::<Vector>(), 16);
        assert_eq!(size_of::<NodeHeader>(), 32);
        assert_eq!(size_of::<ErrorHeader>(), 24);
        assert_eq!(size_of::<OutputRecord>(), 32);
    }
}
