//! Engine Boundary
//!
//! The operations consumed from an HTML engine: parse a buffer into an
//! output blob, destroy that blob, and the two tag-name helpers.

use crate::ffi::{OutputRecord, StringPiece};
use crate::{EngineError, ParseOptions, Tag};
use std::fmt;
use std::ptr::NonNull;

/// An HTML engine producing output blobs
pub trait Engine: Send + Sync + fmt::Debug {
    /// Parse `input` into a newly allocated output blob.
    ///
    /// The blob may point into `input` (original tag text, error text), so
    /// the caller keeps `input` alive and unmoved until `destroy_output`.
    /// Malformed HTML never fails a parse; it is reported in the blob.
    fn parse(
        &self,
        input: &[u8],
        options: &ParseOptions,
    ) -> Result<NonNull<OutputRecord>, EngineError>;

    /// Free an output blob.
    ///
    /// # Safety
    /// `output` must come from `parse` on this engine with the same options
    /// and must not be used afterwards.
    unsafe fn destroy_output(&self, options: &ParseOptions, output: NonNull<OutputRecord>);

    /// Canonical lower-case name of a tag
    fn normalized_tag_name(&self, tag: Tag) -> String {
        tag.normalized_name().to_string()
    }

    /// Narrow a raw `<tag ...>` or `</tag>` span to the tag name.
    ///
    /// Spans that do not look like a tag are returned unchanged.
    ///
    /// # Safety
    /// `text` must be null or point to `text.length` readable bytes.
    unsafe fn tag_from_original_text(&self, text: StringPiece) -> StringPiece {
        if text.is_null() {
            return text;
        }
        // SAFETY: guaranteed by the caller
        let bytes = unsafe { std::slice::from_raw_parts(text.data.cast::<u8>(), text.length) };
        let name = tag_name_range(bytes);
        StringPiece::new(text.data.wrapping_add(name.start), name.len())
    }
}

/// Byte range of the tag name inside a raw tag
pub fn tag_name_range(tag: &[u8]) -> std::ops::Range<usize> {
    if tag.len() < 2 || tag[0] != b'<' || tag[tag.len() - 1] != b'>' {
        return 0..tag.len();
    }
    if tag[1] == b'/' {
        if tag.len() < 3 {
            return 0..tag.len();
        }
        return 2..tag.len() - 1;
    }
    let inner = &tag[1..tag.len() - 1];
    let end = inner
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b == b'/')
        .unwrap_or(inner.len());
    1..1 + end
}
