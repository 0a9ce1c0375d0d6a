//! System libgumbo
//!
//! Binds the C library directly. Available with the `system-gumbo` feature;
//! the output blob is then the engine's own allocation and is freed by it.

use crate::decode::read_c_str;
use crate::engine::Engine;
use crate::ffi::{OutputRecord, StringPiece};
use crate::{EngineError, ParseOptions, Tag};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr::NonNull;

/// Layout of the engine's option struct
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptionsRecord {
    pub allocator: Option<unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void>,
    pub deallocator: Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>,
    pub userdata: *mut c_void,
    pub tab_stop: c_int,
    pub stop_on_first_error: bool,
    /// -1 means unlimited
    pub max_errors: c_int,
    /// `Tag::Last` means a full document parse
    pub fragment_context: c_int,
    pub fragment_namespace: c_int,
}

#[link(name = "gumbo")]
unsafe extern "C" {
    static kGumboDefaultOptions: OptionsRecord;

    fn gumbo_parse_with_options(
        options: *const OptionsRecord,
        buffer: *const c_char,
        buffer_length: usize,
    ) -> *mut OutputRecord;

    fn gumbo_destroy_output(options: *const OptionsRecord, output: *mut OutputRecord);

    fn gumbo_normalized_tagname(tag: c_uint) -> *const c_char;

    fn gumbo_tag_from_original_text(text: *mut StringPiece);
}

/// Engine backed by the system libgumbo
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEngine;

impl SystemEngine {
    pub fn new() -> Self {
        Self
    }

    fn options_record(options: &ParseOptions) -> OptionsRecord {
        // SAFETY: a plain constant exported by the library
        let mut record = unsafe { kGumboDefaultOptions };
        record.tab_stop = options.tab_stop.min(c_int::MAX as u32) as c_int;
        record.stop_on_first_error = options.stop_on_first_error;
        record.max_errors = options
            .max_errors
            .map_or(-1, |max| max.min(c_int::MAX as u32) as c_int);
        match options.fragment_context {
            Some(context) => {
                record.fragment_context = context.tag.as_raw() as c_int;
                record.fragment_namespace = context.namespace.as_raw() as c_int;
            }
            None => record.fragment_context = Tag::Last.as_raw() as c_int,
        }
        record
    }
}

impl Engine for SystemEngine {
    fn parse(
        &self,
        input: &[u8],
        options: &ParseOptions,
    ) -> Result<NonNull<OutputRecord>, EngineError> {
        tracing::debug!("Parsing HTML input with libgumbo: {} bytes", input.len());
        let record = Self::options_record(options);
        // SAFETY: `input` stays valid for the call; the output may point
        // into it, which the caller accounts for
        let output =
            unsafe { gumbo_parse_with_options(&record, input.as_ptr().cast(), input.len()) };
        NonNull::new(output).ok_or(EngineError::NoOutput)
    }

    unsafe fn destroy_output(&self, options: &ParseOptions, output: NonNull<OutputRecord>) {
        let record = Self::options_record(options);
        // SAFETY: forwarded from the caller
        unsafe { gumbo_destroy_output(&record, output.as_ptr()) }
    }

    fn normalized_tag_name(&self, tag: Tag) -> String {
        // SAFETY: the library returns a static string for every tag value
        unsafe { read_c_str(gumbo_normalized_tagname(tag.as_raw())) }.unwrap_or_default()
    }

    unsafe fn tag_from_original_text(&self, text: StringPiece) -> StringPiece {
        let mut piece = text;
        // SAFETY: guaranteed by the caller; the library only narrows the piece
        unsafe { gumbo_tag_from_original_text(&mut piece) };
        piece
    }
}
