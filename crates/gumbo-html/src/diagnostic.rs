//! Parse Diagnostics
//!
//! Error records reported by the engine. Like nodes, an error record is a
//! tagged union: the header is read first and its `error_type` selects which
//! payload arm is valid. Values that name no specific arm, including values
//! outside the known range, fall back to the tokenizer shape.

use crate::decode::{RawError, read_c_str, read_piece, read_vector};
use crate::ffi::{ErrorHeader, SourcePosition};
use crate::{ErrorType, InsertionMode, Tag, TokenType, TokenizerState};
use std::fmt;

/// A decoded engine diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Discriminant exactly as found in the record
    pub raw_type: u32,
    /// Classified error kind; `None` when `raw_type` is out of range
    pub error_type: Option<ErrorType>,
    pub position: SourcePosition,
    /// Byte offset of the offending text within the parsed input
    pub original_offset: Option<usize>,
    pub detail: ErrorDetail,
}

/// Payload shape selected by the error discriminant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// UTF-8 and numeric character reference errors
    Codepoint(u64),
    /// Fallback shape for every other tokenizer error
    Tokenizer {
        codepoint: i32,
        state: Option<TokenizerState>,
    },
    /// Named character reference errors
    NamedCharacter(Option<String>),
    DuplicateAttribute {
        name: Option<String>,
        original_index: u32,
        new_index: u32,
    },
    /// Tree construction errors
    Parser {
        input_type: Option<TokenType>,
        input_tag: Option<Tag>,
        parser_state: Option<InsertionMode>,
        tag_stack: Vec<Tag>,
    },
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", self.position.line, self.position.column)?;
        match self.error_type {
            Some(kind) => write!(f, "{kind:?}")?,
            None => write!(f, "error {}", self.raw_type)?,
        }
        match &self.detail {
            ErrorDetail::Codepoint(codepoint) => write!(f, " (U+{codepoint:04X})"),
            ErrorDetail::NamedCharacter(Some(text)) => write!(f, " ({text})"),
            ErrorDetail::DuplicateAttribute {
                name: Some(name), ..
            } => write!(f, " ({name})"),
            ErrorDetail::Parser {
                input_tag: Some(tag),
                ..
            } if tag.is_known() => write!(f, " (<{}>)", tag.normalized_name()),
            _ => Ok(()),
        }
    }
}

/// Decode one error record.
///
/// `input` is the buffer that was parsed; it is only used to turn the
/// record's text pointer into an offset.
///
/// # Safety
/// `error` must point to a live error record.
pub unsafe fn decode_error(error: RawError, input: &[u8]) -> ParseDiagnostic {
    // SAFETY: the header is the first field of every error record
    let header = unsafe { error.as_ptr().cast::<ErrorHeader>().read() };
    let raw_type = header.error_type as u32;
    let error_type = ErrorType::from_raw(raw_type);

    // SAFETY: `v` follows the header; the arm read is the one the
    // discriminant names, tokenizer for everything unclassified
    let payload = unsafe { &raw const (*error.as_ptr()).v };
    let detail = unsafe {
        match error_type {
            Some(
                ErrorType::Utf8Invalid
                | ErrorType::Utf8Truncated
                | ErrorType::NumericCharRefWithoutSemicolon
                | ErrorType::NumericCharRefInvalid,
            ) => ErrorDetail::Codepoint((*payload).codepoint),
            Some(ErrorType::NamedCharRefWithoutSemicolon | ErrorType::NamedCharRefInvalid) => {
                ErrorDetail::NamedCharacter(read_piece((*payload).text))
            }
            Some(ErrorType::DuplicateAttr) => {
                let record = (*payload).duplicate_attr;
                ErrorDetail::DuplicateAttribute {
                    name: read_c_str(record.name),
                    original_index: record.original_index,
                    new_index: record.new_index,
                }
            }
            Some(ErrorType::Parser | ErrorType::UnacknowledgedSelfClosingTag) => {
                let record = (*payload).parser;
                ErrorDetail::Parser {
                    input_type: TokenType::from_raw(record.input_type as u32),
                    input_tag: Tag::from_raw(record.input_tag as u32),
                    parser_state: InsertionMode::from_raw(record.parser_state as u32),
                    // tags are stored by value in the pointer slots
                    tag_stack: read_vector(&record.tag_stack)
                        .into_iter()
                        .filter_map(|slot| Tag::from_raw(slot as usize as u32))
                        .collect(),
                }
            }
            _ => {
                let record = (*payload).tokenizer;
                ErrorDetail::Tokenizer {
                    codepoint: record.codepoint,
                    state: TokenizerState::from_raw(record.state as u32),
                }
            }
        }
    };

    ParseDiagnostic {
        raw_type,
        error_type,
        position: header.position,
        original_offset: offset_in(input, header.original_text.cast()),
        detail,
    }
}

/// Offset of `ptr` inside `input`; `None` if it points elsewhere
fn offset_in(input: &[u8], ptr: *const u8) -> Option<usize> {
    if ptr.is_null() {
        return None;
    }
    (ptr as usize)
        .checked_sub(input.as_ptr() as usize)
        .filter(|&offset| offset <= input.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{BlobBuilder, ErrorPayloadSpec, ErrorSpec};
    use crate::decode::decode_output;
    use pretty_assertions::assert_eq;

    fn decode_all(builder: BlobBuilder, input: &[u8]) -> Vec<ParseDiagnostic> {
        let blob = builder.finish();
        unsafe {
            decode_output(blob.output())
                .unwrap()
                .errors
                .into_iter()
                .map(|error| decode_error(error, input))
                .collect()
        }
    }

    #[test]
    fn test_codepoint_shape() {
        let mut builder = BlobBuilder::new();
        builder.error(ErrorSpec::new(
            ErrorType::NumericCharRefInvalid,
            ErrorPayloadSpec::Codepoint(0xD800),
        ));
        let diagnostics = decode_all(builder, b"");
        assert_eq!(diagnostics[0].detail, ErrorDetail::Codepoint(0xD800));
        assert_eq!(diagnostics[0].error_type, Some(ErrorType::NumericCharRefInvalid));
    }

    #[test]
    fn test_unclassified_type_falls_back_to_tokenizer() {
        let mut builder = BlobBuilder::new();
        builder.error(ErrorSpec::new(
            ErrorType::TagEof,
            ErrorPayloadSpec::Tokenizer {
                codepoint: 'x' as i32,
                state: TokenizerState::Tag,
            },
        ));
        let mut unknown = ErrorSpec::new(
            ErrorType::TagEof,
            ErrorPayloadSpec::Tokenizer {
                codepoint: 0,
                state: TokenizerState::Data,
            },
        );
        unknown.raw_type = 500;
        builder.error(unknown);

        let diagnostics = decode_all(builder, b"");
        assert_eq!(
            diagnostics[0].detail,
            ErrorDetail::Tokenizer {
                codepoint: 'x' as i32,
                state: Some(TokenizerState::Tag),
            }
        );
        assert_eq!(diagnostics[1].raw_type, 500);
        assert_eq!(diagnostics[1].error_type, None);
        assert!(matches!(diagnostics[1].detail, ErrorDetail::Tokenizer { .. }));
    }

    #[test]
    fn test_duplicate_and_parser_shapes() {
        let mut builder = BlobBuilder::new();
        builder.error(ErrorSpec::new(
            ErrorType::DuplicateAttr,
            ErrorPayloadSpec::DuplicateAttribute {
                name: "class".to_string(),
                original_index: 0,
                new_index: 1,
            },
        ));
        builder.error(ErrorSpec::new(
            ErrorType::Parser,
            ErrorPayloadSpec::Parser {
                input_type: TokenType::StartTag,
                input_tag: Tag::Head,
                parser_state: InsertionMode::InHead,
                tag_stack: vec![Tag::Html, Tag::Head],
            },
        ));

        let diagnostics = decode_all(builder, b"");
        assert_eq!(
            diagnostics[0].detail,
            ErrorDetail::DuplicateAttribute {
                name: Some("class".to_string()),
                original_index: 0,
                new_index: 1,
            }
        );
        assert_eq!(
            diagnostics[1].detail,
            ErrorDetail::Parser {
                input_type: Some(TokenType::StartTag),
                input_tag: Some(Tag::Head),
                parser_state: Some(InsertionMode::InHead),
                tag_stack: vec![Tag::Html, Tag::Head],
            }
        );
        assert_eq!(diagnostics[1].to_string(), "0:0: Parser (<head>)");
    }

    #[test]
    fn test_original_offset_is_relative_to_input() {
        let input = b"<p>&bogus;</p>";
        let mut builder = BlobBuilder::with_input(input);
        let mut spec = ErrorSpec::new(
            ErrorType::NamedCharRefInvalid,
            ErrorPayloadSpec::NamedCharacter(Some(crate::blob::Piece::Input(3..10))),
        );
        spec.original_offset = Some(3);
        builder.error(spec);

        let diagnostics = decode_all(builder, input);
        assert_eq!(diagnostics[0].original_offset, Some(3));
        assert_eq!(
            diagnostics[0].detail,
            ErrorDetail::NamedCharacter(Some("&bogus;".to_string()))
        );
    }
}
