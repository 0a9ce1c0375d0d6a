//! Source Mapping
//!
//! html5ever reports tree construction, not byte positions. A light scan of
//! the input finds the markup tokens (tags, comments, doctypes) with their
//! byte ranges. The sink matches created elements against start tags as the
//! tree builder goes; tokens are processed in source order, so a match at
//! index `i` means every earlier start tag has already been handled. End
//! tags are paired with elements once the tree is complete.
//!
//! Matching is best effort. An element with no matching token is treated as
//! inserted by the parser.

use crate::ffi::SourcePosition;
use std::collections::HashSet;
use std::ops::Range;

/// Elements whose content is scanned as raw text
const RAW_TEXT: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    StartTag,
    EndTag,
    Comment,
    Doctype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedAttribute {
    /// ASCII-lowercased name
    pub name: String,
    pub name_range: Range<usize>,
    /// Value as written, including quotes
    pub value_range: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MarkupToken {
    pub kind: TokenKind,
    /// ASCII-lowercased tag name; empty for comments and doctypes
    pub name: String,
    pub range: Range<usize>,
    pub line: u64,
    pub attributes: Vec<ScannedAttribute>,
}

/// Markup tokens of one input plus a cursor over them
#[derive(Debug)]
pub(crate) struct SourceMap<'a> {
    input: &'a [u8],
    tab_stop: u32,
    line_starts: Vec<usize>,
    tokens: Vec<MarkupToken>,
    cursor: usize,
    last_end: usize,
}

impl<'a> SourceMap<'a> {
    pub fn new(input: &'a [u8], tab_stop: u32) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            input
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        let mut map = Self {
            input,
            tab_stop: tab_stop.max(1),
            line_starts,
            tokens: Vec::new(),
            cursor: 0,
            last_end: 0,
        };
        map.tokens = map.scan();
        map
    }

    pub fn token(&self, index: usize) -> &MarkupToken {
        &self.tokens[index]
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Index of the next unhandled token
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 1-based line of a byte offset
    pub fn line_of(&self, offset: usize) -> u64 {
        self.line_starts.partition_point(|&start| start <= offset) as u64
    }

    /// Line, tab-aware column, and offset of a byte offset
    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = offset.min(self.input.len());
        let line = self.line_of(offset);
        let line_start = self.line_starts[(line - 1) as usize];
        let mut column: u32 = 1;
        for c in String::from_utf8_lossy(&self.input[line_start..offset]).chars() {
            column = match c {
                '\t' => ((column / self.tab_stop) + 1) * self.tab_stop,
                _ => column + 1,
            };
        }
        SourcePosition {
            line: line as u32,
            column,
            offset: offset as u32,
        }
    }

    /// Position of the next unhandled token, or of the end of input
    pub fn next_position(&self) -> SourcePosition {
        let offset = self
            .tokens
            .get(self.cursor)
            .map_or(self.input.len(), |token| token.range.start);
        self.position(offset)
    }

    /// Where the next run of text starts. End tags directly in front of it
    /// have already been processed by the tree builder and are stepped over.
    /// The run extends to the next token.
    pub fn take_text_position(&mut self) -> SourcePosition {
        let mut start = self.last_end;
        while let Some(token) = self.tokens.get(self.cursor) {
            if token.kind != TokenKind::EndTag || token.range.start != start {
                break;
            }
            start = token.range.end;
            self.cursor += 1;
        }
        self.last_end = self
            .tokens
            .get(self.cursor)
            .map_or(self.input.len(), |token| token.range.start)
            .max(start);
        self.position(start)
    }

    /// Match a start tag named `name` on or before `line`
    pub fn match_start_tag(&mut self, name: &str, line: u64) -> Option<usize> {
        self.find(line, |token| {
            Some(token.kind == TokenKind::StartTag && token.name.eq_ignore_ascii_case(name))
        })
    }

    /// End tag closing an element named `name` opened just before token
    /// `from`, searching up to `until`. Nested elements of the same name
    /// take their own end tags first; `claimed` end tags are skipped.
    pub fn find_closing(
        &self,
        name: &str,
        from: usize,
        until: usize,
        claimed: &HashSet<usize>,
    ) -> Option<usize> {
        let mut depth = 1usize;
        for index in from..until.min(self.tokens.len()) {
            let token = &self.tokens[index];
            if !token.name.eq_ignore_ascii_case(name) {
                continue;
            }
            match token.kind {
                TokenKind::StartTag => depth += 1,
                TokenKind::EndTag if !claimed.contains(&index) => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn match_comment(&mut self, line: u64) -> Option<usize> {
        self.find(line, |token| Some(token.kind == TokenKind::Comment))
    }

    pub fn match_doctype(&mut self) -> Option<usize> {
        self.find(u64::MAX, |token| Some(token.kind == TokenKind::Doctype))
    }

    /// Search forward from the cursor. `accept` returns `Some(true)` for a
    /// match, `Some(false)` to keep looking and `None` to stop.
    fn find(
        &mut self,
        line: u64,
        accept: impl Fn(&MarkupToken) -> Option<bool>,
    ) -> Option<usize> {
        let mut index = self.cursor;
        while let Some(token) = self.tokens.get(index) {
            if token.line > line {
                return None;
            }
            match accept(token) {
                Some(true) => {
                    self.cursor = index + 1;
                    self.last_end = token.range.end;
                    return Some(index);
                }
                Some(false) => index += 1,
                None => return None,
            }
        }
        None
    }

    fn scan(&self) -> Vec<MarkupToken> {
        let input = self.input;
        let mut tokens = Vec::new();
        let mut i = 0;
        while let Some(found) = find_byte(input, i, b'<') {
            let rest = &input[found..];
            let (token, mut next) = if rest.starts_with(b"<!--") {
                let end = if rest.starts_with(b"<!-->") {
                    found + 5
                } else if rest.starts_with(b"<!--->") {
                    found + 6
                } else {
                    find_seq(input, found + 4, b"-->").map_or(input.len(), |at| at + 3)
                };
                (Some(self.make_token(TokenKind::Comment, String::new(), found..end)), end)
            } else if starts_with_ignore_case(rest, b"<!doctype") {
                let end = find_byte(input, found, b'>').map_or(input.len(), |at| at + 1);
                (Some(self.make_token(TokenKind::Doctype, String::new(), found..end)), end)
            } else if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                let end = find_byte(input, found, b'>').map_or(input.len(), |at| at + 1);
                (Some(self.make_token(TokenKind::Comment, String::new(), found..end)), end)
            } else if rest.starts_with(b"</") {
                match rest.get(2) {
                    Some(b) if b.is_ascii_alphabetic() => {
                        let name_end = scan_name(input, found + 2);
                        let name = lowercase(&input[found + 2..name_end]);
                        let end = find_byte(input, name_end, b'>').map_or(input.len(), |at| at + 1);
                        (Some(self.make_token(TokenKind::EndTag, name, found..end)), end)
                    }
                    Some(b'>') => (None, found + 3),
                    Some(_) => {
                        let end = find_byte(input, found, b'>').map_or(input.len(), |at| at + 1);
                        (Some(self.make_token(TokenKind::Comment, String::new(), found..end)), end)
                    }
                    None => (None, input.len()),
                }
            } else if rest.get(1).is_some_and(u8::is_ascii_alphabetic) {
                let (token, end) = self.scan_start_tag(found);
                (Some(token), end)
            } else {
                (None, found + 1)
            };

            if let Some(token) = token {
                if token.kind == TokenKind::StartTag {
                    if token.name == "plaintext" {
                        tokens.push(token);
                        break;
                    }
                    if RAW_TEXT.contains(&token.name.as_str()) {
                        next = find_end_tag(input, next, &token.name).unwrap_or(input.len());
                    }
                }
                tokens.push(token);
            }
            i = next;
        }
        tokens
    }

    fn scan_start_tag(&self, start: usize) -> (MarkupToken, usize) {
        let input = self.input;
        let len = input.len();
        let name_end = scan_name(input, start + 1);
        let name = lowercase(&input[start + 1..name_end]);
        let mut attributes = Vec::new();
        let mut i = name_end;
        let end = loop {
            while i < len && (is_space(input[i]) || input[i] == b'/') {
                i += 1;
            }
            if i >= len {
                break len;
            }
            if input[i] == b'>' {
                break i + 1;
            }

            // the first character of a name may be '='
            let name_start = i;
            i += 1;
            while i < len && !is_space(input[i]) && !matches!(input[i], b'/' | b'>' | b'=') {
                i += 1;
            }
            let name_range = name_start..i;

            let mut j = i;
            while j < len && is_space(input[j]) {
                j += 1;
            }
            let mut value_range = None;
            if j < len && input[j] == b'=' {
                j += 1;
                while j < len && is_space(input[j]) {
                    j += 1;
                }
                let value_start = j;
                match input.get(j) {
                    Some(&quote @ (b'"' | b'\'')) => {
                        j = find_byte(input, j + 1, quote).map_or(len, |at| at + 1);
                    }
                    _ => {
                        while j < len && !is_space(input[j]) && input[j] != b'>' {
                            j += 1;
                        }
                    }
                }
                value_range = Some(value_start..j);
                i = j;
            }
            attributes.push(ScannedAttribute {
                name: lowercase(&input[name_range.clone()]),
                name_range,
                value_range,
            });
        };

        let mut token = self.make_token(TokenKind::StartTag, name, start..end);
        token.attributes = attributes;
        (token, end)
    }

    fn make_token(&self, kind: TokenKind, name: String, range: Range<usize>) -> MarkupToken {
        MarkupToken {
            kind,
            name,
            line: self.line_of(range.start),
            range,
            attributes: Vec::new(),
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')
}

fn lowercase(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}

/// End of a tag name starting at `start`
fn scan_name(input: &[u8], start: usize) -> usize {
    input[start..]
        .iter()
        .position(|&b| is_space(b) || b == b'/' || b == b'>')
        .map_or(input.len(), |at| start + at)
}

fn find_byte(input: &[u8], from: usize, byte: u8) -> Option<usize> {
    input
        .get(from..)?
        .iter()
        .position(|&b| b == byte)
        .map(|at| from + at)
}

fn find_seq(input: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    input
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| from + at)
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Start of the `</name` that ends a raw text element
fn find_end_tag(input: &[u8], from: usize, name: &str) -> Option<usize> {
    let mut i = from;
    while let Some(at) = find_seq(input, i, b"</") {
        let after = at + 2 + name.len();
        let closes = input
            .get(at + 2..after)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name.as_bytes()));
        let terminated = input
            .get(after)
            .is_none_or(|&b| is_space(b) || b == b'/' || b == b'>');
        if closes && terminated {
            return Some(at);
        }
        i = at + 2;
    }
    None
}
