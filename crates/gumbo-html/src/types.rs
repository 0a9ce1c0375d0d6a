//! Engine Enumerations
//!
//! Closed enumerations used by the engine records. Every enum converts from
//! the raw integer found in a record through `from_raw`, which returns `None`
//! for values outside the declared range.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident,)+
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub(crate) const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Convert a raw record value, rejecting anything out of range
            pub fn from_raw(raw: u32) -> Option<Self> {
                Self::ALL.get(raw as usize).copied()
            }

            /// Raw value as stored in records
            pub fn as_raw(self) -> u32 {
                self as u32
            }
        }
    };
}

raw_enum! {
    /// Node discriminant
    pub enum NodeType {
        Document,
        Element,
        Text,
        Cdata,
        Comment,
        Whitespace,
        Template,
    }
}

impl NodeType {
    /// Element-shaped payload (element or template)
    pub fn is_element(self) -> bool {
        matches!(self, NodeType::Element | NodeType::Template)
    }

    /// Text-shaped payload (text, CDATA, comment, whitespace)
    pub fn is_text(self) -> bool {
        matches!(
            self,
            NodeType::Text | NodeType::Cdata | NodeType::Comment | NodeType::Whitespace
        )
    }
}

raw_enum! {
    /// Element namespace
    #[derive(Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Namespace {
        #[default]
        Html,
        Svg,
        Mathml,
    }
}

raw_enum! {
    /// Attribute namespace
    #[derive(Default)]
    pub enum AttrNamespace {
        #[default]
        None,
        Xlink,
        Xml,
        Xmlns,
    }
}

impl AttrNamespace {
    /// Conventional prefix, empty for un-namespaced attributes
    pub fn prefix(self) -> &'static str {
        match self {
            AttrNamespace::None => "",
            AttrNamespace::Xlink => "xlink",
            AttrNamespace::Xml => "xml",
            AttrNamespace::Xmlns => "xmlns",
        }
    }
}

raw_enum! {
    /// Doctype quirks-mode classification
    #[derive(Default)]
    pub enum QuirksMode {
        #[default]
        NoQuirks,
        Quirks,
        LimitedQuirks,
    }
}

raw_enum! {
    /// Kind of foreign diagnostic
    pub enum ErrorType {
        Utf8Invalid,
        Utf8Truncated,
        Utf8Null,
        NumericCharRefNoDigits,
        NumericCharRefWithoutSemicolon,
        NumericCharRefInvalid,
        NamedCharRefWithoutSemicolon,
        NamedCharRefInvalid,
        TagStartsWithQuestion,
        TagEof,
        TagInvalid,
        CloseTagEmpty,
        CloseTagEof,
        CloseTagInvalid,
        ScriptEof,
        AttrNameEof,
        AttrNameInvalid,
        AttrDoubleQuoteEof,
        AttrSingleQuoteEof,
        AttrUnquotedEof,
        AttrUnquotedRightBracket,
        AttrUnquotedEquals,
        AttrAfterEof,
        AttrAfterInvalid,
        DuplicateAttr,
        SolidusEof,
        SolidusInvalid,
        DashesOrDoctype,
        CommentEof,
        CommentInvalid,
        CommentBangAfterDoubleDash,
        CommentDashAfterDoubleDash,
        CommentSpaceAfterDoubleDash,
        CommentEndBangEof,
        DoctypeEof,
        DoctypeInvalid,
        DoctypeSpace,
        DoctypeRightBracket,
        DoctypeSpaceOrRightBracket,
        DoctypeEnd,
        Parser,
        UnacknowledgedSelfClosingTag,
    }
}

raw_enum! {
    /// Token kind reported in parser errors
    pub enum TokenType {
        Doctype,
        StartTag,
        EndTag,
        Comment,
        Whitespace,
        Character,
        Null,
        Eof,
    }
}

raw_enum! {
    /// Tree construction insertion mode
    pub enum InsertionMode {
        Initial,
        BeforeHtml,
        BeforeHead,
        InHead,
        InHeadNoscript,
        AfterHead,
        InBody,
        Text,
        InTable,
        InTableText,
        InCaption,
        InColumnGroup,
        InTableBody,
        InRow,
        InCell,
        InSelect,
        InSelectInTable,
        InTemplate,
        AfterBody,
        InFrameset,
        AfterFrameset,
        AfterAfterBody,
        AfterAfterFrameset,
    }
}

raw_enum! {
    /// Tokenizer state reported in tokenizer errors
    pub enum TokenizerState {
        Data,
        CharRef,
        Rcdata,
        Rawtext,
        Plaintext,
        Script,
        Tag,
        SelfClosingTag,
        AttrName,
        AttrValue,
        MarkupDeclaration,
        Comment,
        Doctype,
        Cdata,
    }
}

/// Parse flags: bits recording how the engine inserted a node
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ParseFlags(u32);

impl ParseFlags {
    pub const NORMAL: ParseFlags = ParseFlags(0);
    pub const BY_PARSER: ParseFlags = ParseFlags(1 << 0);
    pub const IMPLICIT_END_TAG: ParseFlags = ParseFlags(1 << 1);
    pub const IMPLIED: ParseFlags = ParseFlags(1 << 3);
    pub const CONVERTED_FROM_END_TAG: ParseFlags = ParseFlags(1 << 4);
    pub const FROM_ISINDEX: ParseFlags = ParseFlags(1 << 5);
    pub const FROM_IMAGE: ParseFlags = ParseFlags(1 << 6);
    pub const RECONSTRUCTED_FORMATTING_ELEMENT: ParseFlags = ParseFlags(1 << 7);
    pub const ADOPTION_AGENCY_CLONED: ParseFlags = ParseFlags(1 << 8);
    pub const ADOPTION_AGENCY_MOVED: ParseFlags = ParseFlags(1 << 9);
    pub const FOSTER_PARENTED: ParseFlags = ParseFlags(1 << 10);

    const NAMES: &'static [(ParseFlags, &'static str)] = &[
        (Self::BY_PARSER, "BY_PARSER"),
        (Self::IMPLICIT_END_TAG, "IMPLICIT_END_TAG"),
        (Self::IMPLIED, "IMPLIED"),
        (Self::CONVERTED_FROM_END_TAG, "CONVERTED_FROM_END_TAG"),
        (Self::FROM_ISINDEX, "FROM_ISINDEX"),
        (Self::FROM_IMAGE, "FROM_IMAGE"),
        (Self::RECONSTRUCTED_FORMATTING_ELEMENT, "RECONSTRUCTED_FORMATTING_ELEMENT"),
        (Self::ADOPTION_AGENCY_CLONED, "ADOPTION_AGENCY_CLONED"),
        (Self::ADOPTION_AGENCY_MOVED, "ADOPTION_AGENCY_MOVED"),
        (Self::FOSTER_PARENTED, "FOSTER_PARENTED"),
    ];

    /// Keep unknown bits; the engine may add flags
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: ParseFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: ParseFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for ParseFlags {
    type Output = ParseFlags;

    fn bitor(self, rhs: ParseFlags) -> ParseFlags {
        ParseFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ParseFlags {
    fn bitor_assign(&mut self, rhs: ParseFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ParseFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NORMAL");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let known = Self::NAMES.iter().fold(0, |acc, (flag, _)| acc | flag.0);
        let unknown = self.0 & !known;
        if unknown != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}
