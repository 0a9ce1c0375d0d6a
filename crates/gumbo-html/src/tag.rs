//! Tag Enumeration
//!
//! The engine classifies every element into a closed set of known HTML, SVG
//! and MathML tags. Anything else is `Tag::Unknown`; `Tag::Last` is the
//! sentinel that terminates the enumeration (also used for "no fragment
//! context").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

macro_rules! tags {
    ($($variant:ident => $name:literal,)+) => {
        /// Known tag, in engine enumeration order
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum Tag {
            $($variant,)+
            #[default]
            Unknown,
            Last,
        }

        const KNOWN: &[(Tag, &str)] = &[$((Tag::$variant, $name),)+];
    };
}

tags! {
    Html => "html",
    Head => "head",
    Title => "title",
    Base => "base",
    Link => "link",
    Meta => "meta",
    Style => "style",
    Script => "script",
    Noscript => "noscript",
    Template => "template",
    Body => "body",
    Article => "article",
    Section => "section",
    Nav => "nav",
    Aside => "aside",
    H1 => "h1",
    H2 => "h2",
    H3 => "h3",
    H4 => "h4",
    H5 => "h5",
    H6 => "h6",
    Hgroup => "hgroup",
    Header => "header",
    Footer => "footer",
    Address => "address",
    P => "p",
    Hr => "hr",
    Pre => "pre",
    Blockquote => "blockquote",
    Ol => "ol",
    Ul => "ul",
    Li => "li",
    Dl => "dl",
    Dt => "dt",
    Dd => "dd",
    Figure => "figure",
    Figcaption => "figcaption",
    Main => "main",
    Div => "div",
    A => "a",
    Em => "em",
    Strong => "strong",
    Small => "small",
    S => "s",
    Cite => "cite",
    Q => "q",
    Dfn => "dfn",
    Abbr => "abbr",
    Data => "data",
    Time => "time",
    Code => "code",
    Var => "var",
    Samp => "samp",
    Kbd => "kbd",
    Sub => "sub",
    Sup => "sup",
    I => "i",
    B => "b",
    U => "u",
    Mark => "mark",
    Ruby => "ruby",
    Rt => "rt",
    Rp => "rp",
    Bdi => "bdi",
    Bdo => "bdo",
    Span => "span",
    Br => "br",
    Wbr => "wbr",
    Ins => "ins",
    Del => "del",
    Image => "image",
    Img => "img",
    Iframe => "iframe",
    Embed => "embed",
    Object => "object",
    Param => "param",
    Video => "video",
    Audio => "audio",
    Source => "source",
    Track => "track",
    Canvas => "canvas",
    Map => "map",
    Area => "area",
    Math => "math",
    Mi => "mi",
    Mo => "mo",
    Mn => "mn",
    Ms => "ms",
    Mtext => "mtext",
    Mglyph => "mglyph",
    Malignmark => "malignmark",
    AnnotationXml => "annotation-xml",
    Svg => "svg",
    Foreignobject => "foreignobject",
    Desc => "desc",
    Table => "table",
    Caption => "caption",
    Colgroup => "colgroup",
    Col => "col",
    Tbody => "tbody",
    Thead => "thead",
    Tfoot => "tfoot",
    Tr => "tr",
    Td => "td",
    Th => "th",
    Form => "form",
    Fieldset => "fieldset",
    Legend => "legend",
    Label => "label",
    Input => "input",
    Button => "button",
    Select => "select",
    Datalist => "datalist",
    Optgroup => "optgroup",
    Option => "option",
    Textarea => "textarea",
    Keygen => "keygen",
    Output => "output",
    Progress => "progress",
    Meter => "meter",
    Details => "details",
    Summary => "summary",
    Menu => "menu",
    Menuitem => "menuitem",
    Applet => "applet",
    Acronym => "acronym",
    Bgsound => "bgsound",
    Dir => "dir",
    Frame => "frame",
    Frameset => "frameset",
    Noframes => "noframes",
    Isindex => "isindex",
    Listing => "listing",
    Xmp => "xmp",
    Nextid => "nextid",
    Noembed => "noembed",
    Plaintext => "plaintext",
    Rb => "rb",
    Strike => "strike",
    Basefont => "basefont",
    Big => "big",
    Blink => "blink",
    Center => "center",
    Font => "font",
    Marquee => "marquee",
    Multicol => "multicol",
    Nobr => "nobr",
    Spacer => "spacer",
    Tt => "tt",
    Rtc => "rtc",
}

impl Tag {
    /// Convert a raw record value. `Unknown` and `Last` are valid values.
    pub fn from_raw(raw: u32) -> Option<Tag> {
        let raw = raw as usize;
        match raw {
            r if r < KNOWN.len() => Some(KNOWN[r].0),
            r if r == KNOWN.len() => Some(Tag::Unknown),
            r if r == KNOWN.len() + 1 => Some(Tag::Last),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Classify a tag name, ignoring ASCII case
    pub fn from_name(name: &str) -> Tag {
        static BY_NAME: OnceLock<HashMap<&'static str, Tag>> = OnceLock::new();
        let by_name =
            BY_NAME.get_or_init(|| KNOWN.iter().map(|&(tag, name)| (name, tag)).collect());
        by_name
            .get(name.to_ascii_lowercase().as_str())
            .copied()
            .unwrap_or(Tag::Unknown)
    }

    /// Canonical lower-case name; empty for `Unknown` and `Last`
    pub fn normalized_name(self) -> &'static str {
        KNOWN
            .get(self as usize)
            .map(|&(_, name)| name)
            .unwrap_or("")
    }

    pub fn is_known(self) -> bool {
        (self as usize) < KNOWN.len()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> String {
        tag.normalized_name().to_string()
    }
}

impl TryFrom<String> for Tag {
    type Error = String;

    fn try_from(name: String) -> Result<Tag, String> {
        match Tag::from_name(&name) {
            Tag::Unknown => Err(format!("unknown tag name `{name}`")),
            tag => Ok(tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_bounds() {
        assert_eq!(Tag::Html.as_raw(), 0);
        assert_eq!(Tag::from_raw(Tag::Tt.as_raw()), Some(Tag::Tt));
        assert_eq!(Tag::from_raw(Tag::Unknown.as_raw()), Some(Tag::Unknown));
        assert_eq!(Tag::from_raw(Tag::Last.as_raw()), Some(Tag::Last));
        assert_eq!(Tag::from_raw(Tag::Last.as_raw() + 1), None);
    }

    #[test]
    fn test_name_lookup_ignores_case() {
        assert_eq!(Tag::from_name("TITLE"), Tag::Title);
        assert_eq!(Tag::from_name("foreignObject"), Tag::Foreignobject);
        assert_eq!(Tag::from_name("annotation-xml"), Tag::AnnotationXml);
        assert_eq!(Tag::from_name("unknown123"), Tag::Unknown);
    }

    #[test]
    fn test_normalized_names() {
        assert_eq!(Tag::Base.normalized_name(), "base");
        assert_eq!(Tag::Unknown.normalized_name(), "");
        assert_eq!(Tag::Last.normalized_name(), "");
        assert!(Tag::Rtc.is_known());
        assert!(!Tag::Unknown.is_known());
    }
}
