//! Gumbo DOM - Lazily Materialized Tree
//!
//! Safe, navigable view of an HTML engine's output. Nodes are decoded on
//! first access and stay valid after the session's foreign memory is freed;
//! anything not yet decoded by then fails with [`Error::Disposed`].

mod attribute;
mod cursor;
mod document;
mod element;
mod error;
mod factory;
mod id_index;
mod lazy;
mod node;
mod session;
mod text;

pub use attribute::Attribute;
pub use cursor::{Cursor, CursorNodeType, Position};
pub use document::Document;
pub use element::Element;
pub use error::{Error, Result};
pub use lazy::{LazyCache, Liveness};
pub use node::{Node, NodeInfo};
pub use session::{IdLookup, ParseSession};
pub use text::Text;

pub use gumbo_html::{
    AttrNamespace, Namespace, NodeType, ParseDiagnostic, ParseFlags, ParseOptions, QuirksMode,
    SourcePosition, Tag,
};

/// Parse `html` with the built-in engine
pub fn parse(html: &str) -> Result<ParseSession> {
    ParseSession::parse(html)
}
