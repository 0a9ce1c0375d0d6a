//! Tree Nodes
//!
//! Decoded node data is owned top down: the document owns its children
//! through their lazy caches, and each element owns its own. Parent links in
//! the data are weak. The public handles (`Document`, `Element`, `Text`)
//! pair the data with the tree's document, so a handle keeps its whole
//! ancestor chain alive even after the session is gone.

use crate::document::DocumentData;
use crate::element::ElementData;
use crate::text::TextData;
use crate::{Document, Element, Result, Text};
use gumbo_html::{NodeType, ParseFlags};
use std::fmt;
use std::sync::{Arc, Weak};

/// Owner of every decoded node of one tree
pub(crate) type Tree = Arc<DocumentData>;

/// Header fields common to every node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_type: NodeType,
    pub parse_flags: ParseFlags,
    /// Position among the parent's children in document order
    pub index_within_parent: usize,
}

/// A node of the materialized tree
#[derive(Clone, PartialEq, Eq)]
pub enum Node {
    Document(Document),
    Element(Element),
    Text(Text),
}

impl Node {
    pub fn info(&self) -> &NodeInfo {
        match self {
            Node::Document(document) => document.info(),
            Node::Element(element) => element.info(),
            Node::Text(text) => text.info(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.info().node_type
    }

    pub fn parse_flags(&self) -> ParseFlags {
        self.info().parse_flags
    }

    pub fn index_within_parent(&self) -> usize {
        self.info().index_within_parent
    }

    /// Parent node; `None` for the document
    pub fn parent(&self) -> Option<Node> {
        match self {
            Node::Document(_) => None,
            Node::Element(element) => element.parent(),
            Node::Text(text) => text.parent(),
        }
    }

    /// Children in document order; always empty for text nodes
    pub fn children(&self) -> Result<Vec<Node>> {
        match self {
            Node::Document(document) => document.children(),
            Node::Element(element) => element.children(),
            Node::Text(_) => Ok(Vec::new()),
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Node::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Document(document) => fmt::Debug::fmt(document, f),
            Node::Element(element) => fmt::Debug::fmt(element, f),
            Node::Text(text) => fmt::Debug::fmt(text, f),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// A decoded child, as stored in a children cache
#[derive(Clone)]
pub(crate) enum ChildData {
    Element(Arc<ElementData>),
    Text(Arc<TextData>),
}

impl ChildData {
    pub fn index_within_parent(&self) -> usize {
        match self {
            ChildData::Element(element) => element.info.index_within_parent,
            ChildData::Text(text) => text.info.index_within_parent,
        }
    }

    /// Public handle for this child of `tree`
    pub fn attach(&self, tree: &Tree) -> Node {
        match self {
            ChildData::Element(data) => Node::Element(Element::attach(tree, data)),
            ChildData::Text(data) => Node::Text(Text::attach(tree, data)),
        }
    }
}

/// Non-owning link to a parent
#[derive(Debug, Clone)]
pub(crate) enum ParentRef {
    Document,
    Element(Weak<ElementData>),
}

impl ParentRef {
    pub fn resolve(&self, tree: &Tree) -> Option<Node> {
        match self {
            ParentRef::Document => Some(Node::Document(Document::attach(tree))),
            ParentRef::Element(element) => element
                .upgrade()
                .map(|data| Node::Element(Element::attach(tree, &data))),
        }
    }
}

/// Handles for every child in `children`
pub(crate) fn attach_all(tree: &Tree, children: &[ChildData]) -> Vec<Node> {
    children.iter().map(|child| child.attach(tree)).collect()
}
