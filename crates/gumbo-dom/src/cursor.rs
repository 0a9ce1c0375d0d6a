//! Cursor
//!
//! A movable position over the tree: either on a node or on an attribute of
//! an element. Moves return `Ok(false)` when there is no target and leave the
//! position unchanged. A move only fails when it has to evaluate a lazy
//! collection after the session was released, or when it needs the session
//! itself after it was dropped.

use crate::session::SessionInner;
use crate::{Attribute, Element, Error, Node, ParseSession, Result};
use gumbo_html::NodeType;
use std::fmt;
use std::sync::Weak;

/// Where a cursor stands
#[derive(Clone)]
pub enum Position {
    Node(Node),
    Attribute(Attribute),
}

/// Identity comparison
impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Position::Node(a), Position::Node(b)) => a == b,
            (Position::Attribute(a), Position::Attribute(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Position {}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Position::Attribute(attribute) => f
                .debug_tuple("Attribute")
                .field(&attribute.name())
                .finish(),
        }
    }
}

/// Kind of the item under a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorNodeType {
    Root,
    Element,
    Text,
    Comment,
    Whitespace,
    Attribute,
}

/// Stateful position over a parsed tree.
///
/// Cloning copies the position only; equality compares positions by
/// identity. The cursor does not keep its session alive: the nodes it
/// stands on keep their tree, but `move_to_id` fails once the session is
/// dropped.
#[derive(Clone)]
pub struct Cursor {
    session: Weak<SessionInner>,
    position: Position,
}

impl Cursor {
    pub(crate) fn new(session: Weak<SessionInner>, position: Position) -> Self {
        Self { session, position }
    }

    /// Owning session, while it is alive
    pub fn session(&self) -> Option<ParseSession> {
        ParseSession::upgrade(&self.session)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn node(&self) -> Option<&Node> {
        match &self.position {
            Position::Node(node) => Some(node),
            Position::Attribute(_) => None,
        }
    }

    pub fn attribute(&self) -> Option<&Attribute> {
        match &self.position {
            Position::Attribute(attribute) => Some(attribute),
            Position::Node(_) => None,
        }
    }

    pub fn move_to_first_child(&mut self) -> Result<bool> {
        let Some(node) = self.node() else {
            return Ok(false);
        };
        let Some(child) = node.children()?.into_iter().next() else {
            return Ok(false);
        };
        self.position = Position::Node(child);
        Ok(true)
    }

    pub fn move_to_next(&mut self) -> Result<bool> {
        self.move_to_sibling(1)
    }

    pub fn move_to_previous(&mut self) -> Result<bool> {
        self.move_to_sibling(-1)
    }

    fn move_to_sibling(&mut self, offset: isize) -> Result<bool> {
        let Some(node) = self.node() else {
            return Ok(false);
        };
        let Some(parent) = node.parent() else {
            return Ok(false);
        };
        let siblings = parent.children()?;
        let index = siblings.iter().position(|sibling| sibling == node);
        let target = index
            .and_then(|index| index.checked_add_signed(offset))
            .and_then(|index| siblings.into_iter().nth(index));
        match target {
            Some(sibling) => {
                self.position = Position::Node(sibling);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn move_to_parent(&mut self) -> bool {
        match self.node().and_then(Node::parent) {
            Some(parent) => {
                self.position = Position::Node(parent);
                true
            }
            None => false,
        }
    }

    pub fn move_to_first_attribute(&mut self) -> Result<bool> {
        let Some(element) = self.node().and_then(Node::as_element) else {
            return Ok(false);
        };
        let Some(first) = element.attributes()?.into_iter().next() else {
            return Ok(false);
        };
        self.position = Position::Attribute(first);
        Ok(true)
    }

    pub fn move_to_next_attribute(&mut self) -> Result<bool> {
        let Some(attribute) = self.attribute() else {
            return Ok(false);
        };
        let attributes = attribute.element().attributes()?;
        let index = attributes.iter().position(|candidate| candidate == attribute);
        let next = index.and_then(|index| attributes.into_iter().nth(index + 1));
        match next {
            Some(next) => {
                self.position = Position::Attribute(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Jump to the first element with `id`, materializing the whole tree
    pub fn move_to_id(&mut self, id: &str) -> Result<bool> {
        let session = self.session().ok_or(Error::Disposed {
            object: "ParseSession",
        })?;
        match session.find_by_id(id)? {
            Some(element) => {
                self.position = Position::Node(Node::Element(element));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Take `other`'s position if it belongs to the same session
    pub fn move_to(&mut self, other: &Cursor) -> bool {
        if !Weak::ptr_eq(&self.session, &other.session) {
            return false;
        }
        self.position = other.position.clone();
        true
    }

    /// Move to the first child element whose local name matches, ignoring
    /// ASCII case
    pub fn move_to_child(&mut self, name: &str) -> Result<bool> {
        let Some(node) = self.node() else {
            return Ok(false);
        };
        let child = node.children()?.into_iter().find_map(|child| match child {
            Node::Element(element) if element_local_name(&element).eq_ignore_ascii_case(name) => {
                Some(element)
            }
            _ => None,
        });
        match child {
            Some(child) => {
                self.position = Position::Node(Node::Element(child));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move to the attribute named `name` of the current element
    pub fn move_to_attribute(&mut self, name: &str) -> Result<bool> {
        let Some(element) = self.node().and_then(Node::as_element) else {
            return Ok(false);
        };
        match element.attribute(name)? {
            Some(attribute) => {
                self.position = Position::Attribute(attribute);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_same_position(&self, other: &Cursor) -> bool {
        self.position == other.position
    }

    pub fn node_type(&self) -> CursorNodeType {
        match &self.position {
            Position::Attribute(_) => CursorNodeType::Attribute,
            Position::Node(node) => match node.node_type() {
                NodeType::Document => CursorNodeType::Root,
                NodeType::Element | NodeType::Template => CursorNodeType::Element,
                NodeType::Text | NodeType::Cdata => CursorNodeType::Text,
                NodeType::Comment => CursorNodeType::Comment,
                NodeType::Whitespace => CursorNodeType::Whitespace,
            },
        }
    }

    /// Name as written: the attribute's original name or the element's
    /// original tag name, falling back to the normalized names
    pub fn name(&self) -> String {
        match &self.position {
            Position::Attribute(attribute) => attribute
                .original_name()
                .unwrap_or(attribute.name())
                .to_string(),
            Position::Node(Node::Element(element)) => element
                .original_tag_name()
                .unwrap_or(element.normalized_tag_name())
                .to_string(),
            Position::Node(_) => String::new(),
        }
    }

    /// Name without any `prefix:` part
    pub fn local_name(&self) -> String {
        match &self.position {
            Position::Attribute(attribute) => attribute.name().to_string(),
            Position::Node(Node::Element(element)) => element_local_name(element).to_string(),
            Position::Node(_) => String::new(),
        }
    }

    /// Attribute value, element text, text value; empty for the document
    pub fn value(&self) -> Result<String> {
        Ok(match &self.position {
            Position::Attribute(attribute) => attribute.value().to_string(),
            Position::Node(Node::Element(element)) => element.value()?.to_string(),
            Position::Node(Node::Text(text)) => text.value().to_string(),
            Position::Node(Node::Document(_)) => String::new(),
        })
    }

    /// Namespace prefix of an attribute; element namespaces are implicit
    pub fn prefix(&self) -> &'static str {
        match &self.position {
            Position::Attribute(attribute) => attribute.namespace().prefix(),
            Position::Node(_) => "",
        }
    }

    /// Whether the cursor is on an element without children
    pub fn is_empty_element(&self) -> Result<bool> {
        match &self.position {
            Position::Node(node @ Node::Element(_)) if node.node_type() == NodeType::Element => {
                Ok(node.children()?.is_empty())
            }
            _ => Ok(false),
        }
    }
}

fn element_local_name(element: &Element) -> &str {
    match element.original_tag_name() {
        Some(name) if !name.is_empty() => name.rsplit(':').next().unwrap_or(name),
        _ => element.normalized_tag_name(),
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_position(other)
    }
}

impl Eq for Cursor {}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
