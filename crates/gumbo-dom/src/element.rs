//! Element Nodes

use crate::attribute::AttributeData;
use crate::lazy::LazyCache;
use crate::node::{ChildData, NodeInfo, ParentRef, Tree, attach_all};
use crate::{Attribute, Node, Result};
use gumbo_html::{Namespace, SourcePosition, Tag};
use std::fmt;
use std::sync::Arc;

/// Decoded element record.
///
/// Scalar fields are decoded when the element is created; children,
/// attributes and the text value are decoded on first access.
pub(crate) struct ElementData {
    pub info: NodeInfo,
    pub parent: ParentRef,
    pub tag: Tag,
    pub namespace: Namespace,
    pub start_position: SourcePosition,
    pub end_position: SourcePosition,
    pub original_tag: Option<String>,
    pub original_tag_name: Option<String>,
    pub original_end_tag: Option<String>,
    pub normalized_tag_name: String,
    pub children: LazyCache<Vec<ChildData>>,
    pub attributes: LazyCache<Vec<Arc<AttributeData>>>,
    pub value: LazyCache<String>,
}

/// An element or template node
#[derive(Clone)]
pub struct Element {
    tree: Tree,
    data: Arc<ElementData>,
}

impl Element {
    pub(crate) fn attach(tree: &Tree, data: &Arc<ElementData>) -> Self {
        Self {
            tree: Arc::clone(tree),
            data: Arc::clone(data),
        }
    }

    pub fn info(&self) -> &NodeInfo {
        &self.data.info
    }

    pub fn parent(&self) -> Option<Node> {
        self.data.parent.resolve(&self.tree)
    }

    pub fn tag(&self) -> Tag {
        self.data.tag
    }

    pub fn namespace(&self) -> Namespace {
        self.data.namespace
    }

    pub fn start_position(&self) -> SourcePosition {
        self.data.start_position
    }

    pub fn end_position(&self) -> SourcePosition {
        self.data.end_position
    }

    /// Start tag exactly as written, e.g. `<DIV class=a>`; `None` when the
    /// engine synthesized the element
    pub fn original_tag(&self) -> Option<&str> {
        self.data.original_tag.as_deref()
    }

    /// Tag name as written in the original start tag
    pub fn original_tag_name(&self) -> Option<&str> {
        self.data.original_tag_name.as_deref()
    }

    pub fn original_end_tag(&self) -> Option<&str> {
        self.data.original_end_tag.as_deref()
    }

    /// Lower-case canonical name; empty for unknown tags
    pub fn normalized_tag_name(&self) -> &str {
        &self.data.normalized_tag_name
    }

    /// Children in document order
    pub fn children(&self) -> Result<Vec<Node>> {
        Ok(attach_all(&self.tree, self.data.children.get()?))
    }

    /// Attributes in source order, duplicates included
    pub fn attributes(&self) -> Result<Vec<Attribute>> {
        Ok(self
            .data
            .attributes
            .get()?
            .iter()
            .map(|attribute| Attribute::attach(self, attribute))
            .collect())
    }

    /// First attribute named `name`, ignoring ASCII case
    pub fn attribute(&self, name: &str) -> Result<Option<Attribute>> {
        Ok(self
            .data
            .attributes
            .get()?
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
            .map(|attribute| Attribute::attach(self, attribute)))
    }

    /// Concatenated text of all descendant text nodes, depth first
    pub fn value(&self) -> Result<&str> {
        self.data.value.get().map(String::as_str)
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> Result<Vec<Element>> {
        Ok(self
            .data
            .children
            .get()?
            .iter()
            .filter_map(|child| match child {
                ChildData::Element(data) => Some(Element::attach(&self.tree, data)),
                ChildData::Text(_) => None,
            })
            .collect())
    }
}

/// Identity comparison
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("type", &self.data.info.node_type)
            .field("tag", &self.data.tag)
            .field("original_tag", &self.data.original_tag)
            .finish_non_exhaustive()
    }
}
