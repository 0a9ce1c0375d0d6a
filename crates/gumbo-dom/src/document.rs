//! Document Node

use crate::lazy::LazyCache;
use crate::node::{ChildData, NodeInfo, Tree, attach_all};
use crate::{Element, Node, Result};
use gumbo_html::QuirksMode;
use std::fmt;
use std::sync::Arc;

/// Decoded document record; owns the rest of the tree
pub(crate) struct DocumentData {
    pub info: NodeInfo,
    pub has_doctype: bool,
    pub name: Option<String>,
    pub public_identifier: Option<String>,
    pub system_identifier: Option<String>,
    pub quirks_mode: QuirksMode,
    pub children: LazyCache<Vec<ChildData>>,
}

/// Root of a parsed tree
#[derive(Clone)]
pub struct Document {
    data: Tree,
}

impl Document {
    pub(crate) fn attach(tree: &Tree) -> Self {
        Self {
            data: Arc::clone(tree),
        }
    }

    pub fn info(&self) -> &NodeInfo {
        &self.data.info
    }

    pub fn has_doctype(&self) -> bool {
        self.data.has_doctype
    }

    /// Doctype name
    pub fn name(&self) -> Option<&str> {
        self.data.name.as_deref()
    }

    pub fn public_identifier(&self) -> Option<&str> {
        self.data.public_identifier.as_deref()
    }

    pub fn system_identifier(&self) -> Option<&str> {
        self.data.system_identifier.as_deref()
    }

    pub fn quirks_mode(&self) -> QuirksMode {
        self.data.quirks_mode
    }

    pub fn children(&self) -> Result<Vec<Node>> {
        Ok(attach_all(&self.data, self.data.children.get()?))
    }

    /// The top-level element, skipping leading comments
    pub fn root(&self) -> Result<Option<Element>> {
        Ok(self
            .data
            .children
            .get()?
            .iter()
            .find_map(|child| match child {
                ChildData::Element(data) => Some(Element::attach(&self.data, data)),
                ChildData::Text(_) => None,
            }))
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("has_doctype", &self.data.has_doctype)
            .field("name", &self.data.name)
            .field("quirks_mode", &self.data.quirks_mode)
            .finish_non_exhaustive()
    }
}
