//! Text Nodes

use crate::Node;
use crate::node::{NodeInfo, ParentRef, Tree};
use gumbo_html::SourcePosition;
use std::fmt;
use std::sync::Arc;

pub(crate) struct TextData {
    pub info: NodeInfo,
    pub parent: ParentRef,
    pub value: String,
    pub start_position: SourcePosition,
}

/// Text, CDATA, comment or whitespace node; always childless
#[derive(Clone)]
pub struct Text {
    tree: Tree,
    data: Arc<TextData>,
}

impl Text {
    pub(crate) fn attach(tree: &Tree, data: &Arc<TextData>) -> Self {
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

    pub fn value(&self) -> &str {
        &self.data.value
    }

    pub fn start_position(&self) -> SourcePosition {
        self.data.start_position
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Text {}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Text")
            .field("type", &self.data.info.node_type)
            .field("value", &self.data.value)
            .finish()
    }
}
