//! Attributes

use crate::Element;
use gumbo_html::{AttrNamespace, SourcePosition};
use std::fmt;
use std::sync::Arc;

/// Decoded attribute record, fully read when created
#[derive(Debug)]
pub(crate) struct AttributeData {
    pub namespace: AttrNamespace,
    pub name: String,
    pub value: String,
    pub original_name: Option<String>,
    pub original_value: Option<String>,
    pub name_start: SourcePosition,
    pub name_end: SourcePosition,
    pub value_start: SourcePosition,
    pub value_end: SourcePosition,
}

/// An attribute of an element
#[derive(Clone)]
pub struct Attribute {
    element: Element,
    data: Arc<AttributeData>,
}

impl Attribute {
    pub(crate) fn attach(element: &Element, data: &Arc<AttributeData>) -> Self {
        Self {
            element: element.clone(),
            data: Arc::clone(data),
        }
    }

    /// Owning element
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn namespace(&self) -> AttrNamespace {
        self.data.namespace
    }

    /// Normalized (lower-case) name
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Value with character references resolved
    pub fn value(&self) -> &str {
        &self.data.value
    }

    /// Name as written in the source
    pub fn original_name(&self) -> Option<&str> {
        self.data.original_name.as_deref()
    }

    /// Value as written in the source, including quotes
    pub fn original_value(&self) -> Option<&str> {
        self.data.original_value.as_deref()
    }

    pub fn name_start(&self) -> SourcePosition {
        self.data.name_start
    }

    pub fn name_end(&self) -> SourcePosition {
        self.data.name_end
    }

    pub fn value_start(&self) -> SourcePosition {
        self.data.value_start
    }

    pub fn value_end(&self) -> SourcePosition {
        self.data.value_end
    }
}

/// Identity comparison
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Attribute {}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.data.name)
            .field("value", &self.data.value)
            .finish_non_exhaustive()
    }
}
