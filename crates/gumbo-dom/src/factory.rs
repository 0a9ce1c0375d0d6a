//! Node Graph Factory
//!
//! Builds tree nodes from engine records. Scalar fields are copied out
//! immediately; children, attributes and element values become lazy fields
//! whose productions decode further records on first access. Decoding an
//! `id` attribute registers its element in the session's id index.

use crate::attribute::AttributeData;
use crate::document::DocumentData;
use crate::element::ElementData;
use crate::id_index::IdIndex;
use crate::lazy::{LazyCache, Liveness};
use crate::node::{ChildData, NodeInfo, ParentRef};
use crate::text::TextData;
use crate::{Error, Result};
use gumbo_html::Engine;
use gumbo_html::decode::{
    DecodedNode, NodeData, RawAttribute, RawNode, decode_attribute, decode_node, read_piece,
};
use std::sync::{Arc, Weak};

/// State shared by every node of one parse session
#[derive(Debug)]
pub(crate) struct TreeContext {
    pub liveness: Liveness,
    pub engine: Arc<dyn Engine>,
    pub ids: IdIndex<ElementData>,
}

impl TreeContext {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            liveness: Liveness::new(),
            engine,
            ids: IdIndex::new(),
        }
    }
}

/// What a node record decodes to
pub(crate) enum Built {
    Document(Arc<DocumentData>),
    Child(ChildData),
}

/// Build the node for `raw`.
///
/// # Safety
/// `raw` must point into a live output blob: either the session is being
/// created or the caller holds a liveness guard.
pub(crate) unsafe fn make_node(
    context: &Arc<TreeContext>,
    raw: RawNode,
    parent: ParentRef,
) -> Result<Built> {
    // SAFETY: guaranteed by the caller
    let decoded = unsafe { decode_node(raw)? };
    let DecodedNode {
        node_type,
        parse_flags,
        index_within_parent,
        data,
    } = decoded;
    let info = NodeInfo {
        node_type,
        parse_flags,
        index_within_parent,
    };

    let built = match data {
        NodeData::Document(document) => Built::Document(Arc::new(DocumentData {
            info,
            has_doctype: document.has_doctype,
            name: document.name,
            public_identifier: document.public_identifier,
            system_identifier: document.system_identifier,
            quirks_mode: document.quirks_mode,
            children: children_cache(context, "Document", document.children, ParentRef::Document),
        })),
        NodeData::Element(element) => {
            // SAFETY: the span points into the same live blob or input
            let original_tag_name = unsafe {
                read_piece(
                    context
                        .engine
                        .tag_from_original_text(element.original_tag_span),
                )
            };
            let normalized_tag_name = context.engine.normalized_tag_name(element.tag);

            let data = Arc::new_cyclic(|weak: &Weak<ElementData>| ElementData {
                info,
                parent,
                tag: element.tag,
                namespace: element.namespace,
                start_position: element.start_position,
                end_position: element.end_position,
                original_tag: element.original_tag,
                original_tag_name,
                original_end_tag: element.original_end_tag,
                normalized_tag_name,
                children: children_cache(
                    context,
                    "Element",
                    element.children,
                    ParentRef::Element(weak.clone()),
                ),
                attributes: attributes_cache(context, element.attributes, weak.clone()),
                value: value_cache(context, weak.clone()),
            });
            Built::Child(ChildData::Element(data))
        }
        NodeData::Text(text) => Built::Child(ChildData::Text(Arc::new(TextData {
            info,
            parent,
            value: text.text.unwrap_or_default(),
            start_position: text.start_position,
        }))),
    };
    Ok(built)
}

/// Build the attribute for `raw`, registering `id` attributes.
///
/// # Safety
/// Same contract as [`make_node`].
pub(crate) unsafe fn make_attribute(
    context: &TreeContext,
    raw: RawAttribute,
    element: &Weak<ElementData>,
) -> Result<Arc<AttributeData>> {
    // SAFETY: guaranteed by the caller
    let decoded = unsafe { decode_attribute(raw)? };
    let attribute = AttributeData {
        namespace: decoded.namespace,
        name: decoded.name.unwrap_or_default(),
        value: decoded.value.unwrap_or_default(),
        original_name: decoded.original_name,
        original_value: decoded.original_value,
        name_start: decoded.name_start,
        name_end: decoded.name_end,
        value_start: decoded.value_start,
        value_end: decoded.value_end,
    };
    if attribute.name.eq_ignore_ascii_case("id") {
        context.ids.register(&attribute.value, element.clone());
    }
    Ok(Arc::new(attribute))
}

fn children_cache(
    context: &Arc<TreeContext>,
    object: &'static str,
    raw_children: Vec<RawNode>,
    parent: ParentRef,
) -> LazyCache<Vec<ChildData>> {
    let context_ref = Arc::clone(context);
    LazyCache::new(context.liveness.clone(), object, move || {
        let mut children = Vec::with_capacity(raw_children.len());
        for raw in raw_children {
            // SAFETY: productions run under a liveness guard
            match unsafe { make_node(&context_ref, raw, parent.clone())? } {
                Built::Child(child) => children.push(child),
                Built::Document(_) => return Err(Error::UnexpectedRoot),
            }
        }
        // storage order is not document order
        children.sort_by_key(ChildData::index_within_parent);
        Ok(children)
    })
}

fn attributes_cache(
    context: &Arc<TreeContext>,
    raw_attributes: Vec<RawAttribute>,
    element: Weak<ElementData>,
) -> LazyCache<Vec<Arc<AttributeData>>> {
    let context_ref = Arc::clone(context);
    LazyCache::new(context.liveness.clone(), "Element", move || {
        raw_attributes
            .into_iter()
            // SAFETY: productions run under a liveness guard
            .map(|raw| unsafe { make_attribute(&context_ref, raw, &element) })
            .collect()
    })
}

fn value_cache(context: &Arc<TreeContext>, element: Weak<ElementData>) -> LazyCache<String> {
    LazyCache::new(context.liveness.clone(), "Element", move || {
        let element = element.upgrade().ok_or(Error::Disposed { object: "Element" })?;
        let mut value = String::new();
        for child in element.children.get()? {
            match child {
                ChildData::Element(child) => value.push_str(child.value.get()?),
                ChildData::Text(text) => value.push_str(&text.value),
            }
        }
        Ok(value)
    })
}
