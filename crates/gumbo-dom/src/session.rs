//! Parse Session
//!
//! Owns the engine's output blob and the input buffer it may point into,
//! and anchors the liveness of every lazy field in the tree. Releasing the
//! session frees the blob once; values already decoded stay usable.

use crate::element::ElementData;
use crate::factory::{self, Built, TreeContext};
use crate::id_index::IdIndex;
use crate::node::{ParentRef, Tree};
use crate::{Cursor, Document, Element, Error, Node, Position, Result};
use gumbo_html::decode::decode_output;
use gumbo_html::diagnostic::decode_error;
use gumbo_html::ffi::OutputRecord;
use gumbo_html::{BuiltinEngine, Engine, ParseDiagnostic, ParseOptions};
use parking_lot::Mutex;
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

/// Engine output plus the buffer it was parsed from. Freed on drop.
struct ForeignOutput {
    output: NonNull<OutputRecord>,
    /// NUL-terminated copy of the input
    input: Box<[u8]>,
    engine: Arc<dyn Engine>,
    options: ParseOptions,
}

// SAFETY: the blob is only read through decode calls made under the
// session's liveness guard, and freed under its write lock
unsafe impl Send for ForeignOutput {}
unsafe impl Sync for ForeignOutput {}

impl ForeignOutput {
    /// Input as given to the engine, without the terminator
    fn html(&self) -> &[u8] {
        &self.input[..self.input.len() - 1]
    }
}

impl Drop for ForeignOutput {
    fn drop(&mut self) {
        tracing::debug!("Destroying engine output ({} input bytes)", self.input.len() - 1);
        // SAFETY: produced by `engine.parse` with these options, freed once
        unsafe { self.engine.destroy_output(&self.options, self.output) }
    }
}

pub(crate) struct SessionInner {
    context: Arc<TreeContext>,
    foreign: Mutex<Option<ForeignOutput>>,
    tree: Tree,
    diagnostics: Vec<ParseDiagnostic>,
    materialized: Mutex<bool>,
}

impl SessionInner {
    fn release(&self) -> bool {
        self.context.liveness.release(|| {
            self.foreign.lock().take();
        })
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// A parsed document and the foreign memory behind it.
///
/// Cloning shares the session. The output blob is freed by `release` or
/// when the last clone is dropped.
#[derive(Clone)]
pub struct ParseSession {
    inner: Arc<SessionInner>,
}

impl ParseSession {
    /// Parse with the built-in engine and default options
    pub fn parse(html: &str) -> Result<Self> {
        Self::parse_with_options(html, ParseOptions::default())
    }

    pub fn parse_with_options(html: &str, options: ParseOptions) -> Result<Self> {
        Self::parse_with_engine(Arc::new(BuiltinEngine::new()), html, options)
    }

    /// Parse with `engine`.
    ///
    /// Malformed HTML never fails; it shows up in `diagnostics()` and in
    /// node parse flags. Errors come from the engine itself or from a root
    /// record that cannot be decoded.
    pub fn parse_with_engine(
        engine: Arc<dyn Engine>,
        html: &str,
        options: ParseOptions,
    ) -> Result<Self> {
        tracing::debug!("Parsing HTML document: {} bytes", html.len());

        let mut input = Vec::with_capacity(html.len() + 1);
        input.extend_from_slice(html.as_bytes());
        input.push(0);
        let input = input.into_boxed_slice();

        let output = engine.parse(&input[..html.len()], &options)?;
        let foreign = ForeignOutput {
            output,
            input,
            engine: Arc::clone(&engine),
            options,
        };

        // SAFETY: the blob was just produced and is owned by `foreign`
        let decoded = unsafe { decode_output(foreign.output)? };
        let diagnostics: Vec<ParseDiagnostic> = decoded
            .errors
            .iter()
            // SAFETY: as above
            .map(|&error| unsafe { decode_error(error, foreign.html()) })
            .collect();

        let context = Arc::new(TreeContext::new(engine));
        // SAFETY: as above
        let root = unsafe { factory::make_node(&context, decoded.document, ParentRef::Document)? };
        let Built::Document(tree) = root else {
            return Err(Error::UnexpectedRoot);
        };

        tracing::debug!("Parsed document with {} diagnostics", diagnostics.len());
        Ok(Self {
            inner: Arc::new(SessionInner {
                context,
                foreign: Mutex::new(Some(foreign)),
                tree,
                diagnostics,
                materialized: Mutex::new(false),
            }),
        })
    }

    pub fn document(&self) -> Document {
        Document::attach(&self.inner.tree)
    }

    /// Engine diagnostics in the order reported
    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.inner.diagnostics
    }

    /// Free the engine output. Later calls are no-ops.
    ///
    /// Lazy fields not yet evaluated fail with `Error::Disposed` afterwards.
    pub fn release(&self) {
        if self.inner.release() {
            tracing::debug!("Parse session released");
        }
    }

    pub fn is_released(&self) -> bool {
        !self.inner.context.liveness.is_alive()
    }

    /// Force every lazy children and attributes field in the tree.
    ///
    /// Runs the walk once per session; afterwards the id index is complete.
    pub fn materialize_all(&self) -> Result<()> {
        let mut materialized = self.inner.materialized.lock();
        if *materialized {
            return Ok(());
        }

        let mut count = 0usize;
        let mut stack = vec![Node::Document(self.document())];
        while let Some(node) = stack.pop() {
            count += 1;
            if let Node::Element(element) = &node {
                element.attributes()?;
            }
            stack.extend(node.children()?.into_iter().rev());
        }

        *materialized = true;
        tracing::debug!("Materialized {} nodes", count);
        Ok(())
    }

    /// First element whose id matches, ignoring case.
    ///
    /// Materializes the whole tree first.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Element>> {
        self.materialize_all()?;
        Ok(self.id_index().lookup(id))
    }

    /// Ids registered so far; complete only after `materialize_all`
    pub fn id_index(&self) -> IdLookup<'_> {
        IdLookup {
            index: &self.inner.context.ids,
            tree: &self.inner.tree,
        }
    }

    /// Cursor positioned on the document
    pub fn cursor(&self) -> Cursor {
        self.cursor_at(Position::Node(Node::Document(self.document())))
    }

    /// Cursor positioned at `position`
    pub fn cursor_at(&self, position: Position) -> Cursor {
        Cursor::new(self.downgrade(), position)
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<SessionInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }
}

/// Read access to a session's id index
#[derive(Clone, Copy)]
pub struct IdLookup<'a> {
    index: &'a IdIndex<ElementData>,
    tree: &'a Tree,
}

impl IdLookup<'_> {
    /// First element registered under `id`, ignoring case
    pub fn lookup(&self, id: &str) -> Option<Element> {
        self.index
            .lookup(id)
            .map(|data| Element::attach(self.tree, &data))
    }

    /// Every element registered under `id`, in registration order
    pub fn lookup_all(&self, id: &str) -> Vec<Element> {
        self.index
            .lookup_all(id)
            .iter()
            .map(|data| Element::attach(self.tree, data))
            .collect()
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl fmt::Debug for IdLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.index, f)
    }
}

impl fmt::Debug for ParseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseSession")
            .field("released", &self.is_released())
            .field("diagnostics", &self.inner.diagnostics.len())
            .field("document", &self.document())
            .finish()
    }
}
