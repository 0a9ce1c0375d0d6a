//! Id Index
//!
//! Session-scoped multimap from element id to every element seen so far
//! carrying it, in registration order. Keys compare case-insensitively.
//! The index only knows elements whose attributes have been decoded.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Case-insensitive id multimap
pub struct IdIndex<T> {
    entries: RwLock<HashMap<String, Vec<Weak<T>>>>,
}

impl<T> Default for IdIndex<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> IdIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(id: &str) -> String {
        id.to_lowercase()
    }

    /// Append `element` to the occurrences of `id`. Never overwrites.
    pub fn register(&self, id: &str, element: Weak<T>) {
        tracing::trace!("Registering element id {:?}", id);
        self.entries
            .write()
            .entry(Self::key(id))
            .or_default()
            .push(element);
    }

    /// First element registered under `id`
    pub fn lookup(&self, id: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(&Self::key(id))
            .and_then(|elements| elements.iter().find_map(Weak::upgrade))
    }

    /// Every element registered under `id`, in registration order
    pub fn lookup_all(&self, id: &str) -> Vec<Arc<T>> {
        self.entries
            .read()
            .get(&Self::key(id))
            .map(|elements| elements.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T> fmt::Debug for IdIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|(id, elements)| (id, elements.len())))
            .finish()
    }
}
