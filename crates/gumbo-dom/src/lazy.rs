//! Lazy Cache
//!
//! Deferred, memoize-once values bound to the liveness of a parse session.
//! A production closure runs at most once, on first access, and only while
//! the session's foreign output is still alive. Memoized values are owned
//! copies, so they stay readable after the session is released.

use crate::{Error, Result};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Shared liveness flag of a parse session.
///
/// Productions hold a read guard while they run, and release takes the write
/// lock, so foreign memory is never freed under a running production.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<RwLock<bool>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(RwLock::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Guard keeping foreign memory alive; `None` once released.
    ///
    /// Recursive so nested productions do not block behind a waiting release.
    pub(crate) fn enter(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let guard = self.alive.read_recursive();
        (*guard).then_some(guard)
    }

    /// Mark released and run `free` under the write lock.
    ///
    /// Returns `false` without calling `free` if already released.
    pub fn release(&self, free: impl FnOnce()) -> bool {
        let mut alive = self.alive.write();
        if !*alive {
            return false;
        }
        *alive = false;
        free();
        true
    }
}

type Production<T> = Box<dyn FnOnce() -> Result<T> + Send>;

/// A value produced on first access
pub struct LazyCache<T> {
    outcome: OnceLock<Result<T>>,
    production: Mutex<Option<Production<T>>>,
    liveness: Liveness,
    object: &'static str,
}

impl<T> LazyCache<T> {
    /// Wrap `produce`; `object` names the owner in disposed errors
    pub fn new(
        liveness: Liveness,
        object: &'static str,
        produce: impl FnOnce() -> Result<T> + Send + 'static,
    ) -> Self {
        Self {
            outcome: OnceLock::new(),
            production: Mutex::new(Some(Box::new(produce))),
            liveness,
            object,
        }
    }

    /// The memoized value, producing it on first access.
    ///
    /// Fails with `Error::Disposed` if the session was released before the
    /// first access. Decode failures are memoized like values.
    pub fn get(&self) -> Result<&T> {
        if let Some(outcome) = self.outcome.get() {
            return outcome.as_ref().map_err(Clone::clone);
        }

        // serializes first access; later callers find the outcome set
        let mut production = self.production.lock();
        if self.outcome.get().is_none() {
            let Some(_alive) = self.liveness.enter() else {
                tracing::warn!("{} accessed after its session was released", self.object);
                return Err(Error::Disposed {
                    object: self.object,
                });
            };
            let produce = production.take().ok_or(Error::Poisoned {
                object: self.object,
            })?;
            tracing::trace!("Evaluating lazy {} field", self.object);
            let _ = self.outcome.set(produce());
        }
        drop(production);

        match self.outcome.get() {
            Some(outcome) => outcome.as_ref().map_err(Clone::clone),
            None => Err(Error::Poisoned {
                object: self.object,
            }),
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.outcome.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome.get() {
            Some(outcome) => f.debug_tuple("LazyCache").field(outcome).finish(),
            None => f.write_str("LazyCache(<pending>)"),
        }
    }
}
