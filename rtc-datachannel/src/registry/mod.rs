
use log::trace;
use parking_lot::RwLock;
use shared::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// HandleRegistry maps a native reference to the wrapper that owns it.
///
/// Entries are weak: the registry never keeps a wrapper alive. A lookup
/// clones the strong reference and releases the lock before returning, so the
/// caller may re-enter the registry (for example by disposing the wrapper it
/// just resolved).
pub struct HandleRegistry<K, T> {
    entries: RwLock<HashMap<K, Weak<T>>>,
}

impl<K, T> Default for HandleRegistry<K, T> {
    fn default() -> Self {
        HandleRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, T> HandleRegistry<K, T>
where
    K: Eq + Hash + Copy + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `key` with `handle`.
    ///
    /// Fails with [`Error::ErrNativeHandleInUse`] if `key` still resolves to a
    /// live handle. A stale entry whose handle has already been dropped is
    /// replaced.
    pub fn insert(&self, key: K, handle: &Arc<T>) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.get(&key).is_some_and(|w| w.strong_count() > 0) {
            return Err(Error::ErrNativeHandleInUse);
        }
        entries.insert(key, Arc::downgrade(handle));
        trace!("registry: {key} registered ({} entries)", entries.len());
        Ok(())
    }

    /// Removes `key`. Returns whether an entry was present.
    pub fn remove(&self, key: K) -> bool {
        let removed = self.entries.write().remove(&key).is_some();
        if removed {
            trace!("registry: {key} unregistered");
        }
        removed
    }

    /// Removes `key` only if it is still associated with `handle`.
    pub fn remove_if(&self, key: K, handle: &T) -> bool {
        let mut entries = self.entries.write();
        let owned = entries
            .get(&key)
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), handle));
        if owned {
            entries.remove(&key);
            trace!("registry: {key} unregistered");
        }
        owned
    }

    pub fn lookup(&self, key: K) -> Option<Arc<T>> {
        self.entries.read().get(&key).and_then(Weak::upgrade)
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.read().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
