//! Self-returning object pool
//!
//! A [`ResourcePool`] hands out items wrapped in a [`PoolItem`] guard.
//! Dropping the guard returns the item to the pool if the pool is still
//! alive, and simply drops the item otherwise. The pool owns a small heap
//! cell and every guard carries a weak reference to it, so nothing ever
//! forms an ownership cycle with the pool itself.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

struct PoolInner<T> {
    items: Mutex<Vec<T>>,
}

/// A pool of reusable values of type `T`.
pub struct ResourcePool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> ResourcePool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                items: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Put an item into the pool.
    pub fn add(&self, item: T) {
        self.inner.items.lock().push(item);
    }

    /// Take an item out of the pool, or `None` when it is empty. The item
    /// returns on drop of the guard.
    pub fn acquire(&self) -> Option<PoolItem<T>> {
        let value = self.inner.items.lock().pop()?;
        Some(PoolItem {
            value: Some(value),
            pool: Arc::downgrade(&self.inner),
        })
    }

    /// Hand out a fresh item that will return to this pool on drop, as if
    /// it had been added and immediately acquired.
    pub fn add_acquire(&self, item: T) -> PoolItem<T> {
        PoolItem {
            value: Some(item),
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Whether the pool currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Number of items currently in the pool (not counting handed-out
    /// guards).
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }
}

impl<T> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard over an acquired pool item. Derefs to the item.
pub struct PoolItem<T> {
    value: Option<T>,
    pool: Weak<PoolInner<T>>,
}

impl<T> Deref for PoolItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("pool item value present until drop")
    }
}

impl<T> DerefMut for PoolItem<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pool item value present until drop")
    }
}

impl<T> Drop for PoolItem<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.items.lock().push(value);
            }
        }
    }
}
