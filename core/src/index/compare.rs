//! Item ordering for [`AvlTree`](super::AvlTree).

use std::cmp::Ordering;
use std::marker::PhantomData;

/// Orders the items of an [`AvlTree`](super::AvlTree).
///
/// The comparator is the only source of ordering the tree consults. Items
/// are located by a [`Key`](Comparator::Key) extracted from them, so lookups
/// and deletions never need a dummy item, and cursors can remember where
/// they were after the item itself is gone.
pub trait Comparator<T> {
    /// Search key. Cloned into cursors, so it should be cheap.
    type Key: Clone;

    /// Extracts the key of `item`.
    fn key(&self, item: &T) -> Self::Key;

    /// Orders `key` relative to `item`.
    fn compare(&self, key: &Self::Key, item: &T) -> Ordering;
}

/// Orders items by their own [`Ord`] implementation. The item is its key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Natural;

impl<T: Ord + Clone> Comparator<T> for Natural {
    type Key = T;

    fn key(&self, item: &T) -> T {
        item.clone()
    }

    fn compare(&self, key: &T, item: &T) -> Ordering {
        key.cmp(item)
    }
}

/// Orders items by a key projection.
///
/// ```
/// use virtgl_core::index::{AvlTree, ByKey};
///
/// let mut tree = AvlTree::new(ByKey::new(|pair: &(u32, u64)| pair.0));
/// tree.assert_insert((2, 20));
/// tree.assert_insert((1, 10));
/// assert_eq!(tree.find(&2), Some(&(2, 20)));
/// ```
pub struct ByKey<F, K> {
    project: F,
    _key: PhantomData<fn() -> K>,
}

impl<F, K> ByKey<F, K> {
    pub fn new(project: F) -> Self {
        Self {
            project,
            _key: PhantomData,
        }
    }
}

impl<T, F, K> Comparator<T> for ByKey<F, K>
where
    F: Fn(&T) -> K,
    K: Ord + Clone,
{
    type Key = K;

    fn key(&self, item: &T) -> K {
        (self.project)(item)
    }

    fn compare(&self, key: &K, item: &T) -> Ordering {
        key.cmp(&(self.project)(item))
    }
}

impl<F: Clone, K> Clone for ByKey<F, K> {
    fn clone(&self) -> Self {
        Self::new(self.project.clone())
    }
}
