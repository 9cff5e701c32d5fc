//! Node storage for [`AvlTree`](super::AvlTree).
//!
//! Nodes live in an allocator and reference each other by [`NodeId`]. The
//! default [`SlabAllocator`] is a growable vector with a free list; it can be
//! capped to bound the number of live nodes.

use super::IndexError;

/// Stable index of a node inside its allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A tree node: two child links, the item, and the AVL balance factor
/// (`height(right) - height(left)`, always in `-1..=1` between operations).
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(crate) link: [Option<NodeId>; 2],
    pub(crate) item: T,
    pub(crate) balance: i8,
}

impl<T> Node<T> {
    pub(crate) fn leaf(item: T) -> Self {
        Self {
            link: [None, None],
            item,
            balance: 0,
        }
    }

    /// The stored item.
    pub fn item(&self) -> &T {
        &self.item
    }
}

/// Backing store for tree nodes.
///
/// The tree never touches node memory except through this trait, so a
/// caller can supply a pre-sized or capped store for constrained targets.
pub trait NodeAllocator<T> {
    /// Stores `node` and returns its id, or fails without side effects.
    fn allocate(&mut self, node: Node<T>) -> Result<NodeId, IndexError>;

    /// Removes and returns the node behind `id`. The id may be reused.
    fn free(&mut self, id: NodeId) -> Node<T>;

    fn get(&self, id: NodeId) -> &Node<T>;

    fn get_mut(&mut self, id: NodeId) -> &mut Node<T>;

    /// Number of live nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Vector-backed node store with slot reuse.
#[derive(Debug, Clone)]
pub struct SlabAllocator<T> {
    slots: Vec<Option<Node<T>>>,
    free_list: Vec<NodeId>,
    live: usize,
    limit: Option<usize>,
}

impl<T> SlabAllocator<T> {
    /// An unbounded allocator.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            limit: None,
        }
    }

    /// An allocator that refuses to hold more than `limit` live nodes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Pre-allocates room for `additional` more nodes.
    pub fn reserve(&mut self, additional: usize) {
        let needed = additional.saturating_sub(self.free_list.len());
        self.slots.reserve(needed);
    }

    /// Maximum number of live nodes, if capped.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl<T> Default for SlabAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeAllocator<T> for SlabAllocator<T> {
    fn allocate(&mut self, node: Node<T>) -> Result<NodeId, IndexError> {
        if let Some(limit) = self.limit
            && self.live >= limit
        {
            log::warn!("SlabAllocator: node limit of {limit} reached");
            return Err(IndexError::AllocatorExhausted { capacity: limit });
        }

        let id = match self.free_list.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(node);
                id
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| IndexError::AllocatorExhausted {
                        capacity: self.slots.len(),
                    })?;
                self.slots.push(Some(node));
                NodeId(index)
            }
        };

        self.live += 1;
        Ok(id)
    }

    fn free(&mut self, id: NodeId) -> Node<T> {
        let node = self.slots[id.index()]
            .take()
            .unwrap_or_else(|| panic!("double free of tree node {id:?}"));
        self.free_list.push(id);
        self.live -= 1;
        node
    }

    fn get(&self, id: NodeId) -> &Node<T> {
        self.slots[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling tree node {id:?}"))
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.slots[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling tree node {id:?}"))
    }

    fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_reused() {
        let mut slab = SlabAllocator::new();
        let a = slab.allocate(Node::leaf(1)).unwrap();
        let b = slab.allocate(Node::leaf(2)).unwrap();
        assert_ne!(a, b);
        assert_eq!(slab.len(), 2);

        assert_eq!(slab.free(a).item, 1);
        let c = slab.allocate(Node::leaf(3)).unwrap();
        assert_eq!(c, a);
        assert_eq!(slab.get(c).item, 3);
        assert_eq!(slab.get(b).item, 2);
    }

    #[test]
    fn test_limit_is_enforced() {
        let mut slab = SlabAllocator::with_limit(1);
        let a = slab.allocate(Node::leaf("a")).unwrap();
        assert_eq!(
            slab.allocate(Node::leaf("b")).unwrap_err(),
            IndexError::AllocatorExhausted { capacity: 1 }
        );

        slab.free(a);
        assert!(slab.is_empty());
        assert!(slab.allocate(Node::leaf("c")).is_ok());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let mut slab = SlabAllocator::new();
        let a = slab.allocate(Node::leaf(0u8)).unwrap();
        slab.free(a);
        slab.free(a);
    }
}
