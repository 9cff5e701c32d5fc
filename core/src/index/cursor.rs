//! Mutation-tolerant traversal of an [`AvlTree`].

use std::cmp::Ordering;
use std::fmt;

use super::{AvlTree, Comparator, IndexError, MAX_HEIGHT, NodeAllocator, NodeId, Probe, TreeId};

/// A stateful position inside an [`AvlTree`].
///
/// A cursor does not borrow its tree: every call takes the tree as an
/// argument, so the tree may be mutated between calls. The cursor records
/// the tree generation it last saw and the key it sits on. When the
/// generation moved, it rebuilds its ancestor stack by searching for that
/// key before stepping. If the key is gone, [`next`](Self::next) continues
/// at the smallest greater key and [`prev`](Self::prev) at the largest
/// smaller one.
///
/// A cursor past either end is in the null position: `next` from there
/// starts at the first item and `prev` at the last.
pub struct Cursor<K> {
    tree: Option<TreeId>,
    node: Option<NodeId>,
    key: Option<K>,
    stack: [NodeId; MAX_HEIGHT],
    height: usize,
    generation: u64,
}

impl<K: Clone> Cursor<K> {
    /// A cursor in the null position, not yet bound to a tree.
    pub fn new() -> Self {
        Self {
            tree: None,
            node: None,
            key: None,
            stack: [NodeId::default(); MAX_HEIGHT],
            height: 0,
            generation: 0,
        }
    }

    /// Key of the item the cursor was last positioned on.
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Moves to the smallest item.
    pub fn first<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.attach(tree);
        self.edge(tree, 0)
    }

    /// Moves to the largest item.
    pub fn last<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.attach(tree);
        self.edge(tree, 1)
    }

    /// Moves to the item with `key`, or to the null position if absent.
    pub fn find<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>, key: &K) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.attach(tree);
        let found = Self::descend(tree, key, &mut self.stack, &mut self.height);
        if found.is_none() {
            self.height = 0;
        }
        self.settle(tree, found)
    }

    /// Inserts `item` through the tree's probe and moves to the resident
    /// item under its key, whether newly inserted or pre-existing.
    pub fn insert<'t, T, C, A>(
        &mut self,
        tree: &'t mut AvlTree<T, C, A>,
        item: T,
    ) -> Result<Probe<'t, T>, IndexError>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.attach(tree);
        let (id, rejected) = tree.probe_node(item)?;
        let tree: &'t AvlTree<T, C, A> = tree;

        self.node = Some(id);
        self.key = Some(tree.compare.key(&tree.node(id).item));
        // The ancestor stack was not recorded; force a rebuild on next move.
        self.generation = tree.generation.wrapping_sub(1);

        let resident = &tree.node(id).item;
        Ok(match rejected {
            None => Probe::Inserted(resident),
            Some(rejected) => Probe::Occupied {
                existing: resident,
                rejected,
            },
        })
    }

    /// Moves to the next item in ascending order.
    pub fn next<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.step(tree, 1)
    }

    /// Moves to the previous item.
    pub fn prev<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.step(tree, 0)
    }

    /// The item under the cursor, or `None` in the null position or when
    /// the item was deleted since the cursor last moved.
    pub fn current<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.bind(tree);
        if self.generation != tree.generation {
            self.refresh(tree);
        }
        self.node.map(|id| &tree.node(id).item)
    }

    /// Swaps the item under the cursor for `item`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not on an item, or if `item` does not compare
    /// equal to it (that would break the tree's ordering).
    pub fn replace<T, C, A>(&mut self, tree: &mut AvlTree<T, C, A>, item: T) -> T
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.bind(tree);
        if self.generation != tree.generation {
            self.refresh(tree);
        }
        let Some(id) = self.node else {
            panic!("cursor replace in the null position");
        };
        let new_key = tree.compare.key(&item);
        assert_eq!(
            tree.compare.compare(&new_key, &tree.node(id).item),
            Ordering::Equal,
            "cursor replace with an item under a different key"
        );
        std::mem::replace(&mut tree.node_mut(id).item, item)
    }

    fn step<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>, dir: usize) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.bind(tree);
        if self.generation != tree.generation {
            self.refresh(tree);
        }

        // Either the null position or a key that was deleted under us.
        let Some(mut x) = self.node else {
            return self.seek_beyond(tree, dir);
        };

        if let Some(mut y) = tree.node(x).link[dir] {
            self.push(x);
            while let Some(inner) = tree.node(y).link[1 - dir] {
                self.push(y);
                y = inner;
            }
            return self.settle(tree, Some(y));
        }

        loop {
            if self.height == 0 {
                return self.settle(tree, None);
            }
            let child = x;
            self.height -= 1;
            x = self.stack[self.height];
            if tree.node(x).link[dir] != Some(child) {
                return self.settle(tree, Some(x));
            }
        }
    }

    /// Walks to the extreme item on side `dir` (0 = smallest).
    fn edge<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>, dir: usize) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.height = 0;
        let mut x = tree.root;
        while let Some(id) = x {
            match tree.node(id).link[dir] {
                Some(next) => {
                    self.push(id);
                    x = Some(next);
                }
                None => break,
            }
        }
        self.settle(tree, x)
    }

    /// Moves to the nearest item beyond the remembered key on side `dir`
    /// (1 = greater), or to the edge opposite `dir` with no key.
    fn seek_beyond<'t, T, C, A>(&mut self, tree: &'t AvlTree<T, C, A>, dir: usize) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        let Some(key) = self.key.as_ref() else {
            return self.edge(tree, 1 - dir);
        };
        let beyond = if dir == 1 {
            Ordering::Less
        } else {
            Ordering::Greater
        };

        let mut height = 0;
        let mut best = None;
        let mut p = tree.root;
        while let Some(id) = p {
            let node = tree.node(id);
            let side = if tree.compare.compare(key, &node.item) == beyond {
                best = Some((id, height));
                1 - dir
            } else {
                dir
            };
            self.stack[height] = id;
            height += 1;
            p = node.link[side];
        }

        match best {
            Some((id, depth)) => {
                self.height = depth;
                self.settle(tree, Some(id))
            }
            None => {
                self.height = 0;
                self.settle(tree, None)
            }
        }
    }

    /// Rebuilds the ancestor stack for the remembered key. If the key is gone
    /// the cursor keeps it, detached, so the next step can seek past it.
    fn refresh<T, C, A>(&mut self, tree: &AvlTree<T, C, A>)
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.generation = tree.generation;
        self.height = 0;
        let Some(key) = self.key.as_ref() else {
            self.node = None;
            return;
        };
        self.node = Self::descend(tree, key, &mut self.stack, &mut self.height);
        if self.node.is_none() {
            self.height = 0;
        }
    }

    /// Searches for `key`, recording the path above the match in `stack`.
    fn descend<T, C, A>(
        tree: &AvlTree<T, C, A>,
        key: &K,
        stack: &mut [NodeId; MAX_HEIGHT],
        height: &mut usize,
    ) -> Option<NodeId>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        *height = 0;
        let mut p = tree.root;
        while let Some(id) = p {
            let node = tree.node(id);
            let dir = match tree.compare.compare(key, &node.item) {
                Ordering::Equal => return Some(id),
                Ordering::Less => 0,
                Ordering::Greater => 1,
            };
            stack[*height] = id;
            *height += 1;
            p = node.link[dir];
        }
        None
    }

    /// Records `node` as the current position and returns its item.
    fn settle<'t, T, C, A>(
        &mut self,
        tree: &'t AvlTree<T, C, A>,
        node: Option<NodeId>,
    ) -> Option<&'t T>
    where
        C: Comparator<T, Key = K>,
        A: NodeAllocator<T>,
    {
        self.generation = tree.generation;
        self.node = node;
        match node {
            Some(id) => {
                let item = &tree.node(id).item;
                self.key = Some(tree.compare.key(item));
                Some(item)
            }
            None => {
                self.key = None;
                None
            }
        }
    }

    fn push(&mut self, id: NodeId) {
        debug_assert!(self.height < MAX_HEIGHT, "tree height exceeds MAX_HEIGHT");
        self.stack[self.height] = id;
        self.height += 1;
    }

    fn attach<T, C, A>(&mut self, tree: &AvlTree<T, C, A>) {
        self.tree = Some(tree.id);
        self.generation = tree.generation;
    }

    /// Binds a fresh cursor to `tree` in the null position, or checks that
    /// a bound cursor is used with the same tree.
    fn bind<T, C, A>(&mut self, tree: &AvlTree<T, C, A>) {
        match self.tree {
            Some(id) => assert_eq!(id, tree.id, "cursor used with a different tree"),
            None => self.attach(tree),
        }
    }
}

impl<K: Clone> Default for Cursor<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> Clone for Cursor<K> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            node: self.node,
            key: self.key.clone(),
            stack: self.stack,
            height: self.height,
            generation: self.generation,
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for Cursor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("key", &self.key)
            .field("node", &self.node)
            .field("height", &self.height)
            .field("generation", &self.generation)
            .finish()
    }
}
