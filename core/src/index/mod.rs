//! Ordered index: a comparator-driven AVL tree.
//!
//! [`AvlTree`] keeps items sorted by a [`Comparator`] and stays height
//! balanced under insertion and deletion, so lookups are `O(log n)`. Nodes
//! live in an injected [`NodeAllocator`] and link to each other by
//! [`NodeId`], which keeps the whole structure in safe code.
//!
//! A [`Cursor`] walks the tree in either direction and can be held across
//! mutations: every structural change bumps the tree's generation, and a
//! cursor that sees a newer generation re-seeks by the key it was on.
//!
//! # Example
//!
//! ```
//! use virtgl_core::index::{AvlTree, Cursor, Natural};
//!
//! let mut tree = AvlTree::new(Natural);
//! for value in [5u32, 1, 9, 3] {
//!     tree.assert_insert(value);
//! }
//!
//! let mut cursor = Cursor::new();
//! assert_eq!(cursor.find(&tree, &3), Some(&3));
//!
//! // Removing the cursor's item does not strand it.
//! tree.delete(&3);
//! assert_eq!(cursor.next(&tree), Some(&5));
//! ```

mod allocator;
mod compare;
mod cursor;


use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub use allocator::{Node, NodeAllocator, NodeId, SlabAllocator};
pub use compare::{ByKey, Comparator, Natural};
pub use cursor::Cursor;

/// Upper bound on tree height. An AVL tree of height 92 would need more
/// nodes than any address space holds, so fixed stacks of this size never
/// overflow.
pub const MAX_HEIGHT: usize = 92;

/// Errors reported by the ordered index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The node allocator refused to store another node.
    #[error("node allocator exhausted at {capacity} nodes")]
    AllocatorExhausted { capacity: usize },
}

/// Outcome of [`AvlTree::probe`].
#[derive(Debug)]
pub enum Probe<'a, T> {
    /// The item was inserted; this is it, now in the tree.
    Inserted(&'a T),
    /// An equal-keyed item was already resident. The tree is unchanged and
    /// the offered item is handed back.
    Occupied { existing: &'a T, rejected: T },
}

impl<'a, T> Probe<'a, T> {
    /// The item now resident under the probed key.
    pub fn resident(&self) -> &'a T {
        match self {
            Self::Inserted(item) => item,
            Self::Occupied { existing, .. } => existing,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TreeId(u64);

impl TreeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A self-balancing binary search tree.
///
/// Equal-keyed items are never both resident. Mutation requires `&mut self`;
/// callers that share a tree across threads wrap it in a lock.
pub struct AvlTree<T, C, A = SlabAllocator<T>> {
    root: Option<NodeId>,
    compare: C,
    alloc: A,
    count: usize,
    generation: u64,
    id: TreeId,
    _items: PhantomData<fn() -> T>,
}

impl<T, C: Comparator<T>> AvlTree<T, C, SlabAllocator<T>> {
    /// Creates an empty tree backed by the default slab allocator.
    pub fn new(compare: C) -> Self {
        Self::with_allocator(compare, SlabAllocator::new())
    }
}

impl<T, C: Comparator<T>, A: NodeAllocator<T>> AvlTree<T, C, A> {
    /// Creates an empty tree storing its nodes in `alloc`.
    pub fn with_allocator(compare: C, alloc: A) -> Self {
        Self {
            root: None,
            compare,
            alloc,
            count: 0,
            generation: 0,
            id: TreeId::next(),
            _items: PhantomData,
        }
    }

    /// Number of items in the tree.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Structural generation. Changes on every insertion and deletion.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn comparator(&self) -> &C {
        &self.compare
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Looks up the item with `key`.
    pub fn find(&self, key: &C::Key) -> Option<&T> {
        self.find_node(key).map(|id| &self.node(id).item)
    }

    pub fn contains_key(&self, key: &C::Key) -> bool {
        self.find_node(key).is_some()
    }

    /// Inserts `item` unless an equal-keyed item is resident, in which case
    /// the tree is left untouched and the existing item is reported.
    pub fn probe(&mut self, item: T) -> Result<Probe<'_, T>, IndexError> {
        let (id, rejected) = self.probe_node(item)?;
        let resident = &self.node(id).item;
        Ok(match rejected {
            None => Probe::Inserted(resident),
            Some(rejected) => Probe::Occupied {
                existing: resident,
                rejected,
            },
        })
    }

    /// Inserts `item`. Returns `None` on success, or the colliding resident
    /// item (the offered one is dropped).
    pub fn insert(&mut self, item: T) -> Result<Option<&T>, IndexError> {
        let (id, rejected) = self.probe_node(item)?;
        Ok(rejected.map(|_| &self.node(id).item))
    }

    /// Inserts `item`, displacing and returning an equal-keyed item if one
    /// was resident.
    pub fn replace(&mut self, item: T) -> Result<Option<T>, IndexError> {
        let (id, rejected) = self.probe_node(item)?;
        Ok(rejected.map(|item| std::mem::replace(&mut self.node_mut(id).item, item)))
    }

    /// Inserts `item`, treating a duplicate key or a full allocator as a
    /// caller bug.
    ///
    /// # Panics
    ///
    /// Panics if an equal-keyed item is resident or allocation fails.
    pub fn assert_insert(&mut self, item: T) {
        match self.probe_node(item) {
            Ok((_, None)) => {}
            Ok((_, Some(_))) => panic!("assert_insert: duplicate key"),
            Err(err) => panic!("assert_insert: {err}"),
        }
    }

    /// Removes and returns the item with `key`.
    pub fn delete(&mut self, key: &C::Key) -> Option<T> {
        let mut pa: [Option<NodeId>; MAX_HEIGHT] = [None; MAX_HEIGHT];
        let mut da = [0usize; MAX_HEIGHT];

        // pa[0] is the slot above the root.
        let mut k = 1;
        let mut p = self.root?;
        loop {
            let node = self.node(p);
            let dir = match self.compare.compare(key, &node.item) {
                Ordering::Equal => break,
                Ordering::Less => 0,
                Ordering::Greater => 1,
            };
            pa[k] = Some(p);
            da[k] = dir;
            k += 1;
            p = node.link[dir]?;
        }

        let [p_left, p_right] = self.node(p).link;
        let p_balance = self.node(p).balance;
        match p_right {
            None => self.set_link(pa[k - 1], da[k - 1], p_left),
            Some(r) if self.node(r).link[0].is_none() => {
                let r_node = self.node_mut(r);
                r_node.link[0] = p_left;
                r_node.balance = p_balance;
                self.set_link(pa[k - 1], da[k - 1], Some(r));
                pa[k] = Some(r);
                da[k] = 1;
                k += 1;
            }
            Some(mut r) => {
                // Replace p with its in-order successor s, the leftmost node
                // of the right subtree.
                let j = k;
                k += 1;
                let s = loop {
                    pa[k] = Some(r);
                    da[k] = 0;
                    k += 1;
                    let s = self.child(r, 0);
                    if self.node(s).link[0].is_none() {
                        break s;
                    }
                    r = s;
                };

                let s_right = self.node(s).link[1];
                self.node_mut(r).link[0] = s_right;
                let s_node = self.node_mut(s);
                s_node.link = [p_left, p_right];
                s_node.balance = p_balance;
                self.set_link(pa[j - 1], da[j - 1], Some(s));
                pa[j] = Some(s);
                da[j] = 1;
            }
        }

        let removed = self.alloc.free(p).item;

        loop {
            k -= 1;
            if k == 0 {
                break;
            }
            let Some(y) = pa[k] else { break };

            // The subtree on side da[k] lost one level; lean toward the other.
            let heavy = 1 - da[k];
            let sign = side_sign(heavy);
            let balance = {
                let y_node = self.node_mut(y);
                y_node.balance += sign;
                y_node.balance
            };

            if balance == sign {
                break;
            }
            if balance == 0 {
                continue;
            }

            let x = self.child(y, heavy);
            if self.node(x).balance == -sign {
                let w = self.rotate_double(y, x, heavy);
                self.set_link(pa[k - 1], da[k - 1], Some(w));
            } else {
                self.rotate_single(y, x, heavy);
                self.set_link(pa[k - 1], da[k - 1], Some(x));
                if self.node(x).balance == 0 {
                    self.node_mut(x).balance = -sign;
                    self.node_mut(y).balance = sign;
                    break;
                }
                self.node_mut(x).balance = 0;
                self.node_mut(y).balance = 0;
            }
        }

        self.count -= 1;
        self.generation = self.generation.wrapping_add(1);
        Some(removed)
    }

    /// Removes and returns the item with `key`.
    ///
    /// # Panics
    ///
    /// Panics if no such item is resident.
    pub fn assert_delete(&mut self, key: &C::Key) -> T {
        match self.delete(key) {
            Some(item) => item,
            None => panic!("assert_delete: key not present"),
        }
    }

    /// Iterates items in ascending order.
    pub fn iter(&self) -> Iter<'_, T, C, A> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
            remaining: self.count,
        };
        iter.push_left(self.root);
        iter
    }

    /// Removes every item, passing each to `destroy` in ascending order.
    pub fn clear_with(&mut self, mut destroy: impl FnMut(T)) {
        let ids: Vec<NodeId> = self.in_order_ids();
        self.root = None;
        self.count = 0;
        self.generation = self.generation.wrapping_add(1);
        for id in ids {
            destroy(self.alloc.free(id).item);
        }
    }

    /// Consumes the tree, passing each item to `destroy` in ascending order.
    pub fn destroy(mut self, destroy: impl FnMut(T)) {
        self.clear_with(destroy);
    }

    /// Copies the tree into `alloc`, preserving its shape, with `copy`
    /// producing each new item. On failure the partial copy is dropped.
    pub fn try_copy_with<B, E, F>(&self, alloc: B, mut copy: F) -> Result<AvlTree<T, C, B>, E>
    where
        C: Clone,
        B: NodeAllocator<T>,
        E: From<IndexError>,
        F: FnMut(&T) -> Result<T, E>,
    {
        let mut tree = AvlTree::with_allocator(self.compare.clone(), alloc);
        tree.root = self.copy_subtree(self.root, &mut tree.alloc, &mut copy)?;
        tree.count = self.count;
        Ok(tree)
    }

    /// [`try_copy_with`](Self::try_copy_with) into a fresh default allocator.
    pub fn try_copy<E, F>(&self, copy: F) -> Result<Self, E>
    where
        C: Clone,
        A: Default,
        E: From<IndexError>,
        F: FnMut(&T) -> Result<T, E>,
    {
        self.try_copy_with(A::default(), copy)
    }

    fn copy_subtree<B, E, F>(
        &self,
        src: Option<NodeId>,
        dst: &mut B,
        copy: &mut F,
    ) -> Result<Option<NodeId>, E>
    where
        B: NodeAllocator<T>,
        E: From<IndexError>,
        F: FnMut(&T) -> Result<T, E>,
    {
        let Some(id) = src else {
            return Ok(None);
        };
        let node = self.node(id);
        let item = copy(&node.item)?;
        let new_id = dst.allocate(Node {
            link: [None, None],
            item,
            balance: node.balance,
        })?;
        let left = self.copy_subtree(node.link[0], dst, copy)?;
        let right = self.copy_subtree(node.link[1], dst, copy)?;
        dst.get_mut(new_id).link = [left, right];
        Ok(Some(new_id))
    }

    /// Finds or inserts. Returns the resident node and, on a duplicate, the
    /// rejected item.
    fn probe_node(&mut self, item: T) -> Result<(NodeId, Option<T>), IndexError> {
        let key = self.compare.key(&item);

        let mut da = [0usize; MAX_HEIGHT];
        let mut k = 0;

        // y is the deepest node on the path with a nonzero balance (the only
        // place a rotation can be needed) and z is its parent.
        let mut z: Option<NodeId> = None;
        let mut y = self.root;
        let mut q: Option<NodeId> = None;
        let mut p = self.root;
        let mut dir = 0;

        while let Some(id) = p {
            let node = self.node(id);
            let cmp = self.compare.compare(&key, &node.item);
            if cmp == Ordering::Equal {
                return Ok((id, Some(item)));
            }
            if node.balance != 0 {
                z = q;
                y = p;
                k = 0;
            }
            dir = usize::from(cmp == Ordering::Greater);
            da[k] = dir;
            k += 1;
            q = p;
            p = node.link[dir];
        }

        let n = self.alloc.allocate(Node::leaf(item))?;
        self.set_link(q, dir, Some(n));
        self.count += 1;
        self.generation = self.generation.wrapping_add(1);

        let Some(y) = y else {
            return Ok((n, None));
        };

        let mut p = y;
        let mut k = 0;
        while p != n {
            let d = da[k];
            let node = self.node_mut(p);
            node.balance += side_sign(d);
            p = self.child(p, d);
            k += 1;
        }

        let balance = self.node(y).balance;
        if balance.abs() != 2 {
            return Ok((n, None));
        }

        let heavy = usize::from(balance > 0);
        let z_dir = match z {
            Some(z) if self.node(z).link[0] != Some(y) => 1,
            _ => 0,
        };
        let x = self.child(y, heavy);
        let w = if self.node(x).balance == side_sign(heavy) {
            self.rotate_single(y, x, heavy);
            self.node_mut(x).balance = 0;
            self.node_mut(y).balance = 0;
            x
        } else {
            self.rotate_double(y, x, heavy)
        };
        self.set_link(z, z_dir, Some(w));

        Ok((n, None))
    }

    /// Rotates `x` (the `heavy` child of `y`) above `y`. Balances are left
    /// to the caller.
    fn rotate_single(&mut self, y: NodeId, x: NodeId, heavy: usize) {
        let inner = self.node(x).link[1 - heavy];
        self.node_mut(y).link[heavy] = inner;
        self.node_mut(x).link[1 - heavy] = Some(y);
    }

    /// Rotates the inner grandchild `w` of `y` above both `x` and `y`, fixes
    /// all three balances, and returns `w`.
    fn rotate_double(&mut self, y: NodeId, x: NodeId, heavy: usize) -> NodeId {
        let light = 1 - heavy;
        let w = self.child(x, light);
        let [w_light, w_heavy] = {
            let link = self.node(w).link;
            [link[light], link[heavy]]
        };

        self.node_mut(x).link[light] = w_heavy;
        self.node_mut(y).link[heavy] = w_light;
        let w_node = self.node_mut(w);
        w_node.link[heavy] = Some(x);
        w_node.link[light] = Some(y);

        let sign = side_sign(heavy);
        let (x_balance, y_balance) = match self.node(w).balance {
            b if b == sign => (0, -sign),
            0 => (0, 0),
            _ => (sign, 0),
        };
        self.node_mut(x).balance = x_balance;
        self.node_mut(y).balance = y_balance;
        self.node_mut(w).balance = 0;
        w
    }

    fn find_node(&self, key: &C::Key) -> Option<NodeId> {
        let mut p = self.root;
        while let Some(id) = p {
            let node = self.node(id);
            match self.compare.compare(key, &node.item) {
                Ordering::Less => p = node.link[0],
                Ordering::Greater => p = node.link[1],
                Ordering::Equal => return Some(id),
            }
        }
        None
    }

    fn in_order_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.count);
        let mut stack = Vec::new();
        let mut p = self.root;
        loop {
            while let Some(id) = p {
                stack.push(id);
                p = self.node(id).link[0];
            }
            let Some(id) = stack.pop() else { break };
            ids.push(id);
            p = self.node(id).link[1];
        }
        ids
    }

    /// Points `parent`'s `dir` link (or the root, for `None`) at `child`.
    fn set_link(&mut self, parent: Option<NodeId>, dir: usize, child: Option<NodeId>) {
        match parent {
            None => self.root = child,
            Some(parent) => self.node_mut(parent).link[dir] = child,
        }
    }

    fn child(&self, id: NodeId, dir: usize) -> NodeId {
        self.node(id).link[dir]
            .unwrap_or_else(|| panic!("AVL invariant broken: {id:?} has no child on side {dir}"))
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        self.alloc.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.alloc.get_mut(id)
    }
}

/// Balance contribution of growing the subtree on side `dir`.
fn side_sign(dir: usize) -> i8 {
    if dir == 0 { -1 } else { 1 }
}

impl<T: Clone, C: Clone, A: Clone> Clone for AvlTree<T, C, A> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            compare: self.compare.clone(),
            alloc: self.alloc.clone(),
            count: self.count,
            generation: 0,
            id: TreeId::next(),
            _items: PhantomData,
        }
    }
}

impl<T: fmt::Debug, C: Comparator<T>, A: NodeAllocator<T>> fmt::Debug for AvlTree<T, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// In-order iterator over an [`AvlTree`].
pub struct Iter<'a, T, C, A> {
    tree: &'a AvlTree<T, C, A>,
    stack: Vec<NodeId>,
    remaining: usize,
}

impl<T, C: Comparator<T>, A: NodeAllocator<T>> Iter<'_, T, C, A> {
    fn push_left(&mut self, mut p: Option<NodeId>) {
        while let Some(id) = p {
            self.stack.push(id);
            p = self.tree.node(id).link[0];
        }
    }
}

impl<'a, T, C: Comparator<T>, A: NodeAllocator<T>> Iterator for Iter<'a, T, C, A> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let id = self.stack.pop()?;
        let tree = self.tree;
        let node = tree.node(id);
        self.push_left(node.link[1]);
        self.remaining -= 1;
        Some(&node.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, C: Comparator<T>, A: NodeAllocator<T>> ExactSizeIterator for Iter<'_, T, C, A> {}

impl<'a, T, C: Comparator<T>, A: NodeAllocator<T>> IntoIterator for &'a AvlTree<T, C, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
