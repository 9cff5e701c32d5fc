//! Name-to-object registry for one resource category.
//!
//! A [`Namespace`] owns one reference to every object registered in it and
//! hands out fresh names. Names are unique among resident objects; a name
//! freed by [`Namespace::remove`] is handed out again by the next
//! [`Namespace::add`] that reaches it, lowest free name first.
//!
//! Mutation takes `&mut self`. A namespace shared between contexts lives
//! behind the per-category lock of its [`ShareGroup`](crate::ShareGroup).
//!
//! # Example
//!
//! ```
//! use virtgl_graphics::{Namespace, NamespaceDescriptor, Object, ObjectName};
//!
//! let mut buffers = Namespace::new(&NamespaceDescriptor::new().with_label("buffers"));
//!
//! let vbo = Object::new(());
//! assert_eq!(buffers.add(&vbo).unwrap(), ObjectName(1));
//!
//! let found = buffers.acquire(ObjectName(1)).unwrap();
//! assert!(virtgl_core::Shared::ptr_eq(&found, &vbo));
//!
//! assert!(buffers.remove(ObjectName(1)));
//! assert!(buffers.acquire(ObjectName(1)).is_none());
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;

use virtgl_core::Shared;
use virtgl_core::index::{AvlTree, Comparator, Cursor, Probe, SlabAllocator};

use crate::error::NamespaceError;
use crate::object::{ObjectRef, Resource};
use crate::types::ObjectName;

/// Descriptor for creating a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDescriptor {
    /// Debug label, used in log output.
    pub label: Option<String>,
    /// Maximum number of resident objects.
    pub name_limit: u32,
}

impl NamespaceDescriptor {
    /// Create a descriptor for a namespace using the whole name range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Cap the number of resident objects.
    pub fn with_name_limit(mut self, name_limit: u32) -> Self {
        self.name_limit = name_limit;
        self
    }
}

impl Default for NamespaceDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            // Every u32 except the reserved 0.
            name_limit: u32::MAX,
        }
    }
}

/// Orders registered objects by local name.
#[derive(Debug, Clone, Copy, Default)]
struct LocalNameOrder;

impl<R: Resource> Comparator<ObjectRef<R>> for LocalNameOrder {
    type Key = ObjectName;

    fn key(&self, item: &ObjectRef<R>) -> ObjectName {
        item.local_name()
    }

    fn compare(&self, key: &ObjectName, item: &ObjectRef<R>) -> Ordering {
        key.cmp(&item.local_name())
    }
}

/// An `add_named` failure, handing back the object that was offered.
pub(crate) type Refused<R> = (NamespaceError, ObjectRef<R>);

/// A registry mapping local names to objects of one category.
pub struct Namespace<R: Resource> {
    label: String,
    index: AvlTree<ObjectRef<R>, LocalNameOrder>,
    /// Every name below `next_name` is either resident or in `free`.
    next_name: u64,
    free: BTreeSet<u32>,
    name_limit: u32,
}

impl<R: Resource> Namespace<R> {
    /// Create an empty namespace. The first generated name is 1.
    pub fn new(descriptor: &NamespaceDescriptor) -> Self {
        let allocator = SlabAllocator::with_limit(descriptor.name_limit as usize);
        Self {
            label: descriptor
                .label
                .clone()
                .unwrap_or_else(|| "unnamed".to_string()),
            index: AvlTree::with_allocator(LocalNameOrder, allocator),
            next_name: 1,
            free: BTreeSet::new(),
            name_limit: descriptor.name_limit,
        }
    }

    /// Registers `object` under a freshly generated name and returns it.
    ///
    /// The namespace takes its own reference; the caller keeps theirs.
    /// The generated name is the lowest one not in use, so an empty
    /// namespace hands out 1, 2, 3, and a removed name is reused before
    /// any higher one.
    ///
    /// `object` must not already be resident in this namespace.
    pub fn add(&mut self, object: &ObjectRef<R>) -> Result<ObjectName, NamespaceError> {
        let exhausted = NamespaceError::Exhausted {
            limit: self.name_limit,
        };
        if self.index.len() >= self.name_limit as usize {
            log::warn!(
                "Namespace {}: all {} names in use",
                self.label,
                self.name_limit
            );
            return Err(exhausted);
        }

        let name = self.free_name().ok_or(exhausted)?;
        let previous = object.local_name();
        object.set_local_name(name);
        match self.index.insert(object.clone()) {
            Ok(collided) => {
                debug_assert!(collided.is_none(), "free name {name} was already taken");
            }
            Err(err) => {
                object.set_local_name(previous);
                return Err(err.into());
            }
        }

        if !self.free.remove(&name.0) {
            self.next_name = u64::from(name.0) + 1;
        }
        log::trace!("Namespace {}: added object {name}", self.label);
        Ok(name)
    }

    /// Lowest unused name: the smallest freed one, or else the first name
    /// at or above `next_name` that `add_named` has not already taken.
    fn free_name(&self) -> Option<ObjectName> {
        if let Some(&name) = self.free.first() {
            return Some(ObjectName(name));
        }

        let mut candidate = u32::try_from(self.next_name).ok()?;
        let mut cursor = Cursor::new();
        let mut resident = cursor.find(&self.index, &ObjectName(candidate));
        while resident.is_some() {
            candidate = candidate.checked_add(1)?;
            resident = cursor
                .next(&self.index)
                .filter(|object| object.local_name() == ObjectName(candidate));
        }
        Some(ObjectName(candidate))
    }

    /// Registers `object` under a caller-chosen name.
    ///
    /// First writer wins: if `name` is free, `object` is registered and
    /// handed back. If another object already holds `name`, the offered
    /// object is released (and destroyed, if that was its last reference)
    /// and a new reference to the resident object is returned instead.
    /// On error the offered object is released with its name unchanged.
    ///
    /// `object` must not be resident in this namespace under another name.
    pub fn add_named(
        &mut self,
        name: ObjectName,
        object: ObjectRef<R>,
    ) -> Result<ObjectRef<R>, NamespaceError> {
        match self.insert_named(name, object) {
            Ok((resident, _rejected)) => Ok(resident),
            Err((err, _object)) => Err(err),
        }
    }

    /// [`add_named`](Self::add_named) that hands a losing or refused object
    /// back instead of releasing it, so the caller can release it outside a
    /// lock.
    pub(crate) fn insert_named(
        &mut self,
        name: ObjectName,
        object: ObjectRef<R>,
    ) -> Result<(ObjectRef<R>, Option<ObjectRef<R>>), Refused<R>> {
        if name.is_none() {
            return Err((NamespaceError::ReservedName, object));
        }

        let previous = object.local_name();
        object.set_local_name(name);
        let existing = match self.index.probe(object.clone()) {
            Ok(Probe::Inserted(_)) => {
                self.free.remove(&name.0);
                log::trace!("Namespace {}: added object {name}", self.label);
                return Ok((object, None));
            }
            Ok(Probe::Occupied { existing, .. }) => existing.clone(),
            Err(err) => {
                log::warn!(
                    "Namespace {}: cannot add object {name}: {err}",
                    self.label
                );
                object.set_local_name(previous);
                return Err((err.into(), object));
            }
        };

        log::trace!(
            "Namespace {}: name {name} already bound, dropping the new object",
            self.label
        );
        if !Shared::ptr_eq(&existing, &object) {
            object.set_local_name(ObjectName::NONE);
        }
        Ok((existing, Some(object)))
    }

    /// Unregisters `name`, releasing the namespace's reference.
    ///
    /// Returns whether anything was removed. Removing a free name is a
    /// no-op.
    pub fn remove(&mut self, name: ObjectName) -> bool {
        self.take(name).is_some()
    }

    /// Unregisters `name` and hands the namespace's reference to the
    /// caller instead of releasing it.
    pub fn take(&mut self, name: ObjectName) -> Option<ObjectRef<R>> {
        if name.is_none() {
            return None;
        }
        let object = self.index.delete(&name)?;
        if u64::from(name.0) < self.next_name {
            self.free.insert(name.0);
        }
        log::trace!("Namespace {}: removed object {name}", self.label);
        Some(object)
    }

    /// Looks up `name` and returns a new reference to its object.
    pub fn acquire(&self, name: ObjectName) -> Option<ObjectRef<R>> {
        if name.is_none() {
            return None;
        }
        self.index.find(&name).cloned()
    }

    /// Whether an object is registered under `name`.
    pub fn contains(&self, name: ObjectName) -> bool {
        !name.is_none() && self.index.contains_key(&name)
    }

    /// Number of resident objects.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn name_limit(&self) -> u32 {
        self.name_limit
    }

    /// Resident names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = ObjectName> + '_ {
        self.index.iter().map(|object| object.local_name())
    }

    /// Resident objects in ascending name order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectRef<R>> + '_ {
        self.index.iter()
    }

    /// Releases every resident object. The namespace stays usable and
    /// starts naming from 1 again.
    pub fn cleanup(&mut self) {
        let mut released = 0usize;
        self.index.clear_with(|object| {
            released += 1;
            drop(object);
        });
        self.next_name = 1;
        self.free.clear();
        if released > 0 {
            log::trace!("Namespace {}: released {released} objects", self.label);
        }
    }
}

impl<R: Resource> Default for Namespace<R> {
    fn default() -> Self {
        Self::new(&NamespaceDescriptor::default())
    }
}

impl<R: Resource> std::fmt::Debug for Namespace<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("label", &self.label)
            .field("len", &self.len())
            .field("next_name", &self.next_name)
            .field("free", &self.free.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Namespace<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Debug)]
    struct Counted(Arc<AtomicUsize>);

    impl Resource for Counted {
        fn destroy(&self, _name: ObjectName) {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn namespace() -> Namespace<Counted> {
        Namespace::new(&NamespaceDescriptor::new().with_label("test"))
    }

    fn counted(destroys: &Arc<AtomicUsize>) -> ObjectRef<Counted> {
        Object::new(Counted(Arc::clone(destroys)))
    }

    #[test]
    fn test_fresh_names_count_up() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        let names: Vec<_> = (0..5)
            .map(|_| ns.add(&counted(&destroys)).unwrap())
            .collect();
        assert_eq!(names, (1..=5).map(ObjectName).collect::<Vec<_>>());
        // Each object is now held only by the namespace.
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(ns.len(), 5);
    }

    #[test]
    fn test_add_takes_a_reference() {
        let mut ns = namespace();
        let destroys = Arc::new(AtomicUsize::new(0));
        let object = counted(&destroys);
        ns.add(&object).unwrap();
        assert_eq!(object.ref_count(), 2);
        assert_eq!(object.local_name(), ObjectName(1));
    }

    #[test]
    fn test_lifecycle_scenario() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();

        let a = counted(&destroys);
        let b = counted(&destroys);
        assert_eq!(ns.add(&a).unwrap(), ObjectName(1));
        assert_eq!(ns.add(&b).unwrap(), ObjectName(2));

        assert!(ns.remove(ObjectName(1)));
        assert_eq!(ns.names().collect::<Vec<_>>(), vec![ObjectName(2)]);

        let c = counted(&destroys);
        assert_eq!(ns.add(&c).unwrap(), ObjectName(1));

        let before = b.ref_count();
        let found = ns.acquire(ObjectName(2)).unwrap();
        assert!(Shared::ptr_eq(&found, &b));
        assert_eq!(b.ref_count(), before + 1);

        let d = ns.add_named(ObjectName(5), counted(&destroys)).unwrap();
        assert_eq!(d.local_name(), ObjectName(5));
        assert_eq!(
            ns.names().collect::<Vec<_>>(),
            vec![ObjectName(1), ObjectName(2), ObjectName(5)]
        );

        let destroyed = destroys.load(AtomicOrdering::SeqCst);
        let e = counted(&destroys);
        let winner = ns.add_named(ObjectName(5), e).unwrap();
        assert!(Shared::ptr_eq(&winner, &d));
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), destroyed + 1);
        assert_eq!(ns.len(), 3);
    }

    #[test]
    fn test_add_skips_names_in_use() {
        let mut ns = namespace();
        ns.add_named(ObjectName(2), Object::new(Counted(Default::default())))
            .unwrap();
        ns.add_named(ObjectName(3), Object::new(Counted(Default::default())))
            .unwrap();

        let destroys = Arc::new(AtomicUsize::new(0));
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(1));
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(4));
        // Probing a taken name must not leak or destroy the candidate.
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_removed_name_is_reused_first() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        for _ in 0..6 {
            ns.add(&counted(&destroys)).unwrap();
        }
        ns.remove(ObjectName(4));
        ns.remove(ObjectName(2));

        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(2));
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(4));
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(7));
    }

    #[test]
    fn test_names_freed_above_hint_are_found_by_scan() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        ns.add_named(ObjectName(3), counted(&destroys)).unwrap();
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(1));
        assert!(ns.remove(ObjectName(3)));

        let names: Vec<_> = (0..4)
            .map(|_| ns.add(&counted(&destroys)).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![ObjectName(2), ObjectName(3), ObjectName(4), ObjectName(5)]
        );
    }

    #[test]
    fn test_reuse_churn_with_many_live_names() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        for _ in 0..1000 {
            ns.add(&counted(&destroys)).unwrap();
        }

        let mut top = 1000;
        for _ in 0..50 {
            assert!(ns.remove(ObjectName(1)));
            assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(1));
            top += 1;
            assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(top));
            assert!(ns.remove(ObjectName(top)));
            top -= 1;
        }
        assert_eq!(ns.len(), 1000);
        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(1001));
    }

    #[test]
    fn test_add_named_success_returns_same_object() {
        let mut ns = namespace();
        let destroys = Arc::new(AtomicUsize::new(0));
        let object = counted(&destroys);
        let keep = object.clone();

        let returned = ns.add_named(ObjectName(9), object).unwrap();
        assert!(Shared::ptr_eq(&returned, &keep));
        // keep + returned + namespace
        assert_eq!(keep.ref_count(), 3);
    }

    #[test]
    fn test_add_named_with_resident_object_is_idempotent() {
        let mut ns: Namespace<()> = Namespace::default();
        let object = ns.add_named(ObjectName(3), Object::new(())).unwrap();
        let again = ns.add_named(ObjectName(3), object.clone()).unwrap();
        assert!(Shared::ptr_eq(&again, &object));
        assert_eq!(object.local_name(), ObjectName(3));
        assert!(ns.contains(ObjectName(3)));
    }

    #[test]
    fn test_add_named_rejects_zero() {
        let mut ns = namespace();
        let destroys = Arc::new(AtomicUsize::new(0));
        let err = ns.add_named(ObjectName::NONE, counted(&destroys)).unwrap_err();
        assert_eq!(err, NamespaceError::ReservedName);
        assert!(ns.is_empty());
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_name_zero_never_found() {
        let mut ns = namespace();
        let destroys = Arc::new(AtomicUsize::new(0));
        ns.add(&counted(&destroys)).unwrap();
        assert!(ns.acquire(ObjectName::NONE).is_none());
        assert!(!ns.contains(ObjectName::NONE));
        assert!(!ns.remove(ObjectName::NONE));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut ns = namespace();
        assert!(!ns.remove(ObjectName(42)));
        assert!(ns.acquire(ObjectName(42)).is_none());
    }

    #[test]
    fn test_remove_keeps_object_alive_while_referenced() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        let object = counted(&destroys);
        let name = ns.add(&object).unwrap();

        assert!(ns.remove(name));
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 0);
        // Removal leaves the name on the object for bound users.
        assert_eq!(object.local_name(), name);

        drop(object);
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_take_transfers_reference() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        let name = ns.add(&counted(&destroys)).unwrap();

        let taken = ns.take(name).unwrap();
        assert_eq!(taken.ref_count(), 1);
        assert!(!ns.contains(name));
        drop(taken);
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_remove_everything_empties_namespace() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        let names: Vec<_> = (0..64)
            .map(|_| ns.add(&counted(&destroys)).unwrap())
            .collect();
        for name in names.iter().rev().step_by(2) {
            assert!(ns.remove(*name));
        }
        for name in names.iter().rev().skip(1).step_by(2) {
            assert!(ns.remove(*name));
        }
        assert!(ns.is_empty());
        assert_eq!(ns.names().count(), 0);
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 64);
    }

    #[test]
    fn test_cleanup_releases_all() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns = namespace();
        for _ in 0..10 {
            ns.add(&counted(&destroys)).unwrap();
        }
        let survivor = ns.acquire(ObjectName(3)).unwrap();

        ns.cleanup();
        assert!(ns.is_empty());
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 9);
        drop(survivor);
        assert_eq!(destroys.load(AtomicOrdering::SeqCst), 10);

        assert_eq!(ns.add(&counted(&destroys)).unwrap(), ObjectName(1));
    }

    #[test]
    fn test_name_limit() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut ns: Namespace<Counted> =
            Namespace::new(&NamespaceDescriptor::new().with_name_limit(2));

        ns.add(&counted(&destroys)).unwrap();
        ns.add(&counted(&destroys)).unwrap();
        assert_eq!(
            ns.add(&counted(&destroys)).unwrap_err(),
            NamespaceError::Exhausted { limit: 2 }
        );
        let offered = counted(&destroys);
        assert_eq!(
            ns.add_named(ObjectName(10), offered.clone()).unwrap_err(),
            NamespaceError::Exhausted { limit: 2 }
        );
        // The refused object never held the name.
        assert!(offered.is_anonymous());
        assert_eq!(offered.ref_count(), 1);
        assert!(!ns.contains(ObjectName(10)));

        // Collisions still resolve when full.
        let existing = ns.add_named(ObjectName(1), counted(&destroys)).unwrap();
        assert_eq!(existing.local_name(), ObjectName(1));
    }

    #[test]
    fn test_objects_in_name_order() {
        let mut ns: Namespace<()> = Namespace::default();
        for name in [7, 3, 5] {
            ns.add_named(ObjectName(name), Object::new(())).unwrap();
        }
        let names: Vec<u32> = ns.objects().map(|o| o.local_name().0).collect();
        assert_eq!(names, vec![3, 5, 7]);
        assert_eq!(ns.label(), "unnamed");
    }
}
