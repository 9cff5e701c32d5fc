//! Share groups: the naming scope shared by a set of contexts.
//!
//! A [`ShareGroup`] holds one [`Namespace`] per [`NamespaceKind`] and the
//! per-target default ("zero") textures. Contexts created with a share
//! context [`join`](ShareGroup::join) its group; everything else gets a
//! fresh one. The group is destroyed with its last [`ShareGroupRef`], which
//! releases every registered object and every zero texture.
//!
//! Each namespace sits behind its own lock, so contexts may register and
//! look up objects concurrently.
//!
//! # Example
//!
//! ```
//! use virtgl_graphics::{NamespaceKind, Object, ObjectName, ShareGroup};
//!
//! let group = ShareGroup::<()>::create();
//! let shared = ShareGroup::join(Some(&group));
//!
//! let texture = Object::new(());
//! let name = group.add(NamespaceKind::Texture, &texture).unwrap();
//!
//! // Visible through every member of the group.
//! assert!(shared.acquire_object(NamespaceKind::Texture, name).is_some());
//! assert!(shared.acquire_object(NamespaceKind::Buffer, name).is_none());
//! ```

use parking_lot::{Mutex, MutexGuard};
use virtgl_core::refcount::{Destroy, Shared};

use crate::error::NamespaceError;
use crate::namespace::{Namespace, NamespaceDescriptor};
use crate::object::{ObjectRef, Resource};
use crate::types::{NamespaceKind, ObjectName, TextureTarget};

/// Descriptor for creating a share group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareGroupDescriptor {
    /// Debug label. Namespace labels are derived from it.
    pub label: Option<String>,
    /// Maximum number of resident objects per namespace.
    pub name_limit: u32,
}

impl ShareGroupDescriptor {
    /// Create a descriptor with unlimited namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Cap the number of resident objects in each namespace.
    pub fn with_name_limit(mut self, name_limit: u32) -> Self {
        self.name_limit = name_limit;
        self
    }

    fn namespace_descriptor(&self, kind: NamespaceKind) -> NamespaceDescriptor {
        let label = match &self.label {
            Some(group) => format!("{group}/{kind}"),
            None => kind.label().to_string(),
        };
        NamespaceDescriptor::new()
            .with_label(label)
            .with_name_limit(self.name_limit)
    }
}

impl Default for ShareGroupDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            name_limit: NamespaceDescriptor::default().name_limit,
        }
    }
}

/// A counted handle to a [`ShareGroup`].
pub type ShareGroupRef<R> = Shared<ShareGroup<R>>;

/// The namespaces and default textures shared by a set of contexts.
pub struct ShareGroup<R: Resource> {
    label: Option<String>,
    namespaces: [Mutex<Namespace<R>>; NamespaceKind::COUNT],
    texture_zero: Mutex<[Option<ObjectRef<R>>; TextureTarget::COUNT]>,
}

impl<R: Resource> ShareGroup<R> {
    /// Create a group with unlimited namespaces and no zero textures.
    pub fn create() -> ShareGroupRef<R> {
        Self::create_with(&ShareGroupDescriptor::default())
    }

    /// Create a group from a descriptor.
    pub fn create_with(descriptor: &ShareGroupDescriptor) -> ShareGroupRef<R> {
        let namespaces = std::array::from_fn(|i| {
            let kind = NamespaceKind::ALL[i];
            Mutex::new(Namespace::new(&descriptor.namespace_descriptor(kind)))
        });

        log::debug!(
            "ShareGroup {}: created",
            descriptor.label.as_deref().unwrap_or("unnamed")
        );

        Shared::new(Self {
            label: descriptor.label.clone(),
            namespaces,
            texture_zero: Mutex::new(Default::default()),
        })
    }

    /// The group a new context should use: the share context's group if
    /// there is one, otherwise a fresh group.
    pub fn join(share: Option<&ShareGroupRef<R>>) -> ShareGroupRef<R> {
        match share {
            Some(group) => {
                log::debug!("ShareGroup {}: joined", group.label());
                group.acquire()
            }
            None => Self::create(),
        }
    }

    /// Get the group label, or `"unnamed"`.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }

    /// Registers `object` in the `kind` namespace under a fresh name.
    pub fn add(
        &self,
        kind: NamespaceKind,
        object: &ObjectRef<R>,
    ) -> Result<ObjectName, NamespaceError> {
        self.namespace(kind).add(object)
    }

    /// Registers `object` under `name`; first writer wins.
    /// See [`Namespace::add_named`].
    pub fn add_named(
        &self,
        kind: NamespaceKind,
        name: ObjectName,
        object: ObjectRef<R>,
    ) -> Result<ObjectRef<R>, NamespaceError> {
        // Losing and refused objects are released after the guard is dropped.
        let outcome = self.namespace(kind).insert_named(name, object);
        match outcome {
            Ok((resident, _rejected)) => Ok(resident),
            Err((err, _object)) => Err(err),
        }
    }

    /// Unregisters `name` from the `kind` namespace. Returns whether
    /// anything was removed.
    pub fn remove(&self, kind: NamespaceKind, name: ObjectName) -> bool {
        // The taken reference is released after the guard is dropped.
        let removed = self.namespace(kind).take(name);
        removed.is_some()
    }

    /// Looks up `name` in the `kind` namespace.
    pub fn acquire_object(&self, kind: NamespaceKind, name: ObjectName) -> Option<ObjectRef<R>> {
        self.namespace(kind).acquire(name)
    }

    pub fn contains(&self, kind: NamespaceKind, name: ObjectName) -> bool {
        self.namespace(kind).contains(name)
    }

    /// Number of objects registered in the `kind` namespace.
    pub fn len(&self, kind: NamespaceKind) -> usize {
        self.namespace(kind).len()
    }

    /// Locks the `kind` namespace for direct access.
    ///
    /// Objects released while the guard is held must not re-enter the same
    /// namespace from their destroy hook.
    pub fn namespace(&self, kind: NamespaceKind) -> MutexGuard<'_, Namespace<R>> {
        self.namespaces[kind.index()].lock()
    }

    /// Locks the `kind` namespace unless another context holds it.
    pub fn try_namespace(&self, kind: NamespaceKind) -> Option<MutexGuard<'_, Namespace<R>>> {
        self.namespaces[kind.index()].try_lock()
    }

    /// The default texture for `target`, created by `create` on first use.
    ///
    /// Every later call, from any member context, gets the same object.
    pub fn texture_zero(
        &self,
        target: TextureTarget,
        create: impl FnOnce() -> ObjectRef<R>,
    ) -> ObjectRef<R> {
        let mut zero = self.texture_zero.lock();
        let slot = &mut zero[target.index()];
        if let Some(texture) = slot {
            return texture.clone();
        }

        let texture = create();
        log::debug!(
            "ShareGroup {}: created zero texture for {target:?}",
            self.label()
        );
        *slot = Some(texture.clone());
        texture
    }

    /// Whether the default texture for `target` has been created.
    pub fn has_texture_zero(&self, target: TextureTarget) -> bool {
        self.texture_zero.lock()[target.index()].is_some()
    }
}

impl<R: Resource> Destroy for ShareGroup<R> {
    fn destroy(&self) {
        log::debug!("ShareGroup {}: destroying", self.label());

        for namespace in &self.namespaces {
            namespace.lock().cleanup();
        }

        let zero = std::mem::take(&mut *self.texture_zero.lock());
        drop(zero);
    }
}

impl<R: Resource> std::fmt::Debug for ShareGroup<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ShareGroup");
        s.field("label", &self.label());
        for kind in NamespaceKind::ALL {
            s.field(kind.label(), &self.len(kind));
        }
        s.finish()
    }
}

// Ensure ShareGroup is Send + Sync
static_assertions::assert_impl_all!(ShareGroup<()>: Send, Sync);
static_assertions::assert_impl_all!(ShareGroupRef<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_namespaces_are_independent() {
        let group = ShareGroup::<()>::create();
        let buffer = Object::new(());
        let texture = Object::new(());

        assert_eq!(group.add(NamespaceKind::Buffer, &buffer).unwrap(), ObjectName(1));
        assert_eq!(group.add(NamespaceKind::Texture, &texture).unwrap(), ObjectName(1));

        let found = group.acquire_object(NamespaceKind::Texture, ObjectName(1)).unwrap();
        assert!(Shared::ptr_eq(&found, &texture));
        assert!(group.remove(NamespaceKind::Buffer, ObjectName(1)));
        assert!(group.contains(NamespaceKind::Texture, ObjectName(1)));
        assert_eq!(group.len(NamespaceKind::Buffer), 0);
    }

    #[test]
    fn test_namespace_labels_follow_group() {
        let group =
            ShareGroup::<()>::create_with(&ShareGroupDescriptor::new().with_label("ctx0"));
        assert_eq!(group.namespace(NamespaceKind::Sampler).label(), "ctx0/sampler");
        assert_eq!(group.label(), "ctx0");
    }

    #[test]
    fn test_join_without_share_creates_group() {
        let a = ShareGroup::<()>::join(None);
        let b = ShareGroup::<()>::join(None);
        assert!(!Shared::ptr_eq(&a, &b));

        let c = ShareGroup::join(Some(&a));
        assert!(Shared::ptr_eq(&a, &c));
        assert_eq!(a.ref_count(), 2);
    }

    #[test]
    fn test_texture_zero_created_once() {
        let group = ShareGroup::<()>::create();
        assert!(!group.has_texture_zero(TextureTarget::CubeMap));

        let first = group.texture_zero(TextureTarget::CubeMap, || Object::new(()));
        let second = group.texture_zero(TextureTarget::CubeMap, || {
            panic!("zero texture created twice")
        });
        assert!(Shared::ptr_eq(&first, &second));
        assert!(group.has_texture_zero(TextureTarget::CubeMap));
        assert!(!group.has_texture_zero(TextureTarget::Texture3D));
    }

    #[test]
    fn test_try_namespace_sees_held_lock() {
        let group = ShareGroup::<()>::create();
        let held = group.namespace(NamespaceKind::Sync);
        assert!(group.try_namespace(NamespaceKind::Sync).is_none());
        assert!(group.try_namespace(NamespaceKind::Buffer).is_some());
        drop(held);
        assert!(group.try_namespace(NamespaceKind::Sync).is_some());
    }

    #[test]
    fn test_group_debug() {
        let group = ShareGroup::<()>::create();
        group.add(NamespaceKind::Sync, &Object::new(())).unwrap();
        let debug = format!("{:?}", *group);
        assert!(debug.contains("ShareGroup"));
        assert!(debug.contains("sync: 1"));
    }
}
