//! Per-context texture unit binding state.
//!
//! A [`TextureUnit`] always has something bound on every target: either a
//! client texture or the share group's zero texture for that target.
//! Deleting a texture name that is still bound falls back to the zero
//! texture, via [`TextureUnit::unbind_name`].

use virtgl_core::refcount::Shared;

use crate::object::{ObjectRef, Resource};
use crate::sharegroup::ShareGroup;
use crate::types::{ObjectName, TextureTarget};

/// Texture and sampler bindings of one texture unit.
///
/// Every slot holds its own reference; dropping the unit releases them.
pub struct TextureUnit<R: Resource> {
    zero: [ObjectRef<R>; TextureTarget::COUNT],
    bound: [ObjectRef<R>; TextureTarget::COUNT],
    sampler: Option<ObjectRef<R>>,
}

impl<R: Resource> TextureUnit<R> {
    /// Creates a unit with every target bound to the group's zero texture.
    ///
    /// `create_default` builds a target's zero texture if no context in the
    /// group has needed it yet.
    pub fn new(
        group: &ShareGroup<R>,
        mut create_default: impl FnMut(TextureTarget) -> ObjectRef<R>,
    ) -> Self {
        let zero: [ObjectRef<R>; TextureTarget::COUNT] = std::array::from_fn(|i| {
            let target = TextureTarget::ALL[i];
            group.texture_zero(target, || create_default(target))
        });
        let bound = zero.clone();
        Self {
            zero,
            bound,
            sampler: None,
        }
    }

    /// Binds `texture` to `target`, or the zero texture for `None`.
    pub fn bind(&mut self, target: TextureTarget, texture: Option<&ObjectRef<R>>) {
        let i = target.index();
        let next = match texture {
            Some(texture) => texture.clone(),
            None => self.zero[i].clone(),
        };
        log::trace!(
            "TextureUnit: bound texture {} to {target:?}",
            next.local_name()
        );
        self.bound[i] = next;
    }

    /// The texture bound to `target`.
    pub fn bound(&self, target: TextureTarget) -> &ObjectRef<R> {
        &self.bound[target.index()]
    }

    /// The zero texture for `target`.
    pub fn zero(&self, target: TextureTarget) -> &ObjectRef<R> {
        &self.zero[target.index()]
    }

    pub fn is_default_bound(&self, target: TextureTarget) -> bool {
        let i = target.index();
        Shared::ptr_eq(&self.bound[i], &self.zero[i])
    }

    /// Rebinds the zero texture on every target where a texture named
    /// `name` is bound. Returns the number of targets affected.
    pub fn unbind_name(&mut self, name: ObjectName) -> usize {
        if name.is_none() {
            return 0;
        }
        let mut unbound = 0;
        for i in 0..TextureTarget::COUNT {
            if !Shared::ptr_eq(&self.bound[i], &self.zero[i])
                && self.bound[i].local_name() == name
            {
                self.bound[i] = self.zero[i].clone();
                unbound += 1;
            }
        }
        unbound
    }

    /// Binds `sampler`, or clears the sampler binding for `None`.
    pub fn bind_sampler(&mut self, sampler: Option<&ObjectRef<R>>) {
        self.sampler = sampler.cloned();
    }

    pub fn sampler(&self) -> Option<&ObjectRef<R>> {
        self.sampler.as_ref()
    }

    /// Clears the sampler binding if it is the sampler named `name`.
    pub fn unbind_sampler_name(&mut self, name: ObjectName) -> bool {
        let matches = !name.is_none()
            && self
                .sampler
                .as_ref()
                .is_some_and(|sampler| sampler.local_name() == name);
        if matches {
            self.sampler = None;
        }
        matches
    }
}

impl<R: Resource> std::fmt::Debug for TextureUnit<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound: Vec<ObjectName> = self.bound.iter().map(|t| t.local_name()).collect();
        f.debug_struct("TextureUnit")
            .field("bound", &bound)
            .field("sampler", &self.sampler.as_ref().map(|s| s.local_name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::types::NamespaceKind;

    fn unit(group: &ShareGroup<()>) -> TextureUnit<()> {
        TextureUnit::new(group, |_| Object::new(()))
    }

    #[test]
    fn test_new_unit_binds_zero_everywhere() {
        let group = ShareGroup::<()>::create();
        let unit = unit(&group);
        for target in TextureTarget::ALL {
            assert!(unit.is_default_bound(target));
            assert!(unit.bound(target).is_anonymous());
        }
        assert!(unit.sampler().is_none());
    }

    #[test]
    fn test_units_share_zero_textures() {
        let group = ShareGroup::<()>::create();
        let a = unit(&group);
        let b = TextureUnit::new(&group, |_| panic!("zero texture recreated"));
        for target in TextureTarget::ALL {
            assert!(Shared::ptr_eq(a.zero(target), b.zero(target)));
        }
    }

    #[test]
    fn test_bind_and_fall_back_to_zero() {
        let group = ShareGroup::<()>::create();
        let mut unit = unit(&group);
        let texture = Object::new(());
        let name = group.add(NamespaceKind::Texture, &texture).unwrap();

        unit.bind(TextureTarget::Texture2D, Some(&texture));
        unit.bind(TextureTarget::Texture3D, Some(&texture));
        assert!(!unit.is_default_bound(TextureTarget::Texture2D));
        assert_eq!(texture.ref_count(), 4);

        group.remove(NamespaceKind::Texture, name);
        assert_eq!(unit.unbind_name(name), 2);
        assert!(unit.is_default_bound(TextureTarget::Texture2D));
        assert!(unit.is_default_bound(TextureTarget::Texture3D));
        assert_eq!(texture.ref_count(), 1);

        unit.bind(TextureTarget::CubeMap, Some(&texture));
        unit.bind(TextureTarget::CubeMap, None);
        assert!(unit.is_default_bound(TextureTarget::CubeMap));
    }

    #[test]
    fn test_unbind_zero_name_is_noop() {
        let group = ShareGroup::<()>::create();
        let mut unit = unit(&group);
        assert_eq!(unit.unbind_name(ObjectName::NONE), 0);
    }

    #[test]
    fn test_sampler_binding() {
        let group = ShareGroup::<()>::create();
        let mut unit = unit(&group);
        let sampler = Object::new(());
        let name = group.add(NamespaceKind::Sampler, &sampler).unwrap();

        unit.bind_sampler(Some(&sampler));
        assert!(unit.sampler().is_some());
        assert!(!unit.unbind_sampler_name(ObjectName(name.0 + 1)));
        assert!(unit.unbind_sampler_name(name));
        assert!(unit.sampler().is_none());
    }
}
