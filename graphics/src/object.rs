//! Named, reference-counted driver objects.
//!
//! An [`Object`] is the unit stored in a [`Namespace`](crate::Namespace):
//! a client-visible local name plus the resource-specific payload. Objects
//! are always handled through [`ObjectRef`], a counted handle. The
//! payload's [`Resource::destroy`] runs exactly once, when the last
//! handle is dropped.
//!
//! # Example
//!
//! ```
//! use virtgl_graphics::{Object, ObjectName};
//!
//! let buffer = Object::new(());
//! assert!(buffer.is_anonymous());
//!
//! let bound = buffer.clone();
//! assert_eq!(buffer.ref_count(), 2);
//! drop(bound);
//! assert_eq!(buffer.local_name(), ObjectName::NONE);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use virtgl_core::refcount::{Destroy, Shared};

use crate::types::ObjectName;

/// Resource-specific state carried by an [`Object`].
///
/// `destroy` is the category's teardown hook. It must only release what
/// the resource owns outward (bound buffers, host names); holding a
/// reference back to the owning object would keep it alive forever.
pub trait Resource: Send + Sync + 'static {
    /// Called once, with the object's last local name, when the last
    /// reference is released.
    fn destroy(&self, name: ObjectName) {
        let _ = name;
    }
}

/// Payload-free objects, for categories with no guest-side state.
impl Resource for () {}

/// A counted handle to an [`Object`].
pub type ObjectRef<R> = Shared<Object<R>>;

/// A resource with a client-visible name.
///
/// The local name is 0 until the object is registered. It is rewritten by
/// the namespace at registration and left untouched on removal, so an
/// object that is still bound somewhere keeps reporting the name it had.
pub struct Object<R: Resource> {
    local_name: AtomicU32,
    resource: R,
}

impl<R: Resource> Object<R> {
    /// Wraps `resource` in an anonymous object holding one reference.
    pub fn new(resource: R) -> ObjectRef<R> {
        Shared::new(Self {
            local_name: AtomicU32::new(0),
            resource,
        })
    }

    /// The client-visible name, or [`ObjectName::NONE`] if anonymous.
    pub fn local_name(&self) -> ObjectName {
        ObjectName(self.local_name.load(Ordering::Relaxed))
    }

    /// Whether the object has never been given a name.
    pub fn is_anonymous(&self) -> bool {
        self.local_name().is_none()
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub(crate) fn set_local_name(&self, name: ObjectName) {
        self.local_name.store(name.0, Ordering::Relaxed);
    }
}

impl<R: Resource> Destroy for Object<R> {
    fn destroy(&self) {
        let name = self.local_name();
        log::trace!("Object {name}: last reference released, destroying");
        self.resource.destroy(name);
    }
}

impl<R: Resource + std::fmt::Debug> std::fmt::Debug for Object<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("local_name", &self.local_name())
            .field("resource", &self.resource)
            .finish()
    }
}

static_assertions::assert_impl_all!(Object<()>: Send, Sync);
static_assertions::assert_impl_all!(ObjectRef<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct Recorder {
        names: Arc<Mutex<Vec<ObjectName>>>,
    }

    impl Resource for Recorder {
        fn destroy(&self, name: ObjectName) {
            self.names.lock().unwrap().push(name);
        }
    }

    impl Resource for String {}

    #[test]
    fn test_new_object_is_anonymous() {
        let object = Object::new(());
        assert!(object.is_anonymous());
        assert_eq!(object.ref_count(), 1);
    }

    #[test]
    fn test_destroy_sees_last_name() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let object = Object::new(Recorder {
            names: Arc::clone(&names),
        });
        object.set_local_name(ObjectName(12));

        let extra = object.clone();
        drop(object);
        assert!(names.lock().unwrap().is_empty());

        drop(extra);
        assert_eq!(*names.lock().unwrap(), vec![ObjectName(12)]);
    }

    #[test]
    fn test_object_debug() {
        let object = Object::new(42u8.to_string());
        let debug = format!("{:?}", *object);
        assert!(debug.contains("Object"));
        assert!(debug.contains("42"));
    }
}
