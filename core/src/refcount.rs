//! Intrusive reference counting.
//!
//! [`RefCounted`] is the embeddable counter: it starts at 1 (the creator's
//! reference), and reports the 1 → 0 transition exactly once. [`Shared<T>`]
//! pairs a counter with a value whose [`Destroy`] hook runs on that
//! transition.
//!
//! Cloning a [`Shared`] acquires a reference, dropping it releases one.
//! Both are lock-free and may be called from any thread.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use virtgl_core::refcount::{Destroy, Shared};
//!
//! struct Texture {
//!     destroyed: AtomicBool,
//! }
//!
//! impl Destroy for Texture {
//!     fn destroy(&self) {
//!         self.destroyed.store(true, Ordering::SeqCst);
//!     }
//! }
//!
//! let tex = Shared::new(Texture { destroyed: AtomicBool::new(false) });
//! let bound = tex.acquire();
//! assert_eq!(tex.ref_count(), 2);
//!
//! drop(tex);
//! assert!(!bound.destroyed.load(Ordering::SeqCst));
//! assert_eq!(bound.ref_count(), 1);
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Atomic reference counter with a single-shot "last release" signal.
///
/// Acquiring a counter that already reached zero, or releasing one more
/// time than it was acquired, is a caller bug and panics.
pub struct RefCounted {
    count: AtomicU32,
}

impl RefCounted {
    /// Creates a counter holding the creator's implicit reference.
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(1),
        }
    }

    /// Adds a reference.
    ///
    /// # Panics
    ///
    /// Panics if the count already dropped to zero.
    #[inline]
    pub fn acquire(&self) {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            assert!(current > 0, "acquire on a destroyed object");
            assert!(current < u32::MAX, "reference count overflow");
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Drops a reference.
    ///
    /// Returns `true` for exactly one caller: the one whose release took the
    /// count from 1 to 0. That caller owns the destroy step.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    #[inline]
    #[must_use]
    pub fn release(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            assert!(current > 0, "release on a destroyed object");
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if current == 1 {
            // Pairs with the Release above so the destroyer sees every write
            // made by threads that released before it.
            fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    /// Current count. Only a snapshot when other threads hold references.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the last reference has been released.
    pub fn is_destroyed(&self) -> bool {
        self.count() == 0
    }

    /// Retires a counter after its destroy step.
    ///
    /// # Panics
    ///
    /// Panics if references are still outstanding.
    pub fn cleanup(self) {
        assert_eq!(
            self.count(),
            0,
            "cleanup of a reference counter that is still referenced"
        );
    }
}

impl Default for RefCounted {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCounted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCounted")
            .field("count", &self.count())
            .finish()
    }
}

/// Hook invoked once, when the last reference to a [`Shared`] value is released.
///
/// Implementations release whatever the value holds outward (other
/// [`Shared`] handles, host-side names). A value must never hold a reference
/// back to itself, directly or through a chain, or it will never be destroyed.
pub trait Destroy: Send + Sync {
    fn destroy(&self);
}

struct SharedInner<T> {
    refs: RefCounted,
    value: T,
}

/// A reference-counted handle with an intrusive counter and a destroy hook.
///
/// Each live `Shared<T>` is one counted reference. `clone` / [`acquire`]
/// add one, `drop` / [`release`] remove one, and the value's
/// [`Destroy::destroy`] runs when the count reaches zero.
///
/// [`acquire`]: Shared::acquire
/// [`release`]: Shared::release
pub struct Shared<T: Destroy> {
    inner: Arc<SharedInner<T>>,
}

impl<T: Destroy> Shared<T> {
    /// Wraps `value` with a count of 1.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                refs: RefCounted::new(),
                value,
            }),
        }
    }

    /// Takes another reference to the same value.
    pub fn acquire(&self) -> Self {
        self.inner.refs.acquire();
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Gives this reference back. Equivalent to dropping the handle.
    pub fn release(this: Self) {
        drop(this);
    }

    /// Number of outstanding references.
    pub fn ref_count(&self) -> u32 {
        self.inner.refs.count()
    }

    /// Whether both handles refer to the same value.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T: Destroy> Clone for Shared<T> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T: Destroy> Drop for Shared<T> {
    fn drop(&mut self) {
        if self.inner.refs.release() {
            self.inner.value.destroy();
        }
    }
}

impl<T: Destroy> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: Destroy + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("refs", &self.ref_count())
            .field("value", &self.inner.value)
            .finish()
    }
}

static_assertions::assert_impl_all!(RefCounted: Send, Sync);
