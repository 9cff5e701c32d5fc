//! # virtgl Core
//!
//! Lifetime and lookup primitives shared by the virtgl guest driver:
//! intrusive reference counting ([`refcount`]) and a comparator-driven
//! ordered index with mutation-tolerant cursors ([`index`]).

pub mod index;
pub mod refcount;

pub use index::{AvlTree, Comparator, Cursor, IndexError};
pub use refcount::{Destroy, RefCounted, Shared};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
