//! Common utilities for registry integration tests.
//!
//! Provides a resource type that records its destruction, so tests can
//! check that every object is destroyed exactly once and never early.

use std::sync::Arc;

use parking_lot::Mutex;
use virtgl_graphics::{Object, ObjectName, ObjectRef, Resource};

/// Install a test logger. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

// ============================================================================
// Destroy tracking
// ============================================================================

/// Shared record of destroyed objects, as `(tag, last local name)`.
#[derive(Debug, Clone, Default)]
pub struct DestroyLog {
    entries: Arc<Mutex<Vec<(String, ObjectName)>>>,
}

impl DestroyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anonymous object that reports to this log.
    pub fn object(&self, tag: impl Into<String>) -> ObjectRef<Tracked> {
        Object::new(Tracked {
            tag: tag.into(),
            log: self.clone(),
        })
    }

    /// Number of destroyed objects.
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// How many times the object tagged `tag` was destroyed.
    pub fn times_destroyed(&self, tag: &str) -> usize {
        self.entries.lock().iter().filter(|(t, _)| t == tag).count()
    }

    /// Name the object tagged `tag` carried when destroyed.
    pub fn destroyed_name(&self, tag: &str) -> Option<ObjectName> {
        self.entries
            .lock()
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, name)| *name)
    }
}

/// A resource that records its destruction in a [`DestroyLog`].
#[derive(Debug)]
pub struct Tracked {
    pub tag: String,
    log: DestroyLog,
}

impl Resource for Tracked {
    fn destroy(&self, name: ObjectName) {
        log::trace!("Tracked {}: destroyed as {name}", self.tag);
        self.log.entries.lock().push((self.tag.clone(), name));
    }
}
