//! Registry error types.

use virtgl_core::IndexError;

/// Errors reported by [`Namespace`](crate::Namespace) and
/// [`ShareGroup`](crate::ShareGroup) registration.
///
/// Absent names and first-writer-wins collisions are not errors; they
/// surface as `Option` results and returned objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    /// Every name the namespace may hand out is in use.
    #[error("namespace exhausted: {limit} names in use")]
    Exhausted { limit: u32 },
    /// Name 0 cannot be registered.
    #[error("object name 0 is reserved")]
    ReservedName,
}

impl From<IndexError> for NamespaceError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::AllocatorExhausted { capacity } => Self::Exhausted {
                limit: u32::try_from(capacity).unwrap_or(u32::MAX),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NamespaceError::Exhausted { limit: 16 };
        assert_eq!(err.to_string(), "namespace exhausted: 16 names in use");

        let err = NamespaceError::ReservedName;
        assert_eq!(err.to_string(), "object name 0 is reserved");
    }

    #[test]
    fn test_from_index_error() {
        let err: NamespaceError = IndexError::AllocatorExhausted { capacity: 3 }.into();
        assert_eq!(err, NamespaceError::Exhausted { limit: 3 });
    }
}
