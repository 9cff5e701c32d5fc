//! Client-visible object names.

/// A client-visible object name, unique within one namespace.
///
/// Name 0 is reserved: it never identifies a registered object, and an
/// object carrying it is anonymous.
///
/// The type is a transparent `u32`, so slices of names can be handed to
/// the marshaling layer without copying.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct ObjectName(pub u32);

impl ObjectName {
    /// The reserved name. Never registered, never found.
    pub const NONE: Self = Self(0);

    /// Whether this is the reserved name 0.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Reinterprets a slice of names as raw `u32` values.
    pub fn as_raw_slice(names: &[Self]) -> &[u32] {
        bytemuck::cast_slice(names)
    }

    /// Reinterprets raw `u32` values as names.
    pub fn from_raw_slice(raw: &[u32]) -> &[Self] {
        bytemuck::cast_slice(raw)
    }
}

impl From<u32> for ObjectName {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<ObjectName> for u32 {
    fn from(name: ObjectName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
