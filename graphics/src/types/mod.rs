//! Common types shared by the object registries.
//!
//! This module contains the client-visible name type and the fixed
//! resource category and texture target enums.

mod kind;
mod name;

pub use kind::{NamespaceKind, TextureTarget};
pub use name::ObjectName;
