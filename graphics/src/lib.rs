//! # virtgl Graphics
//!
//! Object identity and lifetime management for the virtgl guest driver.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Object`] - A reference-counted resource with a client-visible name
//! - [`Namespace`] - Name-to-object registry for one resource category
//! - [`ShareGroup`] - The namespaces and default textures shared by contexts
//! - [`TextureUnit`] - Texture bindings that fall back to the zero texture
//!
//! Host communication and API semantics live in the layers above; this
//! crate only decides which object a name refers to and when it dies.
//!
//! ## Example
//!
//! ```
//! use virtgl_graphics::{NamespaceKind, Object, ShareGroup, TextureTarget, TextureUnit};
//!
//! let group = ShareGroup::<()>::create();
//! let mut unit = TextureUnit::new(&group, |_| Object::new(()));
//!
//! let texture = Object::new(());
//! let name = group.add(NamespaceKind::Texture, &texture).unwrap();
//! unit.bind(TextureTarget::Texture2D, Some(&texture));
//!
//! // glDeleteTextures on a bound texture.
//! group.remove(NamespaceKind::Texture, name);
//! unit.unbind_name(name);
//! assert!(unit.is_default_bound(TextureTarget::Texture2D));
//! ```

pub mod error;
pub mod namespace;
pub mod object;
pub mod sharegroup;
pub mod texture_unit;
pub mod types;

// Re-export main types for convenience
pub use error::NamespaceError;
pub use namespace::{Namespace, NamespaceDescriptor};
pub use object::{Object, ObjectRef, Resource};
pub use sharegroup::{ShareGroup, ShareGroupDescriptor, ShareGroupRef};
pub use texture_unit::TextureUnit;
pub use types::{NamespaceKind, ObjectName, TextureTarget};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
