//! Resource categories and texture binding targets.

/// Resource category. Each category has its own namespace in a
/// [`ShareGroup`](crate::ShareGroup), so the same name may refer to a
/// buffer and a texture at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NamespaceKind {
    Buffer = 0,
    Texture = 1,
    Renderbuffer = 2,
    /// Shaders and programs share one namespace.
    ShaderProgram = 3,
    Sampler = 4,
    Sync = 5,
}

impl NamespaceKind {
    /// Number of categories.
    pub const COUNT: usize = 6;

    /// Every category, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Buffer,
        Self::Texture,
        Self::Renderbuffer,
        Self::ShaderProgram,
        Self::Sampler,
        Self::Sync,
    ];

    /// Position of this category in per-category tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name, used in log output and namespace labels.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Renderbuffer => "renderbuffer",
            Self::ShaderProgram => "shader_program",
            Self::Sampler => "sampler",
            Self::Sync => "sync",
        }
    }
}

impl std::fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Texture binding target. Each target has its own default ("zero")
/// texture per share group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureTarget {
    Texture2D = 0,
    Texture2DArray = 1,
    Texture3D = 2,
    CubeMap = 3,
}

impl TextureTarget {
    /// Number of targets.
    pub const COUNT: usize = 4;

    /// Every target, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Texture2D,
        Self::Texture2DArray,
        Self::Texture3D,
        Self::CubeMap,
    ];

    /// Position of this target in per-target tables.
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_table_order() {
        for (i, kind) in NamespaceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        for (i, target) in TextureTarget::ALL.iter().enumerate() {
            assert_eq!(target.index(), i);
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(NamespaceKind::ShaderProgram.to_string(), "shader_program");
    }
}
