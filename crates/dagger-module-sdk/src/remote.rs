//! Handles on the engine's core object types.
//!
//! Only the types modules commonly pass around are provided. They carry the
//! object's ID and nothing else.

crate::remote_object!(
    /// A container image and its filesystem state
    pub Container
);

crate::remote_object!(
    /// A directory tree
    pub Directory
);

crate::remote_object!(
    /// A single file
    pub File
);

crate::remote_object!(
    /// A secret value kept inside the engine
    pub Secret
);

crate::remote_object!(
    /// A persistent cache mount
    pub CacheVolume
);

/// Names of the remote types above, as the engine knows them.
pub const BUILTIN_TYPES: &[&str] = &["Container", "Directory", "File", "Secret", "CacheVolume"];
