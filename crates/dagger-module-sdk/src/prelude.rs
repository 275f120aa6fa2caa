//! Prelude module for convenient imports
//!
//! ```rust
//! use dagger_module_sdk::prelude::*;
//! ```

// Declarations
pub use crate::registry::{
    Args, CachePolicy, Constructor, EnumDecl, Field, Function, MaybeReady, Module, ObjectDecl,
    Param,
};

// Native values
pub use crate::native::{CancellationToken, FromNative, IntoNative, Native, NativeTyped};

// Engine objects
pub use crate::remote::{CacheVolume, Container, Directory, File, Secret};

// Error types
pub use crate::error::{ArgumentError, ModuleError, Result};

// Re-export macros
pub use crate::{export_module, module_enum, module_object, module_scalar, remote_object};
