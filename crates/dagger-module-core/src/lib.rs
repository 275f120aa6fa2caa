//! Dagger Module Core crate
//!
//! Engine-facing types for Dagger modules: the type definitions a module
//! registers, the current function call it is asked to serve, and the opaque
//! identifiers the engine hands out.

pub mod call;
pub mod schema;
pub mod typedef;

// Re-export main types for convenience
pub use call::{FunctionCall, InputArg, ModuleId, ObjectHandle, ObjectId};
pub use schema::{
    ArgDef, CachePolicyKind, EnumDef, EnumMemberDef, FieldDef, FunctionCachePolicy, FunctionDef,
    ModuleDef, ObjectDef,
};
pub use typedef::{TypeDefKind, TypeDescriptor};
