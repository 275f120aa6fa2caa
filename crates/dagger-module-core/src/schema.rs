//! Module schema submitted to the engine during registration.
//!
//! These mirror the engine's `typeDef`/`function` builder chains: an object
//! collects fields, functions and an optional constructor; a function collects
//! its arguments; an enum collects its members.

use crate::typedef::TypeDescriptor;
use serde::{Deserialize, Serialize};

/// A complete module definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDef {
    /// Module description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Object types in registration order
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
    /// Enum types in registration order
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

impl ModuleDef {
    /// Find an object by name.
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Find an enum by name.
    pub fn enumeration(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }
}

/// An object type (`typeDef().withObject(name, description)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    /// Constructor, registered as a function with an empty name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<FunctionDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecated: None,
            constructor: None,
            fields: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Find a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field on an object (`withField(name, type, description, deprecated)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub type_def: TypeDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
}

/// Cache policy kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicyKind {
    /// Engine default caching
    Default,
    /// Cache for the lifetime of the client session
    PerSession,
    /// Never cache
    Never,
}

impl CachePolicyKind {
    /// The engine's `FunctionCachePolicy` enum literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicyKind::Default => "Default",
            CachePolicyKind::PerSession => "PerSession",
            CachePolicyKind::Never => "Never",
        }
    }
}

/// Cache policy attached to a function (`withCachePolicy(policy, timeToLive)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCachePolicy {
    pub policy: CachePolicyKind,
    /// Time-to-live as a duration string (e.g. `"600s"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<String>,
}

/// A function (`function(name, returnType)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDef {
    /// Function name; empty for constructors
    pub name: String,
    pub return_type: TypeDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_policy: Option<FunctionCachePolicy>,
    #[serde(default)]
    pub args: Vec<ArgDef>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, return_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            return_type,
            description: None,
            deprecated: None,
            cache_policy: None,
            args: Vec::new(),
        }
    }

    /// Find an argument by name.
    pub fn arg(&self, name: &str) -> Option<&ArgDef> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// A function argument
/// (`withArg(name, type, description, defaultValue, defaultPath, ignore)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgDef {
    pub name: String,
    pub type_def: TypeDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Default path for directory/file arguments, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    /// Ignore globs for directory arguments, passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

/// An enum type (`typeDef().withEnum(name, description)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<EnumMemberDef>,
}

/// An enum member (`withEnumMember(name, value, description, deprecated)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumMemberDef {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
}
