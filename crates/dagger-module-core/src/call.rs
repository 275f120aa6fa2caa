//! The function call the engine asks a module process to serve.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an engine-side object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a registered module, returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handle on an engine-side object: its type name and its ID.
///
/// Remote objects are never serialized by structure, only by this handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHandle {
    pub type_name: String,
    pub id: ObjectId,
}

impl ObjectHandle {
    pub fn new(type_name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }
}

/// One named input argument of a function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputArg {
    pub name: String,
    pub value: serde_json::Value,
}

/// The current function call, as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Name of the object the function belongs to; empty during registration
    #[serde(default)]
    pub parent_name: String,
    /// Function name; empty for constructor calls
    #[serde(default)]
    pub name: String,
    /// Serialized state of the receiving instance
    #[serde(default)]
    pub parent: serde_json::Value,
    /// Input arguments in the order the engine sent them
    #[serde(default)]
    pub input_args: Vec<InputArg>,
}

impl FunctionCall {
    /// Whether the engine is asking the module to describe itself.
    pub fn is_registration(&self) -> bool {
        self.parent_name.is_empty()
    }

    /// Whether the engine is asking for a constructor-only invocation.
    pub fn is_constructor(&self) -> bool {
        !self.is_registration() && self.name.is_empty()
    }

    /// Look up an input argument by name.
    pub fn input_arg(&self, name: &str) -> Option<&serde_json::Value> {
        self.input_args
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}
