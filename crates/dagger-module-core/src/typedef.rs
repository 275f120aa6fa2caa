//! Type definitions as the engine's schema understands them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a registered type, with the nested shape for lists and the
/// referenced name for scalars, enums and objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeDefKind {
    /// UTF-8 string
    String,
    /// Signed integer of any width
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// Opaque scalar referenced by name (IDs, `JSON`, platform strings...)
    Scalar { name: String },
    /// Enum referenced by name
    Enum { name: String },
    /// Object referenced by name; identity is resolved by the engine
    Object { name: String },
    /// List of the element type
    List { element: Box<TypeDescriptor> },
    /// No value
    Void,
}

impl TypeDefKind {
    /// The engine's `TypeDefKind` enum literal for this kind.
    pub fn engine_kind(&self) -> &'static str {
        match self {
            TypeDefKind::String => "STRING_KIND",
            TypeDefKind::Integer => "INTEGER_KIND",
            TypeDefKind::Float => "FLOAT_KIND",
            TypeDefKind::Boolean => "BOOLEAN_KIND",
            TypeDefKind::Scalar { .. } => "SCALAR_KIND",
            TypeDefKind::Enum { .. } => "ENUM_KIND",
            TypeDefKind::Object { .. } => "OBJECT_KIND",
            TypeDefKind::List { .. } => "LIST_KIND",
            TypeDefKind::Void => "VOID_KIND",
        }
    }
}

/// A type definition: a kind decorated with optionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Kind and nested shape
    #[serde(flatten)]
    pub kind: TypeDefKind,
    /// Whether the value may be absent
    #[serde(default)]
    pub optional: bool,
}

impl TypeDescriptor {
    /// Create a non-optional descriptor of the given kind.
    pub fn new(kind: TypeDefKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn string() -> Self {
        Self::new(TypeDefKind::String)
    }

    pub fn integer() -> Self {
        Self::new(TypeDefKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(TypeDefKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(TypeDefKind::Boolean)
    }

    pub fn void() -> Self {
        Self::new(TypeDefKind::Void)
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(TypeDefKind::Scalar { name: name.into() })
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(TypeDefKind::Enum { name: name.into() })
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(TypeDefKind::Object { name: name.into() })
    }

    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::new(TypeDefKind::List {
            element: Box::new(element),
        })
    }

    /// Set the optional flag.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// The element type if this is a list.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match &self.kind {
            TypeDefKind::List { element } => Some(element),
            _ => None,
        }
    }

    /// The referenced name for scalars, enums and objects.
    pub fn referenced_name(&self) -> Option<&str> {
        match &self.kind {
            TypeDefKind::Scalar { name }
            | TypeDefKind::Enum { name }
            | TypeDefKind::Object { name } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeDefKind::String => write!(f, "String")?,
            TypeDefKind::Integer => write!(f, "Int")?,
            TypeDefKind::Float => write!(f, "Float")?,
            TypeDefKind::Boolean => write!(f, "Boolean")?,
            TypeDefKind::Void => write!(f, "Void")?,
            TypeDefKind::Scalar { name }
            | TypeDefKind::Enum { name }
            | TypeDefKind::Object { name } => write!(f, "{}", name)?,
            TypeDefKind::List { element } => write!(f, "[{}]", element)?,
        }
        if !self.optional {
            write!(f, "!")?;
        }
        Ok(())
    }
}
