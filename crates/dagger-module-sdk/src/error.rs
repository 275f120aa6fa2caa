//! Error types for the Dagger module runtime
//!
//! Each layer has its own error enum; [`ModuleError`] gathers them at the
//! phase boundary, where its message becomes the call's reported error.

use thiserror::Error;

/// Result type for module runtime operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// A native type with no schema representation.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Type cannot be registered with the engine
    #[error("Unsupported type: {type_name}")]
    UnsupportedType { type_name: String },
}

impl MappingError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        MappingError::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}

/// Inconsistencies found while reading the declared module.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// More than one parameterised constructor with the same, maximal arity
    #[error(
        "Object '{type_name}' declares {count} constructors taking {arity} parameters; keep exactly one"
    )]
    AmbiguousConstructor {
        type_name: String,
        arity: usize,
        count: usize,
    },

    /// An enum is referenced but not declared for exposure
    #[error("Enum '{0}' is used but not exposed by the module")]
    UnknownEnum(String),

    /// An object is referenced but not exposed
    #[error("Object '{0}' is used but not exposed by the module")]
    UnknownObject(String),

    /// The same type name is declared twice
    #[error("Type '{0}' is declared more than once")]
    DuplicateType(String),

    /// Nothing to scan
    #[error("Module declares no types")]
    EmptyRegistry,
}

/// Conversion of a decoded value into a Rust type failed.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Value has the wrong shape
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    /// Value does not fit the target width
    #[error("value {value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
}

impl ConvertError {
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ConvertError::Mismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Reading a typed argument inside a handler failed.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// No value was decoded under that name
    #[error("Argument '{0}' was not provided")]
    Missing(String),

    /// The value did not convert to the requested type
    #[error("Argument '{name}': {source}")]
    Convert {
        name: String,
        #[source]
        source: ConvertError,
    },
}

/// Turning a wire value into a native value failed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Required argument absent with no default
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Enum string matches no member
    #[error("Invalid value '{value}' for enum {type_name}")]
    InvalidEnum { type_name: String, value: String },

    /// Enum target that the module does not expose
    #[error("Unknown enum type: {0}")]
    UnknownEnum(String),

    /// Wire shape does not match the target type
    #[error("Cannot decode {found} as {expected}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    /// Number does not fit the target width
    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: String },

    /// No `load<Type>FromID` accessor for the target
    #[error("No loader for object type: {0}")]
    MissingLoader(String),

    /// Object target that the module does not expose
    #[error("Unknown object type: {0}")]
    UnknownObject(String),

    /// Target type has no wire representation
    #[error("Type {0} cannot be decoded")]
    Unsupported(String),

    /// Object has neither a constructor nor a parameterless factory
    #[error("Object {0} cannot be constructed without arguments")]
    NoConstructor(String),

    /// Field value could not be applied to the instance
    #[error("Field '{field}' of {type_name}: {source}")]
    Field {
        type_name: String,
        field: String,
        #[source]
        source: ConvertError,
    },

    /// The user constructor failed
    #[error("{source}")]
    Constructor {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Resolving a remote object failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DecodeError {
    pub fn mismatch(expected: impl ToString, found: &serde_json::Value) -> Self {
        DecodeError::TypeMismatch {
            expected: expected.to_string(),
            found: json_kind(found),
        }
    }
}

/// Turning a native value into a wire value failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Object type that the module does not expose
    #[error("Unknown object type: {0}")]
    UnknownObject(String),

    /// NaN and infinities have no JSON form
    #[error("Cannot encode non-finite number {0}")]
    NonFinite(f64),

    /// Integer wider than any JSON number the engine accepts
    #[error("Integer {0} is out of range for the wire")]
    IntOutOfRange(i128),

    /// Resolving an object's ID failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Serializing a native value failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The user function failed.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Error returned by the function
    #[error("{0}")]
    Failed(#[source] anyhow::Error),

    /// Panic inside the function
    #[error("Function panicked: {0}")]
    Panicked(String),

    /// The instance handed to the handler is not of the declared type
    #[error("Receiver is not a {0}")]
    Receiver(String),
}

/// Talking to the engine failed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Session variable not set
    #[error("Missing session variable: {0}")]
    MissingSession(&'static str),

    /// Session variable set to something unusable
    #[error("Invalid session variable {name}: {value}")]
    InvalidSession { name: &'static str, value: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine rejected the query
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The engine answered with an unexpected shape
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// No `load<Type>FromID` accessor for the type
    #[error("No loader for object type: {0}")]
    MissingLoader(String),

    /// Scripted failure of a test client
    #[error("{0}")]
    Unavailable(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any failure while serving a function call.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// Call addressed to an object the module does not expose
    #[error("Unknown object type: {0}")]
    UnknownType(String),

    /// Call addressed to a function the object does not expose
    #[error("Unknown function: {type_name}.{function}")]
    UnknownFunction { type_name: String, function: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModuleError {
    /// The message reported to the engine as the call's error value.
    ///
    /// Only the outermost message of the cause is reported; the full chain
    /// goes to the process log.
    pub fn report_message(&self) -> String {
        self.to_string()
    }
}

/// Loading the documentation index failed.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("Failed to read doc index {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid doc index: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures that happen before a call handle can report anything.
#[derive(Debug, Error)]
pub enum InfraError {
    /// The engine client could not be built
    #[error("Failed to connect to the engine: {0}")]
    Connect(#[source] ClientError),

    /// The current call could not be read
    #[error("Failed to resolve the current function call: {0}")]
    CurrentCall(#[source] ClientError),

    /// The result or error could not be delivered
    #[error("Failed to report the call result: {0}")]
    Report(#[source] ClientError),

    /// The async runtime could not start
    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Short name of a wire value's shape, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
