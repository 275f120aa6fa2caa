//! Native type descriptors and native values
//!
//! [`NativeType`] describes a Rust type the way the runtime needs to see it
//! when registering and decoding; [`Native`] is a decoded value on its way
//! into a handler or out of one. The conversion traits connect both to
//! concrete Rust types.

use crate::error::ConvertError;
use dagger_module_core::ObjectHandle;
use indexmap::IndexMap;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Width of an integer type; every width maps to the engine's integer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    /// Inclusive range of values representable at this width.
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntWidth::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntWidth::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntWidth::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntWidth::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntWidth::U8 => (0, u8::MAX as i128),
            IntWidth::U16 => (0, u16::MAX as i128),
            IntWidth::U32 => (0, u32::MAX as i128),
            IntWidth::U64 => (0, u64::MAX as i128),
        }
    }

    pub fn contains(self, value: i128) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
        }
    }
}

/// Width of a floating point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Shape of a Rust type as seen by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    String,
    Int(IntWidth),
    Float(FloatWidth),
    Bool,
    /// Opaque scalar wrapper, referenced by name
    Scalar(String),
    /// Module enum, referenced by native name
    Enum(String),
    /// Engine-side object known only by ID
    Remote(String),
    /// Module-declared object, serialized through its fields
    Object(String),
    /// Arbitrary JSON passed through untouched
    Json,
    Nullable(Box<NativeType>),
    List(Box<NativeType>),
    /// String-keyed dictionary
    Map(Box<NativeType>),
    /// No value
    Void,
    /// Cancellation token supplied by the runtime
    CancellationToken,
    /// A type the runtime cannot represent, kept for error reporting
    Unsupported(String),
}

impl NativeType {
    pub fn nullable(inner: NativeType) -> Self {
        match inner {
            already @ NativeType::Nullable(_) => already,
            other => NativeType::Nullable(Box::new(other)),
        }
    }

    pub fn list_of(element: NativeType) -> Self {
        NativeType::List(Box::new(element))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, NativeType::Nullable(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, NativeType::Void)
    }

    pub fn is_cancellation_token(&self) -> bool {
        matches!(self, NativeType::CancellationToken)
    }

    /// The type with one level of nullability removed.
    pub fn non_null(&self) -> &NativeType {
        match self {
            NativeType::Nullable(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::String => write!(f, "String"),
            NativeType::Int(width) => write!(f, "{}", width.name()),
            NativeType::Float(FloatWidth::F32) => write!(f, "f32"),
            NativeType::Float(FloatWidth::F64) => write!(f, "f64"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::Scalar(name)
            | NativeType::Enum(name)
            | NativeType::Remote(name)
            | NativeType::Object(name)
            | NativeType::Unsupported(name) => write!(f, "{}", name),
            NativeType::Json => write!(f, "JSON"),
            NativeType::Nullable(inner) => write!(f, "Option<{}>", inner),
            NativeType::List(inner) => write!(f, "Vec<{}>", inner),
            NativeType::Map(inner) => write!(f, "Map<String, {}>", inner),
            NativeType::Void => write!(f, "()"),
            NativeType::CancellationToken => write!(f, "CancellationToken"),
        }
    }
}

/// Token handed to functions that accept one. The runtime never cancels it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancellationToken {
    _private: (),
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { _private: () }
    }

    pub fn is_cancelled(&self) -> bool {
        false
    }

    /// Resolves when the token is cancelled, which never happens.
    pub async fn cancelled(&self) {
        futures::future::pending::<()>().await
    }
}

/// An instance of a module-declared object.
pub struct ObjectValue {
    type_name: String,
    instance: Box<dyn Any + Send>,
}

impl ObjectValue {
    pub fn new<T: Any + Send>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            instance: Box::new(value),
        }
    }

    pub fn from_boxed(type_name: impl Into<String>, instance: Box<dyn Any + Send>) -> Self {
        Self {
            type_name: type_name.into(),
            instance,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn instance(&self) -> &(dyn Any + Send) {
        self.instance.as_ref()
    }

    pub fn into_instance(self) -> Box<dyn Any + Send> {
        self.instance
    }

    /// Recover the concrete instance, handing the value back on mismatch.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        let type_name = self.type_name;
        match self.instance.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(instance) => Err(Self {
                type_name,
                instance,
            }),
        }
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A decoded value.
#[derive(Debug)]
pub enum Native {
    Null,
    Bool(bool),
    /// Any integer width, held losslessly
    Int(i128),
    Float(f64),
    String(String),
    /// Enum member by its declared name
    Enum { type_name: String, member: String },
    /// Opaque scalar holding its raw text
    Scalar { type_name: String, value: String },
    Remote(ObjectHandle),
    Object(ObjectValue),
    List(Vec<Native>),
    Map(IndexMap<String, Native>),
    Json(serde_json::Value),
    Token(CancellationToken),
}

impl Native {
    /// Short name of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Native::Null => "null",
            Native::Bool(_) => "boolean",
            Native::Int(_) => "integer",
            Native::Float(_) => "float",
            Native::String(_) => "string",
            Native::Enum { .. } => "enum",
            Native::Scalar { .. } => "scalar",
            Native::Remote(_) => "remote object",
            Native::Object(_) => "object",
            Native::List(_) => "list",
            Native::Map(_) => "map",
            Native::Json(_) => "JSON",
            Native::Token(_) => "cancellation token",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    /// Wrap any serializable value as pass-through JSON.
    pub fn serialized<T: serde::Serialize>(
        value: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Native::Json(serde_json::to_value(value)?))
    }
}

/// A type with a known runtime shape.
pub trait NativeTyped {
    fn native_type() -> NativeType;
}

/// Conversion of a handler result into a native value.
pub trait IntoNative {
    fn into_native(self) -> Native;
}

/// Conversion of a decoded native value into a handler argument.
pub trait FromNative: Sized {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError>;
}

impl NativeTyped for String {
    fn native_type() -> NativeType {
        NativeType::String
    }
}

impl IntoNative for String {
    fn into_native(self) -> Native {
        Native::String(self)
    }
}

impl IntoNative for &str {
    fn into_native(self) -> Native {
        Native::String(self.to_string())
    }
}

impl FromNative for String {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::String(s) => Ok(s),
            other => Err(ConvertError::mismatch("string", other.kind())),
        }
    }
}

impl NativeTyped for bool {
    fn native_type() -> NativeType {
        NativeType::Bool
    }
}

impl IntoNative for bool {
    fn into_native(self) -> Native {
        Native::Bool(self)
    }
}

impl FromNative for bool {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Bool(b) => Ok(b),
            other => Err(ConvertError::mismatch("boolean", other.kind())),
        }
    }
}

macro_rules! native_int {
    ($($ty:ty => $width:ident),* $(,)?) => {
        $(
            impl NativeTyped for $ty {
                fn native_type() -> NativeType {
                    NativeType::Int(IntWidth::$width)
                }
            }

            impl IntoNative for $ty {
                fn into_native(self) -> Native {
                    Native::Int(self as i128)
                }
            }

            impl FromNative for $ty {
                fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
                    match value {
                        Native::Int(n) => <$ty>::try_from(n).map_err(|_| ConvertError::OutOfRange {
                            value: n.to_string(),
                            target: IntWidth::$width.name(),
                        }),
                        other => Err(ConvertError::mismatch("integer", other.kind())),
                    }
                }
            }
        )*
    };
}

native_int! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

impl NativeTyped for f64 {
    fn native_type() -> NativeType {
        NativeType::Float(FloatWidth::F64)
    }
}

impl IntoNative for f64 {
    fn into_native(self) -> Native {
        Native::Float(self)
    }
}

impl FromNative for f64 {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Float(f) => Ok(f),
            Native::Int(n) => Ok(n as f64),
            other => Err(ConvertError::mismatch("float", other.kind())),
        }
    }
}

impl NativeTyped for f32 {
    fn native_type() -> NativeType {
        NativeType::Float(FloatWidth::F32)
    }
}

impl IntoNative for f32 {
    fn into_native(self) -> Native {
        // Widen through the shortest decimal form so 0.1f32 stays 0.1.
        let widened = self.to_string().parse::<f64>().unwrap_or(self as f64);
        Native::Float(widened)
    }
}

impl FromNative for f32 {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Float(f) => Ok(f as f32),
            Native::Int(n) => Ok(n as f32),
            other => Err(ConvertError::mismatch("float", other.kind())),
        }
    }
}

impl NativeTyped for () {
    fn native_type() -> NativeType {
        NativeType::Void
    }
}

impl IntoNative for () {
    fn into_native(self) -> Native {
        Native::Null
    }
}

impl FromNative for () {
    fn from_native(_value: Native) -> std::result::Result<Self, ConvertError> {
        Ok(())
    }
}

impl<T: NativeTyped> NativeTyped for Option<T> {
    fn native_type() -> NativeType {
        NativeType::nullable(T::native_type())
    }
}

impl<T: IntoNative> IntoNative for Option<T> {
    fn into_native(self) -> Native {
        match self {
            Some(value) => value.into_native(),
            None => Native::Null,
        }
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Null => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: NativeTyped> NativeTyped for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::list_of(T::native_type())
    }
}

impl<T: IntoNative> IntoNative for Vec<T> {
    fn into_native(self) -> Native {
        Native::List(self.into_iter().map(IntoNative::into_native).collect())
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::List(items) => items.into_iter().map(T::from_native).collect(),
            other => Err(ConvertError::mismatch("list", other.kind())),
        }
    }
}

macro_rules! native_map {
    ($($map:ident),*) => {
        $(
            impl<T: NativeTyped> NativeTyped for $map<String, T> {
                fn native_type() -> NativeType {
                    NativeType::Map(Box::new(T::native_type()))
                }
            }

            impl<T: IntoNative> IntoNative for $map<String, T> {
                fn into_native(self) -> Native {
                    Native::Map(self.into_iter().map(|(k, v)| (k, v.into_native())).collect())
                }
            }

            impl<T: FromNative> FromNative for $map<String, T> {
                fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
                    match value {
                        Native::Map(entries) => entries
                            .into_iter()
                            .map(|(k, v)| T::from_native(v).map(|v| (k, v)))
                            .collect(),
                        other => Err(ConvertError::mismatch("map", other.kind())),
                    }
                }
            }
        )*
    };
}

native_map!(HashMap, BTreeMap, IndexMap);

impl NativeTyped for serde_json::Value {
    fn native_type() -> NativeType {
        NativeType::Json
    }
}

impl IntoNative for serde_json::Value {
    fn into_native(self) -> Native {
        Native::Json(self)
    }
}

impl FromNative for serde_json::Value {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Json(v) => Ok(v),
            Native::Null => Ok(serde_json::Value::Null),
            other => Err(ConvertError::mismatch("JSON", other.kind())),
        }
    }
}

impl NativeTyped for CancellationToken {
    fn native_type() -> NativeType {
        NativeType::CancellationToken
    }
}

impl FromNative for CancellationToken {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        match value {
            Native::Token(token) => Ok(token),
            Native::Null => Ok(CancellationToken::never()),
            other => Err(ConvertError::mismatch("cancellation token", other.kind())),
        }
    }
}

impl IntoNative for Native {
    fn into_native(self) -> Native {
        self
    }
}

impl FromNative for Native {
    fn from_native(value: Native) -> std::result::Result<Self, ConvertError> {
        Ok(value)
    }
}

/// A module-declared object type.
///
/// Implemented by [`module_object!`](crate::module_object).
pub trait ModuleObject: Any + Send + Sized {
    /// Native type name, used to reference the object in the schema.
    const NAME: &'static str;
}

/// A module-declared enum.
///
/// Implemented by [`module_enum!`](crate::module_enum).
pub trait ModuleEnum: Copy + Send + Sized + 'static {
    /// Native type name.
    const NAME: &'static str;

    /// Members in declaration order.
    fn members() -> &'static [Self];

    /// Declared member name.
    fn member_name(self) -> &'static str;

    /// Look up a member by its exact declared name.
    fn from_member_name(name: &str) -> Option<Self> {
        Self::members()
            .iter()
            .copied()
            .find(|m| m.member_name() == name)
    }
}
