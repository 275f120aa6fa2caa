//! Wire value codec
//!
//! Decoding turns the engine's JSON arguments and parent state into native
//! values of a declared type; encoding turns a handler result back into
//! JSON. Remote objects cross the boundary by ID, which may take a round
//! trip through the engine client, so both directions are async.

use crate::client::EngineClient;
use crate::discovery::{EnumType, ModuleType, ParameterMeta, normalize_name};
use crate::error::{ClientError, DecodeError, EncodeError, InvocationError};
use crate::native::{CancellationToken, IntWidth, Native, NativeType, ObjectValue};
use crate::registry::Args;
use dagger_module_core::ObjectId;
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use tracing::debug;

static NULL: Value = Value::Null;

/// Decoder and encoder bound to one module's types and an engine client.
pub struct Codec<'a> {
    client: &'a dyn EngineClient,
    types: &'a [ModuleType],
    enums: &'a [EnumType],
}

impl<'a> Codec<'a> {
    pub fn new(
        client: &'a dyn EngineClient,
        types: &'a [ModuleType],
        enums: &'a [EnumType],
    ) -> Self {
        Self {
            client,
            types,
            enums,
        }
    }

    fn module_type(&self, native_name: &str) -> Option<&'a ModuleType> {
        self.types.iter().find(|t| t.native_name == native_name)
    }

    fn enum_type(&self, native_name: &str) -> Option<&'a EnumType> {
        self.enums.iter().find(|e| e.native_name == native_name)
    }

    /// The value a wire `null` decodes to.
    ///
    /// Enums take their first declared member.
    fn zero_value(&self, ty: &NativeType) -> Native {
        match ty {
            NativeType::String => Native::String(String::new()),
            NativeType::Int(_) => Native::Int(0),
            NativeType::Float(_) => Native::Float(0.0),
            NativeType::Bool => Native::Bool(false),
            NativeType::Enum(name) => self
                .enum_type(name)
                .and_then(|e| e.values.first())
                .map_or(Native::Null, |member| Native::Enum {
                    type_name: name.clone(),
                    member: member.name.clone(),
                }),
            NativeType::Json => Native::Json(Value::Null),
            NativeType::List(_) => Native::List(Vec::new()),
            NativeType::Map(_) => Native::Map(IndexMap::new()),
            NativeType::CancellationToken => Native::Token(CancellationToken::never()),
            _ => Native::Null,
        }
    }

    /// Decode a wire value into a native value of type `ty`.
    pub fn decode<'s>(
        &'s self,
        value: &'s Value,
        ty: &'s NativeType,
    ) -> BoxFuture<'s, Result<Native, DecodeError>> {
        async move {
            if value.is_null() {
                return Ok(self.zero_value(ty));
            }

            match ty {
                NativeType::Nullable(inner) => self.decode(value, inner).await,
                NativeType::String => value
                    .as_str()
                    .map(|s| Native::String(s.to_string()))
                    .ok_or_else(|| DecodeError::mismatch("string", value)),
                NativeType::Int(width) => decode_int(value, *width),
                NativeType::Float(_) => value
                    .as_f64()
                    .map(Native::Float)
                    .ok_or_else(|| DecodeError::mismatch("float", value)),
                NativeType::Bool => value
                    .as_bool()
                    .map(Native::Bool)
                    .ok_or_else(|| DecodeError::mismatch("boolean", value)),
                NativeType::Enum(name) => self.decode_enum(value, name),
                NativeType::Scalar(name) => Ok(Native::Scalar {
                    type_name: name.clone(),
                    value: match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    },
                }),
                NativeType::Remote(name) => self.decode_remote(value, name).await,
                NativeType::List(element) => {
                    let items = value
                        .as_array()
                        .ok_or_else(|| DecodeError::mismatch(ty, value))?;
                    let mut decoded = Vec::with_capacity(items.len());
                    for item in items {
                        decoded.push(self.decode(item, element).await?);
                    }
                    Ok(Native::List(decoded))
                }
                NativeType::Map(inner) => {
                    let entries = value
                        .as_object()
                        .ok_or_else(|| DecodeError::mismatch(ty, value))?;
                    let mut decoded = IndexMap::with_capacity(entries.len());
                    for (key, item) in entries {
                        decoded.insert(key.clone(), self.decode(item, inner).await?);
                    }
                    Ok(Native::Map(decoded))
                }
                NativeType::Json => Ok(Native::Json(value.clone())),
                NativeType::Object(name) => {
                    let module_type = self
                        .module_type(name)
                        .ok_or_else(|| DecodeError::UnknownObject(name.clone()))?;
                    let state = value
                        .as_object()
                        .ok_or_else(|| DecodeError::mismatch(&module_type.name, value))?;
                    Ok(Native::Object(self.instantiate(module_type, state).await?))
                }
                NativeType::Void => Ok(Native::Null),
                NativeType::CancellationToken => Ok(Native::Token(CancellationToken::never())),
                NativeType::Unsupported(name) => Err(DecodeError::Unsupported(name.clone())),
            }
        }
        .boxed()
    }

    fn decode_enum(&self, value: &Value, native_name: &str) -> Result<Native, DecodeError> {
        let enum_type = self
            .enum_type(native_name)
            .ok_or_else(|| DecodeError::UnknownEnum(native_name.to_string()))?;
        let text = value
            .as_str()
            .ok_or_else(|| DecodeError::mismatch(&enum_type.name, value))?;

        let member = enum_type
            .values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(text))
            .or_else(|| enum_type.values.iter().find(|v| v.value == text))
            .ok_or_else(|| DecodeError::InvalidEnum {
                type_name: enum_type.name.clone(),
                value: text.to_string(),
            })?;

        Ok(Native::Enum {
            type_name: native_name.to_string(),
            member: member.name.clone(),
        })
    }

    async fn decode_remote(&self, value: &Value, type_name: &str) -> Result<Native, DecodeError> {
        let id = match value {
            Value::String(id) => id.clone(),
            Value::Object(fields) => match fields.get("id") {
                Some(Value::String(id)) => id.clone(),
                None | Some(Value::Null) => return Ok(Native::Null),
                Some(other) => return Err(DecodeError::mismatch(type_name, other)),
            },
            other => return Err(DecodeError::mismatch(type_name, other)),
        };

        debug!(type_name, id = %id, "Loading remote object");
        match self.client.load_object(type_name, &ObjectId::new(id)).await {
            Ok(handle) => Ok(Native::Remote(handle)),
            Err(ClientError::MissingLoader(name)) => Err(DecodeError::MissingLoader(name)),
            Err(err) => Err(err.into()),
        }
    }

    /// Rebuild an object from its serialized state.
    ///
    /// The parameterised constructor takes the state entries matching its
    /// parameters; remaining fields are then set from the state.
    pub fn instantiate<'s>(
        &'s self,
        module_type: &'s ModuleType,
        state: &'s Map<String, Value>,
    ) -> BoxFuture<'s, Result<ObjectValue, DecodeError>> {
        async move {
            let (mut instance, covered) = match &module_type.constructor {
                Some(constructor) => {
                    let inputs = constructor
                        .params
                        .iter()
                        .map(|p| (p, lookup(state, &p.name)))
                        .collect();
                    let args = self.decode_params(inputs).await?;
                    let instance = (constructor.build)(args)
                        .map_err(|err| constructor_error(&module_type.name, err))?;
                    let covered: HashSet<&str> =
                        constructor.params.iter().map(|p| p.name.as_str()).collect();
                    (instance, covered)
                }
                None => {
                    let factory = module_type
                        .factory
                        .as_ref()
                        .ok_or_else(|| DecodeError::NoConstructor(module_type.name.clone()))?;
                    let instance =
                        factory().map_err(|err| constructor_error(&module_type.name, err))?;
                    (instance, HashSet::new())
                }
            };

            for field in &module_type.fields {
                if covered.contains(field.name.as_str()) {
                    continue;
                }
                let Some(raw) = lookup(state, &field.name) else {
                    continue;
                };
                let native = self.decode(raw, &field.native_type).await?;
                (field.set)(&mut *instance, native).map_err(|source| DecodeError::Field {
                    type_name: module_type.name.clone(),
                    field: field.name.clone(),
                    source,
                })?;
            }

            Ok(ObjectValue::from_boxed(module_type.native_name.clone(), instance))
        }
        .boxed()
    }

    /// Decode parameters from their wire values.
    ///
    /// A missing or null value falls back to the default, then to null for
    /// optional parameters; a required parameter without either fails.
    pub fn decode_params<'s>(
        &'s self,
        inputs: Vec<(&'s ParameterMeta, Option<&'s Value>)>,
    ) -> BoxFuture<'s, Result<Args, DecodeError>> {
        async move {
            let mut args = Args::new();
            for (param, raw) in inputs {
                let provided = raw.filter(|v| !v.is_null());
                let native = match (provided, &param.default_value) {
                    _ if param.is_cancellation_token() => Native::Token(CancellationToken::never()),
                    (Some(value), _) => self.decode(value, &param.native_type).await?,
                    (None, Some(default)) => self.decode(default, &param.native_type).await?,
                    (None, None) if param.optional || !param.exposed => {
                        self.decode(&NULL, &param.native_type).await?
                    }
                    (None, None) => return Err(DecodeError::MissingArgument(param.name.clone())),
                };
                args.insert(param.native_name.clone(), native);
            }
            Ok(args)
        }
        .boxed()
    }

    /// Encode a native value for the wire.
    pub fn encode(&self, value: Native) -> BoxFuture<'_, Result<Value, EncodeError>> {
        async move {
            let encoded = match value {
                Native::Null | Native::Token(_) => Value::Null,
                Native::Bool(b) => Value::Bool(b),
                Native::Int(n) => int_value(n).ok_or(EncodeError::IntOutOfRange(n))?,
                Native::Float(f) => {
                    Value::Number(Number::from_f64(f).ok_or(EncodeError::NonFinite(f))?)
                }
                Native::String(s) => Value::String(s),
                Native::Enum { member, .. } => Value::String(member),
                Native::Scalar { value, .. } => Value::String(value),
                Native::Json(value) => value,
                Native::List(items) => {
                    let mut encoded = Vec::with_capacity(items.len());
                    for item in items {
                        encoded.push(self.encode(item).await?);
                    }
                    Value::Array(encoded)
                }
                Native::Map(entries) => {
                    let mut encoded = Map::new();
                    for (key, item) in entries {
                        encoded.insert(key, self.encode(item).await?);
                    }
                    Value::Object(encoded)
                }
                Native::Remote(handle) => {
                    let id = self.client.object_id(&handle).await?;
                    Value::String(id.0)
                }
                Native::Object(object) => self.encode_object(object).await?,
            };
            Ok(encoded)
        }
        .boxed()
    }

    /// An object's exposed fields, keyed by exposed name.
    async fn encode_object(&self, object: ObjectValue) -> Result<Value, EncodeError> {
        let module_type = self
            .module_type(object.type_name())
            .ok_or_else(|| EncodeError::UnknownObject(object.type_name().to_string()))?;

        let mut values = Vec::with_capacity(module_type.fields.len());
        for field in &module_type.fields {
            let value = (field.get)(object.instance())
                .ok_or_else(|| EncodeError::UnknownObject(object.type_name().to_string()))?;
            values.push((field.name.clone(), value));
        }
        drop(object);

        let mut encoded = Map::new();
        for (name, value) in values {
            encoded.insert(name, self.encode(value).await?);
        }
        Ok(Value::Object(encoded))
    }
}

/// Wire form of a value that needs no engine round trip.
///
/// Remote objects, module objects and tokens have no static form.
pub fn encode_static(value: Native) -> Option<Value> {
    match value {
        Native::Null => Some(Value::Null),
        Native::Bool(b) => Some(Value::Bool(b)),
        Native::Int(n) => int_value(n),
        Native::Float(f) => Number::from_f64(f).map(Value::Number),
        Native::String(s) => Some(Value::String(s)),
        Native::Enum { member, .. } => Some(Value::String(member)),
        Native::Scalar { value, .. } => Some(Value::String(value)),
        Native::Json(value) => Some(value),
        Native::List(items) => items
            .into_iter()
            .map(encode_static)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Native::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| encode_static(v).map(|v| (k, v)))
            .collect::<Option<Map<_, _>>>()
            .map(Value::Object),
        Native::Remote(_) | Native::Object(_) | Native::Token(_) => None,
    }
}

fn decode_int(value: &Value, width: IntWidth) -> Result<Native, DecodeError> {
    let number = if let Some(n) = value.as_i64() {
        n as i128
    } else if let Some(n) = value.as_u64() {
        n as i128
    } else if let Some(f) = value.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0) {
        f as i128
    } else {
        return Err(DecodeError::mismatch("integer", value));
    };

    if !width.contains(number) {
        return Err(DecodeError::OutOfRange {
            value: value.to_string(),
            target: width.name().to_string(),
        });
    }
    Ok(Native::Int(number))
}

/// JSON number for an integer, if it fits in `i64` or `u64`.
fn int_value(n: i128) -> Option<Value> {
    i64::try_from(n)
        .map(Value::from)
        .or_else(|_| u64::try_from(n).map(Value::from))
        .ok()
}

/// State entry for an exposed name, tolerating differently cased keys.
fn lookup<'v>(state: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    state.get(name).or_else(|| {
        state
            .iter()
            .find(|(key, _)| normalize_name(key) == name)
            .map(|(_, value)| value)
    })
}

pub(crate) fn constructor_error(type_name: &str, err: InvocationError) -> DecodeError {
    let source = match err {
        InvocationError::Failed(source) => source,
        other => anyhow::Error::new(other),
    };
    DecodeError::Constructor {
        type_name: type_name.to_string(),
        source,
    }
}
