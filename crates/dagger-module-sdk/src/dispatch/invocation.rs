//! Invocation phase: run one function or constructor.

use super::ModuleContext;
use crate::codec::{Codec, constructor_error};
use crate::discovery::{
    ModuleType, ParameterMeta, discover_enum_types, discover_module_types, normalize_name,
};
use crate::error::{DecodeError, ModuleError};
use crate::native::{Native, ObjectValue};
use dagger_module_core::FunctionCall;
use serde_json::{Map, Value};
use tracing::debug;

pub(super) async fn invoke(ctx: &ModuleContext, call: &FunctionCall) -> Result<Value, ModuleError> {
    let enums = discover_enum_types(&ctx.module, &ctx.docs)?;
    let types = discover_module_types(&ctx.module, &ctx.docs)?;
    let codec = Codec::new(ctx.client.as_ref(), &types, &enums);

    let module_type = types
        .iter()
        .find(|t| t.name == call.parent_name)
        .ok_or_else(|| ModuleError::UnknownType(call.parent_name.clone()))?;

    if call.is_constructor() {
        return construct(&codec, module_type, call).await;
    }

    let function = module_type
        .function(&call.name)
        .or_else(|| module_type.function(&normalize_name(&call.name)))
        .ok_or_else(|| ModuleError::UnknownFunction {
            type_name: module_type.name.clone(),
            function: call.name.clone(),
        })?;

    let empty = Map::new();
    let state = match &call.parent {
        Value::Object(state) => state,
        Value::Null => &empty,
        other => return Err(DecodeError::mismatch(&module_type.name, other).into()),
    };
    let receiver = codec.instantiate(module_type, state).await?;
    let args = codec.decode_params(inputs(&function.params, call)).await?;

    debug!(
        object = %module_type.name,
        function = %function.name,
        args = args.len(),
        "Calling handler"
    );
    let result = (function.handler)(receiver.into_instance(), args)
        .resolve()
        .await?;

    if function.returns_void() {
        return Ok(Value::Null);
    }
    Ok(codec.encode(result).await?)
}

/// Constructor-only call: build a fresh instance from the input arguments.
async fn construct(
    codec: &Codec<'_>,
    module_type: &ModuleType,
    call: &FunctionCall,
) -> Result<Value, ModuleError> {
    let instance = match &module_type.constructor {
        Some(constructor) => {
            let args = codec.decode_params(inputs(&constructor.params, call)).await?;
            (constructor.build)(args).map_err(|err| constructor_error(&module_type.name, err))?
        }
        None => {
            let factory = module_type
                .factory
                .as_ref()
                .ok_or_else(|| DecodeError::NoConstructor(module_type.name.clone()))?;
            factory().map_err(|err| constructor_error(&module_type.name, err))?
        }
    };

    let object = ObjectValue::from_boxed(module_type.native_name.clone(), instance);
    Ok(codec.encode(Native::Object(object)).await?)
}

/// Pair each parameter with the value the engine sent for it.
///
/// Parameters the engine does not know about never take a wire value.
fn inputs<'a>(
    params: &'a [ParameterMeta],
    call: &'a FunctionCall,
) -> Vec<(&'a ParameterMeta, Option<&'a Value>)> {
    params
        .iter()
        .map(|param| {
            let raw = if param.exposed {
                call.input_arg(&param.name)
            } else {
                None
            };
            (param, raw)
        })
        .collect()
}
