//! Registration phase: describe the module to the engine.

use super::ModuleContext;
use crate::discovery::{
    EnumType, FieldMeta, FunctionMeta, ModuleType, ParameterMeta, discover_enum_types,
    discover_module_types,
};
use crate::docs::DocIndex;
use crate::error::{DiscoveryError, ModuleError};
use crate::mapper::map_type;
use crate::native::NativeType;
use crate::registry::{CachePolicy, Module};
use dagger_module_core::{
    ArgDef, CachePolicyKind, EnumDef, EnumMemberDef, FieldDef, FunctionCachePolicy, FunctionDef,
    ModuleDef, ModuleId, ObjectDef, TypeDescriptor,
};
use std::collections::HashMap;
use tracing::debug;

pub(super) async fn register(ctx: &ModuleContext) -> Result<ModuleId, ModuleError> {
    let def = build_module_def(&ctx.module, &ctx.docs)?;
    debug!(
        objects = def.objects.len(),
        enums = def.enums.len(),
        "Submitting module definition"
    );
    Ok(ctx.client.register_module(&def).await?)
}

/// Build the definition submitted during registration.
pub fn build_module_def(module: &Module, docs: &DocIndex) -> Result<ModuleDef, ModuleError> {
    let types = discover_module_types(module, docs)?;
    let enums = discover_enum_types(module, docs)?;
    let linker = Linker::new(&types, &enums);

    let objects = types
        .iter()
        .map(|t| object_def(t, &linker))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModuleDef {
        description: module.description.clone(),
        objects,
        enums: enums.iter().map(enum_def).collect(),
    })
}

/// Rewrites native type names to the names the engine knows them by.
struct Linker<'a> {
    objects: HashMap<&'a str, &'a str>,
    enums: HashMap<&'a str, &'a str>,
}

impl<'a> Linker<'a> {
    fn new(types: &'a [ModuleType], enums: &'a [EnumType]) -> Self {
        Self {
            objects: types
                .iter()
                .map(|t| (t.native_name.as_str(), t.name.as_str()))
                .collect(),
            enums: enums
                .iter()
                .map(|e| (e.native_name.as_str(), e.name.as_str()))
                .collect(),
        }
    }

    fn link(&self, ty: &NativeType) -> Result<NativeType, DiscoveryError> {
        Ok(match ty {
            NativeType::Object(name) => NativeType::Object(
                self.objects
                    .get(name.as_str())
                    .ok_or_else(|| DiscoveryError::UnknownObject(name.clone()))?
                    .to_string(),
            ),
            NativeType::Enum(name) => NativeType::Enum(
                self.enums
                    .get(name.as_str())
                    .ok_or_else(|| DiscoveryError::UnknownEnum(name.clone()))?
                    .to_string(),
            ),
            NativeType::Nullable(inner) => NativeType::Nullable(Box::new(self.link(inner)?)),
            NativeType::List(inner) => NativeType::List(Box::new(self.link(inner)?)),
            NativeType::Map(inner) => NativeType::Map(Box::new(self.link(inner)?)),
            other => other.clone(),
        })
    }

    fn type_def(&self, ty: &NativeType) -> Result<(TypeDescriptor, bool), ModuleError> {
        Ok(map_type(&self.link(ty)?)?)
    }
}

fn object_def(module_type: &ModuleType, linker: &Linker<'_>) -> Result<ObjectDef, ModuleError> {
    let mut def = ObjectDef::new(module_type.name.clone());
    def.description = module_type.description.clone();
    def.deprecated = module_type.deprecated.clone();

    if let Some(constructor) = &module_type.constructor {
        let mut function = FunctionDef::new("", TypeDescriptor::object(module_type.name.clone()));
        function.args = arg_defs(constructor.params.iter().filter(|p| p.exposed), linker)?;
        def.constructor = Some(function);
    }

    def.fields = module_type
        .fields
        .iter()
        .map(|f| field_def(f, linker))
        .collect::<Result<_, _>>()?;
    def.functions = module_type
        .functions
        .iter()
        .map(|f| function_def(f, linker))
        .collect::<Result<_, _>>()?;
    Ok(def)
}

fn field_def(field: &FieldMeta, linker: &Linker<'_>) -> Result<FieldDef, ModuleError> {
    let (type_def, nullable) = linker.type_def(&field.native_type)?;
    Ok(FieldDef {
        name: field.name.clone(),
        type_def: type_def.with_optional(nullable),
        description: field.description.clone(),
        deprecated: field.deprecated.clone(),
    })
}

fn function_def(function: &FunctionMeta, linker: &Linker<'_>) -> Result<FunctionDef, ModuleError> {
    let (return_type, nullable) = linker.type_def(&function.return_type)?;
    let optional = return_type.optional || nullable;

    let mut def = FunctionDef::new(function.name.clone(), return_type.with_optional(optional));
    def.description = function.description.clone();
    def.deprecated = function.deprecated.clone();
    def.cache_policy = cache_policy(function.cache);
    def.args = arg_defs(function.exposed_params(), linker)?;
    Ok(def)
}

fn arg_defs<'p>(
    params: impl Iterator<Item = &'p ParameterMeta>,
    linker: &Linker<'_>,
) -> Result<Vec<ArgDef>, ModuleError> {
    params
        .map(|param| {
            let (type_def, nullable) = linker.type_def(&param.native_type)?;
            Ok(ArgDef {
                name: param.name.clone(),
                type_def: type_def.with_optional(param.optional || nullable),
                description: param.description.clone(),
                default_value: param.default_value.clone(),
                default_path: param.default_path.clone(),
                ignore: param.ignore.clone(),
            })
        })
        .collect()
}

fn cache_policy(cache: CachePolicy) -> Option<FunctionCachePolicy> {
    let (policy, time_to_live) = match cache {
        CachePolicy::Default => return None,
        CachePolicy::Never => (CachePolicyKind::Never, None),
        CachePolicy::PerSession => (CachePolicyKind::PerSession, None),
        CachePolicy::Ttl(ttl) => {
            // Whole seconds on the wire; partial seconds round up
            let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
            (CachePolicyKind::Default, Some(format!("{}s", secs)))
        }
    };
    Some(FunctionCachePolicy {
        policy,
        time_to_live,
    })
}

fn enum_def(enum_type: &EnumType) -> EnumDef {
    EnumDef {
        name: enum_type.name.clone(),
        description: enum_type.description.clone(),
        members: enum_type
            .values
            .iter()
            .map(|v| EnumMemberDef {
                name: v.name.clone(),
                value: v.value.clone(),
                description: v.description.clone(),
                deprecated: v.deprecated.clone(),
            })
            .collect(),
    }
}
