//! Metadata discovery over the declared module.
//!
//! Turns the declarations of a [`Module`] into the normalised metadata the
//! dispatcher registers and invokes: exposed names, descriptions, resolved
//! constructors and the erased handlers behind them.

use crate::docs::{DocIndex, first_sentence};
use crate::error::DiscoveryError;
use crate::native::NativeType;
use crate::registry::{
    Args, AsyncShape, CachePolicy, ConstructorEntry, ConstructorFn, EnumDecl, FactoryFn,
    FieldEntry, FunctionEntry, GetterFn, HandlerFn, Module, ObjectEntry, Param, SetterFn,
};
use convert_case::{Case, Casing};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// An object exposed to the engine.
pub struct ModuleType {
    pub name: String,
    pub native_name: String,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub constructor: Option<ConstructorMeta>,
    pub functions: Vec<FunctionMeta>,
    pub fields: Vec<FieldMeta>,
    pub(crate) factory: Option<FactoryFn>,
}

impl ModuleType {
    pub fn function(&self, name: &str) -> Option<&FunctionMeta> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The resolved parameterised constructor of an object.
pub struct ConstructorMeta {
    pub params: Vec<ParameterMeta>,
    pub(crate) build: ConstructorFn,
}

pub struct FunctionMeta {
    pub name: String,
    pub native_name: String,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub cache: CachePolicy,
    pub return_type: NativeType,
    pub shape: AsyncShape,
    pub params: Vec<ParameterMeta>,
    pub(crate) handler: HandlerFn,
}

impl FunctionMeta {
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Parameters the engine knows about, in declaration order.
    pub fn exposed_params(&self) -> impl Iterator<Item = &ParameterMeta> {
        self.params.iter().filter(|p| p.exposed)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub name: String,
    pub native_name: String,
    pub description: Option<String>,
    pub native_type: NativeType,
    pub optional: bool,
    pub default_value: Option<serde_json::Value>,
    pub default_path: Option<String>,
    pub ignore: Vec<String>,
    /// False for ignored parameters and the cancellation token
    pub exposed: bool,
}

impl ParameterMeta {
    pub fn is_cancellation_token(&self) -> bool {
        self.native_type.is_cancellation_token()
    }
}

pub struct FieldMeta {
    pub name: String,
    pub native_name: String,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub native_type: NativeType,
    pub(crate) get: GetterFn,
    pub(crate) set: SetterFn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub native_name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Literal member name, not case converted
    pub name: String,
    pub value: String,
    pub description: Option<String>,
    pub deprecated: Option<String>,
}

/// Exposed name of a function, field or parameter.
pub fn normalize_name(name: &str) -> String {
    name.to_case(Case::Camel)
}

fn describe(
    explicit: &Option<String>,
    doc: &Option<String>,
    docs: &DocIndex,
    key: &str,
) -> Option<String> {
    explicit
        .clone()
        .or_else(|| doc.as_deref().and_then(first_sentence))
        .or_else(|| docs.summary(key))
}

/// Discover the objects the module exposes.
pub fn discover_module_types(
    module: &Module,
    docs: &DocIndex,
) -> Result<Vec<ModuleType>, DiscoveryError> {
    if module.objects.is_empty() {
        return Err(DiscoveryError::EmptyRegistry);
    }

    let mut seen = HashSet::new();
    let mut types = Vec::new();
    for entry in module.objects.iter().filter(|o| !o.hidden) {
        let module_type = discover_object(entry, docs)?;
        if module_type.functions.is_empty() && module_type.fields.is_empty() {
            debug!(
                object = %module_type.native_name,
                "Object has no functions or fields; not exposed"
            );
            continue;
        }
        if !seen.insert(module_type.name.clone()) {
            return Err(DiscoveryError::DuplicateType(module_type.name));
        }
        types.push(module_type);
    }

    debug!(count = types.len(), "Discovered module types");
    Ok(types)
}

/// Discover the enums the module exposes.
pub fn discover_enum_types(
    module: &Module,
    docs: &DocIndex,
) -> Result<Vec<EnumType>, DiscoveryError> {
    let mut seen = HashSet::new();
    let mut enums = Vec::new();
    for decl in module.enums.iter().filter(|e| !e.hidden) {
        let enum_type = discover_enum(decl, docs);
        if !seen.insert(enum_type.name.clone()) {
            return Err(DiscoveryError::DuplicateType(enum_type.name));
        }
        enums.push(enum_type);
    }
    Ok(enums)
}

fn discover_enum(decl: &EnumDecl, docs: &DocIndex) -> EnumType {
    let native_name = decl.native_name.to_string();
    let values = decl
        .members
        .iter()
        .map(|member| EnumValue {
            name: member.name.to_string(),
            value: member
                .value
                .clone()
                .unwrap_or_else(|| member.name.to_string()),
            description: member
                .description
                .clone()
                .or_else(|| docs.summary(&format!("{}.{}", native_name, member.name))),
            deprecated: member.deprecated.clone(),
        })
        .collect();

    EnumType {
        name: decl.name.clone().unwrap_or_else(|| native_name.clone()),
        description: describe(&decl.description, &decl.doc, docs, &native_name),
        native_name,
        values,
    }
}

fn discover_object(entry: &ObjectEntry, docs: &DocIndex) -> Result<ModuleType, DiscoveryError> {
    let native_name = entry.native_name.to_string();
    let name = entry.name.clone().unwrap_or_else(|| native_name.clone());

    let mut functions = Vec::new();
    let mut function_names = HashSet::new();
    for function in &entry.functions {
        if let Some(meta) = discover_function(&native_name, function, docs) {
            if function_names.insert(meta.name.clone()) {
                functions.push(meta);
            } else {
                warn!(
                    object = %native_name,
                    function = %meta.name,
                    "Duplicate function name; skipping"
                );
            }
        }
    }

    let mut fields = Vec::new();
    let mut field_names = HashSet::new();
    for field in entry.fields.iter().filter(|f| !f.ignore) {
        let meta = discover_field(&native_name, field, docs);
        if meta.name.is_empty() {
            warn!(object = %native_name, "Field without a name; skipping");
        } else if field_names.insert(meta.name.clone()) {
            fields.push(meta);
        } else {
            warn!(object = %native_name, field = %meta.name, "Duplicate field name; skipping");
        }
    }

    let (constructor, fallback) = resolve_constructor(&native_name, &entry.constructors, docs)?;

    Ok(ModuleType {
        description: describe(&entry.description, &entry.doc, docs, &native_name),
        deprecated: entry.deprecated.clone(),
        factory: entry.factory.clone().or(fallback),
        name,
        native_name,
        constructor,
        functions,
        fields,
    })
}

/// Pick the constructor with the most parameters.
///
/// Returns the parameterised constructor, if any, and a parameterless
/// fallback usable as a factory.
fn resolve_constructor(
    native_name: &str,
    constructors: &[ConstructorEntry],
    docs: &DocIndex,
) -> Result<(Option<ConstructorMeta>, Option<FactoryFn>), DiscoveryError> {
    let fallback = constructors
        .iter()
        .find(|c| c.params.is_empty())
        .map(|c| parameterless_factory(c.build.clone()));

    let Some(arity) = constructors.iter().map(|c| c.params.len()).max() else {
        return Ok((None, None));
    };
    if arity == 0 {
        return Ok((None, fallback));
    }

    let widest: Vec<_> = constructors.iter().filter(|c| c.params.len() == arity).collect();
    if widest.len() > 1 {
        return Err(DiscoveryError::AmbiguousConstructor {
            type_name: native_name.to_string(),
            arity,
            count: widest.len(),
        });
    }

    let chosen = widest[0];
    let doc_prefix = format!("{}.", native_name);
    let params = discover_params(&doc_prefix, &chosen.params, docs);
    Ok((
        Some(ConstructorMeta {
            params,
            build: chosen.build.clone(),
        }),
        fallback,
    ))
}

fn parameterless_factory(build: ConstructorFn) -> FactoryFn {
    Arc::new(move || build(Args::new()))
}

fn discover_function(
    native_name: &str,
    function: &FunctionEntry,
    docs: &DocIndex,
) -> Option<FunctionMeta> {
    if function.ignore {
        debug!(object = %native_name, function = %function.name, "Function ignored");
        return None;
    }
    if function.name.trim().is_empty() {
        warn!(object = %native_name, "Function without a name; skipping");
        return None;
    }
    let (Some(handler), Some(return_type)) = (&function.handler, &function.returns) else {
        warn!(
            object = %native_name,
            function = %function.name,
            "Function has no handler; skipping"
        );
        return None;
    };

    let key = format!("{}.{}", native_name, function.name);
    Some(FunctionMeta {
        name: normalize_name(&function.name),
        native_name: function.name.clone(),
        description: describe(&function.description, &function.doc, docs, &key),
        deprecated: function.deprecated.clone(),
        cache: function.cache,
        return_type: return_type.clone(),
        shape: function.shape,
        params: discover_params(&format!("{}.", key), &function.params, docs),
        handler: handler.clone(),
    })
}

fn discover_params(doc_prefix: &str, params: &[Param], docs: &DocIndex) -> Vec<ParameterMeta> {
    params
        .iter()
        .map(|param| {
            let key = format!("{}{}", doc_prefix, param.name);
            ParameterMeta {
                name: normalize_name(&param.name),
                native_name: param.name.clone(),
                description: describe(&param.description, &param.doc, docs, &key),
                native_type: param.native_type.clone(),
                optional: param.is_optional(),
                default_value: param.default_value.clone(),
                default_path: param.default_path.clone(),
                ignore: param.ignore_patterns.clone(),
                exposed: !param.ignore && !param.native_type.is_cancellation_token(),
            }
        })
        .collect()
}

fn discover_field(native_name: &str, field: &FieldEntry, docs: &DocIndex) -> FieldMeta {
    let key = format!("{}.{}", native_name, field.name);
    FieldMeta {
        name: normalize_name(&field.name),
        native_name: field.name.clone(),
        description: describe(&field.description, &field.doc, docs, &key),
        deprecated: field.deprecated.clone(),
        native_type: field.native_type.clone(),
        get: field.get.clone(),
        set: field.set.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::CancellationToken;
    use crate::registry::{Constructor, Field, Function, ObjectDecl};

    #[derive(Default)]
    struct Greeter {
        greeting: String,
    }

    crate::module_object!(Greeter);

    #[derive(Default)]
    struct Empty;

    crate::module_object!(Empty);

    crate::module_enum! {
        enum Mood {
            HAPPY,
            GRUMPY,
        }
    }

    fn greet() -> Function<Greeter> {
        Function::new("say_hello")
            .doc("Say hello to someone. The greeting is configurable.")
            .arg(Param::new::<String>("name"))
            .arg(Param::new::<CancellationToken>("token"))
            .handler(|g: &mut Greeter, args: &mut Args| {
                Ok(format!("{}, {}!", g.greeting, args.take::<String>("name")?))
            })
    }

    fn greeting_field() -> Field<Greeter> {
        Field::new(
            "greeting",
            |g: &Greeter| g.greeting.clone(),
            |g: &mut Greeter, v| g.greeting = v,
        )
    }

    fn build(greeting: &str) -> anyhow::Result<Greeter> {
        Ok(Greeter {
            greeting: greeting.to_string(),
        })
    }

    #[test]
    fn test_names_are_camel_cased() {
        let module = Module::new().object(ObjectDecl::<Greeter>::new().function(greet()));
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        let function = &types[0].functions[0];
        assert_eq!(function.name, "sayHello");
        assert_eq!(function.native_name, "say_hello");
        assert_eq!(function.description.as_deref(), Some("Say hello to someone."));
    }

    #[test]
    fn test_token_is_not_exposed() {
        let module = Module::new().object(ObjectDecl::<Greeter>::new().function(greet()));
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        let exposed: Vec<_> = types[0].functions[0]
            .exposed_params()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(exposed, vec!["name"]);
        assert_eq!(types[0].functions[0].params.len(), 2);
    }

    #[test]
    fn test_doc_index_fills_descriptions() {
        let mut docs = DocIndex::new();
        docs.insert("Greeter", "Greets people. Politely.");
        docs.insert("Greeter.say_hello.name", "Who to greet");

        let module = Module::new().object(
            ObjectDecl::<Greeter>::new().function(
                Function::new("say_hello")
                    .description("Explicit wins")
                    .arg(Param::new::<String>("name"))
                    .handler(|_: &mut Greeter, _: &mut Args| Ok(())),
            ),
        );
        let types = discover_module_types(&module, &docs).unwrap();

        assert_eq!(types[0].description.as_deref(), Some("Greets people."));
        let function = &types[0].functions[0];
        assert_eq!(function.description.as_deref(), Some("Explicit wins"));
        assert_eq!(function.params[0].description.as_deref(), Some("Who to greet"));
    }

    #[test]
    fn test_malformed_functions_are_skipped() {
        let module = Module::new().object(
            ObjectDecl::<Greeter>::new()
                .function(Function::new("noHandler"))
                .function(Function::new(""))
                .function(Function::new("hidden").ignore())
                .function(greet())
                .function(greet()),
        );
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        let names: Vec<_> = types[0].functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["sayHello"]);
    }

    #[test]
    fn test_types_without_members_are_dropped() {
        let module = Module::new()
            .object(ObjectDecl::<Empty>::new())
            .object(ObjectDecl::<Greeter>::new().field(greeting_field()));
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "Greeter");
        assert_eq!(types[0].fields[0].name, "greeting");
    }

    #[test]
    fn test_hidden_types_are_ignored() {
        let module =
            Module::new().object(ObjectDecl::<Greeter>::new().field(greeting_field()).hidden());
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();
        assert!(types.is_empty());
    }

    #[test]
    fn test_empty_registry_is_an_error() {
        let err = discover_module_types(&Module::new(), &DocIndex::new()).err().unwrap();
        assert!(matches!(err, DiscoveryError::EmptyRegistry));
    }

    #[test]
    fn test_widest_constructor_wins() {
        let module = Module::new().object(
            ObjectDecl::<Greeter>::new()
                .field(greeting_field())
                .constructor(Constructor::new(|_: &mut Args| build("Hi")))
                .constructor(
                    Constructor::new(|args: &mut Args| build(&args.take::<String>("greeting")?))
                        .arg(Param::new::<String>("greeting")),
                ),
        );
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        let constructor = types[0].constructor.as_ref().unwrap();
        assert_eq!(constructor.params.len(), 1);
        assert_eq!(constructor.params[0].name, "greeting");
    }

    #[test]
    fn test_parameterless_constructor_is_not_metadata() {
        let module = Module::new().object(
            ObjectDecl::<Greeter>::without_default()
                .field(greeting_field())
                .constructor(Constructor::new(|_: &mut Args| build("Hi"))),
        );
        let types = discover_module_types(&module, &DocIndex::new()).unwrap();

        assert!(types[0].constructor.is_none());
        assert!(types[0].factory.is_some());
    }

    #[test]
    fn test_ambiguous_constructors_fail() {
        let module = Module::new().object(
            ObjectDecl::<Greeter>::new()
                .field(greeting_field())
                .constructor(
                    Constructor::new(|args: &mut Args| build(&args.take::<String>("a")?))
                        .arg(Param::new::<String>("a")),
                )
                .constructor(
                    Constructor::new(|args: &mut Args| build(&args.take::<String>("b")?))
                        .arg(Param::new::<String>("b")),
                ),
        );
        let err = discover_module_types(&module, &DocIndex::new()).err().unwrap();
        assert!(matches!(
            err,
            DiscoveryError::AmbiguousConstructor { arity: 1, count: 2, .. }
        ));
    }

    #[test]
    fn test_enum_members_keep_their_names() {
        let module = Module::new()
            .enumeration(EnumDecl::of::<Mood>().member_value("GRUMPY", "grumpy"))
            .enumeration(EnumDecl::of::<Mood>().name("Hidden").hidden());
        let enums = discover_enum_types(&module, &DocIndex::new()).unwrap();

        assert_eq!(enums.len(), 1);
        assert_eq!(enums[0].name, "Mood");
        assert_eq!(enums[0].values[0].name, "HAPPY");
        assert_eq!(enums[0].values[0].value, "HAPPY");
        assert_eq!(enums[0].values[1].value, "grumpy");
    }

    #[test]
    fn test_duplicate_exposed_names_fail() {
        let module = Module::new()
            .enumeration(EnumDecl::of::<Mood>())
            .enumeration(EnumDecl::of::<Mood>());
        let err = discover_enum_types(&module, &DocIndex::new()).unwrap_err();
        assert!(matches!(err, DiscoveryError::DuplicateType(name) if name == "Mood"));
    }
}
