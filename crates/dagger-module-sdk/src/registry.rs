//! Typed declaration of a module
//!
//! A [`Module`] lists the objects and enums the process exposes. Each object
//! is declared with an [`ObjectDecl`] carrying its functions, fields and
//! constructors; handlers are plain closures over the Rust type and are
//! erased here so the dispatcher can call them by name.
//!
//! ```rust,ignore
//! use dagger_module_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct Test;
//! module_object!(Test);
//!
//! pub fn module() -> Module {
//!     Module::new().object(
//!         ObjectDecl::<Test>::new().function(
//!             Function::new("hello")
//!                 .arg(Param::new::<String>("name"))
//!                 .handler(|_: &mut Test, args: &mut Args| {
//!                     let name: String = args.take("name")?;
//!                     Ok(format!("Hello, {}!", name))
//!                 }),
//!         ),
//!     )
//! }
//! ```

use crate::codec::encode_static;
use crate::error::{ArgumentError, ConvertError, InvocationError};
use crate::native::{
    CancellationToken, FromNative, IntoNative, ModuleEnum, ModuleObject, Native, NativeType,
    NativeTyped,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A type-erased object instance.
pub type Instance = Box<dyn Any + Send>;

pub(crate) type HandlerFn = Arc<dyn Fn(Instance, Args) -> CallOutcome + Send + Sync>;
pub(crate) type ConstructorFn =
    Arc<dyn Fn(Args) -> std::result::Result<Instance, InvocationError> + Send + Sync>;
pub(crate) type FactoryFn =
    Arc<dyn Fn() -> std::result::Result<Instance, InvocationError> + Send + Sync>;
pub(crate) type GetterFn = Arc<dyn Fn(&(dyn Any + Send)) -> Option<Native> + Send + Sync>;
pub(crate) type SetterFn = Arc<
    dyn Fn(&mut (dyn Any + Send), Native) -> std::result::Result<(), ConvertError> + Send + Sync,
>;

/// Result of calling a handler: either already complete or still running.
pub enum CallOutcome {
    Ready(std::result::Result<Native, InvocationError>),
    Pending(BoxFuture<'static, std::result::Result<Native, InvocationError>>),
}

impl CallOutcome {
    /// Wait for the handler's result.
    pub async fn resolve(self) -> std::result::Result<Native, InvocationError> {
        match self {
            CallOutcome::Ready(result) => result,
            CallOutcome::Pending(future) => future.await,
        }
    }
}

/// How a function produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncShape {
    /// Returns directly
    None,
    /// Always completes asynchronously
    Future,
    /// May hand back an already-completed result
    MaybeReady,
}

/// A result that may already be available.
pub enum MaybeReady<R> {
    Ready(anyhow::Result<R>),
    Pending(BoxFuture<'static, anyhow::Result<R>>),
}

impl<R> MaybeReady<R> {
    pub fn ready(value: R) -> Self {
        MaybeReady::Ready(Ok(value))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        MaybeReady::Pending(Box::pin(future))
    }
}

/// Caching directive for a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Leave caching to the engine
    #[default]
    Default,
    /// Never cache results
    Never,
    /// Cache for the lifetime of the client session
    PerSession,
    /// Cache for the given duration
    Ttl(Duration),
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn settle<R: IntoNative>(
    result: std::thread::Result<anyhow::Result<R>>,
) -> std::result::Result<Native, InvocationError> {
    match result {
        Ok(Ok(value)) => Ok(value.into_native()),
        Ok(Err(err)) => Err(InvocationError::Failed(err)),
        Err(payload) => Err(InvocationError::Panicked(panic_message(payload))),
    }
}

fn downcast_receiver<T: ModuleObject>(
    instance: Instance,
) -> std::result::Result<Box<T>, InvocationError> {
    instance
        .downcast::<T>()
        .map_err(|_| InvocationError::Receiver(T::NAME.to_string()))
}

/// Decoded arguments of one call, keyed by declared parameter name.
#[derive(Debug, Default)]
pub struct Args {
    values: IndexMap<String, Native>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Native) {
        self.values.insert(name.into(), value);
    }

    /// Remove an argument and convert it to the requested type.
    pub fn take<V: FromNative>(&mut self, name: &str) -> std::result::Result<V, ArgumentError> {
        let value = self
            .values
            .shift_remove(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
        V::from_native(value).map_err(|source| ArgumentError::Convert {
            name: name.to_string(),
            source,
        })
    }

    /// The call's cancellation token.
    pub fn token(&self) -> CancellationToken {
        CancellationToken::never()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A declared function or constructor parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) name: String,
    pub(crate) native_type: NativeType,
    pub(crate) description: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) default_value: Option<serde_json::Value>,
    pub(crate) optional: bool,
    pub(crate) ignore: bool,
    pub(crate) default_path: Option<String>,
    pub(crate) ignore_patterns: Vec<String>,
}

impl Param {
    pub fn new<V: NativeTyped>(name: impl Into<String>) -> Self {
        Self::of_type(name, V::native_type())
    }

    pub fn of_type(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
            description: None,
            doc: None,
            default_value: None,
            optional: false,
            ignore: false,
            default_path: None,
            ignore_patterns: Vec::new(),
        }
    }

    /// Static default used when the caller omits the argument.
    ///
    /// Only primitives, enums, scalars and lists of those have a static
    /// form; other defaults are dropped with a warning.
    pub fn default<V: IntoNative>(mut self, value: V) -> Self {
        match encode_static(value.into_native()) {
            Some(json) => self.default_value = Some(json),
            None => warn!(param = %self.name, "Default value has no static form; ignoring it"),
        }
        self
    }

    /// Mark the parameter optional without giving it a default.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Keep the parameter out of the engine schema.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Default path for directory and file arguments.
    pub fn default_path(mut self, path: impl Into<String>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    /// Ignore globs for directory arguments.
    pub fn ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Whether the engine may omit this argument.
    pub fn is_optional(&self) -> bool {
        self.native_type.is_nullable() || self.default_value.is_some() || self.optional
    }
}

pub(crate) struct FunctionEntry {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) deprecated: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) cache: CachePolicy,
    pub(crate) params: Vec<Param>,
    pub(crate) returns: Option<NativeType>,
    pub(crate) shape: AsyncShape,
    pub(crate) handler: Option<HandlerFn>,
}

/// A function declared on object `T`.
pub struct Function<T> {
    entry: FunctionEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Function<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entry: FunctionEntry {
                name: name.into(),
                description: None,
                doc: None,
                deprecated: None,
                ignore: false,
                cache: CachePolicy::Default,
                params: Vec::new(),
                returns: None,
                shape: AsyncShape::None,
                handler: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.entry.description = Some(description.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.entry.doc = Some(doc.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.entry.deprecated = Some(reason.into());
        self
    }

    /// Keep the function out of the engine schema.
    pub fn ignore(mut self) -> Self {
        self.entry.ignore = true;
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.entry.cache = policy;
        self
    }

    pub fn arg(mut self, param: Param) -> Self {
        self.entry.params.push(param);
        self
    }
}

impl<T: ModuleObject> Function<T> {
    /// Synchronous handler.
    pub fn handler<R, F>(mut self, f: F) -> Self
    where
        R: NativeTyped + IntoNative,
        F: Fn(&mut T, &mut Args) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.entry.returns = Some(R::native_type());
        self.entry.shape = AsyncShape::None;
        self.entry.handler = Some(Arc::new(move |instance: Instance, mut args: Args| {
            let mut receiver = match downcast_receiver::<T>(instance) {
                Ok(receiver) => receiver,
                Err(err) => return CallOutcome::Ready(Err(err)),
            };
            CallOutcome::Ready(settle(catch_unwind(AssertUnwindSafe(|| {
                f(&mut *receiver, &mut args)
            }))))
        }));
        self
    }

    /// Handler returning a future; the receiver is moved into it.
    pub fn handler_async<R, F, Fut>(mut self, f: F) -> Self
    where
        R: NativeTyped + IntoNative + 'static,
        F: Fn(T, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        self.entry.returns = Some(R::native_type());
        self.entry.shape = AsyncShape::Future;
        self.entry.handler = Some(Arc::new(move |instance: Instance, args: Args| {
            let receiver = match downcast_receiver::<T>(instance) {
                Ok(receiver) => receiver,
                Err(err) => return CallOutcome::Ready(Err(err)),
            };
            let future = match catch_unwind(AssertUnwindSafe(|| f(*receiver, args))) {
                Ok(future) => future,
                Err(payload) => {
                    return CallOutcome::Ready(Err(InvocationError::Panicked(panic_message(
                        payload,
                    ))));
                }
            };
            CallOutcome::Pending(
                async move { settle(AssertUnwindSafe(future).catch_unwind().await) }.boxed(),
            )
        }));
        self
    }

    /// Handler that may complete without suspending.
    pub fn handler_maybe_ready<R, F>(mut self, f: F) -> Self
    where
        R: NativeTyped + IntoNative + 'static,
        F: Fn(T, Args) -> MaybeReady<R> + Send + Sync + 'static,
    {
        self.entry.returns = Some(R::native_type());
        self.entry.shape = AsyncShape::MaybeReady;
        self.entry.handler = Some(Arc::new(move |instance: Instance, args: Args| {
            let receiver = match downcast_receiver::<T>(instance) {
                Ok(receiver) => receiver,
                Err(err) => return CallOutcome::Ready(Err(err)),
            };
            match catch_unwind(AssertUnwindSafe(|| f(*receiver, args))) {
                Ok(MaybeReady::Ready(result)) => CallOutcome::Ready(settle(Ok(result))),
                Ok(MaybeReady::Pending(future)) => CallOutcome::Pending(
                    async move { settle(AssertUnwindSafe(future).catch_unwind().await) }.boxed(),
                ),
                Err(payload) => {
                    CallOutcome::Ready(Err(InvocationError::Panicked(panic_message(payload))))
                }
            }
        }));
        self
    }
}

pub(crate) struct FieldEntry {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) deprecated: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) native_type: NativeType,
    pub(crate) get: GetterFn,
    pub(crate) set: SetterFn,
}

/// A field of object `T`: part of its serialized state and readable by the
/// engine without a function call.
pub struct Field<T> {
    entry: FieldEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ModuleObject> Field<T> {
    pub fn new<V, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        V: NativeTyped + IntoNative + FromNative,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let getter: GetterFn = Arc::new(move |instance: &(dyn Any + Send)| {
            instance.downcast_ref::<T>().map(|t| get(t).into_native())
        });
        let setter: SetterFn = Arc::new(move |instance: &mut (dyn Any + Send), value: Native| {
            let target = instance
                .downcast_mut::<T>()
                .ok_or_else(|| ConvertError::mismatch(T::NAME, "foreign instance"))?;
            set(target, V::from_native(value)?);
            Ok(())
        });
        Self {
            entry: FieldEntry {
                name: name.into(),
                description: None,
                doc: None,
                deprecated: None,
                ignore: false,
                native_type: V::native_type(),
                get: getter,
                set: setter,
            },
            _marker: PhantomData,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.entry.description = Some(description.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.entry.doc = Some(doc.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.entry.deprecated = Some(reason.into());
        self
    }

    /// Keep the field out of the engine schema and the serialized state.
    pub fn ignore(mut self) -> Self {
        self.entry.ignore = true;
        self
    }
}

pub(crate) struct ConstructorEntry {
    pub(crate) params: Vec<Param>,
    pub(crate) build: ConstructorFn,
}

/// A constructor of object `T`.
pub struct Constructor<T> {
    entry: ConstructorEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ModuleObject> Constructor<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Args) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let build: ConstructorFn = Arc::new(move |mut args: Args| {
            match catch_unwind(AssertUnwindSafe(|| f(&mut args))) {
                Ok(Ok(value)) => Ok(Box::new(value) as Instance),
                Ok(Err(err)) => Err(InvocationError::Failed(err)),
                Err(payload) => Err(InvocationError::Panicked(panic_message(payload))),
            }
        });
        Self {
            entry: ConstructorEntry {
                params: Vec::new(),
                build,
            },
            _marker: PhantomData,
        }
    }

    pub fn arg(mut self, param: Param) -> Self {
        self.entry.params.push(param);
        self
    }
}

pub(crate) struct ObjectEntry {
    pub(crate) native_name: &'static str,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) deprecated: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) factory: Option<FactoryFn>,
    pub(crate) constructors: Vec<ConstructorEntry>,
    pub(crate) functions: Vec<FunctionEntry>,
    pub(crate) fields: Vec<FieldEntry>,
}

/// Declaration of object `T`.
pub struct ObjectDecl<T> {
    entry: ObjectEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ModuleObject + Default> ObjectDecl<T> {
    /// Declare `T`, constructed with `Default` when no constructor applies.
    pub fn new() -> Self {
        Self::without_default().factory(T::default)
    }
}

impl<T: ModuleObject + Default> Default for ObjectDecl<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ModuleObject> ObjectDecl<T> {
    /// Declare `T` with no parameterless construction.
    pub fn without_default() -> Self {
        Self {
            entry: ObjectEntry {
                native_name: T::NAME,
                name: None,
                description: None,
                doc: None,
                deprecated: None,
                hidden: false,
                factory: None,
                constructors: Vec::new(),
                functions: Vec::new(),
                fields: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Parameterless construction.
    pub fn factory<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.entry.factory = Some(Arc::new(move || Ok(Box::new(f()) as Instance)));
        self
    }

    /// Expose the object under a different name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.entry.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.entry.description = Some(description.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.entry.doc = Some(doc.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.entry.deprecated = Some(reason.into());
        self
    }

    /// Declare the type without exposing it to the engine.
    pub fn hidden(mut self) -> Self {
        self.entry.hidden = true;
        self
    }

    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.entry.constructors.push(constructor.entry);
        self
    }

    pub fn function(mut self, function: Function<T>) -> Self {
        self.entry.functions.push(function.entry);
        self
    }

    pub fn field(mut self, field: Field<T>) -> Self {
        self.entry.fields.push(field.entry);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EnumMemberDecl {
    pub(crate) name: &'static str,
    pub(crate) value: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) deprecated: Option<String>,
}

/// Declaration of a module enum.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub(crate) native_name: &'static str,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) members: Vec<EnumMemberDecl>,
}

impl EnumDecl {
    /// Declare enum `E` with all of its members.
    pub fn of<E: ModuleEnum>() -> Self {
        Self {
            native_name: E::NAME,
            name: None,
            description: None,
            doc: None,
            hidden: false,
            members: E::members()
                .iter()
                .map(|m| EnumMemberDecl {
                    name: m.member_name(),
                    value: None,
                    description: None,
                    deprecated: None,
                })
                .collect(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Declare the enum without exposing it to the engine.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Wire value of a member; defaults to the member name.
    pub fn member_value(self, member: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.with_member(member, |m| m.value = Some(value))
    }

    pub fn member_description(self, member: &str, description: impl Into<String>) -> Self {
        let description = description.into();
        self.with_member(member, |m| m.description = Some(description))
    }

    pub fn member_deprecated(self, member: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.with_member(member, |m| m.deprecated = Some(reason))
    }

    fn with_member(mut self, member: &str, f: impl FnOnce(&mut EnumMemberDecl)) -> Self {
        match self.members.iter_mut().find(|m| m.name == member) {
            Some(decl) => f(decl),
            None => warn!(enum_name = self.native_name, member, "No such enum member"),
        }
        self
    }
}

/// The full declaration of a module: every object and enum it knows about.
#[derive(Default)]
pub struct Module {
    pub(crate) description: Option<String>,
    pub(crate) objects: Vec<ObjectEntry>,
    pub(crate) enums: Vec<EnumDecl>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn object<T: ModuleObject>(mut self, decl: ObjectDecl<T>) -> Self {
        self.objects.push(decl.entry);
        self
    }

    pub fn enumeration(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Default)]
    struct Counter {
        count: i32,
    }

    crate::module_object!(Counter);

    crate::module_enum! {
        enum Level {
            LOW,
            HIGH,
        }
    }

    fn bump() -> Function<Counter> {
        Function::new("bump")
            .arg(Param::new::<i32>("by").default(1))
            .handler(|counter: &mut Counter, args: &mut Args| {
                counter.count += args.take::<i32>("by")?;
                Ok(counter.count)
            })
    }

    fn call(function: &FunctionEntry, instance: Counter, args: Args) -> CallOutcome {
        let handler = function.handler.as_ref().unwrap();
        handler(Box::new(instance) as Instance, args)
    }

    #[rstest]
    #[case(Param::new::<String>("a"), false)]
    #[case(Param::new::<Option<String>>("a"), true)]
    #[case(Param::new::<i32>("a").default(10), true)]
    #[case(Param::new::<String>("a").optional(), true)]
    #[case(Param::new::<Option<String>>("a").default("x"), true)]
    #[case(Param::new::<Option<String>>("a").optional(), true)]
    #[case(Param::new::<i32>("a").default(10).optional(), true)]
    #[case(Param::new::<Option<i32>>("a").default(10).optional(), true)]
    fn test_param_optionality(#[case] param: Param, #[case] optional: bool) {
        assert_eq!(param.is_optional(), optional);
    }

    #[test]
    fn test_param_default_is_static_json() {
        let param = Param::new::<Level>("level").default(Level::HIGH);
        assert_eq!(param.default_value, Some(serde_json::json!("HIGH")));

        let param = Param::new::<u64>("n").default(u64::MAX);
        assert_eq!(param.default_value, Some(serde_json::json!(u64::MAX)));
    }

    #[tokio::test]
    async fn test_sync_handler_runs_on_instance() {
        let function = bump().entry;
        assert_eq!(function.returns, Some(NativeType::Int(crate::native::IntWidth::I32)));

        let mut args = Args::new();
        args.insert("by", Native::Int(5));
        let result = call(&function, Counter { count: 2 }, args).resolve().await.unwrap();
        assert!(matches!(result, Native::Int(7)));
    }

    #[tokio::test]
    async fn test_handler_panic_is_caught() {
        let function = Function::<Counter>::new("explode")
            .handler(|_: &mut Counter, _: &mut Args| -> anyhow::Result<()> {
                panic!("kaboom")
            })
            .entry;

        let err = call(&function, Counter::default(), Args::new())
            .resolve()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Function panicked: kaboom");
    }

    #[tokio::test]
    async fn test_async_handler_is_pending() {
        let function = Function::<Counter>::new("later")
            .handler_async(|counter: Counter, _args: Args| async move {
                Ok(counter.count * 2)
            })
            .entry;
        assert_eq!(function.shape, AsyncShape::Future);

        let outcome = call(&function, Counter { count: 21 }, Args::new());
        assert!(matches!(outcome, CallOutcome::Pending(_)));
        assert!(matches!(outcome.resolve().await.unwrap(), Native::Int(42)));
    }

    #[tokio::test]
    async fn test_maybe_ready_handler_completes_inline() {
        let function = Function::<Counter>::new("now")
            .handler_maybe_ready(|counter: Counter, _args: Args| MaybeReady::ready(counter.count))
            .entry;

        let outcome = call(&function, Counter { count: 3 }, Args::new());
        assert!(matches!(outcome, CallOutcome::Ready(Ok(Native::Int(3)))));
    }

    #[test]
    fn test_field_accessors_use_instance() {
        let field = Field::new(
            "count",
            |c: &Counter| c.count,
            |c: &mut Counter, v| c.count = v,
        )
        .entry;

        let mut instance: Instance = Box::new(Counter { count: 4 });
        assert!(matches!((field.get)(&*instance), Some(Native::Int(4))));

        (field.set)(&mut *instance, Native::Int(9)).unwrap();
        assert!(matches!((field.get)(&*instance), Some(Native::Int(9))));
    }

    #[test]
    fn test_args_take_reports_missing() {
        let mut args = Args::new();
        let err = args.take::<String>("name").unwrap_err();
        assert_eq!(err.to_string(), "Argument 'name' was not provided");
    }

    #[test]
    fn test_enum_decl_member_value() {
        let decl = EnumDecl::of::<Level>().member_value("LOW", "low");
        assert_eq!(decl.members[0].value.as_deref(), Some("low"));
        assert_eq!(decl.members[1].value, None);
    }
}
