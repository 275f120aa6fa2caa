//! Example Dagger module
//!
//! Exercises the SDK end to end: plain arguments, defaults and optionals,
//! enums, lists, custom objects, engine objects, async results and errors.

use dagger_module_sdk::prelude::*;
use std::time::Duration;

/// The module's main object.
#[derive(Debug, Default)]
pub struct Test {
    pub name: String,
}

module_object!(Test);

/// A plain data object returned by value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CustomObject {
    pub value: String,
    pub count: i32,
}

module_object!(CustomObject);

module_scalar!(
    /// An OCI platform string such as `linux/amd64`
    pub Platform
);

module_enum! {
    /// Whether something is running
    pub enum Status {
        ACTIVE,
        INACTIVE,
    }
}

pub fn module() -> Module {
    Module::new()
        .description("Example module for the Rust SDK")
        .object(test_object())
        .object(custom_object())
        .enumeration(
            EnumDecl::of::<Status>()
                .member_description("ACTIVE", "Currently running")
                .member_description("INACTIVE", "Stopped"),
        )
}

fn test_object() -> ObjectDecl<Test> {
    ObjectDecl::<Test>::new()
        .description("Functions for exercising the module runtime")
        .field(Field::new(
            "name",
            |t: &Test| t.name.clone(),
            |t: &mut Test, v| t.name = v,
        ))
        .constructor(
            Constructor::new(|args: &mut Args| {
                Ok(Test {
                    name: args.take("name")?,
                })
            })
            .arg(Param::new::<String>("name").default("default")),
        )
        .function(
            Function::new("hello")
                .doc("Say hello to someone.")
                .arg(Param::new::<String>("name"))
                .handler(|_: &mut Test, args: &mut Args| {
                    Ok(format!("Hello, {}!", args.take::<String>("name")?))
                }),
        )
        .function(
            Function::new("greet")
                .arg(Param::new::<Option<String>>("greeting"))
                .handler(|t: &mut Test, args: &mut Args| {
                    let greeting: Option<String> = args.take("greeting")?;
                    Ok(format!("{}, {}!", greeting.as_deref().unwrap_or("Hi"), t.name))
                }),
        )
        .function(
            Function::new("echo")
                .arg(Param::new::<String>("message").default("default"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<String>("message").map_err(Into::into)
                }),
        )
        .function(
            Function::new("add")
                .description("Add two numbers")
                .arg(Param::new::<i32>("a"))
                .arg(Param::new::<i32>("b").default(10))
                .handler(|_: &mut Test, args: &mut Args| {
                    let a: i32 = args.take("a")?;
                    let b: i32 = args.take("b")?;
                    Ok(a + b)
                }),
        )
        .function(
            Function::new("get_status")
                .arg(Param::new::<bool>("active"))
                .handler(|_: &mut Test, args: &mut Args| {
                    Ok(if args.take::<bool>("active")? {
                        Status::ACTIVE
                    } else {
                        Status::INACTIVE
                    })
                }),
        )
        .function(
            Function::new("list_items")
                .arg(Param::new::<i32>("count").default(3))
                .handler(|_: &mut Test, args: &mut Args| {
                    let count: i32 = args.take("count")?;
                    Ok((1..=count).map(|i| format!("item-{}", i)).collect::<Vec<_>>())
                }),
        )
        .function(
            Function::new("default_platform")
                .handler(|_: &mut Test, _: &mut Args| Ok(Platform("linux/amd64".to_string()))),
        )
        .function(
            Function::new("get_name")
                .cache(CachePolicy::Never)
                .handler(|t: &mut Test, _: &mut Args| Ok(t.name.clone())),
        )
        .function(
            Function::new("create_custom")
                .arg(Param::new::<String>("value"))
                .arg(Param::new::<i32>("count").default(1))
                .handler(|_: &mut Test, args: &mut Args| {
                    Ok(CustomObject {
                        value: args.take("value")?,
                        count: args.take("count")?,
                    })
                }),
        )
        .function(
            Function::new("inspect")
                .doc("Return the container it was given.")
                .arg(Param::new::<Container>("ctr"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<Container>("ctr").map_err(Into::into)
                }),
        )
        .function(
            Function::new("throw_error").handler(
                |_: &mut Test, _: &mut Args| -> anyhow::Result<()> { anyhow::bail!("boom") },
            ),
        )
        .function(
            Function::new("async_method")
                .arg(Param::new::<CancellationToken>("token"))
                .handler_async(|_: Test, _: Args| async {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    anyhow::Ok(42)
                }),
        )
        .function(
            Function::new("quick_check")
                .arg(Param::new::<Option<String>>("input"))
                .handler_maybe_ready(|_: Test, mut args: Args| {
                    match args.take::<Option<String>>("input") {
                        Ok(Some(input)) => MaybeReady::ready(input.len() as i64),
                        Ok(None) => MaybeReady::pending(async { anyhow::Ok(0_i64) }),
                        Err(err) => MaybeReady::Ready(Err(err.into())),
                    }
                }),
        )
        .function(
            Function::new("done").handler(|_: &mut Test, _: &mut Args| Ok(())),
        )
}

fn custom_object() -> ObjectDecl<CustomObject> {
    ObjectDecl::<CustomObject>::new()
        .description("A custom object with two fields")
        .field(Field::new(
            "value",
            |c: &CustomObject| c.value.clone(),
            |c: &mut CustomObject, v| c.value = v,
        ))
        .field(Field::new(
            "count",
            |c: &CustomObject| c.count,
            |c: &mut CustomObject, v| c.count = v,
        ))
        .function(
            Function::new("describe")
                .handler(|c: &mut CustomObject, _: &mut Args| {
                    Ok(format!("{} x{}", c.value, c.count))
                }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagger_module_sdk::dispatch::build_module_def;
    use dagger_module_sdk::{DocIndex, MemoryClient, Outcome, serve};
    use dagger_module_sdk::TypeDefKind;
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn call(client: MemoryClient) -> (Outcome, Arc<MemoryClient>) {
        let client = Arc::new(client);
        let outcome = serve(module(), client.clone(), DocIndex::new()).await.unwrap();
        (outcome, client)
    }

    #[test]
    fn test_module_definition() {
        let def = build_module_def(&module(), &DocIndex::new()).unwrap();

        let test = def.object("Test").unwrap();
        let names: Vec<_> = test.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"getStatus"));
        assert!(names.contains(&"throwError"));
        assert_eq!(test.constructor.as_ref().unwrap().args[0].name, "name");
        assert!(test.function("asyncMethod").unwrap().args.is_empty());
        assert!(test.function("done").unwrap().return_type.optional);
        assert_eq!(def.enumeration("Status").unwrap().members.len(), 2);
        assert_eq!(
            test.function("defaultPlatform").unwrap().return_type.kind,
            TypeDefKind::Scalar {
                name: "Platform".into()
            }
        );
    }

    #[rstest]
    #[case("hello", json!({"name": "World"}), json!("Hello, World!"))]
    #[case("echo", json!({}), json!("default"))]
    #[case("add", json!({"a": 5}), json!(15))]
    #[case("getStatus", json!({"active": false}), json!("INACTIVE"))]
    #[case("listItems", json!({"count": 2}), json!(["item-1", "item-2"]))]
    #[case("defaultPlatform", json!({}), json!("linux/amd64"))]
    #[case("createCustom", json!({"value": "x"}), json!({"value": "x", "count": 1}))]
    #[case("asyncMethod", json!({}), json!(42))]
    #[case("quickCheck", json!({"input": "abcd"}), json!(4))]
    #[case("quickCheck", json!({}), json!(0))]
    #[case("done", json!({}), Value::Null)]
    #[tokio::test]
    async fn test_functions(#[case] function: &str, #[case] args: Value, #[case] expected: Value) {
        let mut client = MemoryClient::invocation("Test", function);
        if let Value::Object(args) = args {
            for (name, value) in args {
                client = client.arg(name, value);
            }
        }

        let (outcome, client) = call(client).await;
        assert_eq!(outcome, Outcome::Returned(expected.clone()));
        assert_eq!(client.returned_value(), Some(expected));
    }

    #[tokio::test]
    async fn test_receiver_state_comes_from_parent() {
        let client = MemoryClient::invocation("Test", "greet")
            .parent(json!({"name": "Ada"}))
            .arg("greeting", json!("Hello"));
        let (outcome, _) = call(client).await;
        assert_eq!(outcome, Outcome::Returned(json!("Hello, Ada!")));
    }

    #[tokio::test]
    async fn test_error_is_reported() {
        let (outcome, client) = call(MemoryClient::invocation("Test", "throwError")).await;
        assert_eq!(outcome, Outcome::Failed("boom".into()));
        assert_eq!(client.returned_error().as_deref(), Some("boom"));
        assert_eq!(client.returned_value(), None);
    }

    #[tokio::test]
    async fn test_constructor_call() {
        let (outcome, _) = call(MemoryClient::invocation("Test", "")).await;
        assert_eq!(outcome, Outcome::Returned(json!({"name": "default"})));
    }
}
