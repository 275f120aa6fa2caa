//! End-to-end tests of the dispatcher against the in-memory engine.

use dagger_module_sdk::error::InfraError;
use dagger_module_sdk::prelude::*;
use dagger_module_sdk::{DocIndex, MemoryClient, Outcome, TypeDefKind, TypeDescriptor, serve};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static HANDLER_CALLS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct Test {
    prefix: String,
    visits: i32,
}

module_object!(Test);

#[derive(Default)]
struct Point {
    x: i64,
    y: i64,
    label: String,
}

module_object!(Point);

module_enum! {
    enum Level {
        LOW,
        HIGH,
    }
}

fn test_object() -> ObjectDecl<Test> {
    ObjectDecl::<Test>::new()
        .field(Field::new(
            "prefix",
            |t: &Test| t.prefix.clone(),
            |t: &mut Test, v| t.prefix = v,
        ))
        .field(Field::new(
            "visits",
            |t: &Test| t.visits,
            |t: &mut Test, v| t.visits = v,
        ))
        .constructor(
            Constructor::new(|args: &mut Args| {
                Ok(Test {
                    prefix: format!("built:{}", args.take::<String>("prefix")?),
                    visits: 0,
                })
            })
            .arg(Param::new::<String>("prefix").default("none")),
        )
        .function(
            Function::new("hello")
                .arg(Param::new::<String>("name"))
                .handler(|_: &mut Test, args: &mut Args| {
                    Ok(format!("Hello, {}!", args.take::<String>("name")?))
                }),
        )
        .function(
            Function::new("count_up")
                .arg(Param::new::<i32>("count").default(10))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<i32>("count").map_err(Into::into)
                }),
        )
        .function(
            Function::new("fail")
                .handler(|_: &mut Test, _: &mut Args| -> anyhow::Result<String> {
                    anyhow::bail!("boom")
                }),
        )
        .function(
            Function::new("panics")
                .handler(|_: &mut Test, _: &mut Args| -> anyhow::Result<String> {
                    panic!("kaboom")
                }),
        )
        .function(
            Function::new("answer")
                .arg(Param::new::<CancellationToken>("token"))
                .handler_async(|_: Test, _: Args| async { anyhow::Ok(42) }),
        )
        .function(
            Function::new("strict")
                .arg(Param::new::<String>("required"))
                .handler(|_: &mut Test, _: &mut Args| {
                    HANDLER_CALLS.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .function(
            Function::new("tiny")
                .arg(Param::new::<i8>("value"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<i8>("value").map_err(Into::into)
                }),
        )
        .function(
            Function::new("level")
                .arg(Param::new::<Level>("level"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<Level>("level").map_err(Into::into)
                }),
        )
        .function(
            Function::new("maybe")
                .arg(Param::new::<Option<String>>("note"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<Option<String>>("note").map_err(Into::into)
                }),
        )
        .function(
            Function::new("state")
                .handler(|t: &mut Test, _: &mut Args| Ok(format!("{}/{}", t.prefix, t.visits))),
        )
        .function(
            Function::new("origin")
                .arg(Param::new::<i64>("x"))
                .handler(|_: &mut Test, args: &mut Args| {
                    Ok(Point {
                        x: args.take("x")?,
                        y: 0,
                        label: "origin".into(),
                    })
                }),
        )
        .function(
            Function::new("widest")
                .handler(|_: &mut Test, _: &mut Args| Ok(u64::MAX)),
        )
        .function(
            Function::new("widest_default")
                .arg(Param::new::<u64>("n").default(u64::MAX))
                .handler(|_: &mut Test, args: &mut Args| args.take::<u64>("n").map_err(Into::into)),
        )
        .function(
            Function::new("pick")
                .arg(Param::new::<Level>("level").optional())
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<Level>("level").map_err(Into::into)
                }),
        )
        .function(
            Function::new("relabel")
                .arg(Param::new::<Container>("ctr"))
                .handler(|_: &mut Test, args: &mut Args| {
                    args.take::<Container>("ctr").map_err(Into::into)
                }),
        )
}

fn point_object() -> ObjectDecl<Point> {
    ObjectDecl::<Point>::new()
        .field(Field::new("x", |p: &Point| p.x, |p: &mut Point, v| p.x = v))
        .field(Field::new("y", |p: &Point| p.y, |p: &mut Point, v| p.y = v))
        .field(
            Field::new(
                "label",
                |p: &Point| p.label.clone(),
                |p: &mut Point, v| p.label = v,
            )
            .ignore(),
        )
}

fn module() -> Module {
    Module::new()
        .description("Dispatcher test module")
        .object(test_object())
        .object(point_object())
        .enumeration(EnumDecl::of::<Level>())
}

async fn run(client: MemoryClient) -> (Outcome, Arc<MemoryClient>) {
    let client = Arc::new(client);
    let outcome = serve(module(), client.clone(), DocIndex::new())
        .await
        .unwrap();
    (outcome, client)
}

#[tokio::test]
async fn test_hello_round_trip() {
    let client = MemoryClient::invocation("Test", "hello").arg("name", json!("World"));
    let (outcome, client) = run(client).await;

    assert_eq!(outcome, Outcome::Returned(json!("Hello, World!")));
    assert_eq!(client.returned_value(), Some(json!("Hello, World!")));
    assert_eq!(client.returned_error(), None);
}

#[tokio::test]
async fn test_default_reaches_handler() {
    let (outcome, _) = run(MemoryClient::invocation("Test", "countUp")).await;
    assert_eq!(outcome, Outcome::Returned(json!(10)));
}

#[tokio::test]
async fn test_error_message_is_reported_verbatim() {
    let (outcome, client) = run(MemoryClient::invocation("Test", "fail")).await;

    assert_eq!(outcome, Outcome::Failed("boom".into()));
    assert_eq!(client.returned_error().as_deref(), Some("boom"));
    assert_eq!(client.returned_value(), None);
}

#[tokio::test]
async fn test_async_result_is_awaited() {
    let (outcome, client) = run(MemoryClient::invocation("Test", "answer")).await;
    assert_eq!(outcome, Outcome::Returned(json!(42)));
    assert_eq!(client.returned_value(), Some(json!(42)));
}

#[tokio::test]
async fn test_panic_is_reported() {
    let (outcome, _) = run(MemoryClient::invocation("Test", "panics")).await;
    assert_eq!(outcome, Outcome::Failed("Function panicked: kaboom".into()));
}

#[tokio::test]
async fn test_missing_argument_never_reaches_handler() {
    let before = HANDLER_CALLS.load(Ordering::SeqCst);
    let (outcome, _) = run(MemoryClient::invocation("Test", "strict")).await;

    assert_eq!(
        outcome,
        Outcome::Failed("Missing required argument: required".into())
    );
    assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_narrowing_rejects_out_of_range() {
    let client = MemoryClient::invocation("Test", "tiny").arg("value", json!(300));
    let (outcome, _) = run(client).await;
    assert_eq!(
        outcome,
        Outcome::Failed("Value 300 is out of range for i8".into())
    );
}

#[rstest]
#[case("HIGH")]
#[case("high")]
#[case("High")]
#[tokio::test]
async fn test_enum_arguments_ignore_case(#[case] wire: &str) {
    let client = MemoryClient::invocation("Test", "level").arg("level", json!(wire));
    let (outcome, _) = run(client).await;
    assert_eq!(outcome, Outcome::Returned(json!("HIGH")));
}

#[rstest]
#[case(None, Value::Null)]
#[case(Some(Value::Null), Value::Null)]
#[case(Some(json!("hi")), json!("hi"))]
#[tokio::test]
async fn test_optional_argument(#[case] wire: Option<Value>, #[case] expected: Value) {
    let mut client = MemoryClient::invocation("Test", "maybe");
    if let Some(value) = wire {
        client = client.arg("note", value);
    }
    let (outcome, _) = run(client).await;
    assert_eq!(outcome, Outcome::Returned(expected));
}

#[tokio::test]
async fn test_constructor_parameters_win_over_fields() {
    let client = MemoryClient::invocation("Test", "state")
        .parent(json!({"prefix": "saved", "visits": 3}));
    let (outcome, _) = run(client).await;
    assert_eq!(outcome, Outcome::Returned(json!("built:saved/3")));
}

#[rstest]
#[case("widest")]
#[case("widestDefault")]
#[tokio::test]
async fn test_u64_max_survives_the_wire(#[case] function: &str) {
    let (outcome, client) = run(MemoryClient::invocation("Test", function)).await;
    assert_eq!(outcome, Outcome::Returned(json!(u64::MAX)));
    assert_eq!(client.returned_value(), Some(json!(u64::MAX)));
}

#[tokio::test]
async fn test_omitted_optional_enum_takes_first_member() {
    let (outcome, _) = run(MemoryClient::invocation("Test", "pick")).await;
    assert_eq!(outcome, Outcome::Returned(json!("LOW")));
}

#[tokio::test]
async fn test_plain_objects_encode_as_fields() {
    let client = MemoryClient::invocation("Test", "origin").arg("x", json!(7));
    let (outcome, _) = run(client).await;
    assert_eq!(outcome, Outcome::Returned(json!({"x": 7, "y": 0})));
}

#[tokio::test]
async fn test_remote_objects_pass_by_reference() {
    let client = MemoryClient::invocation("Test", "relabel").arg("ctr", json!("ctr-9"));
    let (outcome, client) = run(client).await;

    assert_eq!(outcome, Outcome::Returned(json!("ctr-9")));
    assert_eq!(client.loaded_ids(), vec!["ctr-9".to_string()]);
    assert_eq!(client.id_requests(), vec!["ctr-9".to_string()]);
}

#[tokio::test]
async fn test_constructor_only_call() {
    let client = MemoryClient::invocation("Test", "").arg("prefix", json!("p"));
    let (outcome, _) = run(client).await;
    assert_eq!(
        outcome,
        Outcome::Returned(json!({"prefix": "built:p", "visits": 0}))
    );
}

#[rstest]
#[case("Nope", "hello", "Unknown object type: Nope")]
#[case("Test", "nope", "Unknown function: Test.nope")]
#[tokio::test]
async fn test_unknown_targets_are_reported(
    #[case] object: &str,
    #[case] function: &str,
    #[case] message: &str,
) {
    let (outcome, client) = run(MemoryClient::invocation(object, function)).await;
    assert_eq!(outcome, Outcome::Failed(message.into()));
    assert_eq!(client.returned_error().as_deref(), Some(message));
}

#[tokio::test]
async fn test_registration_describes_module() {
    let (outcome, client) = run(MemoryClient::registration()).await;
    assert!(matches!(outcome, Outcome::Registered(_)));

    let def = client.registered_module().unwrap();
    assert_eq!(def.description.as_deref(), Some("Dispatcher test module"));

    let test = def.object("Test").unwrap();
    let constructor = test.constructor.as_ref().unwrap();
    assert_eq!(constructor.return_type, TypeDescriptor::object("Test"));
    assert!(constructor.arg("prefix").unwrap().type_def.optional);

    let hello = test.function("hello").unwrap();
    assert!(!hello.arg("name").unwrap().type_def.optional);
    assert_eq!(hello.return_type, TypeDescriptor::string());

    assert!(test.function("answer").unwrap().args.is_empty());
    assert!(test.function("strict").unwrap().return_type.optional);
    assert!(test.function("maybe").unwrap().return_type.optional);
    assert_eq!(
        test.function("countUp").unwrap().arg("count").unwrap().default_value,
        Some(json!(10))
    );
    assert_eq!(
        test.function("widestDefault").unwrap().arg("n").unwrap().default_value,
        Some(json!(u64::MAX))
    );
    assert!(test.function("pick").unwrap().arg("level").unwrap().type_def.optional);
    assert_eq!(
        test.function("relabel").unwrap().return_type.kind,
        TypeDefKind::Object {
            name: "Container".into()
        }
    );

    let level = def.enumeration("Level").unwrap();
    let members: Vec<_> = level.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(members, vec!["LOW", "HIGH"]);
    let point = def.object("Point").unwrap();
    assert_eq!(point.fields.len(), 2);
    assert!(point.fields.iter().all(|f| f.name != "label"));
}

#[tokio::test]
async fn test_ambiguous_constructors_fail_registration() {
    let module = Module::new().object(
        point_object()
            .constructor(
                Constructor::new(|args: &mut Args| {
                    Ok(Point {
                        x: args.take("x")?,
                        ..Point::default()
                    })
                })
                .arg(Param::new::<i64>("x")),
            )
            .constructor(
                Constructor::new(|args: &mut Args| {
                    Ok(Point {
                        y: args.take("y")?,
                        ..Point::default()
                    })
                })
                .arg(Param::new::<i64>("y")),
            ),
    );
    let client = Arc::new(MemoryClient::registration());
    let outcome = serve(module, client.clone(), DocIndex::new()).await.unwrap();

    assert!(matches!(outcome, Outcome::Failed(_)));
    assert!(client.registered_module().is_none());
}

#[tokio::test]
async fn test_unresolvable_call_is_infrastructure_failure() {
    let client = Arc::new(MemoryClient::unavailable("engine went away"));
    let err = serve(module(), client, DocIndex::new()).await.unwrap_err();
    assert!(matches!(err, InfraError::CurrentCall(_)));
}
