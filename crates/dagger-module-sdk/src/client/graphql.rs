//! GraphQL client for the engine session.
//!
//! The engine exposes its API on a local HTTP port for the lifetime of the
//! session. Queries are built as a single chain of selections, one field per
//! level, and the value at the end of the chain is returned. Type
//! definitions are registered bottom-up: each nested definition is resolved
//! to an ID first and referenced by that ID from its parent.

use super::EngineClient;
use crate::config::SessionConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use dagger_module_core::{
    EnumDef, FunctionCall, FunctionDef, ModuleDef, ModuleId, ObjectDef, ObjectHandle, ObjectId,
    TypeDefKind, TypeDescriptor,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const CURRENT_CALL_QUERY: &str =
    "query { currentFunctionCall { parentName name parent inputArgs { name value } } }";

/// An argument value in a GraphQL selection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GqlArg {
    String(String),
    Enum(&'static str),
    Bool(bool),
    List(Vec<GqlArg>),
    /// A JSON scalar, sent as its serialized text
    Json(Value),
}

impl GqlArg {
    fn str(value: impl Into<String>) -> Self {
        GqlArg::String(value.into())
    }

    fn render(&self) -> String {
        match self {
            GqlArg::String(s) => quote(s),
            GqlArg::Enum(literal) => literal.to_string(),
            GqlArg::Bool(b) => b.to_string(),
            GqlArg::List(items) => {
                let items: Vec<_> = items.iter().map(GqlArg::render).collect();
                format!("[{}]", items.join(", "))
            }
            GqlArg::Json(value) => quote(&value.to_string()),
        }
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// A chain of field selections, outermost first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    path: Vec<(String, Vec<(&'static str, GqlArg)>)>,
}

impl Selection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn select(self, field: impl Into<String>) -> Self {
        self.select_with(field, Vec::new())
    }

    pub(crate) fn select_with(
        mut self,
        field: impl Into<String>,
        args: Vec<(&'static str, GqlArg)>,
    ) -> Self {
        self.path.push((field.into(), args));
        self
    }

    pub(crate) fn to_query(&self) -> String {
        let mut body = String::new();
        for (field, args) in self.path.iter().rev() {
            let mut rendered = field.clone();
            if !args.is_empty() {
                let args: Vec<_> = args
                    .iter()
                    .map(|(name, value)| format!("{}: {}", name, value.render()))
                    .collect();
                rendered = format!("{}({})", rendered, args.join(", "));
            }
            body = if body.is_empty() {
                rendered
            } else {
                format!("{} {{ {} }}", rendered, body)
            };
        }
        format!("query {{ {} }}", body)
    }

    /// Walk the response data down the selected fields.
    pub(crate) fn extract(&self, data: Value) -> Result<Value, ClientError> {
        let mut current = data;
        for (field, _) in &self.path {
            current = match current {
                Value::Object(mut fields) => fields.remove(field).ok_or_else(|| {
                    ClientError::InvalidResponse(format!("missing field '{}'", field))
                })?,
                other => {
                    return Err(ClientError::InvalidResponse(format!(
                        "expected object at '{}', got {}",
                        field,
                        crate::error::json_kind(&other)
                    )));
                }
            };
        }
        Ok(current)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Engine client speaking GraphQL over the session's HTTP endpoint.
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GraphQlClient {
    pub fn new(session: &SessionConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("dagger-module-sdk/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: session.endpoint(),
            token: session.token.clone(),
        })
    }

    async fn execute(&self, query: &str) -> Result<Value, ClientError> {
        debug!(query, "Sending query");
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.token, Some(""))
            .json(&json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?;

        let body: GraphQlResponse = response.json().await?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::GraphQl(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| ClientError::InvalidResponse("response has no data".to_string()))
    }

    async fn run(&self, selection: &Selection) -> Result<Value, ClientError> {
        let data = self.execute(&selection.to_query()).await?;
        selection.extract(data)
    }

    async fn id_of(&self, selection: Selection) -> Result<String, ClientError> {
        let selection = selection.select("id");
        match self.run(&selection).await? {
            Value::String(id) => Ok(id),
            other => Err(ClientError::InvalidResponse(format!(
                "expected an ID, got {}",
                crate::error::json_kind(&other)
            ))),
        }
    }

    fn type_def_id<'s>(
        &'s self,
        ty: &'s TypeDescriptor,
    ) -> BoxFuture<'s, Result<String, ClientError>> {
        async move {
            let selection = Selection::new().select("typeDef");
            let mut selection = match &ty.kind {
                TypeDefKind::List { element } => {
                    let element = self.type_def_id(element).await?;
                    selection.select_with(
                        "withListOf",
                        vec![("elementType", GqlArg::String(element))],
                    )
                }
                TypeDefKind::Object { name } => {
                    selection.select_with("withObject", vec![("name", GqlArg::str(name))])
                }
                TypeDefKind::Enum { name } => {
                    selection.select_with("withEnum", vec![("name", GqlArg::str(name))])
                }
                TypeDefKind::Scalar { name } => {
                    selection.select_with("withScalar", vec![("name", GqlArg::str(name))])
                }
                other => selection
                    .select_with("withKind", vec![("kind", GqlArg::Enum(other.engine_kind()))]),
            };
            if ty.optional {
                selection = selection
                    .select_with("withOptional", vec![("value", GqlArg::Bool(true))]);
            }
            self.id_of(selection).await
        }
        .boxed()
    }

    async fn function_id(&self, function: &FunctionDef) -> Result<String, ClientError> {
        let return_type = self.type_def_id(&function.return_type).await?;
        let mut selection = Selection::new().select_with(
            "function",
            vec![
                ("name", GqlArg::str(&function.name)),
                ("returnType", GqlArg::String(return_type)),
            ],
        );
        if let Some(description) = &function.description {
            selection = selection
                .select_with("withDescription", vec![("description", GqlArg::str(description))]);
        }
        if let Some(reason) = &function.deprecated {
            selection = selection
                .select_with("withDeprecated", vec![("reason", GqlArg::str(reason))]);
        }
        if let Some(cache) = &function.cache_policy {
            let mut args = vec![("policy", GqlArg::Enum(cache.policy.as_str()))];
            if let Some(ttl) = &cache.time_to_live {
                args.push(("timeToLive", GqlArg::str(ttl)));
            }
            selection = selection.select_with("withCachePolicy", args);
        }

        for arg in &function.args {
            let type_def = self.type_def_id(&arg.type_def).await?;
            let mut args = vec![
                ("name", GqlArg::str(&arg.name)),
                ("typeDef", GqlArg::String(type_def)),
            ];
            if let Some(description) = &arg.description {
                args.push(("description", GqlArg::str(description)));
            }
            if let Some(default) = &arg.default_value {
                args.push(("defaultValue", GqlArg::Json(default.clone())));
            }
            if let Some(path) = &arg.default_path {
                args.push(("defaultPath", GqlArg::str(path)));
            }
            if !arg.ignore.is_empty() {
                args.push(("ignore", GqlArg::List(arg.ignore.iter().map(GqlArg::str).collect())));
            }
            selection = selection.select_with("withArg", args);
        }

        self.id_of(selection).await
    }

    async fn object_type_id(&self, object: &ObjectDef) -> Result<String, ClientError> {
        let mut args = vec![("name", GqlArg::str(&object.name))];
        if let Some(description) = &object.description {
            args.push(("description", GqlArg::str(description)));
        }
        if let Some(reason) = &object.deprecated {
            args.push(("deprecated", GqlArg::str(reason)));
        }
        let mut selection = Selection::new().select("typeDef").select_with("withObject", args);

        for field in &object.fields {
            let type_def = self.type_def_id(&field.type_def).await?;
            let mut args = vec![
                ("name", GqlArg::str(&field.name)),
                ("typeDef", GqlArg::String(type_def)),
            ];
            if let Some(description) = &field.description {
                args.push(("description", GqlArg::str(description)));
            }
            if let Some(reason) = &field.deprecated {
                args.push(("deprecated", GqlArg::str(reason)));
            }
            selection = selection.select_with("withField", args);
        }
        for function in &object.functions {
            let id = self.function_id(function).await?;
            selection = selection
                .select_with("withFunction", vec![("function", GqlArg::String(id))]);
        }
        if let Some(constructor) = &object.constructor {
            let id = self.function_id(constructor).await?;
            selection = selection
                .select_with("withConstructor", vec![("function", GqlArg::String(id))]);
        }

        self.id_of(selection).await
    }

    async fn enum_type_id(&self, enumeration: &EnumDef) -> Result<String, ClientError> {
        let mut args = vec![("name", GqlArg::str(&enumeration.name))];
        if let Some(description) = &enumeration.description {
            args.push(("description", GqlArg::str(description)));
        }
        let mut selection = Selection::new().select("typeDef").select_with("withEnum", args);

        for member in &enumeration.members {
            let mut args = vec![
                ("name", GqlArg::str(&member.name)),
                ("value", GqlArg::str(&member.value)),
            ];
            if let Some(description) = &member.description {
                args.push(("description", GqlArg::str(description)));
            }
            if let Some(reason) = &member.deprecated {
                args.push(("deprecated", GqlArg::str(reason)));
            }
            selection = selection.select_with("withEnumMember", args);
        }

        self.id_of(selection).await
    }

    fn loader(type_name: &str, id: &ObjectId) -> Selection {
        Selection::new().select_with(
            format!("load{}FromID", type_name),
            vec![("id", GqlArg::str(id.as_str()))],
        )
    }
}

/// JSON scalars arrive as their serialized text.
fn parse_json_scalar(value: Value) -> Result<Value, ClientError> {
    match value {
        Value::String(text) if text.is_empty() => Ok(Value::Null),
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(other),
    }
}

#[async_trait]
impl EngineClient for GraphQlClient {
    async fn current_function_call(&self) -> Result<FunctionCall, ClientError> {
        let data = self.execute(CURRENT_CALL_QUERY).await?;
        let raw = Selection::new().select("currentFunctionCall").extract(data)?;
        let mut call: FunctionCall = serde_json::from_value(raw)?;

        call.parent = parse_json_scalar(std::mem::take(&mut call.parent))?;
        for arg in &mut call.input_args {
            arg.value = parse_json_scalar(std::mem::take(&mut arg.value))?;
        }
        Ok(call)
    }

    async fn return_value(&self, value: Value) -> Result<(), ClientError> {
        let selection = Selection::new()
            .select("currentFunctionCall")
            .select_with("returnValue", vec![("value", GqlArg::Json(value))]);
        self.run(&selection).await.map(|_| ())
    }

    async fn return_error(&self, message: &str) -> Result<(), ClientError> {
        let error_id = self
            .id_of(Selection::new().select_with("error", vec![("message", GqlArg::str(message))]))
            .await?;
        let selection = Selection::new()
            .select("currentFunctionCall")
            .select_with("returnError", vec![("error", GqlArg::String(error_id))]);
        self.run(&selection).await.map(|_| ())
    }

    async fn register_module(&self, module: &ModuleDef) -> Result<ModuleId, ClientError> {
        let mut selection = Selection::new().select("module");
        if let Some(description) = &module.description {
            selection = selection
                .select_with("withDescription", vec![("description", GqlArg::str(description))]);
        }
        for enumeration in &module.enums {
            let id = self.enum_type_id(enumeration).await?;
            selection = selection.select_with("withEnum", vec![("enum", GqlArg::String(id))]);
        }
        for object in &module.objects {
            let id = self.object_type_id(object).await?;
            selection = selection.select_with("withObject", vec![("object", GqlArg::String(id))]);
        }
        self.id_of(selection).await.map(ModuleId)
    }

    async fn load_object(
        &self,
        type_name: &str,
        id: &ObjectId,
    ) -> Result<ObjectHandle, ClientError> {
        match self.id_of(Self::loader(type_name, id)).await {
            Ok(id) => Ok(ObjectHandle::new(type_name, ObjectId::new(id))),
            Err(ClientError::GraphQl(message)) if message.contains("Cannot query field") => {
                Err(ClientError::MissingLoader(type_name.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    async fn object_id(&self, handle: &ObjectHandle) -> Result<ObjectId, ClientError> {
        self.id_of(Self::loader(&handle.type_name, &handle.id))
            .await
            .map(ObjectId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_selection_renders() {
        let selection = Selection::new()
            .select("typeDef")
            .select_with("withKind", vec![("kind", GqlArg::Enum("STRING_KIND"))])
            .select_with("withOptional", vec![("value", GqlArg::Bool(true))])
            .select("id");

        assert_eq!(
            selection.to_query(),
            "query { typeDef { withKind(kind: STRING_KIND) { withOptional(value: true) { id } } } }"
        );
    }

    #[test]
    fn test_arguments_are_escaped() {
        let selection = Selection::new()
            .select("currentFunctionCall")
            .select_with(
                "returnValue",
                vec![("value", GqlArg::Json(json!({"msg": "hi \"there\""})))],
            );

        assert_eq!(
            selection.to_query(),
            r#"query { currentFunctionCall { returnValue(value: "{\"msg\":\"hi \\\"there\\\"\"}") } }"#
        );
    }

    #[test]
    fn test_list_arguments() {
        let arg = GqlArg::List(vec![GqlArg::str("node_modules"), GqlArg::str("*.log")]);
        assert_eq!(arg.render(), r#"["node_modules", "*.log"]"#);
    }

    #[test]
    fn test_extract_walks_the_path() {
        let selection = Selection::new().select("typeDef").select("id");
        let data = json!({"typeDef": {"id": "td-1"}});
        assert_eq!(selection.extract(data).unwrap(), json!("td-1"));

        let err = selection.extract(json!({"typeDef": null})).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[test]
    fn test_json_scalars_are_parsed() {
        assert_eq!(parse_json_scalar(json!("{\"a\":1}")).unwrap(), json!({"a": 1}));
        assert_eq!(parse_json_scalar(json!("\"World\"")).unwrap(), json!("World"));
        assert_eq!(parse_json_scalar(json!("")).unwrap(), Value::Null);
        assert_eq!(parse_json_scalar(json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_loader_field_name() {
        let query = GraphQlClient::loader("Container", &ObjectId::new("abc"))
            .select("id")
            .to_query();
        assert_eq!(query, r#"query { loadContainerFromID(id: "abc") { id } }"#);
    }
}
