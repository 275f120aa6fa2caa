//! In-memory engine client for tests and local runs.

use super::EngineClient;
use crate::error::ClientError;
use crate::remote::BUILTIN_TYPES;
use async_trait::async_trait;
use dagger_module_core::{FunctionCall, InputArg, ModuleDef, ModuleId, ObjectHandle, ObjectId};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Recorded {
    returned_value: Option<Value>,
    returned_error: Option<String>,
    registered: Option<ModuleDef>,
    loaded: Vec<ObjectHandle>,
    id_requests: Vec<ObjectHandle>,
}

/// A scripted engine: serves a fixed call and records everything the
/// module reports back.
#[derive(Debug)]
pub struct MemoryClient {
    call: FunctionCall,
    call_failure: Option<String>,
    loaders: HashSet<String>,
    recorded: Mutex<Recorded>,
}

impl MemoryClient {
    pub fn new(call: FunctionCall) -> Self {
        Self {
            call,
            call_failure: None,
            loaders: BUILTIN_TYPES.iter().map(|t| t.to_string()).collect(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Serve a registration call.
    pub fn registration() -> Self {
        Self::new(FunctionCall::default())
    }

    /// Serve a call of `function` on `parent_name`; an empty function name
    /// asks for the constructor.
    pub fn invocation(parent_name: impl Into<String>, function: impl Into<String>) -> Self {
        Self::new(FunctionCall {
            parent_name: parent_name.into(),
            name: function.into(),
            parent: Value::Object(Default::default()),
            input_args: Vec::new(),
        })
    }

    /// A client whose current call cannot be resolved.
    pub fn unavailable(message: impl Into<String>) -> Self {
        let mut client = Self::registration();
        client.call_failure = Some(message.into());
        client
    }

    /// Serialized state of the receiving instance.
    pub fn parent(mut self, parent: Value) -> Self {
        self.call.parent = parent;
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.call.input_args.push(InputArg {
            name: name.into(),
            value,
        });
        self
    }

    /// Allow loading objects of another type by ID.
    pub fn loader(mut self, type_name: impl Into<String>) -> Self {
        self.loaders.insert(type_name.into());
        self
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn returned_value(&self) -> Option<Value> {
        self.recorded().returned_value.clone()
    }

    pub fn returned_error(&self) -> Option<String> {
        self.recorded().returned_error.clone()
    }

    pub fn registered_module(&self) -> Option<ModuleDef> {
        self.recorded().registered.clone()
    }

    /// IDs of objects loaded, in order.
    pub fn loaded_ids(&self) -> Vec<String> {
        self.recorded()
            .loaded
            .iter()
            .map(|h| h.id.to_string())
            .collect()
    }

    /// IDs the module asked the engine to resolve, in order.
    pub fn id_requests(&self) -> Vec<String> {
        self.recorded()
            .id_requests
            .iter()
            .map(|h| h.id.to_string())
            .collect()
    }
}

#[async_trait]
impl EngineClient for MemoryClient {
    async fn current_function_call(&self) -> Result<FunctionCall, ClientError> {
        match &self.call_failure {
            Some(message) => Err(ClientError::Unavailable(message.clone())),
            None => Ok(self.call.clone()),
        }
    }

    async fn return_value(&self, value: Value) -> Result<(), ClientError> {
        self.recorded().returned_value = Some(value);
        Ok(())
    }

    async fn return_error(&self, message: &str) -> Result<(), ClientError> {
        self.recorded().returned_error = Some(message.to_string());
        Ok(())
    }

    async fn register_module(&self, module: &ModuleDef) -> Result<ModuleId, ClientError> {
        self.recorded().registered = Some(module.clone());
        Ok(ModuleId("module".to_string()))
    }

    async fn load_object(
        &self,
        type_name: &str,
        id: &ObjectId,
    ) -> Result<ObjectHandle, ClientError> {
        if !self.loaders.contains(type_name) {
            return Err(ClientError::MissingLoader(type_name.to_string()));
        }
        let handle = ObjectHandle::new(type_name, id.clone());
        self.recorded().loaded.push(handle.clone());
        Ok(handle)
    }

    async fn object_id(&self, handle: &ObjectHandle) -> Result<ObjectId, ClientError> {
        self.recorded().id_requests.push(handle.clone());
        Ok(handle.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_scripted_call() {
        let client = MemoryClient::invocation("Test", "hello").arg("name", json!("World"));
        let call = client.current_function_call().await.unwrap();
        assert_eq!(call.parent_name, "Test");
        assert_eq!(call.input_arg("name"), Some(&json!("World")));
    }

    #[tokio::test]
    async fn test_records_outcome() {
        let client = MemoryClient::registration();
        client.return_value(json!("ok")).await.unwrap();
        client.return_error("boom").await.unwrap();
        assert_eq!(client.returned_value(), Some(json!("ok")));
        assert_eq!(client.returned_error().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unknown_loader() {
        let client = MemoryClient::registration();
        let err = client
            .load_object("Service", &ObjectId::new("svc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingLoader(_)));

        let client = client.loader("Service");
        assert!(client.load_object("Service", &ObjectId::new("svc")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_call() {
        let client = MemoryClient::unavailable("no session");
        let err = client.current_function_call().await.unwrap_err();
        assert_eq!(err.to_string(), "no session");
    }
}
