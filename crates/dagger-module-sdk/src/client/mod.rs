//! Engine client
//!
//! Every interaction with the engine during a call goes through
//! [`EngineClient`]: reading the current call, reporting its outcome,
//! registering the module and resolving object IDs.

mod graphql;
mod memory;

pub use graphql::GraphQlClient;
pub use memory::MemoryClient;

use crate::error::ClientError;
use async_trait::async_trait;
use dagger_module_core::{FunctionCall, ModuleDef, ModuleId, ObjectHandle, ObjectId};
use serde_json::Value;

/// Connection to the engine for the duration of one call.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// The call this process was started to serve.
    async fn current_function_call(&self) -> Result<FunctionCall, ClientError>;

    /// Report the call's result.
    async fn return_value(&self, value: Value) -> Result<(), ClientError>;

    /// Report the call's failure.
    async fn return_error(&self, message: &str) -> Result<(), ClientError>;

    /// Submit the module definition and get its ID back.
    async fn register_module(&self, module: &ModuleDef) -> Result<ModuleId, ClientError>;

    /// Resolve an engine object of `type_name` from its ID.
    async fn load_object(&self, type_name: &str, id: &ObjectId)
    -> Result<ObjectHandle, ClientError>;

    /// Ask the engine for the ID of an object.
    async fn object_id(&self, handle: &ObjectHandle) -> Result<ObjectId, ClientError>;
}
