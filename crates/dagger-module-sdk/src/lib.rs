//! Dagger Module SDK
//!
//! This crate bridges Rust code and the Dagger engine. A module process is
//! started once per call: it either describes its objects, functions and
//! enums to the engine (registration) or runs one of its functions with
//! arguments supplied by the engine (invocation).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dagger_module_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter;
//! module_object!(Greeter);
//!
//! fn module() -> Module {
//!     Module::new().object(
//!         ObjectDecl::<Greeter>::new().function(
//!             Function::new("hello")
//!                 .arg(Param::new::<String>("name"))
//!                 .handler(|_: &mut Greeter, args: &mut Args| {
//!                     Ok(format!("Hello, {}!", args.take::<String>("name")?))
//!                 }),
//!         ),
//!     )
//! }
//!
//! dagger_module_sdk::export_module!(module());
//! ```
//!
//! # Layers
//!
//! - **registry**: typed declaration of objects, functions, fields and enums
//! - **discovery**: exposed names, descriptions and resolved constructors
//! - **mapper**: native types to engine type definitions
//! - **codec**: wire values to native values and back
//! - **dispatch**: the registration and invocation phases

pub mod client;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod docs;
pub mod error;
pub mod logging;
pub mod macros;
pub mod mapper;
pub mod native;
pub mod prelude;
pub mod registry;
pub mod remote;

// Re-exports
pub use client::{EngineClient, GraphQlClient, MemoryClient};
pub use config::{RuntimeConfig, SessionConfig};
pub use dagger_module_core::{
    FunctionCall, ModuleDef, ModuleId, ObjectHandle, ObjectId, TypeDefKind, TypeDescriptor,
};
pub use dispatch::{Dispatcher, ModuleContext, Outcome};
pub use docs::DocIndex;
pub use error::{InfraError, ModuleError, Result};
pub use registry::Module;

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Serve the engine's current call with the given client.
pub async fn serve(
    module: Module,
    client: Arc<dyn EngineClient>,
    docs: DocIndex,
) -> std::result::Result<Outcome, InfraError> {
    Dispatcher::new(ModuleContext {
        client,
        docs,
        module,
    })
    .dispatch()
    .await
}

/// Process entry point used by [`export_module!`].
///
/// Connects to the engine session from the environment and serves one
/// call. Errors raised by module code are reported to the engine and still
/// exit successfully; only failures to talk to the engine exit non-zero.
pub fn run(module: Module) -> ExitCode {
    let config = RuntimeConfig::from_env();
    logging::init(&config);

    match run_with(module, &config) {
        Ok(outcome) => {
            info!(?outcome, "Call served");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "Module runtime failed");
            ExitCode::FAILURE
        }
    }
}

fn run_with(module: Module, config: &RuntimeConfig) -> std::result::Result<Outcome, InfraError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let session = SessionConfig::from_env().map_err(InfraError::Connect)?;
    let client = GraphQlClient::new(&session).map_err(InfraError::Connect)?;
    let docs = load_docs(config);

    runtime.block_on(serve(module, Arc::new(client), docs))
}

fn load_docs(config: &RuntimeConfig) -> DocIndex {
    let Some(path) = &config.docs_path else {
        return DocIndex::new();
    };
    match DocIndex::load(path) {
        Ok(docs) => docs,
        Err(err) => {
            warn!(error = %err, "Continuing without documentation");
            DocIndex::new()
        }
    }
}
