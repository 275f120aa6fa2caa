//! Call dispatch
//!
//! A module process serves exactly one call. With no parent name the engine
//! is asking for the module's definition (registration); otherwise it is
//! asking for one function or constructor to run (invocation). Both phases
//! end by reporting either a value or an error through the engine client.

mod invocation;
mod registration;

pub use registration::build_module_def;

use crate::client::EngineClient;
use crate::docs::DocIndex;
use crate::error::{InfraError, ModuleError};
use crate::registry::Module;
use dagger_module_core::ModuleId;
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};

/// Everything a call needs, built once at startup.
pub struct ModuleContext {
    pub client: Arc<dyn EngineClient>,
    pub docs: DocIndex,
    pub module: Module,
}

/// How the call ended. Errors reported to the engine are still a normal end.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Registered(ModuleId),
    Returned(Value),
    Failed(String),
}

pub struct Dispatcher {
    context: Arc<ModuleContext>,
}

impl Dispatcher {
    pub fn new(context: ModuleContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    /// Serve the current call.
    pub async fn dispatch(&self) -> Result<Outcome, InfraError> {
        let call = self
            .context
            .client
            .current_function_call()
            .await
            .map_err(InfraError::CurrentCall)?;

        if call.is_registration() {
            info!("Registering module");
            let result = registration::register(&self.context)
                .await
                .map(|id| (Value::String(id.0.clone()), Outcome::Registered(id)));
            self.run_phase(result).await
        } else {
            info!(object = %call.parent_name, function = %call.name, "Invoking function");
            let result = invocation::invoke(&self.context, &call)
                .await
                .map(|value| (value.clone(), Outcome::Returned(value)));
            self.run_phase(result).await
        }
    }

    /// Report a phase's result to the engine.
    async fn run_phase(
        &self,
        result: Result<(Value, Outcome), ModuleError>,
    ) -> Result<Outcome, InfraError> {
        let client = &self.context.client;
        match result {
            Ok((value, outcome)) => {
                client.return_value(value).await.map_err(InfraError::Report)?;
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %error_chain(&err), "Call failed");
                let message = err.report_message();
                client
                    .return_error(&message)
                    .await
                    .map_err(InfraError::Report)?;
                Ok(Outcome::Failed(message))
            }
        }
    }
}

/// An error with all of its causes, outermost first.
pub(crate) fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut messages = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if messages.last() != Some(&message) {
            messages.push(message);
        }
        source = cause.source();
    }
    messages.join(": ")
}
