//! Execution of a single operation body behind a failure boundary.
//!
//! Handlers may fail, but nothing propagates past the executor: failures
//! and timeouts come back as `ExecutionError` and get folded into an
//! error-flagged `OperationResult` by the router.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::registry::OperationSpec;
use crate::validate::ValidatedArguments;

/// Boxed error type handlers are free to produce.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The body of one operation.
///
/// Handlers must be pure with respect to shared state: any external data
/// they need is injected at construction, so invocations from the same
/// round can run concurrently.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError>;
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("timeout")]
    Timeout,
}

/// Wrapper that runs handlers with an optional per-call deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    timeout: Option<Duration>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Run the spec's handler over validated arguments.
    ///
    /// Handler failures are captured, never propagated; a deadline overrun
    /// yields `ExecutionError::Timeout`.
    pub async fn execute(
        &self,
        spec: &OperationSpec,
        args: ValidatedArguments,
    ) -> Result<Value, ExecutionError> {
        let run = spec.handler().run(args);

        let outcome = match self.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(operation = spec.name(), "execution timed out");
                    return Err(ExecutionError::Timeout);
                }
            },
            None => run.await,
        };

        outcome.map_err(|e| {
            warn!(operation = spec.name(), error = %e, "execution failed");
            ExecutionError::Failed(e.to_string())
        })
    }
}
