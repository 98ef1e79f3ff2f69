//! Dispatch routing: invocation request in, tagged result out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::debug;

use crate::executor::Executor;
use crate::registry::OperationRegistry;
use crate::validate::validate;
use crate::OpsError;

/// One request to run a named operation with raw arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Caller-assigned id, echoed on the result so callers can match
    /// results to requests regardless of completion order.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl InvocationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of one invocation, success or error, always data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub name: String,
    pub payload: Value,
    pub is_error: bool,
}

impl OperationResult {
    pub fn ok(id: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload,
            is_error: false,
        }
    }

    pub fn error(id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload: Value::String(message.into()),
            is_error: true,
        }
    }

    /// Render the payload as text for a conversation tool turn.
    pub fn text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Routes invocation requests through lookup, validation, and execution.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<OperationRegistry>,
    executor: Executor,
}

impl Router {
    pub fn new(registry: Arc<OperationRegistry>, executor: Executor) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Dispatch a single invocation.
    ///
    /// Unknown names and validation failures short-circuit without
    /// touching the executor; every outcome is an `OperationResult` so a
    /// failing invocation never aborts the caller.
    pub async fn dispatch(&self, req: InvocationRequest) -> OperationResult {
        let spec = match self.registry.lookup(&req.name) {
            Some(spec) => spec,
            None => {
                debug!(operation = %req.name, "unknown operation requested");
                let message = OpsError::UnknownOperation(req.name.clone()).to_string();
                return OperationResult::error(req.id, req.name, message);
            }
        };

        let args = match validate(spec.schema(), &req.arguments) {
            Ok(args) => args,
            Err(e) => {
                debug!(operation = %req.name, error = %e, "validation failed");
                return OperationResult::error(req.id, req.name, e.to_string());
            }
        };

        match self.executor.execute(spec, args).await {
            Ok(payload) => OperationResult::ok(req.id, req.name, payload),
            Err(e) => OperationResult::error(req.id, req.name, e.to_string()),
        }
    }

    /// Dispatch all invocations of one round concurrently.
    ///
    /// Results arrive in completion order, not request order; each carries
    /// the invocation id and operation name, so callers can reorder if
    /// their wire format requires it. The returned vector is complete: one
    /// result per request, success or error.
    pub async fn dispatch_round(&self, requests: Vec<InvocationRequest>) -> Vec<OperationResult> {
        let mut set = JoinSet::new();
        for req in requests {
            let router = self.clone();
            set.spawn(async move { router.dispatch(req).await });
        }

        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // A panicking handler still yields a result; the id is
                // gone with the task, so tag it as unattributed.
                Err(e) => results.push(OperationResult::error("", "", format!("task failed: {}", e))),
            }
        }
        results
    }
}
