//! Bounded agent loop with concurrent per-round dispatch.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cryptopulse_ops::{InvocationRequest, OperationResult, Router};
use cryptopulse_provider::{
    ChatParams, ChatResponse, Provider, StreamEvent, ToolCall, ToolCallDef, ToolChoice,
};

use crate::context::operation_tools;
use crate::state::ConversationState;
use crate::{AgentError, Result, STEP_LIMIT_NOTICE};

/// Progress events emitted while a conversation round runs. The HTTP
/// transport forwards these directly as SSE payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Delta { text: String },
    ToolStarted { id: String, name: String },
    ToolCompleted { id: String, name: String, is_error: bool },
    Done { text: String },
    Error { message: String },
}

/// Drives inference rounds against a provider and dispatches requested
/// operations through the router. `max_steps` bounds the number of
/// inference calls per conversation turn; there is no unbounded mode.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    router: Router,
    model: String,
    max_steps: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        router: Router,
        model: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        Self {
            provider,
            router,
            model: model.into(),
            max_steps,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn params(&self, state: &ConversationState) -> ChatParams {
        ChatParams {
            model: self.model.clone(),
            messages: state.messages(),
            tools: operation_tools(self.router.registry()),
            tool_choice: ToolChoice::Auto,
            ..Default::default()
        }
    }

    /// Runs the loop to completion without streaming. Returns the final
    /// assistant text, or the step-limit notice when the bound is hit.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        cancel: &CancellationToken,
    ) -> Result<String> {
        for step in 1..=self.max_steps {
            debug!(step, "inference round");

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.provider.chat(self.params(state)) => {
                    result.map_err(|e| AgentError::Provider(e.to_string()))?
                }
            };

            if !response.has_tool_calls() {
                let text = response
                    .content
                    .unwrap_or_else(|| "Analysis complete.".to_string());
                state.push_assistant(text.clone());
                return Ok(text);
            }

            self.tool_round(state, &response, cancel, None).await?;
        }

        warn!(max_steps = self.max_steps, "step limit reached");
        state.push_assistant(STEP_LIMIT_NOTICE);
        Ok(STEP_LIMIT_NOTICE.to_string())
    }

    /// Runs the loop with streaming output. Text deltas and tool progress
    /// are sent over `events`; a `Done` or `Error` event is always the last
    /// one delivered. Dropping the receiver cancels the round via `cancel`.
    pub async fn run_streaming(
        &self,
        state: &mut ConversationState,
        events: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<String> {
        for step in 1..=self.max_steps {
            debug!(step, "inference round (streaming)");

            let response = match self.stream_round(state, &events, &cancel).await {
                Ok(response) => response,
                Err(AgentError::Provider(message)) => {
                    let _ = events
                        .send(AgentEvent::Error {
                            message: message.clone(),
                        })
                        .await;
                    return Err(AgentError::Provider(message));
                }
                Err(e) => return Err(e),
            };

            if !response.has_tool_calls() {
                let text = response
                    .content
                    .unwrap_or_else(|| "Analysis complete.".to_string());
                state.push_assistant(text.clone());
                self.emit(&events, &cancel, AgentEvent::Done { text: text.clone() })
                    .await?;
                info!(steps = step, "conversation round finished");
                return Ok(text);
            }

            self.tool_round(state, &response, &cancel, Some(&events))
                .await?;
        }

        warn!(max_steps = self.max_steps, "step limit reached");
        state.push_assistant(STEP_LIMIT_NOTICE);
        self.emit(
            &events,
            &cancel,
            AgentEvent::Done {
                text: STEP_LIMIT_NOTICE.to_string(),
            },
        )
        .await?;
        Ok(STEP_LIMIT_NOTICE.to_string())
    }

    /// Consumes one streaming inference call, forwarding text deltas.
    async fn stream_round(
        &self,
        state: &ConversationState,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = self.provider.chat_stream(self.params(state)) => {
                result.map_err(|e| AgentError::Provider(e.to_string()))?
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                event = stream.next() => event,
            };

            match event {
                Some(Ok(StreamEvent::TextDelta(text))) => {
                    self.emit(events, cancel, AgentEvent::Delta { text }).await?;
                }
                Some(Ok(StreamEvent::Completed(response))) => return Ok(response),
                Some(Err(e)) => return Err(AgentError::Provider(e.to_string())),
                None => {
                    return Err(AgentError::Provider(
                        "stream ended without completing".to_string(),
                    ))
                }
            }
        }
    }

    /// Dispatches all invocations of one round concurrently, records the
    /// assistant turn and the tagged results, and emits progress events
    /// when a sender is given.
    async fn tool_round(
        &self,
        state: &mut ConversationState,
        response: &ChatResponse,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<()> {
        let calls = &response.tool_calls;
        debug!(count = calls.len(), "dispatching invocation round");

        let defs: Vec<ToolCallDef> = calls
            .iter()
            .map(|c| ToolCallDef::new(&c.id, &c.name, c.arguments.clone()))
            .collect();
        state.push_assistant_tool_calls(response.content.clone(), defs);

        if let Some(events) = events {
            for call in calls {
                self.emit(
                    events,
                    cancel,
                    AgentEvent::ToolStarted {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    },
                )
                .await?;
            }
        }

        let results = self.dispatch(calls, cancel, events).await?;

        for result in &results {
            if let Some(events) = events {
                self.emit(
                    events,
                    cancel,
                    AgentEvent::ToolCompleted {
                        id: result.id.clone(),
                        name: result.name.clone(),
                        is_error: result.is_error,
                    },
                )
                .await?;
            }
            state.push_tool_result(&result.id, &result.name, result.text());
        }

        Ok(())
    }

    /// Dispatches one round. A cancelled token or a dropped event receiver
    /// abandons the round future, which aborts the in-flight handler tasks.
    async fn dispatch(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<Vec<OperationResult>> {
        let requests: Vec<InvocationRequest> = calls
            .iter()
            .map(|c| InvocationRequest::new(&c.id, &c.name, c.arguments.clone()))
            .collect();

        let receiver_closed = async {
            match events {
                Some(events) => events.closed().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            _ = receiver_closed => {
                debug!("event receiver dropped, aborting dispatch");
                cancel.cancel();
                Err(AgentError::Cancelled)
            }
            results = self.router.dispatch_round(requests) => Ok(results),
        }
    }

    /// Sends one event. A closed receiver means the client went away, so
    /// the round is cancelled rather than run to waste.
    async fn emit(
        &self,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
        event: AgentEvent,
    ) -> Result<()> {
        if events.send(event).await.is_err() {
            debug!("event receiver dropped, cancelling round");
            cancel.cancel();
            return Err(AgentError::Cancelled);
        }
        Ok(())
    }
}
