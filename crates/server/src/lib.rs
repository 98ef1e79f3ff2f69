//! HTTP transport adapter: streaming chat over SSE plus catalog listing.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cryptopulse_agent::{system_prompt, AgentEvent, AgentLoop, ConversationState};

/// Shared per-process state. The agent loop itself is stateless across
/// requests; each request gets its own conversation and cancellation token.
#[derive(Clone)]
pub struct AppState {
    agent: Arc<AgentLoop>,
}

impl AppState {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self { agent }
    }
}

/// One incoming conversation turn.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/api/chat", post(chat))
        .route("/api/operations", get(operations))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds and serves until the process is shut down.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "listening");
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Catalog listing, independent of any conversation.
async fn operations(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.agent.router().registry();
    Json(json!({ "operations": registry.describe() }))
}

/// Streaming chat. The agent loop runs in a spawned task; its events are
/// forwarded as SSE. Dropping the response (client disconnect) drops the
/// receiver, which cancels the in-flight round.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<serde_json::Value>)>
{
    if request.messages.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "messages must not be empty" })),
        ));
    }

    let mut conversation = ConversationState::with_system(system_prompt());
    for message in request.messages {
        match message.role.as_str() {
            "user" => conversation.push_user(message.content),
            "assistant" => conversation.push_assistant(message.content),
            "system" => conversation.push_system(message.content),
            other => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("unsupported role: {other}") })),
                ));
            }
        }
    }

    let agent = state.agent.clone();
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel::<AgentEvent>(64);

    tokio::spawn(async move {
        if let Err(e) = agent.run_streaming(&mut conversation, tx, cancel).await {
            error!(error = %e, "chat round ended with error");
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let name = match &event {
            AgentEvent::Delta { .. } => "delta",
            AgentEvent::ToolStarted { .. } => "tool_started",
            AgentEvent::ToolCompleted { .. } => "tool_completed",
            AgentEvent::Done { .. } => "done",
            AgentEvent::Error { .. } => "error",
        };
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(name).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use cryptopulse_market::default_registry;
    use cryptopulse_ops::{Executor, Router};
    use cryptopulse_provider::{
        ChatParams, ChatResponse, ChatStream, Provider, StreamEvent, ToolCall,
    };
    use futures::StreamExt as _;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct ScriptedProvider {
        responses: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat(&self, _params: ChatParams) -> cryptopulse_provider::Result<ChatResponse> {
            let mut responses = self.responses.lock().unwrap();
            Ok(if responses.is_empty() {
                ChatResponse::text("out of script")
            } else {
                responses.remove(0)
            })
        }

        async fn chat_stream(
            &self,
            params: ChatParams,
        ) -> cryptopulse_provider::Result<ChatStream> {
            let response = self.chat(params).await?;
            let mut events = Vec::new();
            if let Some(content) = &response.content {
                events.push(Ok(StreamEvent::TextDelta(content.clone())));
            }
            events.push(Ok(StreamEvent::Completed(response)));
            Ok(futures::stream::iter(events).boxed())
        }

        fn default_model(&self) -> String {
            "scripted".to_string()
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn test_state(responses: Vec<ChatResponse>) -> AppState {
        let registry = Arc::new(default_registry().unwrap());
        let router = Router::new(registry, Executor::new());
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::new(responses)),
            router,
            "scripted",
            10,
        );
        AppState::new(Arc::new(agent))
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_state(vec![]));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_operations_lists_catalog() {
        let app = router(test_state(vec![]));
        let response = app
            .oneshot(Request::get("/api/operations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let operations = json["operations"].as_array().unwrap();
        assert_eq!(operations.len(), 7);
        assert_eq!(operations[0]["name"], "get_price");
        assert_eq!(
            operations[0]["inputSchema"]["required"],
            serde_json::json!(["symbol"])
        );
    }

    #[tokio::test]
    async fn test_chat_streams_delta_and_done() {
        let app = router(test_state(vec![ChatResponse::text("BTC looks fine.")]));
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"messages":[{"role":"user","content":"how is BTC?"}]}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: delta"));
        assert!(text.contains("event: done"));
        assert!(text.contains("BTC looks fine."));
    }

    #[tokio::test]
    async fn test_chat_tool_round_surfaces_progress_events() {
        let tool_round = ChatResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "get_price".to_string(),
                arguments: serde_json::json!({"symbol": "BTC"}),
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Default::default(),
        };
        let app = router(test_state(vec![
            tool_round,
            ChatResponse::text("BTC is at $48,250."),
        ]));

        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"messages":[{"role":"user","content":"price of BTC?"}]}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: tool_started"));
        assert!(text.contains("event: tool_completed"));
        assert!(text.contains("get_price"));
        assert!(text.contains("event: done"));
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_messages() {
        let app = router(test_state(vec![]));
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"messages":[]}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_rejects_unknown_role() {
        let app = router(test_state(vec![]));
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"messages":[{"role":"wizard","content":"hi"}]}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("wizard"));
    }
}
