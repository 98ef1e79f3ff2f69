//! OpenRouter/OpenAI-compatible chat-completions client.

use crate::*;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

/// Chat-completions provider. Detects OpenRouter from the key prefix or the
/// base URL and picks defaults accordingly.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-")
            || api_base
                .as_ref()
                .map(|b| b.contains("openrouter"))
                .unwrap_or(false);

        let api_base = api_base.unwrap_or_else(|| {
            if is_openrouter {
                "https://openrouter.ai/api/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        });

        let default_model = default_model.unwrap_or_else(|| {
            if is_openrouter {
                "anthropic/claude-sonnet-4".to_string()
            } else {
                "gpt-4".to_string()
            }
        });

        Self {
            client: Client::new(),
            api_key,
            api_base,
            default_model,
        }
    }

    fn build_request(&self, params: &ChatParams, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": &m.role });
                if let Some(content) = &m.content {
                    obj["content"] = json!(content);
                }
                if let Some(tool_calls) = &m.tool_calls {
                    obj["tool_calls"] = json!(tool_calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if stream {
            body["stream"] = json!(true);
        }

        if !params.tools.is_empty() {
            let tools: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.function.name,
                            "description": &t.function.description,
                            "parameters": &t.function.parameters
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Required(name) => {
                    json!({"type": "function", "function": {"name": name}})
                }
                ToolChoice::None => json!("none"),
            };
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let args = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

/// Per-index accumulator for tool-call deltas. Streamed tool calls arrive in
/// fragments keyed by `index`; the argument string concatenates across chunks
/// and only parses as JSON once the stream finishes.
#[derive(Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Default)]
struct StreamAssembler {
    content: String,
    tool_calls: Vec<ToolCallBuilder>,
    finish_reason: String,
    usage: Usage,
}

impl StreamAssembler {
    /// Applies one stream chunk, returning any text delta it carried.
    fn apply(&mut self, chunk: &serde_json::Value) -> Option<String> {
        if let Some(usage) = chunk["usage"].as_object() {
            self.usage = Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            };
        }

        let choice = chunk["choices"].get(0)?;
        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = reason.to_string();
        }

        let delta = &choice["delta"];
        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                let index = call["index"].as_u64().unwrap_or(0) as usize;
                while self.tool_calls.len() <= index {
                    self.tool_calls.push(ToolCallBuilder::default());
                }
                let builder = &mut self.tool_calls[index];
                if let Some(id) = call["id"].as_str() {
                    builder.id.push_str(id);
                }
                if let Some(name) = call["function"]["name"].as_str() {
                    builder.name.push_str(name);
                }
                if let Some(args) = call["function"]["arguments"].as_str() {
                    builder.arguments.push_str(args);
                }
            }
        }

        let text = delta["content"].as_str()?;
        if text.is_empty() {
            return None;
        }
        self.content.push_str(text);
        Some(text.to_string())
    }

    fn finish(self) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .map(|b| {
                let arguments = serde_json::from_str(&b.arguments)
                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                ToolCall {
                    id: b.id,
                    name: b.name,
                    arguments,
                }
            })
            .collect();

        let finish_reason = if self.finish_reason.is_empty() {
            "stop".to_string()
        } else {
            self.finish_reason
        };

        ChatResponse {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            tool_calls,
            finish_reason,
            usage: self.usage,
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        trace!(base = %self.api_base, model = %params.model, "sending chat request");

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params, false);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let error = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Api(error));
        }

        debug!(
            tool_calls = json["choices"][0]["message"]["tool_calls"]
                .as_array()
                .map(|v| v.len())
                .unwrap_or(0),
            "chat response received"
        );

        self.parse_response(json)
    }

    async fn chat_stream(&self, params: ChatParams) -> Result<ChatStream> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!(base = %self.api_base, model = %params.model, "opening chat stream");

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params, true);

        let mut source = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .eventsource()
            .map_err(|e| ProviderError::Stream(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(64);

        tokio::spawn(async move {
            let mut assembler = StreamAssembler::default();
            let mut completed = false;

            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        if message.data == "[DONE]" {
                            completed = true;
                            let response = std::mem::take(&mut assembler).finish();
                            let _ = tx.send(Ok(StreamEvent::Completed(response))).await;
                            break;
                        }
                        let chunk: serde_json::Value = match serde_json::from_str(&message.data) {
                            Ok(v) => v,
                            Err(e) => {
                                warn!(error = %e, "dropping unparseable stream chunk");
                                continue;
                            }
                        };
                        if let Some(text) = assembler.apply(&chunk) {
                            if tx.send(Ok(StreamEvent::TextDelta(text))).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::Stream(e.to_string()))).await;
                        break;
                    }
                }
            }

            // Some upstreams close without a [DONE] sentinel.
            if !completed {
                let response = assembler.finish();
                let _ = tx.send(Ok(StreamEvent::Completed(response))).await;
            }

            source.close();
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_with_openrouter_key() {
        let provider = OpenRouterProvider::new("sk-or-test123", None, None);
        assert_eq!(provider.api_base, "https://openrouter.ai/api/v1");
        assert_eq!(provider.default_model, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_new_with_openai_key() {
        let provider = OpenRouterProvider::new("sk-openai123", None, None);
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
        assert_eq!(provider.default_model, "gpt-4");
    }

    #[test]
    fn test_new_with_custom_base_and_model() {
        let provider = OpenRouterProvider::new(
            "sk-or-test",
            Some("https://custom.api.com".to_string()),
            Some("custom/model-v1".to_string()),
        );
        assert_eq!(provider.api_base, "https://custom.api.com");
        assert_eq!(provider.default_model, "custom/model-v1");
    }

    #[test]
    fn test_is_configured() {
        assert!(OpenRouterProvider::new("valid-key", None, None).is_configured());
        assert!(!OpenRouterProvider::new("", None, None).is_configured());
    }

    #[test]
    fn test_build_request_basic() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("Hello")],
            max_tokens: 1024,
            temperature: 0.5,
            ..Default::default()
        };

        let request = provider.build_request(&params, false);

        assert_eq!(request["model"], "gpt-4");
        assert_eq!(request["max_tokens"], 1024);
        assert_eq!(request["temperature"], 0.5);
        assert!(request.get("tools").is_none());
        assert!(request.get("stream").is_none());

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
    }

    #[test]
    fn test_build_request_stream_flag() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("Hello")],
            ..Default::default()
        };

        let request = provider.build_request(&params, true);
        assert_eq!(request["stream"], true);
    }

    #[test]
    fn test_build_request_tool_message() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::tool("call_123", "get_price", "{\"price\": 48250}")],
            ..Default::default()
        };

        let request = provider.build_request(&params, false);
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "tool");
        assert_eq!(messages[0]["tool_call_id"], "call_123");
        assert_eq!(messages[0]["name"], "get_price");
    }

    #[test]
    fn test_build_request_with_tools_auto_choice() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("price of BTC?")],
            tools: vec![Tool::new(
                "get_price",
                "Get the current price of a cryptocurrency",
                json!({
                    "type": "object",
                    "properties": {
                        "symbol": {"type": "string"}
                    }
                }),
            )],
            ..Default::default()
        };

        let request = provider.build_request(&params, false);

        let tools = request["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "get_price");
        assert_eq!(request["tool_choice"], "auto");
    }

    #[test]
    fn test_build_request_tool_choice_variants() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let tools = vec![Tool::new("get_price", "Get price", json!({}))];

        let required = provider.build_request(
            &ChatParams {
                model: "m".to_string(),
                tools: tools.clone(),
                tool_choice: ToolChoice::Required("get_price".to_string()),
                ..Default::default()
            },
            false,
        );
        assert_eq!(required["tool_choice"]["function"]["name"], "get_price");

        let none = provider.build_request(
            &ChatParams {
                model: "m".to_string(),
                tools,
                tool_choice: ToolChoice::None,
                ..Default::default()
            },
            false,
        );
        assert_eq!(none["tool_choice"], "none");
    }

    #[test]
    fn test_build_request_assistant_with_tool_calls() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let msg = Message::assistant_tool_calls(
            None,
            vec![ToolCallDef::new("call_1", "get_price", json!({"symbol": "BTC"}))],
        );
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![msg],
            ..Default::default()
        };

        let request = provider.build_request(&params, false);
        let messages = request["messages"].as_array().unwrap();
        assert!(messages[0].get("tool_calls").is_some());
        assert!(messages[0].get("content").is_none());
    }

    #[test]
    fn test_parse_response_simple() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response_json = json!({
            "choices": [{
                "message": {
                    "content": "BTC is at $48,250.",
                    "role": "assistant"
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15
            }
        });

        let response = provider.parse_response(response_json).unwrap();

        assert_eq!(response.content, Some("BTC is at $48,250.".to_string()));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response_json = json!({
            "choices": [{
                "message": {
                    "content": serde_json::Value::Null,
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_price",
                            "arguments": "{\"symbol\": \"BTC\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {}
        });

        let response = provider.parse_response(response_json).unwrap();

        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_123");
        assert_eq!(response.tool_calls[0].name, "get_price");
        assert_eq!(response.tool_calls[0].arguments, json!({"symbol": "BTC"}));
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[test]
    fn test_parse_response_missing_usage() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response_json = json!({
            "choices": [{
                "message": { "content": "Hello" },
                "finish_reason": "stop"
            }]
        });

        let response = provider.parse_response(response_json).unwrap();
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_parse_response_empty_choices() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let result = provider.parse_response(json!({"choices": [], "usage": {}}));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[test]
    fn test_stream_assembler_text_deltas() {
        let mut assembler = StreamAssembler::default();

        let delta = assembler.apply(&json!({
            "choices": [{"delta": {"content": "BTC is "}}]
        }));
        assert_eq!(delta.as_deref(), Some("BTC is "));

        let delta = assembler.apply(&json!({
            "choices": [{"delta": {"content": "up today."}, "finish_reason": "stop"}]
        }));
        assert_eq!(delta.as_deref(), Some("up today."));

        let response = assembler.finish();
        assert_eq!(response.content, Some("BTC is up today.".to_string()));
        assert_eq!(response.finish_reason, "stop");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_stream_assembler_tool_call_fragments() {
        let mut assembler = StreamAssembler::default();

        assembler.apply(&json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0,
                "id": "call_1",
                "function": {"name": "get_price", "arguments": "{\"sym"}
            }]}}]
        }));
        assembler.apply(&json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0,
                "function": {"arguments": "bol\": \"BTC\"}"}
            }]}}]
        }));
        assembler.apply(&json!({
            "choices": [{"delta": {}, "finish_reason": "tool_calls"}]
        }));

        let response = assembler.finish();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_1");
        assert_eq!(response.tool_calls[0].name, "get_price");
        assert_eq!(response.tool_calls[0].arguments, json!({"symbol": "BTC"}));
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[test]
    fn test_stream_assembler_parallel_tool_calls() {
        let mut assembler = StreamAssembler::default();

        assembler.apply(&json!({
            "choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "get_price", "arguments": "{}"}},
                {"index": 1, "id": "call_b", "function": {"name": "get_news", "arguments": "{}"}}
            ]}}]
        }));

        let response = assembler.finish();
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].name, "get_price");
        assert_eq!(response.tool_calls[1].name, "get_news");
    }

    #[test]
    fn test_stream_assembler_unparseable_arguments_fall_back_to_empty_object() {
        let mut assembler = StreamAssembler::default();
        assembler.apply(&json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0,
                "id": "call_1",
                "function": {"name": "get_price", "arguments": "not json"}
            }]}}]
        }));

        let response = assembler.finish();
        assert_eq!(response.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn test_stream_assembler_empty_stream_defaults() {
        let response = StreamAssembler::default().finish();
        assert!(response.content.is_none());
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, "stop");
    }
}
