//! Append-only conversation state.

use chrono::{DateTime, Local};
use serde::Serialize;

use cryptopulse_provider::{Message, ToolCallDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One conversation turn: the wire message plus when it was appended.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub message: Message,
    pub at: DateTime<Local>,
}

/// In-memory conversation history. Turns are only ever appended; nothing
/// here is persisted across requests.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh conversation seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.push_system(prompt);
        state
    }

    fn push(&mut self, role: Role, message: Message) {
        self.turns.push(Turn {
            role,
            message,
            at: Local::now(),
        });
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(Role::System, Message::system(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, Message::assistant(content));
    }

    /// Assistant turn that requested operations; the matching tool results
    /// must follow before the next inference call.
    pub fn push_assistant_tool_calls(&mut self, content: Option<String>, calls: Vec<ToolCallDef>) {
        self.push(Role::Assistant, Message::assistant_tool_calls(content, calls));
    }

    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.push(Role::Tool, Message::tool(call_id, name, content));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Wire messages for the next inference call.
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().map(|t| t.message.clone()).collect()
    }

    /// Content of the most recent plain assistant turn, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .and_then(|t| t.message.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turns_append_in_order() {
        let mut state = ConversationState::with_system("analyst prompt");
        state.push_user("price of BTC?");
        state.push_assistant("BTC is at $48,250.");

        let roles: Vec<Role> = state.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_messages_mirror_turns() {
        let mut state = ConversationState::new();
        state.push_user("hello");

        let messages = state.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_tool_round_shape() {
        let mut state = ConversationState::new();
        state.push_assistant_tool_calls(
            None,
            vec![ToolCallDef::new("call_1", "get_price", json!({"symbol": "BTC"}))],
        );
        state.push_tool_result("call_1", "get_price", "BTC: $48250.00 (+2.66%)");

        assert_eq!(state.turns()[0].role, Role::Assistant);
        assert_eq!(state.turns()[1].role, Role::Tool);
        assert_eq!(
            state.turns()[1].message.tool_call_id.as_deref(),
            Some("call_1")
        );
    }

    #[test]
    fn test_last_assistant_text_skips_tool_turns() {
        let mut state = ConversationState::new();
        state.push_assistant("first answer");
        state.push_tool_result("call_1", "get_price", "payload");
        assert_eq!(state.last_assistant_text(), Some("first answer"));

        state.push_assistant("second answer");
        assert_eq!(state.last_assistant_text(), Some("second answer"));
    }

    #[test]
    fn test_empty_state() {
        let state = ConversationState::new();
        assert!(state.is_empty());
        assert!(state.last_assistant_text().is_none());
    }
}
