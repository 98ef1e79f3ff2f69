//! Bounded tool-calling loop for the CryptoPulse runtime.
//!
//! The loop alternates between inference and dispatch: the model either
//! answers directly or requests operations, requested operations run
//! concurrently against the registry, and their results feed the next
//! inference call. `max_steps` bounds the number of inference rounds.

use thiserror::Error;

pub mod context;
pub mod loop_agent;
pub mod state;

pub use context::{operation_tools, system_prompt};
pub use loop_agent::{AgentEvent, AgentLoop};
pub use state::{ConversationState, Role, Turn};

/// Final assistant text synthesized when the round bound is hit.
pub const STEP_LIMIT_NOTICE: &str = "step limit reached before the assistant finished";

/// Loop-terminating failures. Per-invocation failures never appear here;
/// they flow back into the conversation as error-flagged tool results.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("step limit reached")]
    StepLimit,

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AgentError>;
