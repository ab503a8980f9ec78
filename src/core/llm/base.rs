use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::stream::CancellableStream;

/// Default receptionist persona
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional receptionist for Prime Auto Lab, an automotive service company.

Your role:
- Greet callers warmly and professionally
- Answer questions about our services
- Help schedule appointments
- Collect lead information for new customers

Our services:
- General auto repair and maintenance
- Diagnostics and inspections
- Oil changes and fluid services
- Brake services
- Tire services
- Engine repairs

Guidelines:
- Keep responses concise and conversational (1-2 sentences)
- Be friendly but professional
- Ask for customer name, phone, and preferred date/time for appointments
- If you don't know something, offer to have someone call them back
- Always confirm details before ending the conversation

Important: Keep responses SHORT for natural voice conversation.";

/// Configuration for the chat completion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub max_tool_iterations: u32,
    pub tool_timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 150,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_iterations: 10,
            tool_timeout_secs: 10,
        }
    }
}

/// Error types for reply generation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument text as produced by the model
    pub arguments: String,
}

/// One message of the prompt sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Schema of a tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// Output of a single model round
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    /// Fully assembled tool call, emitted once its fragments are complete
    ToolCall(ToolCall),
}

pub type ModelStream = BoxStream<'static, LLMResult<ModelDelta>>;

/// One streamed chat completion round
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn stream_round(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> LLMResult<ModelStream>;

    fn provider_info(&self) -> &'static str;
}

/// Lazily produced reply text; cancel to stop generation
pub type TokenStream = CancellableStream<LLMResult<String>>;

/// Produces the assistant's reply to a conversation
pub trait ResponseGenerator: Send + Sync {
    /// Start generating. Tokens arrive in order; an `Err` item ends the stream.
    fn generate(&self, history: Vec<ChatMessage>) -> TokenStream;
}
