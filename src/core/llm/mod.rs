//! Reply generation: chat model rounds wrapped in a bounded tool loop.

pub mod base;
pub mod generator;
pub mod openai;
pub mod sse;
pub mod tools;

pub use base::{
    ChatMessage, ChatRole, DEFAULT_SYSTEM_PROMPT, LLMConfig, LLMError, LLMResult, LanguageModel,
    ModelDelta, ModelStream, ResponseGenerator, TokenStream, ToolCall, ToolDefinition,
};
pub use generator::{TOOL_LOOP_APOLOGY, ToolLoopGenerator};
pub use openai::OpenAIChatModel;
pub use tools::{NoTools, ReceptionTools, ToolError, ToolExecutor};
