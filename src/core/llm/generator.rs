use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::base::{
    ChatMessage, LLMConfig, LLMResult, LanguageModel, ModelDelta, ResponseGenerator, TokenStream,
    ToolCall,
};
use super::tools::{ToolError, ToolExecutor};
use crate::core::stream::{CancellableStream, StreamSink};

/// Final token when the model keeps asking for tools past the limit
pub const TOOL_LOOP_APOLOGY: &str = "I apologize, but I encountered an issue processing your request. Please try again or rephrase your question.";

/// Reply generator that lets the model call tools between text rounds.
///
/// Each round is one streamed completion. Text deltas go straight to the
/// caller; tool calls are executed and fed back for another round, at most
/// `max_tool_iterations` times.
pub struct ToolLoopGenerator {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolExecutor>,
    system_prompt: Arc<str>,
    max_tool_iterations: u32,
    tool_timeout: Duration,
}

impl ToolLoopGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolExecutor>,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        let defaults = LLMConfig::default();
        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            max_tool_iterations: defaults.max_tool_iterations,
            tool_timeout: Duration::from_secs(defaults.tool_timeout_secs),
        }
    }

    pub fn from_config(
        config: &LLMConfig,
        model: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self::new(model, tools, config.system_prompt.as_str())
            .with_max_tool_iterations(config.max_tool_iterations)
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
    }

    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }
}

impl ResponseGenerator for ToolLoopGenerator {
    fn generate(&self, history: Vec<ChatMessage>) -> TokenStream {
        let run = ToolLoop {
            model: self.model.clone(),
            tools: self.tools.clone(),
            max_tool_iterations: self.max_tool_iterations,
            tool_timeout: self.tool_timeout,
        };
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(&*self.system_prompt));
        messages.extend(history);

        CancellableStream::spawn(move |sink| run.drive(messages, sink))
    }
}

struct ToolLoop {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolExecutor>,
    max_tool_iterations: u32,
    tool_timeout: Duration,
}

impl ToolLoop {
    async fn drive(self, mut messages: Vec<ChatMessage>, sink: StreamSink<LLMResult<String>>) {
        let definitions = self.tools.definitions();
        let mut iterations = 0u32;

        loop {
            let mut round = match self
                .model
                .stream_round(messages.clone(), definitions.clone())
                .await
            {
                Ok(round) => round,
                Err(e) => {
                    warn!("Reply generation failed: {}", e);
                    sink.send(Err(e)).await;
                    return;
                }
            };

            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            while let Some(item) = round.next().await {
                match item {
                    Ok(ModelDelta::Text(delta)) => {
                        text.push_str(&delta);
                        if !sink.send(Ok(delta)).await {
                            return;
                        }
                    }
                    Ok(ModelDelta::ToolCall(call)) => calls.push(call),
                    Err(e) => {
                        warn!("Reply stream failed: {}", e);
                        sink.send(Err(e)).await;
                        return;
                    }
                }
            }

            if calls.is_empty() {
                return;
            }

            iterations += 1;
            if iterations > self.max_tool_iterations {
                warn!(
                    "Model exceeded {} tool iterations, giving up",
                    self.max_tool_iterations
                );
                sink.send(Ok(TOOL_LOOP_APOLOGY.to_string())).await;
                return;
            }

            let content = (!text.is_empty()).then_some(text);
            messages.push(ChatMessage::assistant_tool_calls(content, calls.clone()));
            for call in calls {
                let result = self.execute(&call).await;
                messages.push(ChatMessage::tool_result(call.id, result.to_string()));
                if sink.is_cancelled() {
                    return;
                }
            }
        }
    }

    /// Run one tool call, folding every failure into an error payload.
    async fn execute(&self, call: &ToolCall) -> Value {
        let arguments = if call.arguments.trim().is_empty() {
            Ok(json!({}))
        } else {
            serde_json::from_str::<Value>(&call.arguments)
        };
        let arguments = match arguments {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, "Tool arguments are not valid JSON: {}", e);
                return json!({ "error": "Tool execution failed" });
            }
        };

        debug!(tool = %call.name, "Invoking tool");
        match timeout(self.tool_timeout, self.tools.invoke(&call.name, arguments)).await {
            Ok(Ok(value)) => value,
            Ok(Err(ToolError::UnknownTool(name))) => {
                warn!("Model called unknown tool {}", name);
                json!({ "error": "Unknown tool" })
            }
            Ok(Err(e)) => {
                warn!(tool = %call.name, "Tool execution error: {}", e);
                json!({ "error": "Tool execution failed" })
            }
            Err(_) => {
                warn!(tool = %call.name, "Tool timed out after {:?}", self.tool_timeout);
                json!({ "error": "Tool execution failed" })
            }
        }
    }
}
