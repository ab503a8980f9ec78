use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::base::{
    ChatMessage, LLMConfig, LLMError, LLMResult, LanguageModel, ModelDelta, ModelStream,
    ToolDefinition,
};
use super::sse::{LineBuffer, SseChunk, ToolCallAccumulator, parse_sse_line};
use crate::utils::req_manager::ReqManager;

/// Streaming chat completions against an OpenAI-compatible endpoint
pub struct OpenAIChatModel {
    config: LLMConfig,
    http: Arc<ReqManager>,
}

impl OpenAIChatModel {
    pub fn new(config: LLMConfig, http: Arc<ReqManager>) -> LLMResult<Self> {
        if config.api_key.is_empty() {
            return Err(LLMError::AuthenticationFailed(
                "API key is required for OpenAI".to_string(),
            ));
        }
        Ok(Self { config, http })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
            "stream": true,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let mut value = json!({
        "role": message.role,
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        value["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        value["tool_call_id"] = json!(id);
    }
    value
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

/// Map a non-success HTTP status onto an error kind
pub fn classify_status(status: u16, body: &str) -> LLMError {
    let detail = extract_error_message(body).unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => LLMError::AuthenticationFailed(detail),
        429 => LLMError::RateLimited(detail),
        s => LLMError::ProviderError(format!("HTTP {s}: {detail}")),
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn stream_round(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> LLMResult<ModelStream> {
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending streaming chat completion request"
        );

        let guard = self
            .http
            .acquire()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        let result = guard
            .client()
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .header("Accept", "text/event-stream")
            .json(&self.build_body(&messages, &tools))
            .send()
            .await;
        guard.record(&result);
        let response = result.map_err(|e| LLMError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "chat completion request rejected");
            return Err(classify_status(status.as_u16(), &body));
        }

        let stream: ModelStream = Box::pin(try_stream! {
            // Hold the pool slot until the body is drained
            let _guard = guard;
            let mut body = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut tool_calls = ToolCallAccumulator::default();
            let mut finished = false;

            while !finished {
                let Some(chunk) = body.next().await else {
                    break;
                };
                let chunk = chunk
                    .map_err(|e| LLMError::NetworkError(format!("stream read error: {e}")))?;

                let mut parsed = Vec::new();
                for line in lines.push(&chunk) {
                    match parse_sse_line(&line) {
                        Ok(chunks) => parsed.extend(chunks),
                        Err(e) => warn!(error = %e, "SSE parse error, skipping line"),
                    }
                }

                for item in parsed {
                    match item {
                        SseChunk::TextDelta(text) => yield ModelDelta::Text(text),
                        SseChunk::ToolCallDelta { index, id, name, arguments } => {
                            tool_calls.push(index, id, name, arguments);
                        }
                        SseChunk::Done => finished = true,
                    }
                }
            }

            let leftover = if finished { None } else { lines.remainder() };
            if let Some(rest) = leftover {
                for item in parse_sse_line(&rest).unwrap_or_default() {
                    match item {
                        SseChunk::TextDelta(text) => yield ModelDelta::Text(text),
                        SseChunk::ToolCallDelta { index, id, name, arguments } => {
                            tool_calls.push(index, id, name, arguments);
                        }
                        SseChunk::Done => {}
                    }
                }
            }

            for call in tool_calls.finish() {
                debug!(tool = %call.name, "model requested tool call");
                yield ModelDelta::ToolCall(call);
            }
        });

        Ok(stream)
    }

    fn provider_info(&self) -> &'static str {
        "OpenAI chat completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::base::ToolCall;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> OpenAIChatModel {
        let config = LLMConfig {
            api_key: "sk-test".to_string(),
            base_url: format!("{}/v1", server.uri()),
            ..Default::default()
        };
        OpenAIChatModel::new(config, Arc::new(ReqManager::new(4).unwrap())).unwrap()
    }

    fn sse(lines: &[&str]) -> ResponseTemplate {
        let body: String = lines.iter().map(|l| format!("data: {l}\n\n")).collect();
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    async fn collect(stream: ModelStream) -> Vec<LLMResult<ModelDelta>> {
        stream.collect().await
    }

    #[test]
    fn test_requires_api_key() {
        let http = Arc::new(ReqManager::new(1).unwrap());
        let result = OpenAIChatModel::new(LLMConfig::default(), http);
        assert!(matches!(result, Err(LLMError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, r#"{"error":{"message":"bad key"}}"#),
            LLMError::AuthenticationFailed(m) if m == "bad key"
        ));
        assert!(matches!(classify_status(429, ""), LLMError::RateLimited(_)));
        assert!(matches!(
            classify_status(503, "down"),
            LLMError::ProviderError(m) if m.contains("503")
        ));
    }

    #[tokio::test]
    async fn test_streams_text_deltas() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "max_tokens": 150
            })))
            .respond_with(sse(&[
                r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
                r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
                r#"{"choices":[{"delta":{"content":" there"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ]))
            .expect(1)
            .mount(&server)
            .await;

        let model = model_for(&server);
        let stream = model
            .stream_round(vec![ChatMessage::user("hi")], vec![])
            .await
            .unwrap();
        let items: Vec<ModelDelta> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(
            items,
            vec![
                ModelDelta::Text("Hello".to_string()),
                ModelDelta::Text(" there".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_streams_assembled_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({ "tool_choice": "auto" })))
            .respond_with(sse(&[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"lookupCustomer","arguments":"{\"pho"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ne\":\"555\"}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ]))
            .mount(&server)
            .await;

        let model = model_for(&server);
        let tools = vec![ToolDefinition {
            name: "lookupCustomer".to_string(),
            description: "Look up a customer".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let stream = model
            .stream_round(vec![ChatMessage::user("who am I")], tools)
            .await
            .unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Ok(ModelDelta::ToolCall(call)) => {
                assert_eq!(call.id, "call_1");
                assert_eq!(call.name, "lookupCustomer");
                assert_eq!(call.arguments, r#"{"phone":"555"}"#);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error":{"message":"Incorrect API key provided"}}"#),
            )
            .mount(&server)
            .await;

        let model = model_for(&server);
        let result = model.stream_round(vec![ChatMessage::user("hi")], vec![]).await;
        assert!(matches!(result, Err(LLMError::AuthenticationFailed(m)) if m.contains("Incorrect")));
    }

    #[test]
    fn test_wire_message_for_tool_turns() {
        let call = ToolCall {
            id: "call_9".to_string(),
            name: "checkAvailability".to_string(),
            arguments: "{}".to_string(),
        };
        let assistant = wire_message(&ChatMessage::assistant_tool_calls(None, vec![call]));
        assert_eq!(assistant["role"], "assistant");
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "checkAvailability");

        let tool = wire_message(&ChatMessage::tool_result("call_9", "{}"));
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_9");
    }
}
