//! Server-sent event parsing for OpenAI-compatible streaming completions.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use super::base::{LLMError, LLMResult, ToolCall};

const DONE_SENTINEL: &str = "[DONE]";

/// Parsed unit of a streaming completion
#[derive(Debug, Clone, PartialEq)]
pub enum SseChunk {
    TextDelta(String),
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: DeltaBody,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaBody {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
    name: Option<String>,
    arguments: Option<String>,
}

/// Parse one SSE line into zero or more chunks.
///
/// Blank lines, comments and non-`data:` fields yield nothing.
pub fn parse_sse_line(line: &str) -> LLMResult<Vec<SseChunk>> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with(':') {
        return Ok(vec![]);
    }

    let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
        return Ok(vec![]);
    };
    if payload.is_empty() {
        return Ok(vec![]);
    }
    if payload == DONE_SENTINEL {
        return Ok(vec![SseChunk::Done]);
    }

    let delta: StreamDelta = serde_json::from_str(payload)
        .map_err(|e| LLMError::InvalidResponse(format!("failed to parse SSE delta: {e}")))?;

    let mut chunks = Vec::new();
    if let Some(choice) = delta.choices.into_iter().next() {
        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            chunks.push(SseChunk::TextDelta(text));
        }

        for fragment in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match fragment.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            chunks.push(SseChunk::ToolCallDelta {
                index: fragment.index,
                id: fragment.id,
                name,
                arguments,
            });
        }

        if choice.finish_reason.is_some() {
            chunks.push(SseChunk::Done);
        }
    }
    Ok(chunks)
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stitches streamed tool-call fragments back together by index
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn push(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id {
            call.id = id;
        }
        if let Some(name) = name {
            call.name.push_str(&name);
        }
        if let Some(arguments) = arguments {
            call.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order. Calls without a name are dropped.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| ToolCall {
                id: if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                },
                name: call.name,
                arguments: call.arguments,
            })
            .collect()
    }
}

/// Splits a byte stream into complete lines, carrying partial lines over
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Whatever is left once the stream has ended
    pub fn remainder(self) -> Option<String> {
        let rest = self.buffer.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}
