//! SSE streaming response parser for OpenAI-compatible chat completions.
//!
//! Reads a response body as a byte stream, splits it into lines, and parses the
//! payload of every `data: ` line as JSON until the `[DONE]` sentinel. Lines
//! without the prefix (comments, `event:` lines, keep-alives) are ignored.

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use super::errors::InferenceError;
use super::types::{
    ChatCompletionChunk, FunctionCallResponse, ResponseMessage, Role, ToolCallResponse,
};

/// Prefix marking a significant line.
const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Status reported for errors embedded in a stream that opened successfully.
const STREAM_STATUS: u16 = 200;

// ─── Line parser ─────────────────────────────────────────────────────────────

/// What a single body line means to the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// A JSON fragment to hand to the consumer.
    Data(Value),
    /// The terminator sentinel.
    Done,
    /// Anything without the `data: ` prefix.
    Ignored,
}

/// Classify one line of the response body (without its trailing `\n`).
pub fn parse_sse_line(line: &str) -> Result<SseLine, InferenceError> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(SseLine::Ignored);
    };

    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(SseLine::Done);
    }
    if payload.is_empty() {
        return Ok(SseLine::Ignored);
    }

    let value: Value = serde_json::from_str(payload).map_err(|e| InferenceError::StreamError {
        reason: format!("failed to parse SSE payload: {e} (data: {payload})"),
    })?;

    // Errors raised after the 200 headers arrive as an `error` payload
    if let Some(err) = InferenceError::from_error_payload(STREAM_STATUS, &value) {
        tracing::warn!(message = %err, "stream carried an API error");
        return Err(err);
    }

    Ok(SseLine::Data(value))
}

// ─── Stream ──────────────────────────────────────────────────────────────────

/// Turn a raw body byte stream into a stream of parsed `data:` fragments.
///
/// Lines are reassembled across chunk boundaries, so the transport may split
/// the body anywhere. The stream ends at `[DONE]` or when the body ends; a
/// transport error is yielded once and then ends the stream. A payload that
/// is not valid JSON, or that carries a top-level `error`, is yielded as an
/// error and parsing continues.
pub fn parse_sse_stream<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<Value, InferenceError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        |(mut byte_stream, mut buffer, mut body_ended)| async move {
            loop {
                // A complete line is already buffered
                if let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);

                    match parse_sse_line(&line) {
                        Ok(SseLine::Data(value)) => {
                            return Some((Ok(value), (byte_stream, buffer, body_ended)))
                        }
                        Ok(SseLine::Done) => {
                            tracing::debug!("stream reached [DONE]");
                            return None;
                        }
                        Ok(SseLine::Ignored) => continue,
                        Err(e) => return Some((Err(e), (byte_stream, buffer, body_ended))),
                    }
                }

                if body_ended {
                    // Last line without a trailing newline
                    if buffer.is_empty() {
                        return None;
                    }
                    let rest = std::mem::take(&mut buffer);
                    let line = String::from_utf8_lossy(&rest).into_owned();
                    return match parse_sse_line(&line) {
                        Ok(SseLine::Data(value)) => {
                            Some((Ok(value), (byte_stream, buffer, body_ended)))
                        }
                        Ok(_) => None,
                        Err(e) => Some((Err(e), (byte_stream, buffer, body_ended))),
                    };
                }

                // Need more data from the body
                match byte_stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, Vec::new(), true),
                        ));
                    }
                    None => body_ended = true,
                }
            }
        },
    )
}

/// Decode each JSON fragment as a [`ChatCompletionChunk`].
pub fn typed_chunks<S>(fragments: S) -> impl Stream<Item = Result<ChatCompletionChunk, InferenceError>>
where
    S: Stream<Item = Result<Value, InferenceError>>,
{
    fragments.map(|fragment| {
        fragment.and_then(|value| {
            serde_json::from_value(value).map_err(|e| InferenceError::StreamError {
                reason: format!("unexpected chunk shape: {e}"),
            })
        })
    })
}

/// Keep only the non-empty text deltas of a chunk stream.
pub fn text_fragments<S>(chunks: S) -> impl Stream<Item = Result<String, InferenceError>>
where
    S: Stream<Item = Result<ChatCompletionChunk, InferenceError>>,
{
    chunks.filter_map(|chunk| async move {
        match chunk {
            Ok(chunk) => chunk.content().map(|text| Ok(text.to_string())),
            Err(e) => Some(Err(e)),
        }
    })
}

// ─── Accumulator ─────────────────────────────────────────────────────────────

/// Folds streaming chunks back into one complete assistant message.
///
/// Tool calls arrive as fragments keyed by `index`: the first fragment carries
/// the id and name, later ones append to the argument string.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    /// In-progress tool calls: `(index, id, name, arguments_buffer)`.
    pending_tool_calls: Vec<(u32, Option<String>, String, String)>,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in and return its text delta, if any.
    pub fn accept<'a>(&mut self, chunk: &'a ChatCompletionChunk) -> Option<&'a str> {
        let choice = chunk.choices.first()?;

        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }

        for tc in choice.delta.tool_calls.iter().flatten() {
            let index = tc.index.unwrap_or(0);
            let name_part = tc.function.as_ref().and_then(|f| f.name.as_deref());
            let args_part = tc.function.as_ref().and_then(|f| f.arguments.as_deref());

            match self
                .pending_tool_calls
                .iter_mut()
                .find(|(idx, _, _, _)| *idx == index)
            {
                Some((_, id, name, args)) => {
                    name.push_str(name_part.unwrap_or_default());
                    args.push_str(args_part.unwrap_or_default());
                    if tc.id.is_some() {
                        id.clone_from(&tc.id);
                    }
                }
                None => self.pending_tool_calls.push((
                    index,
                    tc.id.clone(),
                    name_part.unwrap_or_default().to_string(),
                    args_part.unwrap_or_default().to_string(),
                )),
            }
        }

        let text = chunk.content()?;
        self.content.push_str(text);
        Some(text)
    }

    /// Text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// The assembled message, tool calls ordered by index.
    pub fn finish(mut self) -> ResponseMessage {
        self.pending_tool_calls.sort_by_key(|(index, _, _, _)| *index);

        let tool_calls: Vec<ToolCallResponse> = self
            .pending_tool_calls
            .into_iter()
            .map(|(index, id, name, arguments)| ToolCallResponse {
                id: id.unwrap_or_else(|| format!("call_{index}")),
                r#type: "function".to_string(),
                function: FunctionCallResponse { name, arguments },
            })
            .collect();

        ResponseMessage {
            role: Role::Assistant,
            content: (!self.content.is_empty()).then_some(self.content),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
