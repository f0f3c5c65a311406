//! Two-round tool conversation.
//!
//! Round one sends `[system, user]` with the tools exposed, or as a plain chat
//! request when the tool set is empty. If the model asks for tool calls, each
//! is run locally and the results are appended as `tool` messages; round two
//! re-sends the whole conversation as a plain chat request and returns its
//! text. There is no third round.

use crate::inference::request::{chat_request, tool_response_message, tools_request};
use crate::inference::types::ChatMessage;
use crate::inference::GroqClient;

use super::errors::AgentError;
use super::tools::{definitions, find_tool, Tool};

impl GroqClient {
    /// Run one tool-calling exchange and return the model's final text.
    ///
    /// Tool calls naming an unknown function are skipped. Any failure
    /// (network, decoding, callback) is returned as
    /// [`AgentError::ConversationFailed`] wrapping the cause.
    pub async fn run_conversation_with_tools(
        &self,
        user_prompt: &str,
        tools: &[Tool],
        model: &str,
        system_message: &str,
    ) -> Result<String, AgentError> {
        self.tool_round_trip(user_prompt, tools, model, system_message)
            .await
            .map_err(|e| {
                tracing::warn!(model = %model, error = %e, "tool conversation failed");
                AgentError::ConversationFailed {
                    source: Box::new(e),
                }
            })
    }

    async fn tool_round_trip(
        &self,
        user_prompt: &str,
        tools: &[Tool],
        model: &str,
        system_message: &str,
    ) -> Result<String, AgentError> {
        let mut messages = vec![
            ChatMessage::system(system_message),
            ChatMessage::user(user_prompt),
        ];

        let first = self
            .chat_completion(&tools_request(model, messages.clone(), &definitions(tools), None))
            .await?;

        let Some(reply) = first.first_message().cloned() else {
            return Ok(String::new());
        };

        let tool_calls = reply.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            return Ok(reply.content.unwrap_or_default());
        }

        tracing::info!(
            model = %model,
            tool_call_count = tool_calls.len(),
            "model requested tool calls"
        );
        messages.push(ChatMessage::from(reply));

        for call in &tool_calls {
            let Some(tool) = find_tool(tools, &call.function.name) else {
                tracing::warn!(
                    tool = %call.function.name,
                    call_id = %call.id,
                    "skipping call to unknown tool"
                );
                continue;
            };

            tracing::debug!(tool = %call.function.name, call_id = %call.id, "running tool");
            let result = tool.call(&call.function.arguments)?;
            messages.push(tool_response_message(&call.id, &call.function.name, &result));
        }

        let second = self.chat_completion(&chat_request(model, messages, None)).await?;
        Ok(second.first_content().unwrap_or_default().to_string())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ClientConfig, InferenceError};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const MODEL: &str = "llama-3.3-70b-versatile";

    /// Matches chat bodies that do not expose tools (the second round).
    struct WithoutTools;

    impl Match for WithoutTools {
        fn matches(&self, request: &Request) -> bool {
            serde_json::from_slice::<Value>(&request.body)
                .map(|body| body.get("tools").is_none())
                .unwrap_or(false)
        }
    }

    fn test_client(server: &MockServer) -> GroqClient {
        GroqClient::new(ClientConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    fn weather_tool(calls: Arc<AtomicUsize>) -> Tool {
        Tool::new(
            "get_weather",
            "Current weather for a city",
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
            move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                let args: Value = serde_json::from_str(args)?;
                Ok(json!({"city": args["city"], "temp_c": 21}).to_string())
            },
        )
    }

    fn tool_call_reply(calls: Value) -> Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": calls},
                "finish_reason": "tool_calls"
            }]
        })
    }

    fn text_reply(content: &str) -> Value {
        json!({
            "id": "chatcmpl-2",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    async fn mount_rounds(server: &MockServer, first: Value, second: Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"tool_choice": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(WithoutTools)
            .respond_with(ResponseTemplate::new(200).set_body_json(second))
            .mount(server)
            .await;
    }

    async fn sent_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let server = MockServer::start().await;
        mount_rounds(
            &server,
            tool_call_reply(json!([{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Lisbon\"}"}
            }])),
            text_reply("It is 21°C in Lisbon."),
        )
        .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let client = test_client(&server);
        let answer = client
            .run_conversation_with_tools(
                "Weather in Lisbon?",
                &[weather_tool(calls.clone())],
                MODEL,
                "You are a weather assistant.",
            )
            .await
            .unwrap();

        assert_eq!(answer, "It is 21°C in Lisbon.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let bodies = sent_bodies(&server).await;
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(bodies[0]["tools"][0]["function"]["name"], "get_weather");

        let messages = bodies[1]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(messages[3]["name"], "get_weather");

        let result: Value = serde_json::from_str(messages[3]["content"].as_str().unwrap()).unwrap();
        assert_eq!(result["city"], "Lisbon");
    }

    #[tokio::test]
    async fn test_no_tool_calls_sends_one_request() {
        let server = MockServer::start().await;
        mount_rounds(&server, text_reply("Hello there."), text_reply("unused")).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let answer = test_client(&server)
            .run_conversation_with_tools("hi", &[weather_tool(calls.clone())], MODEL, "Be brief.")
            .await
            .unwrap();

        assert_eq!(answer, "Hello there.");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sent_bodies(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_returns_empty_string() {
        let server = MockServer::start().await;
        mount_rounds(
            &server,
            json!({"choices": [{"index": 0, "message": {"role": "assistant"}}]}),
            text_reply("unused"),
        )
        .await;

        let answer = test_client(&server)
            .run_conversation_with_tools(
                "hi",
                &[weather_tool(Arc::new(AtomicUsize::new(0)))],
                MODEL,
                "s",
            )
            .await
            .unwrap();
        assert_eq!(answer, "");
    }

    #[tokio::test]
    async fn test_empty_tool_set_sends_plain_chat() {
        let server = MockServer::start().await;
        mount_rounds(&server, text_reply("unused"), text_reply("Plain answer.")).await;

        let answer = test_client(&server)
            .run_conversation_with_tools("hi", &[], MODEL, "s")
            .await
            .unwrap();
        assert_eq!(answer, "Plain answer.");

        let bodies = sent_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].get("tools").is_none());
        assert!(bodies[0].get("tool_choice").is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_skipped() {
        let server = MockServer::start().await;
        mount_rounds(
            &server,
            tool_call_reply(json!([
                {"id": "call_1", "type": "function", "function": {"name": "get_stock", "arguments": "{}"}},
                {"id": "call_2", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}}
            ])),
            text_reply("Cold."),
        )
        .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let answer = test_client(&server)
            .run_conversation_with_tools("?", &[weather_tool(calls.clone())], MODEL, "s")
            .await
            .unwrap();

        assert_eq!(answer, "Cold.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let bodies = sent_bodies(&server).await;
        let messages = bodies[1]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3]["tool_call_id"], "call_2");
    }

    #[tokio::test]
    async fn test_callback_error_is_wrapped() {
        let server = MockServer::start().await;
        mount_rounds(
            &server,
            tool_call_reply(json!([{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "not json"}
            }])),
            text_reply("unused"),
        )
        .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let err = test_client(&server)
            .run_conversation_with_tools("?", &[weather_tool(calls)], MODEL, "s")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ConversationFailed { .. }));
        assert!(matches!(err.root_cause(), AgentError::ToolFailed { .. }));
        assert_eq!(sent_bodies(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_api_error_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached", "code": "rate_limit_exceeded"}
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .run_conversation_with_tools("?", &[], MODEL, "s")
            .await
            .unwrap_err();

        match err.root_cause() {
            AgentError::Inference(inner) => assert!(inner.is_rate_limited()),
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_client_is_wrapped() {
        let server = MockServer::start().await;
        let client = test_client(&server);
        client.close();

        let err = client
            .run_conversation_with_tools("?", &[], MODEL, "s")
            .await
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            AgentError::Inference(InferenceError::ClientClosed)
        ));
    }
}
