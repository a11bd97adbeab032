//! OpenAI-compatible chat-completions client
//!
//! Works against any provider exposing `/chat/completions` with function
//! calling (Groq, OpenRouter, OpenAI, local servers).
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{parse_react_output, LanguageModel, ThinkRequest};
use crate::config::LlmSettings;
use crate::error::AdvisorError;
use crate::models::{Decision, Role, ToolCall};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiCompatibleClient {
    client: Client,
    settings: LlmSettings,
}

impl OpenAiCompatibleClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| AdvisorError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete(&self, request: ThinkRequest<'_>) -> Result<Decision> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AdvisorError::Backend("LLM API key not configured".to_string()))?;

        let body = ChatCompletionRequest {
            model: &self.settings.model,
            messages: build_messages(&request),
            tools: request
                .tools
                .iter()
                .map(|spec| WireTool {
                    kind: "function",
                    function: WireFunctionSpec {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.input_schema.clone(),
                    },
                })
                .collect(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!(model = %self.settings.model, steps = request.scratchpad.len(), "Calling chat-completions API");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat-completions request failed: {}", e);
                AdvisorError::Backend(format!("LLM API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat-completions error response: {}", error_text);
            return Err(AdvisorError::Backend(format!(
                "LLM API returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat-completions response: {}", e);
            AdvisorError::Backend(format!("LLM parse error: {}", e))
        })?;

        decision_from_response(completion)
    }
}

/// Render the think request as chat messages. Scratchpad steps become
/// assistant tool calls followed by their tool results.
fn build_messages(request: &ThinkRequest<'_>) -> Vec<WireMessage> {
    let mut messages =
        Vec::with_capacity(request.history.len() + request.scratchpad.len() * 2 + 2);

    messages.push(WireMessage::text("system", request.system_prompt));

    for utterance in request.history {
        let message = match utterance.role() {
            Role::User => WireMessage::text("user", utterance.text()),
            Role::Assistant => WireMessage::text("assistant", utterance.text()),
            Role::Tool => WireMessage::text("assistant", &format!("Observasi: {}", utterance.text())),
        };
        messages.push(message);
    }

    messages.push(WireMessage::text("user", request.input));

    for (i, step) in request.scratchpad.iter().enumerate() {
        let call_id = format!("call_{}", i + 1);
        messages.push(WireMessage {
            role: "assistant".to_string(),
            content: (!step.thought.is_empty()).then(|| step.thought.clone()),
            tool_calls: vec![WireToolCall {
                id: call_id.clone(),
                kind: "function".to_string(),
                function: WireFunctionCall {
                    name: step.action.clone(),
                    arguments: step.action_input.to_string(),
                },
            }],
            tool_call_id: None,
        });
        messages.push(WireMessage {
            role: "tool".to_string(),
            content: Some(step.observation.clone()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id),
        });
    }

    messages
}

fn decision_from_response(completion: ChatCompletionResponse) -> Result<Decision> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdvisorError::Backend("No choices in LLM response".to_string()))?;

    debug!(finish_reason = ?choice.finish_reason, "Chat-completions response received");

    let message = choice.message;
    let thought = message.content.unwrap_or_default();

    if let Some(call) = message.tool_calls.into_iter().next() {
        let tool_input = serde_json::from_str::<Value>(&call.function.arguments)
            .unwrap_or(Value::String(call.function.arguments));

        return Ok(Decision::UseTool(ToolCall {
            tool_name: call.function.name,
            tool_input,
            thought: thought.trim().to_string(),
        }));
    }

    if thought.trim().is_empty() {
        return Err(AdvisorError::Backend("Empty response from LLM".to_string()));
    }

    Ok(parse_react_output(&thought))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

fn function_kind() -> String {
    "function".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<WireToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<WireToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvisorConfig;
    use crate::models::{ScratchpadStep, StepOutcome, ToolSpec, Utterance};
    use serde_json::json;

    #[test]
    fn test_messages_include_history_and_scratchpad() {
        let history = vec![Utterance::user("Halo"), Utterance::assistant("Halo juga")];
        let scratchpad = vec![ScratchpadStep::new(
            ToolCall {
                tool_name: "analisis_swot".to_string(),
                tool_input: json!({ "usaha_type": "bakso" }),
                thought: "perlu SWOT".to_string(),
            },
            "Analisis SWOT untuk bakso:".to_string(),
            StepOutcome::Success,
        )];
        let request = ThinkRequest {
            system_prompt: "Kamu INA",
            history: &history,
            input: "Analisis usaha bakso",
            scratchpad: &scratchpad,
            tools: &[],
        };

        let messages = build_messages(&request);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user", "assistant", "tool"]);
        assert_eq!(messages[4].tool_calls[0].function.name, "analisis_swot");
        assert_eq!(messages[5].tool_call_id.as_deref(), Some("call_1"));

        let wire = serde_json::to_value(&messages[4]).unwrap();
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert!(wire.get("tool_call_id").is_none());
    }

    #[test]
    fn test_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "kalkulator_keuangan",
                            "arguments": "{\"modal\": 20000000, \"margin_percent\": 25}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let completion: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let Decision::UseTool(call) = decision_from_response(completion).unwrap() else {
            panic!("expected tool call");
        };
        assert_eq!(call.tool_name, "kalkulator_keuangan");
        assert_eq!(call.tool_input["margin_percent"], 25);
    }

    #[test]
    fn test_content_response_is_parsed_as_react() {
        let raw = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Final Answer: Silakan daftar NIB.", "tool_calls": null },
                "finish_reason": "stop"
            }]
        });

        let completion: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(
            decision_from_response(completion).unwrap(),
            Decision::final_answer("Silakan daftar NIB.")
        );
    }

    #[test]
    fn test_empty_choices_is_backend_error() {
        let completion: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(
            decision_from_response(completion),
            Err(AdvisorError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_backend_error() {
        let client = OpenAiCompatibleClient::new(AdvisorConfig::default().llm).unwrap();
        let tools = vec![ToolSpec {
            name: "analisis_swot".to_string(),
            description: "SWOT".to_string(),
            input_schema: json!({ "type": "object" }),
        }];
        let request = ThinkRequest {
            system_prompt: "",
            history: &[],
            input: "halo",
            scratchpad: &[],
            tools: &tools,
        };

        let err = client.complete(request).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
