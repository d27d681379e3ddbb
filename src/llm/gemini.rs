//! Google Gemini provider implementation

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    url: String,
    model_id: String,
}

impl GeminiService {
    /// `gateway` replaces the public endpoint host when set
    pub fn new(api_key: String, model: &str, gateway: Option<&str>, timeout: Duration) -> Self {
        let base = gateway.map_or(DEFAULT_BASE_URL, |gw| gw.trim_end_matches('/'));
        let url = format!("{base}/v1beta/models/{model}:generateContent");

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            url,
            model_id: model.to_string(),
        }
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let system_instruction = (!request.system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(&request.system)],
        });

        let mut contents: Vec<GeminiContent> = Vec::new();
        for msg in &request.messages {
            let parts = translate_parts(msg);
            if parts.is_empty() {
                continue;
            }
            let role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };

            // One tool result per stored message; Gemini expects the responses
            // to a batch of calls in a single turn.
            if let Some(last) = contents.last_mut() {
                if last.role.as_deref() == Some(role)
                    && last.is_function_responses()
                    && parts.iter().all(|p| p.function_response.is_some())
                {
                    last.parts.extend(parts);
                    continue;
                }
            }

            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<LlmResponse, LlmError> {
        let candidate = resp.candidates.into_iter().next().ok_or_else(|| {
            match resp.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => LlmError::invalid_request(format!("Prompt blocked: {reason}")),
                None => LlmError::unknown("No candidates in response"),
            }
        })?;

        let mut content = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                content.push(ContentBlock::ToolUse {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    name: call.name,
                    input: call.args,
                });
            } else if let Some(text) = part.text {
                if text.is_empty() {
                    continue;
                }
                if part.thought {
                    content.push(ContentBlock::Thought { text });
                } else {
                    content.push(ContentBlock::Text { text });
                }
            }
        }

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        if content.is_empty() && !finish_reason.is_empty() && finish_reason != "STOP" {
            return Err(LlmError::invalid_request(format!(
                "Response stopped without content: {finish_reason}"
            )));
        }

        Ok(LlmResponse {
            end_turn: finish_reason == "STOP",
            content,
            usage: Usage {
                input_tokens: resp.usage_metadata.prompt_token_count,
                output_tokens: resp.usage_metadata.candidates_token_count
                    + resp.usage_metadata.thoughts_token_count,
            },
        })
    }
}

fn translate_parts(msg: &LlmMessage) -> Vec<GeminiPart> {
    msg.content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } if !text.is_empty() => Some(GeminiPart::text(text)),
            ContentBlock::ToolUse { name, input, .. } => Some(GeminiPart {
                function_call: Some(GeminiFunctionCall {
                    id: None,
                    name: name.clone(),
                    args: input.clone(),
                }),
                ..GeminiPart::default()
            }),
            ContentBlock::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                let response = if *is_error {
                    serde_json::json!({ "error": content })
                } else {
                    serde_json::json!({ "result": content })
                };
                Some(GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        name: name.clone(),
                        response,
                    }),
                    ..GeminiPart::default()
                })
            }
            // Thoughts are never replayed
            ContentBlock::Text { .. } | ContentBlock::Thought { .. } => None,
        })
        .collect()
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn is_function_responses(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|p| p.function_response.is_some())
    }
}

/// A part carries exactly one of its payload fields
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    usage_metadata: GeminiUsageMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
