use async_trait::async_trait;
use ragcrust_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::OpenAiProvider;
use super::sse::SseParser;
use crate::providers::{
    ChatRole, LlmProvider, LlmRequest, LlmResponse, LlmStream, LlmStreamResponse, Usage,
};

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let openai_request = convert_request(request, false);
        let response: ChatCompletionResponse = self
            .send_json(
                self.post("chat/completions").json(&openai_request),
                "chat completion",
            )
            .await?;
        convert_response(response)
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream> {
        let openai_request = convert_request(request, true);
        let response = self
            .send(
                self.post("chat/completions").json(&openai_request),
                "chat completion stream",
            )
            .await?;

        let parser = SseParser::new(response.bytes_stream(), decode_chunk);
        Ok(Box::pin(parser))
    }

    async fn health_check(&self) -> Result<bool> {
        match self.get("models").send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn convert_request(request: &LlmRequest, stream: bool) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system_prompt) = &request.system {
        messages.push(WireMessage {
            role: "system",
            content: system_prompt.clone(),
        });
    }

    for msg in &request.messages {
        messages.push(WireMessage {
            role: match msg.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: msg.content.clone(),
        });
    }

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

fn convert_response(response: ChatCompletionResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Provider("no choices in chat completion response".to_string()))?;

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage: response.usage.map(Usage::from),
        stop_reason: choice.finish_reason,
    })
}

fn decode_chunk(data: &str) -> Vec<Result<LlmStreamResponse>> {
    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => return vec![Err(Error::Provider(format!("JSON parse error: {e}")))],
    };

    if let Some(error) = chunk.error {
        return vec![Err(Error::Provider(format!(
            "chat completion stream error: {}",
            error.message
        )))];
    }

    let mut items = Vec::new();
    for choice in chunk.choices {
        match choice.delta.content {
            Some(content) => items.push(Ok(LlmStreamResponse {
                delta: content,
                usage: None,
                stop_reason: choice.finish_reason,
            })),
            None => {
                if let Some(reason) = choice.finish_reason {
                    items.push(Ok(LlmStreamResponse {
                        delta: String::new(),
                        usage: None,
                        stop_reason: Some(reason),
                    }));
                }
            }
        }
    }

    if let Some(usage) = chunk.usage {
        items.push(Ok(LlmStreamResponse {
            delta: String::new(),
            usage: Some(usage.into()),
            stop_reason: None,
        }));
    }

    items
}

// Request Types
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

// Response Types
#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

// Stream Response Types
#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct WireError {
    pub(crate) message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;

    #[test]
    fn system_prompt_becomes_first_message() {
        let request = LlmRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage::user("hi")],
            system: Some("You are a helpful assistant.".to_string()),
            max_tokens: Some(500),
            temperature: None,
        };
        let json = serde_json::to_value(convert_request(&request, true)).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn decode_chunk_reports_in_band_errors() {
        let items = decode_chunk(r#"{"error":{"message":"model overloaded"}}"#);
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }

    #[test]
    fn decode_chunk_emits_text_deltas() {
        let items = decode_chunk(
            r#"{"id":"c","model":"m","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().delta, "Hel");
    }
}
