use async_trait::async_trait;
use ragcrust_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::OpenAiProvider;
use super::sse::SseParser;
use crate::providers::{ResponseOutput, ResponseRequest, ResponseTool, ResponsesApi};

#[async_trait]
impl ResponsesApi for OpenAiProvider {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseOutput> {
        let stream = request.stream;
        let body = WireResponseRequest {
            model: &request.model,
            input: &request.input,
            instructions: request.instructions.as_deref(),
            reasoning: Reasoning {
                effort: request.reasoning_effort.as_str(),
            },
            tools: &request.tools,
            stream,
        };

        if stream {
            let response = self
                .send(self.post("responses").json(&body), "response stream")
                .await?;
            let parser = SseParser::new(response.bytes_stream(), decode_event);
            return Ok(ResponseOutput::Stream(Box::pin(parser)));
        }

        let response: WireResponse = self
            .send_json(self.post("responses").json(&body), "response")
            .await?;
        Ok(ResponseOutput::Text(response.into_text()))
    }
}

fn decode_event(data: &str) -> Vec<Result<String>> {
    let event = match serde_json::from_str::<WireStreamEvent>(data) {
        Ok(event) => event,
        Err(e) => return vec![Err(Error::Provider(format!("JSON parse error: {e}")))],
    };

    match event.kind.as_str() {
        "response.output_text.delta" => match event.delta {
            Some(delta) if !delta.is_empty() => vec![Ok(delta)],
            _ => Vec::new(),
        },
        "error" => vec![Err(Error::Provider(format!(
            "response stream error: {}",
            event
                .message
                .unwrap_or_else(|| "unknown error".to_string())
        )))],
        "response.failed" => {
            let message = event
                .response
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| "response failed".to_string());
            vec![Err(Error::Provider(format!("response stream error: {message}")))]
        }
        _ => Vec::new(),
    }
}

#[derive(Serialize)]
struct WireResponseRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    reasoning: Reasoning,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ResponseTool],
    stream: bool,
}

fn no_tools(tools: &&[ResponseTool]) -> bool {
    tools.is_empty()
}

#[derive(Serialize)]
struct Reasoning {
    effort: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<super::chat::WireError>,
}

impl WireResponse {
    fn into_text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }
        self.output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireStreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<String>,
    message: Option<String>,
    response: Option<WireResponse>,
}
