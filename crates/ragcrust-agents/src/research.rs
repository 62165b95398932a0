use std::time::Duration;

use ragcrust_common::{Error, Result};
use ragcrust_config::ResearchConfig;
use serde::Serialize;
use tracing::{debug, warn};

use crate::providers::{LlmProvider, LlmRequest};

const BRIEF_SYSTEM_PROMPT: &str =
    "You are a research assistant. Provide key insights on the topic.";
const REPORT_SYSTEM_PROMPT: &str =
    "You are a research assistant. Provide comprehensive insights on the given topic.";
const REPORT_SOURCE: &str = "OpenAI Analysis";

/// Result of a standalone research request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchReport {
    pub query: String,
    pub findings: Vec<String>,
    pub sources: Vec<String>,
    pub summary: String,
}

/// Fetches short topical briefs from a chat model.
pub struct ResearchAugmenter {
    model: String,
    max_tokens: u32,
    report_max_tokens: Option<u32>,
    timeout: Duration,
    summary_chars: usize,
}

impl ResearchAugmenter {
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            report_max_tokens: config.report_max_tokens,
            timeout: config.timeout(),
            summary_chars: config.summary_chars,
        }
    }

    /// Brief insights about `query`, or an empty string if anything goes wrong.
    pub async fn augment<P>(&self, provider: &P, query: &str) -> String
    where
        P: LlmProvider + ?Sized,
    {
        let request = LlmRequest::single_turn(
            &self.model,
            Some(BRIEF_SYSTEM_PROMPT.to_string()),
            format!("Provide brief research insights about: {query}"),
        )
        .with_max_tokens(Some(self.max_tokens));

        match tokio::time::timeout(self.timeout, provider.complete(&request)).await {
            Ok(Ok(response)) => {
                debug!(chars = response.content.len(), "research brief received");
                response.content
            }
            Ok(Err(e)) => {
                warn!("research augmentation failed: {e}");
                String::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "research augmentation timed out"
                );
                String::new()
            }
        }
    }

    /// Append a non-empty brief to the user's message as a separate block.
    pub fn append_brief(message: &str, brief: &str) -> String {
        if brief.trim().is_empty() {
            return message.to_string();
        }
        format!("{message}\n\nResearch findings:\n{brief}")
    }

    /// Standalone research. Unlike [`augment`](Self::augment), failures propagate.
    pub async fn research<P>(&self, provider: &P, query: &str) -> Result<ResearchReport>
    where
        P: LlmProvider + ?Sized,
    {
        let request = LlmRequest::single_turn(
            &self.model,
            Some(REPORT_SYSTEM_PROMPT.to_string()),
            format!("Research the following topic and provide insights: {query}"),
        )
        .with_max_tokens(self.report_max_tokens);

        let response = provider
            .complete(&request)
            .await
            .map_err(|e| Error::Agent(format!("research failed: {e}")))?;

        let summary = summarize(&response.content, self.summary_chars);
        Ok(ResearchReport {
            query: query.to_string(),
            findings: vec![response.content],
            sources: vec![REPORT_SOURCE.to_string()],
            summary,
        })
    }
}

fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::providers::{LlmResponse, LlmStream};

    struct CannedProvider {
        reply: Result<String>,
        delay: Option<Duration>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl CannedProvider {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(Error::Provider("status=429".into())),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn provider_id(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    content: text.clone(),
                    model: request.model.clone(),
                    usage: None,
                    stop_reason: Some("stop".into()),
                }),
                Err(e) => Err(Error::Provider(e.to_string())),
            }
        }

        async fn complete_stream(&self, _request: &LlmRequest) -> Result<LlmStream> {
            Err(Error::Provider("not used".into()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn augmenter() -> ResearchAugmenter {
        ResearchAugmenter::new(&ResearchConfig::default())
    }

    #[tokio::test]
    async fn augment_uses_bounded_brief_request() {
        let provider = CannedProvider::ok("Rust is memory safe.");
        let brief = augmenter().augment(&provider, "rust").await;
        assert_eq!(brief, "Rust is memory safe.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].max_tokens, Some(500));
        assert!(seen[0].messages[0].content.ends_with("about: rust"));
    }

    #[tokio::test]
    async fn augment_swallows_failures() {
        let brief = augmenter().augment(&CannedProvider::failing(), "rust").await;
        assert!(brief.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn augment_gives_up_after_timeout() {
        let provider = CannedProvider {
            delay: Some(Duration::from_secs(600)),
            ..CannedProvider::ok("late")
        };
        let brief = augmenter().augment(&provider, "rust").await;
        assert!(brief.is_empty());
    }

    #[test]
    fn brief_is_appended_never_replacing_message() {
        assert_eq!(
            ResearchAugmenter::append_brief("question", "facts"),
            "question\n\nResearch findings:\nfacts"
        );
        assert_eq!(ResearchAugmenter::append_brief("question", "  "), "question");
    }

    #[tokio::test]
    async fn research_report_truncates_summary() {
        let long = "a".repeat(600);
        let report = augmenter()
            .research(&CannedProvider::ok(&long), "topic")
            .await
            .unwrap();
        assert_eq!(report.findings, vec![long]);
        assert_eq!(report.sources, vec!["OpenAI Analysis".to_string()]);
        assert_eq!(report.summary.len(), 503);
        assert!(report.summary.ends_with("..."));

        let short = augmenter()
            .research(&CannedProvider::ok("brief"), "topic")
            .await
            .unwrap();
        assert_eq!(short.summary, "brief");
    }

    #[tokio::test]
    async fn research_propagates_failures() {
        let result = augmenter().research(&CannedProvider::failing(), "topic").await;
        assert!(matches!(result, Err(Error::Agent(_))));
    }
}
