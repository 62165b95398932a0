use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Reasoning budget forwarded to models that support it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::Config(format!(
                "unknown reasoning effort '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

/// A single "generate reply" call. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    pub message: String,
    pub model: String,
    pub file_ids: Vec<String>,
    pub use_research: bool,
    pub reasoning_effort: ReasoningEffort,
    pub received_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            model: model.into(),
            file_ids: Vec::new(),
            use_research: false,
            reasoning_effort: ReasoningEffort::default(),
            received_at: Utc::now(),
        }
    }

    pub fn with_files(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }

    pub fn with_research(mut self, use_research: bool) -> Self {
        self.use_research = use_research;
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = effort;
        self
    }

    pub fn has_files(&self) -> bool {
        !self.file_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_request_factory() {
        let start_time = Utc::now();
        let request = GenerationRequest::new("Hello, world!", "gpt-5");
        let end_time = Utc::now();

        assert!(!request.id.is_empty());
        assert_eq!(request.message, "Hello, world!");
        assert_eq!(request.model, "gpt-5");
        assert!(!request.has_files());
        assert!(!request.use_research);
        assert_eq!(request.reasoning_effort, ReasoningEffort::Medium);
        assert!(request.received_at >= start_time);
        assert!(request.received_at <= end_time);
    }

    #[test]
    fn builder_methods_set_fields() {
        let request = GenerationRequest::new("q", "gpt-4o")
            .with_files(vec!["file-1".to_string()])
            .with_research(true)
            .with_reasoning_effort(ReasoningEffort::High);

        assert!(request.has_files());
        assert!(request.use_research);
        assert_eq!(request.reasoning_effort.as_str(), "high");
    }

    #[test]
    fn reasoning_effort_parses_case_insensitively() {
        assert_eq!("LOW".parse::<ReasoningEffort>().unwrap(), ReasoningEffort::Low);
        assert_eq!(" high ".parse::<ReasoningEffort>().unwrap(), ReasoningEffort::High);
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }

    #[test]
    fn reasoning_effort_serde_is_lowercase() {
        let json = serde_json::to_string(&ReasoningEffort::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: ReasoningEffort = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, ReasoningEffort::Low);
    }
}
