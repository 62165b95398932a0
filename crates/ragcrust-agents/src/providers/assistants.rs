use async_trait::async_trait;
use ragcrust_common::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Assistant / thread / run surface used for file-attached generation.
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Create an assistant with file search enabled; returns its id.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;

    async fn create_thread(&self) -> Result<String>;

    /// Post a user turn with `attachments` scoped to file search.
    async fn post_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<String>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Thread messages, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub model: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// Polling stops here. `RequiresAction` counts as terminal: no tool
    /// outputs are ever submitted, so the run cannot progress on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RequiresAction
                | Self::Cancelled
                | Self::Failed
                | Self::Completed
                | Self::Incomplete
                | Self::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: MessageRole,
    /// Text content parts in order; non-text parts are dropped.
    pub texts: Vec<String>,
}

impl ThreadMessage {
    pub fn first_text(&self) -> Option<&str> {
        self.texts
            .iter()
            .map(String::as_str)
            .find(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Expired.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(RunStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn run_status_parses_wire_names() {
        let run: Run =
            serde_json::from_str(r#"{"id":"run_1","status":"in_progress"}"#).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert_eq!(run.status.to_string(), "in_progress");
    }

    #[test]
    fn first_text_skips_blank_parts() {
        let message = ThreadMessage {
            role: MessageRole::Assistant,
            texts: vec!["  ".to_string(), "answer".to_string()],
        };
        assert_eq!(message.first_text(), Some("answer"));
    }
}
