use async_trait::async_trait;
use ragcrust_common::Result;
use serde::Deserialize;
use serde_json::json;

use super::{ASSISTANTS_BETA, OpenAiProvider};
use crate::providers::{AssistantSpec, AssistantsApi, MessageRole, Run, ThreadMessage};

#[async_trait]
impl AssistantsApi for OpenAiProvider {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let created: IdObject = self
            .send_json(
                self.post("assistants")
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&json!({
                        "model": spec.model,
                        "instructions": spec.instructions,
                        "tools": [{ "type": "file_search" }],
                    })),
                "assistant creation",
            )
            .await?;
        Ok(created.id)
    }

    async fn create_thread(&self) -> Result<String> {
        let created: IdObject = self
            .send_json(
                self.post("threads")
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&json!({})),
                "thread creation",
            )
            .await?;
        Ok(created.id)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<String> {
        let attachments: Vec<_> = attachments
            .iter()
            .map(|file_id| json!({ "file_id": file_id, "tools": [{ "type": "file_search" }] }))
            .collect();
        let created: IdObject = self
            .send_json(
                self.post(&format!("threads/{thread_id}/messages"))
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&json!({
                        "role": "user",
                        "content": content,
                        "attachments": attachments,
                    })),
                "thread message",
            )
            .await?;
        Ok(created.id)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        self.send_json(
            self.post(&format!("threads/{thread_id}/runs"))
                .header("OpenAI-Beta", ASSISTANTS_BETA)
                .json(&json!({ "assistant_id": assistant_id })),
            "run creation",
        )
        .await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.send_json(
            self.get(&format!("threads/{thread_id}/runs/{run_id}"))
                .header("OpenAI-Beta", ASSISTANTS_BETA),
            "run retrieval",
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let list: MessageList = self
            .send_json(
                self.get(&format!("threads/{thread_id}/messages"))
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .query(&[("order", "desc")]),
                "thread message list",
            )
            .await?;
        Ok(list.data.into_iter().map(ThreadMessage::from).collect())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        self.send(
            self.delete(&format!("assistants/{assistant_id}"))
                .header("OpenAI-Beta", ASSISTANTS_BETA),
            "assistant deletion",
        )
        .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    role: MessageRole,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    text: Option<WireText>,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
}

impl From<WireMessage> for ThreadMessage {
    fn from(message: WireMessage) -> Self {
        ThreadMessage {
            role: message.role,
            texts: message
                .content
                .into_iter()
                .filter_map(|part| part.text.map(|t| t.value))
                .collect(),
        }
    }
}
