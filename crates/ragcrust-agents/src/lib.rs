pub mod ingest;
pub mod knowledge;
pub mod openai;
pub mod orchestrator;
pub mod providers;
pub mod research;
pub mod runtime;

pub use ingest::{ClearSessionReport, FileIngestionService, FileMapping, KnowledgeBaseOverview};
pub use knowledge::KnowledgeBaseCache;
pub use openai::{OpenAiBackendFactory, OpenAiProvider};
pub use orchestrator::{
    AttemptOutcome, GenerationAttempt, GenerationPlan, GenerationReport, Orchestrator, TierKind,
};
pub use providers::{
    AssistantSpec, AssistantsApi, BackendFactory, ChatMessage, ChatRole, FileStore, LlmProvider,
    LlmRequest, LlmResponse, LlmStream, LlmStreamResponse, MessageRole, ModelBackend,
    ResponseOutput, ResponseRequest, ResponseTool, ResponsesApi, Run, RunStatus, TextStream,
    ThreadMessage, Usage, VectorIndex, VectorStoreInfo,
};
pub use research::{ResearchAugmenter, ResearchReport};
pub use runtime::{ChatRuntime, HealthReport, ReplyStream};
