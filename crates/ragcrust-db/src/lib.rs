pub mod in_memory;
pub mod knowledge_base;
pub mod records;
pub mod sqlite_store;

pub use in_memory::InMemoryStore;
pub use knowledge_base::{IndexMapStore, KnowledgeBaseHandle};
pub use records::{FileRecordStore, UploadedFileRecord};
pub use sqlite_store::SqliteStore;
