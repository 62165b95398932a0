pub mod error;
pub mod request;
pub mod types;

pub use error::{Error, Result};
pub use request::{GenerationRequest, ReasoningEffort};
pub use types::SessionKey;
