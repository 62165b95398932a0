pub mod redaction;
pub mod session_key;

pub use redaction::{RedactingWriter, mask_credential, redact_secrets};
pub use session_key::SessionKeyResolver;
