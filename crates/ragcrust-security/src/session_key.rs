use ragcrust_common::SessionKey;

const DEFAULT_KEY_LENGTH: usize = 8;

/// Derives a [`SessionKey`] from a caller credential by keeping its trailing
/// characters. Pure and total: the same credential always maps to the same
/// key, and credentials shorter than the key length are used whole.
#[derive(Debug, Clone, Copy)]
pub struct SessionKeyResolver {
    key_length: usize,
}

impl SessionKeyResolver {
    pub fn new(key_length: usize) -> Self {
        Self {
            key_length: key_length.max(1),
        }
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn resolve(&self, credential: &str) -> SessionKey {
        let credential = credential.trim();
        let char_count = credential.chars().count();
        let skip = char_count.saturating_sub(self.key_length);
        SessionKey::new(credential.chars().skip(skip).collect::<String>())
    }
}

impl Default for SessionKeyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_trailing_characters() {
        let resolver = SessionKeyResolver::default();
        let key = resolver.resolve("sk-test-0000000000ABCDEFGH");
        assert_eq!(key.as_str(), "ABCDEFGH");
    }

    #[test]
    fn is_deterministic() {
        let resolver = SessionKeyResolver::default();
        assert_eq!(
            resolver.resolve("sk-proj-abcdef123456"),
            resolver.resolve("sk-proj-abcdef123456")
        );
    }

    #[test]
    fn short_credentials_are_used_whole() {
        let resolver = SessionKeyResolver::default();
        assert_eq!(resolver.resolve("abc").as_str(), "abc");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let resolver = SessionKeyResolver::new(4);
        assert_eq!(resolver.resolve("  key-WXYZ\n").as_str(), "WXYZ");
    }

    #[test]
    fn multibyte_credentials_do_not_split_characters() {
        let resolver = SessionKeyResolver::new(2);
        assert_eq!(resolver.resolve("clé-été").as_str(), "té");
    }

    #[test]
    fn zero_length_is_clamped() {
        let resolver = SessionKeyResolver::new(0);
        assert_eq!(resolver.key_length(), 1);
        assert_eq!(resolver.resolve("abc").as_str(), "c");
    }
}
