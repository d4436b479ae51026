//! API key generation
//!
//! Produces cryptographically random key material with hash-at-rest storage.
//! The plaintext key leaves this module exactly once, in the generation
//! result; only the hash and the human-visible prefix are ever persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::api_key::{format_prefix, KeyType, PREFIX_SLICE_LEN};
use crate::domain::environment::Environment;

/// Result of generating new key material
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// The full plaintext key (only surfaced once at creation)
    pub plaintext: String,
    /// The stored, human-visible prefix
    pub prefix: String,
    /// The hash persisted in place of the plaintext
    pub hash: String,
}

/// Generator for API key material
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    /// Number of random bytes per key (32 bytes = 256 bits of entropy)
    key_bytes: usize,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self { key_bytes: 32 }
    }

    /// Overrides the amount of random material
    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes;
        self
    }

    /// Generates a new key for the given type and environment
    pub fn generate(&self, key_type: KeyType, environment: Environment) -> GeneratedKey {
        let mut random_bytes = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let encoded = URL_SAFE_NO_PAD.encode(&random_bytes);
        let plaintext = format_prefix(key_type, environment, &encoded);
        let prefix = format_prefix(
            key_type,
            environment,
            &encoded[..PREFIX_SLICE_LEN.min(encoded.len())],
        );

        let hash = self.hash_key(&plaintext);

        GeneratedKey {
            plaintext,
            prefix,
            hash,
        }
    }

    /// Hashes a presented key for storage or lookup
    pub fn hash_key(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let result = hasher.finalize();
        format!("sha256${}", URL_SAFE_NO_PAD.encode(result))
    }

    /// Verifies a presented key against a stored hash
    pub fn verify_key(&self, key: &str, stored_hash: &str) -> bool {
        let computed = self.hash_key(key);
        constant_time_compare(&computed, stored_hash)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::parse_key_prefix;

    #[test]
    fn test_generate_secret_production_key() {
        let generator = KeyGenerator::new();
        let generated = generator.generate(KeyType::Secret, Environment::Production);

        assert!(generated.plaintext.starts_with("sk_prod_"));
        assert!(generated.prefix.starts_with("sk_prod_"));
        assert_eq!(generated.prefix.len(), "sk_prod_".len() + 8);
        assert!(generated.hash.starts_with("sha256$"));
    }

    #[test]
    fn test_prefix_type_correspondence() {
        // For every type × environment combination, the generated prefix
        // parses back to the same type and environment.
        let generator = KeyGenerator::new();

        for key_type in [KeyType::Publishable, KeyType::Secret] {
            for environment in Environment::all() {
                let generated = generator.generate(key_type, environment);

                let from_key = parse_key_prefix(&generated.plaintext).unwrap();
                assert_eq!(from_key.key_type, key_type);
                assert_eq!(from_key.environment, environment);

                let from_prefix = parse_key_prefix(&generated.prefix).unwrap();
                assert_eq!(from_prefix.key_type, key_type);
                assert_eq!(from_prefix.environment, environment);

                assert!(generated.plaintext.starts_with(&generated.prefix));
            }
        }
    }

    #[test]
    fn test_key_uniqueness() {
        let generator = KeyGenerator::new();
        let a = generator.generate(KeyType::Secret, Environment::Production);
        let b = generator.generate(KeyType::Secret, Environment::Production);

        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_entropy_length() {
        let generator = KeyGenerator::new();
        let generated = generator.generate(KeyType::Publishable, Environment::Development);

        // 32 bytes base64-encoded = 43 chars, plus "pk_dev_"
        assert!(generated.plaintext.len() >= "pk_dev_".len() + 43);
    }

    #[test]
    fn test_verify_key() {
        let generator = KeyGenerator::new();
        let generated = generator.generate(KeyType::Secret, Environment::Test);

        assert!(generator.verify_key(&generated.plaintext, &generated.hash));
        assert!(!generator.verify_key("sk_test_wrong", &generated.hash));
    }

    #[test]
    fn test_hash_deterministic() {
        let generator = KeyGenerator::new();

        assert_eq!(
            generator.hash_key("sk_prod_fixed"),
            generator.hash_key("sk_prod_fixed")
        );
        assert_ne!(
            generator.hash_key("sk_prod_fixed"),
            generator.hash_key("sk_prod_fixee")
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
