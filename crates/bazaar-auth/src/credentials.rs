use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::error::AuthError;

/// Hashes and verifies passwords. Argon2id with a fresh random salt per
/// hash; the plaintext never leaves this module and is never logged.
#[derive(Debug, Default, Clone)]
pub struct CredentialStore;

impl CredentialStore {
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Constant-time verification. A stored hash that fails to parse
    /// verifies false rather than erroring; the caller only needs a
    /// yes/no answer.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Malformed password hash in storage: {}", e);
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_the_original_password_only() {
        let store = CredentialStore;
        let hash = store.hash("pw1").unwrap();

        assert!(store.verify("pw1", &hash));
        assert!(!store.verify("pw2", &hash));
        assert!(!store.verify("", &hash));
    }

    #[test]
    fn hash_is_salted_phc_output() {
        let store = CredentialStore;
        let first = store.hash("pw1").unwrap();
        let second = store.hash("pw1").unwrap();

        assert!(first.starts_with("$argon2"));
        assert!(!first.contains("pw1"));
        // Fresh salt per call.
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stored_hash_verifies_false() {
        let store = CredentialStore;
        assert!(!store.verify("pw1", "not-a-phc-string"));
        assert!(!store.verify("pw1", ""));
    }
}
