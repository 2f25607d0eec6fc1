//! In-memory [`KeySigner`] fake used by tests — stands in for the real KMS
//! service the same way `rbac::memory_store::MemoryStore` stands in for
//! DynamoDB: real key material, held only for the test process's lifetime,
//! so tests exercise the actual DER/JWK conversion path instead of mocking
//! it away.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::SigningKey;
use p256::pkcs8::EncodePublicKey;

use super::key_registry::KeyRef;
use super::kms_client::{KeySigner, SigningError};

pub struct InMemorySigner {
    keys: Mutex<HashMap<String, SigningKey>>,
}

impl InMemorySigner {
    pub fn new() -> Self {
        Self { keys: Mutex::new(HashMap::new()) }
    }

    fn key_for(&self, key_id: &str) -> SigningKey {
        let mut keys = self.keys.lock().unwrap();
        keys.entry(key_id.to_string())
            .or_insert_with(|| SigningKey::random(&mut rand::thread_rng()))
            .clone()
    }
}

impl Default for InMemorySigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySigner for InMemorySigner {
    async fn sign(&self, key_ref: &KeyRef, digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        let key = self.key_for(&key_ref.key_id);
        let signature: p256::ecdsa::Signature = key
            .sign_prehash(digest)
            .map_err(|e| SigningError::Unavailable(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    async fn public_key(&self, key_ref: &KeyRef) -> Result<Vec<u8>, SigningError> {
        let key = self.key_for(&key_ref.key_id);
        let der = key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| SigningError::Unavailable(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }
}
