//! The remote cryptographic service boundary (spec.md §4.6/§4.7): no
//! private key material for a [`KeyRef`] ever leaves the HSM — this crate
//! only ever asks the service to sign a digest or hand back public key
//! material.
//!
//! Grounded on `store::postgres::PgStore`'s boundary discipline (translate
//! the AWS SDK's service-error types into a crate-local enum before they
//! reach callers) applied to `aws-sdk-kms`'s `Sign`/`GetPublicKey`
//! operations instead of DynamoDB's.

use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{MessageType, SigningAlgorithmSpec};
use aws_sdk_kms::Client;
use thiserror::Error;

use super::key_registry::KeyRef;

#[derive(Debug, Error, Clone)]
pub enum SigningError {
    /// Transient failure from the remote key service — retriable
    /// (spec.md §4.6, surfaces as `AppError::SigningUnavailable` → 503).
    #[error("signing service unavailable: {0}")]
    Unavailable(String),
    /// Authorization failure from the key service — fatal, and the
    /// message must never leak key identifiers (spec.md §4.6/§7).
    #[error("signing service denied the request")]
    Forbidden(String),
}

/// The remote cryptographic service (spec.md §4.6). `sign` takes an
/// already-hashed digest — the private key never leaves the HSM, and this
/// crate never requests raw signing of unhashed data.
#[async_trait]
pub trait KeySigner: Send + Sync {
    /// Signs `digest` (a SHA-256 hash) with `key_ref` using ECDSA-P256,
    /// returning the DER-encoded signature.
    async fn sign(&self, key_ref: &KeyRef, digest: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// Fetches `key_ref`'s public key material as a DER `SubjectPublicKeyInfo`.
    async fn public_key(&self, key_ref: &KeyRef) -> Result<Vec<u8>, SigningError>;
}

/// `aws-sdk-kms`-backed implementation.
pub struct AwsKms {
    client: Client,
}

impl AwsKms {
    pub async fn connect() -> anyhow::Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self { client: Client::new(&config) })
    }
}

#[async_trait]
impl KeySigner for AwsKms {
    async fn sign(&self, key_ref: &KeyRef, digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        let output = self
            .client
            .sign()
            .key_id(&key_ref.key_id)
            .message(Blob::new(digest.to_vec()))
            .message_type(MessageType::Digest)
            .signing_algorithm(SigningAlgorithmSpec::EcdsaSha256)
            .send()
            .await
            .map_err(classify)?;

        output
            .signature
            .map(|b| b.into_inner())
            .ok_or_else(|| SigningError::Unavailable("KMS Sign returned no signature".to_string()))
    }

    async fn public_key(&self, key_ref: &KeyRef) -> Result<Vec<u8>, SigningError> {
        let output = self
            .client
            .get_public_key()
            .key_id(&key_ref.key_id)
            .send()
            .await
            .map_err(classify)?;

        output
            .public_key
            .map(|b| b.into_inner())
            .ok_or_else(|| SigningError::Unavailable("KMS GetPublicKey returned no key material".to_string()))
    }
}

/// Maps an AWS SDK error to the crate's `SigningError` taxonomy without
/// leaking the underlying service-error type — the key identifier is never
/// included in the forbidden-case message (spec.md §4.6/§7).
fn classify<E: std::fmt::Display>(err: aws_sdk_kms::error::SdkError<E>) -> SigningError {
    let message = err.to_string();
    if message.to_lowercase().contains("accessdenied") || message.to_lowercase().contains("notauthorized") {
        SigningError::Forbidden(message)
    } else {
        SigningError::Unavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::test_signer::InMemorySigner;

    #[tokio::test]
    async fn in_memory_signer_round_trips_through_the_trait_object() {
        let signer = InMemorySigner::new();
        let key_ref = KeyRef::parse("K1/us-east-1").unwrap();
        let digest = [7u8; 32];

        let der_sig = signer.sign(&key_ref, &digest).await.unwrap();
        assert!(!der_sig.is_empty());

        let public_key = signer.public_key(&key_ref).await.unwrap();
        assert!(!public_key.is_empty());
    }
}
