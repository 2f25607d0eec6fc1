//! JWT Signer (spec.md §4.6): builds header/payload, delegates the actual
//! signature to the remote key service, and assembles the compact
//! serialization. Grounded on `middleware::oidc`'s JWT header/claim structs
//! and base64url helpers, generalized from verification to issuance.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::key_registry::KeyRegistry;
use super::kms_client::{KeySigner, SigningError};

#[derive(Debug, Serialize)]
struct Header<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    scope: String,
    roles: &'a [String],
    iat: i64,
    exp: i64,
    jti: String,
}

/// Issues ES256-signed JWTs whose `scope`/`roles` claims come from the RBAC
/// principal-access query (spec.md §4.6). The signer never touches private
/// key material directly — every signature is produced by `signer`, the
/// remote key service boundary.
pub struct JwtSigner {
    registry: Arc<KeyRegistry>,
    signer: Arc<dyn KeySigner>,
    issuer: String,
}

impl JwtSigner {
    pub fn new(registry: Arc<KeyRegistry>, signer: Arc<dyn KeySigner>, issuer: impl Into<String>) -> Self {
        Self { registry, signer, issuer: issuer.into() }
    }

    /// Builds and signs a compact JWT for `principal_id`'s access to
    /// `resource_name`, using the signing key registered for `region` (or
    /// the default key if `region` has no regional override).
    pub async fn issue(
        &self,
        principal_id: &str,
        resource_name: &str,
        scopes: &[String],
        roles: &[String],
        region: &str,
        lifetime_minutes: i64,
    ) -> Result<String, SigningError> {
        let key_ref = self.registry.pick_signing_key(region);
        let kid = self.registry.kid_for(key_ref);

        let header = Header { alg: "ES256", typ: "JWT", kid: &kid };
        let now = Utc::now();
        let claims = Claims {
            iss: &self.issuer,
            sub: principal_id,
            aud: resource_name,
            scope: scopes.join(" "),
            roles,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::minutes(lifetime_minutes)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let header_b64 = encode_segment(&header);
        let payload_b64 = encode_segment(&claims);
        let signing_input = format!("{header_b64}.{payload_b64}");

        let digest = Sha256::digest(signing_input.as_bytes());
        let der_signature = self.signer.sign(key_ref, &digest).await?;
        let fixed_signature = der_to_fixed_length(&der_signature)
            .map_err(SigningError::Unavailable)?;
        let signature_b64 = URL_SAFE_NO_PAD.encode(fixed_signature);

        tracing::info!(principal_id, resource_name, region, kid = %kid, "jwt issued");
        Ok(format!("{signing_input}.{signature_b64}"))
    }
}

fn encode_segment<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_vec(value).expect("JWT segments are always serializable");
    URL_SAFE_NO_PAD.encode(json)
}

/// Converts a DER-encoded ECDSA-P256 signature to the JWS fixed-length
/// `R || S` 64-byte form required by the ES256 algorithm.
fn der_to_fixed_length(der: &[u8]) -> Result<[u8; 64], String> {
    let signature = p256::ecdsa::Signature::from_der(der)
        .map_err(|e| format!("malformed DER signature from key service: {e}"))?;
    Ok(signature.to_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::key_registry::{KeyRegistry, KeyRegistryConfig};
    use crate::signing::test_signer::InMemorySigner;

    fn registry() -> Arc<KeyRegistry> {
        Arc::new(
            KeyRegistry::new(&KeyRegistryConfig {
                default_key: "K0/us-east-1".to_string(),
                regional_keys: vec!["K1/eu-west-1".to_string()],
                secondary_keys: vec![],
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn issues_a_three_segment_compact_token() {
        let signer = JwtSigner::new(registry(), Arc::new(InMemorySigner::new()), "https://issuer.example");
        let token = signer
            .issue(
                "arn:aws:iam::1:user/alice",
                "api://x",
                &["rbac".to_string()],
                &["rbac.read".to_string()],
                "eu-west-1",
                60,
            )
            .await
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header_json = URL_SAFE_NO_PAD.decode(parts[0]).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_json).unwrap();
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["kid"], "K1");

        let payload_json = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_json).unwrap();
        assert_eq!(payload["sub"], "arn:aws:iam::1:user/alice");
        assert_eq!(payload["aud"], "api://x");
        assert_eq!(payload["scope"], "rbac");
        assert_eq!(payload["roles"][0], "rbac.read");
    }

    #[tokio::test]
    async fn falls_back_to_default_key_for_unregistered_region() {
        let signer = JwtSigner::new(registry(), Arc::new(InMemorySigner::new()), "https://issuer.example");
        let token = signer.issue("arn:p", "api://x", &[], &[], "ap-south-1", 5).await.unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["kid"], "K0");
    }
}
