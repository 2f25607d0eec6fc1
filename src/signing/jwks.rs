//! JWKS Publisher (spec.md §4.7) — fetches each registered key's public
//! material once at startup, converts it to JWK form, and caches it for the
//! process lifetime (keys in this registry do not rotate online). Grounded
//! on `middleware::oidc::{get_jwks, JWKS_CACHE}`'s shape, with the TTL
//! dropped since spec.md §4.7 is explicit that these keys don't rotate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::key_registry::KeyRegistry;
use super::kms_client::{KeySigner, SigningError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    pub kid: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// Static OpenID Connect discovery document — composed from configuration
/// and the JWKS URI, with no further I/O once built (spec.md §4.7).
#[derive(Debug, Clone, Serialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    pub grant_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
}

impl OidcDiscovery {
    pub fn new(issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let jwks_uri = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
        let token_endpoint = format!("{}/token", issuer.trim_end_matches('/'));
        Self {
            issuer,
            jwks_uri,
            token_endpoint,
            grant_types_supported: vec!["client_credentials"],
            id_token_signing_alg_values_supported: vec!["ES256"],
        }
    }
}

/// Fetches public key material for every key in a [`KeyRegistry`] once and
/// caches the resulting JWKS document for the process lifetime.
pub struct JwksPublisher {
    document: JwksDocument,
}

impl JwksPublisher {
    pub async fn build(registry: &KeyRegistry, signer: &dyn KeySigner) -> Result<Self, SigningError> {
        let mut keys = Vec::new();
        for key_ref in registry.all_keys() {
            let der = signer.public_key(key_ref).await?;
            let (x, y) = decode_ec_point(&der).map_err(SigningError::Unavailable)?;
            keys.push(Jwk {
                kty: "EC".to_string(),
                crv: "P-256".to_string(),
                x,
                y,
                kid: registry.kid_for(key_ref),
                alg: "ES256".to_string(),
                key_use: "sig".to_string(),
            });
        }
        tracing::info!(keys = keys.len(), "jwks published at startup");
        Ok(Self { document: JwksDocument { keys } })
    }

    pub fn document(&self) -> &JwksDocument {
        &self.document
    }
}

/// Converts a DER `SubjectPublicKeyInfo` for an EC-P256 key into its
/// base64url `(x, y)` coordinate pair.
fn decode_ec_point(der: &[u8]) -> Result<(String, String), String> {
    use p256::pkcs8::DecodePublicKey;

    let public_key = p256::PublicKey::from_public_key_der(der)
        .map_err(|e| format!("malformed EC public key from key service: {e}"))?;
    let encoded = public_key.to_encoded_point(false);
    let x = encoded.x().ok_or("uncompressed point missing x coordinate")?;
    let y = encoded.y().ok_or("uncompressed point missing y coordinate")?;
    Ok((URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::key_registry::{KeyRegistry, KeyRegistryConfig};
    use crate::signing::test_signer::InMemorySigner;

    #[tokio::test]
    async fn publishes_one_jwk_per_registered_key() {
        let registry = KeyRegistry::new(&KeyRegistryConfig {
            default_key: "K0/us-east-1".to_string(),
            regional_keys: vec!["K1/eu-west-1".to_string()],
            secondary_keys: vec!["K9/us-east-1".to_string()],
        })
        .unwrap();
        let signer = InMemorySigner::new();

        let publisher = JwksPublisher::build(&registry, &signer).await.unwrap();
        assert_eq!(publisher.document().keys.len(), 3);
        for jwk in &publisher.document().keys {
            assert_eq!(jwk.kty, "EC");
            assert_eq!(jwk.crv, "P-256");
            assert!(!jwk.x.is_empty());
            assert!(!jwk.y.is_empty());
        }
    }

    #[test]
    fn discovery_document_derives_well_known_uris() {
        let discovery = OidcDiscovery::new("https://auth.example.com/");
        assert_eq!(discovery.jwks_uri, "https://auth.example.com/.well-known/jwks.json");
        assert_eq!(discovery.token_endpoint, "https://auth.example.com/token");
    }
}
