//! Token Endpoint orchestration (spec.md §2, §6 `POST /token`).
//!
//! Wires together the three things spec.md §2 says the handler does:
//! verify the caller's signed `GetCallerIdentity` request, call the
//! repository's principal-access query, and hand the result to the JWT
//! signer. SigV4 verification proper is "noted but not specified" (spec.md
//! §1) — this module defines the [`CallerIdentityVerifier`] trait boundary
//! and a concrete-but-minimal implementation that forwards the caller's
//! presigned request to AWS STS rather than re-deriving the signature
//! itself, the same boundary discipline `api::handlers` draws around
//! `proxy::upstream::UpstreamClient`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::errors::AppError;
use crate::rbac::repository::Repository;
use crate::signing::jwt::JwtSigner;

/// A signed `sts:GetCallerIdentity` request as submitted by the client in
/// the token request's `client_secret` field — opaque to this crate beyond
/// the fields needed to replay it. The SigV4 signature inside `headers` is
/// never parsed or re-derived here.
#[derive(Debug, Clone)]
pub struct SignedCallerIdentityRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error, Clone)]
pub enum VerifyError {
    #[error("caller identity request was rejected: {0}")]
    Rejected(String),
    #[error("could not reach the identity verification service: {0}")]
    Unavailable(String),
}

impl From<VerifyError> for AppError {
    fn from(_: VerifyError) -> Self {
        AppError::Unauthorized
    }
}

/// Verifies a signed `GetCallerIdentity` request and returns the caller's
/// ARN. Implementations never see unsigned requests — a forged or expired
/// signature must surface as [`VerifyError::Rejected`].
#[async_trait]
pub trait CallerIdentityVerifier: Send + Sync {
    async fn verify(&self, request: &SignedCallerIdentityRequest) -> Result<String, VerifyError>;
}

/// Forwards the caller's presigned request to AWS STS unmodified and reads
/// back the `Arn` element of the `GetCallerIdentityResponse` — the request
/// is only valid (non-expired, correctly signed) if STS accepts it, so a
/// successful call is itself the proof of identity.
pub struct StsCallerIdentityVerifier {
    client: reqwest::Client,
}

impl StsCallerIdentityVerifier {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for StsCallerIdentityVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallerIdentityVerifier for StsCallerIdentityVerifier {
    async fn verify(&self, request: &SignedCallerIdentityRequest) -> Result<String, VerifyError> {
        let mut builder = self
            .client
            .request(
                request
                    .method
                    .parse()
                    .map_err(|e| VerifyError::Rejected(format!("invalid method: {e}")))?,
                &request.url,
            )
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::Rejected(format!(
                "STS rejected the request with status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        extract_arn(&body).ok_or_else(|| {
            VerifyError::Rejected("GetCallerIdentityResponse had no Arn element".to_string())
        })
    }
}

/// Pulls the text content of the first `<Arn>...</Arn>` element out of a
/// `GetCallerIdentityResponse` document.
fn extract_arn(xml: &str) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    let mut in_arn = false;
    loop {
        match reader.read_event().ok()? {
            Event::Start(tag) if tag.local_name().as_ref() == b"Arn" => in_arn = true,
            Event::Text(text) if in_arn => {
                return text.unescape().ok().map(|s| s.into_owned());
            }
            Event::End(tag) if tag.local_name().as_ref() == b"Arn" => in_arn = false,
            Event::Eof => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Orchestrates `POST /token` (spec.md §2/§6): verify -> RBAC lookup ->
/// sign. Specified only at this contract level — no SigV4 bytes are parsed
/// here, and the permission middleware guarding admin endpoints is a
/// separate, out-of-scope collaborator.
pub struct TokenEndpoint {
    repository: Arc<Repository>,
    signer: Arc<JwtSigner>,
    verifier: Arc<dyn CallerIdentityVerifier>,
    default_resource: String,
    token_lifetime_minutes: i64,
}

impl TokenEndpoint {
    pub fn new(
        repository: Arc<Repository>,
        signer: Arc<JwtSigner>,
        verifier: Arc<dyn CallerIdentityVerifier>,
        default_resource: impl Into<String>,
        token_lifetime_minutes: i64,
    ) -> Self {
        Self {
            repository,
            signer,
            verifier,
            default_resource: default_resource.into(),
            token_lifetime_minutes,
        }
    }

    /// Issues a token for `claimed_principal_id`. `resource_name` falls
    /// back to the service's configured default audience when the caller
    /// omits it (spec.md §6: `resource` is optional on `POST /token`).
    pub async fn issue_token(
        &self,
        claimed_principal_id: &str,
        signed_request: &SignedCallerIdentityRequest,
        resource_name: Option<&str>,
        scope_name: Option<&str>,
        region: &str,
    ) -> Result<TokenResponse, AppError> {
        let verified_principal_id = self.verifier.verify(signed_request).await?;
        if verified_principal_id != claimed_principal_id {
            tracing::warn!(
                claimed = claimed_principal_id,
                verified = %verified_principal_id,
                "client_id does not match the signed request's principal"
            );
            return Err(AppError::Unauthorized);
        }

        let resource_name = resource_name.unwrap_or(&self.default_resource);
        let access = self
            .repository
            .get_principal_access(&verified_principal_id, resource_name, scope_name)
            .await?;

        let token = self
            .signer
            .issue(
                &verified_principal_id,
                resource_name,
                &access.scopes,
                &access.roles,
                region,
                self.token_lifetime_minutes,
            )
            .await?;

        tracing::info!(principal_id = %verified_principal_id, resource_name, "token issued");
        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer",
            expires_in: self.token_lifetime_minutes * 60,
        })
    }
}

#[cfg(any(test, feature = "test-util"))]
pub struct AlwaysVerifies {
    pub principal_id: String,
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl CallerIdentityVerifier for AlwaysVerifies {
    async fn verify(&self, _request: &SignedCallerIdentityRequest) -> Result<String, VerifyError> {
        Ok(self.principal_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::memory_store::MemoryStore;
    use crate::signing::key_registry::{KeyRegistry, KeyRegistryConfig};
    use crate::signing::test_signer::InMemorySigner;

    const ALICE: &str = "arn:aws:iam::1:user/alice";
    const RESOURCE: &str = "api://x";

    fn sample_request() -> SignedCallerIdentityRequest {
        SignedCallerIdentityRequest {
            method: "POST".to_string(),
            url: "https://sts.amazonaws.com/".to_string(),
            headers: vec![],
            body: b"Action=GetCallerIdentity&Version=2011-06-15".to_vec(),
        }
    }

    async fn endpoint(verifier: Arc<dyn CallerIdentityVerifier>) -> TokenEndpoint {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(Repository::new(store));
        repo.create_resource(RESOURCE).await.unwrap();
        repo.create_scope(RESOURCE, "rbac").await.unwrap();
        repo.create_role(RESOURCE, "rbac.read").await.unwrap();
        repo.create_scope_assignment(ALICE, RESOURCE, "rbac").await.unwrap();
        repo.create_role_assignment(ALICE, RESOURCE, "rbac.read").await.unwrap();

        let registry = Arc::new(
            KeyRegistry::new(&KeyRegistryConfig {
                default_key: "K0/us-east-1".to_string(),
                regional_keys: vec![],
                secondary_keys: vec![],
            })
            .unwrap(),
        );
        let signer = Arc::new(JwtSigner::new(registry, Arc::new(InMemorySigner::new()), "https://issuer.example"));
        TokenEndpoint::new(repo, signer, verifier, RESOURCE, 60)
    }

    #[tokio::test]
    async fn issues_a_bearer_token_for_a_verified_matching_principal() {
        let verifier = Arc::new(AlwaysVerifies { principal_id: ALICE.to_string() });
        let ep = endpoint(verifier).await;

        let resp = ep
            .issue_token(ALICE, &sample_request(), None, None, "us-east-1")
            .await
            .unwrap();
        assert_eq!(resp.token_type, "Bearer");
        assert_eq!(resp.expires_in, 3600);
        assert_eq!(resp.access_token.split('.').count(), 3);
    }

    #[tokio::test]
    async fn rejects_when_claimed_principal_does_not_match_verified_one() {
        let verifier = Arc::new(AlwaysVerifies { principal_id: "arn:aws:iam::1:user/mallory".to_string() });
        let ep = endpoint(verifier).await;

        let err = ep
            .issue_token(ALICE, &sample_request(), None, None, "us-east-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn extracts_arn_from_sts_response_body() {
        let body = r#"<GetCallerIdentityResponse><GetCallerIdentityResult>
            <Arn>arn:aws:iam::1:user/alice</Arn>
            </GetCallerIdentityResult></GetCallerIdentityResponse>"#;
        assert_eq!(extract_arn(body), Some("arn:aws:iam::1:user/alice".to_string()));
    }

    #[test]
    fn returns_none_when_arn_element_is_absent() {
        assert_eq!(extract_arn("<Foo></Foo>"), None);
    }
}
