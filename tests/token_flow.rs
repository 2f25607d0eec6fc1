//! Integration tests driving the RBAC repository, key registry, and JWT
//! signer together through the token endpoint, the way `tests/integration.rs`
//! drove spend caps and webhooks against the library crate directly.
//!
//! Requires the `test-util` feature (exposes the in-memory `Store`/`KeySigner`
//! fakes this crate uses in place of DynamoDB/KMS, which have no local
//! emulator dependency): `cargo test --test token_flow --features test-util`.
#![cfg(feature = "test-util")]

use std::sync::Arc;

use rbac_token_service::rbac::memory_store::MemoryStore;
use rbac_token_service::rbac::repository::Repository;
use rbac_token_service::signing::jwks::JwksPublisher;
use rbac_token_service::signing::jwt::JwtSigner;
use rbac_token_service::signing::key_registry::{KeyRegistry, KeyRegistryConfig};
use rbac_token_service::signing::test_signer::InMemorySigner;
use rbac_token_service::token_endpoint::{AlwaysVerifies, TokenEndpoint};

const ALICE: &str = "arn:aws:iam::111122223333:user/alice";
const BOB: &str = "arn:aws:iam::111122223333:user/bob";
const ORDERS: &str = "api://orders";

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

mod end_to_end_token_issuance {
    use super::*;

    #[tokio::test]
    async fn a_principal_with_scope_and_role_receives_a_token_carrying_both() {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(Repository::new(store));
        repo.create_resource(ORDERS).await.unwrap();
        repo.create_scope(ORDERS, "orders.read").await.unwrap();
        repo.create_role(ORDERS, "orders.viewer").await.unwrap();
        repo.create_scope_assignment(ALICE, ORDERS, "orders.read").await.unwrap();
        repo.create_role_assignment(ALICE, ORDERS, "orders.viewer").await.unwrap();

        let registry = registry();
        let signer = Arc::new(InMemorySigner::new());
        let jwt_signer = Arc::new(JwtSigner::new(registry, signer, "https://auth.example.com"));
        let verifier = Arc::new(AlwaysVerifies { principal_id: ALICE.to_string() });
        let endpoint = TokenEndpoint::new(repo, jwt_signer, verifier, ORDERS, 60);

        let request = sample_signed_request();
        let response = endpoint.issue_token(ALICE, &request, None, None, "eu-west-1").await.unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        let parts: Vec<&str> = response.access_token.split('.').collect();
        assert_eq!(parts.len(), 3);

        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["kid"], "K1");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["scope"], "orders.read");
        assert_eq!(payload["roles"][0], "orders.viewer");
    }

    #[tokio::test]
    async fn a_principal_with_only_a_role_assignment_receives_no_roles_claim_content() {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(Repository::new(store));
        repo.create_resource(ORDERS).await.unwrap();
        repo.create_role(ORDERS, "orders.viewer").await.unwrap();
        repo.create_role_assignment(BOB, ORDERS, "orders.viewer").await.unwrap();

        let registry = registry();
        let signer = Arc::new(InMemorySigner::new());
        let jwt_signer = Arc::new(JwtSigner::new(registry, signer, "https://auth.example.com"));
        let verifier = Arc::new(AlwaysVerifies { principal_id: BOB.to_string() });
        let endpoint = TokenEndpoint::new(repo, jwt_signer, verifier, ORDERS, 60);

        let response = endpoint.issue_token(BOB, &sample_signed_request(), None, None, "us-east-1").await.unwrap();

        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;
        let parts: Vec<&str> = response.access_token.split('.').collect();
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["scope"], "");
        assert!(payload["roles"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_the_endpoints_default_resource_when_none_is_requested() {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(Repository::new(store));
        repo.create_resource(ORDERS).await.unwrap();

        let registry = registry();
        let signer = Arc::new(InMemorySigner::new());
        let jwt_signer = Arc::new(JwtSigner::new(registry, signer, "https://auth.example.com"));
        let verifier = Arc::new(AlwaysVerifies { principal_id: ALICE.to_string() });
        let endpoint = TokenEndpoint::new(repo, jwt_signer, verifier, ORDERS, 15);

        let response = endpoint.issue_token(ALICE, &sample_signed_request(), None, None, "us-east-1").await.unwrap();
        assert_eq!(response.expires_in, 15 * 60);
    }

    fn sample_signed_request() -> rbac_token_service::token_endpoint::SignedCallerIdentityRequest {
        rbac_token_service::token_endpoint::SignedCallerIdentityRequest {
            method: "POST".to_string(),
            url: "https://sts.amazonaws.com/".to_string(),
            headers: vec![("Authorization".to_string(), "AWS4-HMAC-SHA256 ...".to_string())],
            body: b"Action=GetCallerIdentity&Version=2011-06-15".to_vec(),
        }
    }
}

mod jwks_publication {
    use super::*;

    #[tokio::test]
    async fn jwks_exposes_every_registered_key_as_a_verifiable_p256_jwk() {
        let registry = registry();
        let signer = InMemorySigner::new();
        let publisher = JwksPublisher::build(&registry, &signer).await.unwrap();

        let kids: Vec<&str> = publisher.document().keys.iter().map(|k| k.kid.as_str()).collect();
        assert!(kids.contains(&"K0"));
        assert!(kids.contains(&"K1"));
        for jwk in &publisher.document().keys {
            assert_eq!(jwk.alg, "ES256");
            assert_eq!(jwk.key_use, "sig");
        }
    }
}

mod resource_lifecycle {
    use super::*;

    #[tokio::test]
    async fn deleting_a_resource_removes_every_scope_role_and_assignment_under_it() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone());
        repo.create_resource(ORDERS).await.unwrap();
        repo.create_scope(ORDERS, "orders.read").await.unwrap();
        repo.create_role(ORDERS, "orders.viewer").await.unwrap();
        repo.create_scope_assignment(ALICE, ORDERS, "orders.read").await.unwrap();
        repo.create_role_assignment(ALICE, ORDERS, "orders.viewer").await.unwrap();

        assert!(!store.is_empty());
        repo.delete_resource(ORDERS).await.unwrap();

        assert!(store.items_referencing(ORDERS).is_empty());
        assert!(repo.get_resource(ORDERS).await.unwrap().is_none());
    }
}
