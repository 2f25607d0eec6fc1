//! KMS-Backed JWT Signing Pipeline (spec.md §4.5–§4.7): a read-only key
//! registry, a signer that never sees private key material, and a JWKS/OIDC
//! publisher fed by that registry.

pub mod jwks;
pub mod jwt;
pub mod key_registry;
pub mod kms_client;

#[cfg(any(test, feature = "test-util"))]
pub mod test_signer;
