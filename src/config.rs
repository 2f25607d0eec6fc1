//! Ambient configuration (SPEC_FULL.md §4.10) — env-var driven via
//! `dotenvy`, grounded on the teacher's `config::load()` fail-fast style but
//! generalized to *aggregate* every key-registry violation into one error
//! (spec.md §4.5/§7), rather than bailing on the first bad value the way the
//! teacher's `master_key` placeholder check does.

use crate::signing::key_registry::{KeyRegistry, KeyRegistryConfig, KeyRegistryError};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub table_name: String,
    pub aws_region: String,
    pub kms_default_key_id: String,
    pub kms_regional_key_ids: Vec<String>,
    pub kms_secondary_key_ids: Vec<String>,
    pub jwt_issuer: String,
    pub jwt_lifetime_minutes: i64,
    /// The audience used for `POST /token` requests that omit `resource`.
    pub default_resource: String,
}

impl Config {
    pub fn key_registry_config(&self) -> KeyRegistryConfig {
        KeyRegistryConfig {
            default_key: self.kms_default_key_id.clone(),
            regional_keys: self.kms_regional_key_ids.clone(),
            secondary_keys: self.kms_secondary_key_ids.clone(),
        }
    }

    /// Builds the key registry from this config, surfacing every violation
    /// `KeyRegistry::new` finds in one aggregate error (spec.md §4.5/§7) —
    /// operators never have to fix-and-restart-and-discover-the-next-one.
    pub fn build_key_registry(&self) -> Result<KeyRegistry, KeyRegistryError> {
        KeyRegistry::new(&self.key_registry_config())
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let table_name = require_env("TABLE_NAME")?;
    let kms_default_key_id = require_env("KMS_DEFAULT_KEY_ID")?;
    let jwt_issuer = require_env("JWT_ISSUER")?;

    if jwt_issuer == "https://CHANGE_ME.example.com" {
        anyhow::bail!("JWT_ISSUER is still the placeholder value — set the real issuer URL before running.");
    }

    let default_resource =
        std::env::var("DEFAULT_RESOURCE").unwrap_or_else(|_| format!("{jwt_issuer}/self"));

    Ok(Config {
        port: std::env::var("PORT").unwrap_or_else(|_| "8443".into()).parse().unwrap_or(8443),
        table_name,
        aws_region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into()),
        kms_default_key_id,
        kms_regional_key_ids: std::env::var("KMS_REGIONAL_KEY_IDS")
            .ok()
            .map(|v| split_csv(&v))
            .unwrap_or_default(),
        kms_secondary_key_ids: std::env::var("KMS_SECONDARY_KEY_IDS")
            .ok()
            .map(|v| split_csv(&v))
            .unwrap_or_default(),
        jwt_issuer,
        jwt_lifetime_minutes: std::env::var("JWT_LIFETIME_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
        default_resource,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_values_and_trims_whitespace() {
        assert_eq!(
            split_csv(" K1/us-east-1 , K2/eu-west-1,K3/ap-south-1 "),
            vec!["K1/us-east-1", "K2/eu-west-1", "K3/ap-south-1"]
        );
    }

    #[test]
    fn empty_string_splits_to_no_keys() {
        assert!(split_csv("").is_empty());
    }
}
