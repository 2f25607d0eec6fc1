//! Key Registry (spec.md §4.5) — parses, validates and deduplicates the
//! configured signing key identifiers into a default key, per-region
//! overrides, and retired secondaries. Read-only after construction; no
//! synchronization needed (spec.md §5).
//!
//! Grounded on the aggregate-validation style of `config::load` (fail-fast
//! with a message) generalized to fail-with-*all*-messages, since spec.md
//! §4.5/§7 explicitly requires operators see every configuration problem at
//! once rather than one at a time.

use std::collections::HashMap;
use thiserror::Error;

/// An opaque reference to a signing key, resolvable by the remote key
/// service. Configured identifiers embed their region as the trailing
/// `/region` fragment (e.g. `K1/us-east-1`, or a real KMS key ARN such as
/// `arn:aws:kms:us-east-1:111122223333:key/1234abcd/us-east-1`) — spec.md
/// §4.5 requires identifiers be "parseable to extract a region tag"; `key_id`
/// is everything handed to the remote key service, `region` is what was
/// parsed off the end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub key_id: String,
    pub region: String,
}

impl KeyRef {
    pub fn parse(identifier: &str) -> Result<Self, String> {
        let identifier = identifier.trim();
        match identifier.rsplit_once('/') {
            Some((key_id, region)) if !key_id.is_empty() && !region.is_empty() => {
                Ok(Self { key_id: key_id.to_string(), region: region.to_string() })
            }
            _ => Err(format!(
                "key identifier '{identifier}' is not syntactically valid \
                 (expected '<keyId>/<region>', e.g. 'K1/us-east-1' or a KMS key ARN ending in '/<region>')"
            )),
        }
    }

    /// The configured form, for diagnostics and duplicate-detection.
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.key_id, self.region)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyRegistryConfig {
    pub default_key: String,
    pub regional_keys: Vec<String>,
    pub secondary_keys: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyRegistryError {
    /// One aggregate failure collecting every violation found in a single
    /// validation pass (spec.md §4.5, §7).
    #[error("key registry configuration invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Validated, read-only key registry (spec.md §4.5). `pick_signing_key` is a
/// pure function — no I/O, no suspension point (spec.md §5).
pub struct KeyRegistry {
    default_key: KeyRef,
    regional: HashMap<String, KeyRef>,
    secondary: Vec<KeyRef>,
}

impl KeyRegistry {
    /// Validates `config` in one pass, collecting every violation before
    /// returning — never fails on the first problem found.
    pub fn new(config: &KeyRegistryConfig) -> Result<Self, KeyRegistryError> {
        let mut violations = Vec::new();

        let default_key = match KeyRef::parse(&config.default_key) {
            Ok(k) => Some(k),
            Err(e) => {
                violations.push(format!("default key: {e}"));
                None
            }
        };

        let mut regional_keys = Vec::new();
        for raw in &config.regional_keys {
            match KeyRef::parse(raw) {
                Ok(k) => regional_keys.push(k),
                Err(e) => violations.push(format!("regional key: {e}")),
            }
        }

        let mut secondary_keys = Vec::new();
        for raw in &config.secondary_keys {
            match KeyRef::parse(raw) {
                Ok(k) => secondary_keys.push(k),
                Err(e) => violations.push(format!("secondary key: {e}")),
            }
        }

        // Regional keys must not duplicate one another by identifier.
        for i in 0..regional_keys.len() {
            for j in (i + 1)..regional_keys.len() {
                if regional_keys[i] == regional_keys[j] {
                    violations.push(format!(
                        "regional key '{}' is listed more than once",
                        regional_keys[i].identifier()
                    ));
                }
            }
        }

        // No two regional keys may share a region — at most one active
        // signing key per region.
        for i in 0..regional_keys.len() {
            for j in (i + 1)..regional_keys.len() {
                if regional_keys[i].region == regional_keys[j].region {
                    violations.push(format!(
                        "regional keys '{}' and '{}' both target region '{}'",
                        regional_keys[i].identifier(),
                        regional_keys[j].identifier(),
                        regional_keys[i].region
                    ));
                }
            }
        }

        // Secondary keys must not duplicate one another.
        for i in 0..secondary_keys.len() {
            for j in (i + 1)..secondary_keys.len() {
                if secondary_keys[i] == secondary_keys[j] {
                    violations.push(format!(
                        "secondary key '{}' is listed more than once",
                        secondary_keys[i].identifier()
                    ));
                }
            }
        }

        if let Some(default_key) = &default_key {
            if regional_keys.contains(default_key) {
                violations.push(format!(
                    "default key specified as regional: '{}'",
                    default_key.identifier()
                ));
            }
            if secondary_keys.contains(default_key) {
                violations.push(format!(
                    "default key specified as secondary: '{}'",
                    default_key.identifier()
                ));
            }
        }

        for regional in &regional_keys {
            if secondary_keys.contains(regional) {
                violations.push(format!(
                    "regional key '{}' is also listed as secondary",
                    regional.identifier()
                ));
            }
        }

        if !violations.is_empty() {
            return Err(KeyRegistryError::Invalid(violations));
        }

        let default_key = default_key.expect("validated above");
        let regional = regional_keys
            .into_iter()
            .map(|k| (k.region.clone(), k))
            .collect();

        Ok(Self { default_key, regional, secondary: secondary_keys })
    }

    /// Returns the regional key for `region` if one is registered, else
    /// the default key. Pure, no I/O (spec.md §4.5).
    pub fn pick_signing_key(&self, region: &str) -> &KeyRef {
        self.regional.get(region).unwrap_or(&self.default_key)
    }

    /// The full exported set — default ∪ regional ∪ secondary — published
    /// in JWKS so tokens issued under retired keys remain verifiable.
    pub fn all_keys(&self) -> Vec<&KeyRef> {
        let mut keys = vec![&self.default_key];
        keys.extend(self.regional.values());
        keys.extend(self.secondary.iter());
        keys
    }

    /// Stable per-key identifier embedded in the JWT header's `kid` field —
    /// the bare key ID or alias name, without the region suffix or ARN
    /// scaffolding.
    pub fn kid_for(&self, key_ref: &KeyRef) -> String {
        key_ref.key_id.rsplit('/').next().unwrap_or(&key_ref.key_id).to_string()
    }
}
