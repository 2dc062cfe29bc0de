//! Session state accumulated during login
//!
//! The remote API returns loosely-shaped JSON objects; login merges them into
//! one map and the typed accessors below pull out the fields authenticated
//! calls need. Absent fields surface as `NotAuthenticated` instead of a raw
//! key-lookup failure.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CrunchyrollError;

/// Server-issued CMS query-signing parameters. Required by all content
/// catalog endpoints; populated by the index response during login.
#[derive(Debug, Clone, Deserialize)]
pub struct CmsSigning {
    pub bucket: String,
    pub policy: String,
    pub signature: String,
    pub key_pair_id: String,
}

/// Accumulated session config. Mutated only by `login`; everything else
/// reads through the accessors.
#[derive(Debug, Default)]
pub struct SessionConfig {
    values: Map<String, Value>,
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a response body into the config, overwriting existing keys.
    pub fn merge(&mut self, other: Map<String, Value>) {
        self.values.extend(other);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read-only view of the raw config map.
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// CMS signing parameters from the index response.
    pub fn cms(&self) -> Result<CmsSigning, CrunchyrollError> {
        let cms = self
            .values
            .get("cms")
            .ok_or(CrunchyrollError::NotAuthenticated("cms"))?;
        serde_json::from_value(cms.clone())
            .map_err(|_| CrunchyrollError::NotAuthenticated("cms signing fields"))
    }

    /// Account id from the profile response.
    pub fn account_id(&self) -> Result<&str, CrunchyrollError> {
        self.values
            .get("account_id")
            .and_then(Value::as_str)
            .ok_or(CrunchyrollError::NotAuthenticated("account_id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_config_is_not_authenticated() {
        let config = SessionConfig::new();
        assert!(matches!(
            config.cms(),
            Err(CrunchyrollError::NotAuthenticated("cms"))
        ));
        assert!(matches!(
            config.account_id(),
            Err(CrunchyrollError::NotAuthenticated("account_id"))
        ));
    }

    #[test]
    fn test_cms_accessor() {
        let mut config = SessionConfig::new();
        config.merge(as_map(json!({
            "cms": {
                "bucket": "/us/b1",
                "policy": "p",
                "signature": "s",
                "key_pair_id": "k",
                "expires": "2026-01-01T00:00:00Z"
            }
        })));
        let cms = config.cms().unwrap();
        assert_eq!(cms.bucket, "/us/b1");
        assert_eq!(cms.policy, "p");
        assert_eq!(cms.signature, "s");
        assert_eq!(cms.key_pair_id, "k");
    }

    #[test]
    fn test_cms_missing_field_is_not_authenticated() {
        let mut config = SessionConfig::new();
        config.merge(as_map(json!({"cms": {"bucket": "/us/b1"}})));
        assert!(matches!(
            config.cms(),
            Err(CrunchyrollError::NotAuthenticated(_))
        ));
    }

    #[test]
    fn test_account_id_accessor() {
        let mut config = SessionConfig::new();
        config.merge(as_map(json!({"account_id": "A"})));
        assert_eq!(config.account_id().unwrap(), "A");
    }

    #[test]
    fn test_merge_overwrites_existing_keys() {
        let mut config = SessionConfig::new();
        config.merge(as_map(json!({"access_token": "old", "token_type": "Bearer"})));
        config.merge(as_map(json!({"access_token": "new"})));
        assert_eq!(
            config.get("access_token").and_then(Value::as_str),
            Some("new")
        );
        assert_eq!(
            config.get("token_type").and_then(Value::as_str),
            Some("Bearer")
        );
    }
}
