// src/chain/version.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::UpstreamError;

pub const UNKNOWN_VERSION: &str = "Unknown";

/// Latest published software versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub node: String,
    pub space_acres: String,
}

impl VersionInfo {
    pub fn unknown() -> Self {
        Self {
            node: UNKNOWN_VERSION.to_string(),
            space_acres: UNKNOWN_VERSION.to_string(),
        }
    }

    /// Read `latestver` and `latest_spaceacres_version`; anything missing
    /// or non-string becomes `"Unknown"`.
    pub fn from_json(v: &Value) -> Self {
        let field = |key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_VERSION)
                .to_string()
        };
        Self {
            node: field("latestver"),
            space_acres: field("latest_spaceacres_version"),
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn fetch_versions(&self) -> Result<VersionInfo, UpstreamError>;
}

pub struct HttpVersionSource {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpVersionSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn fetch_versions(&self) -> Result<VersionInfo, UpstreamError> {
        let body: Value = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !body.is_object() {
            return Err(UpstreamError::Malformed(format!(
                "version info is not a JSON object: {body}"
            )));
        }
        Ok(VersionInfo::from_json(&body))
    }
}

/// Always answers with the same versions.
#[derive(Debug, Clone)]
pub struct FixedVersionSource(pub VersionInfo);

#[async_trait]
impl VersionSource for FixedVersionSource {
    async fn fetch_versions(&self) -> Result<VersionInfo, UpstreamError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default_to_unknown() {
        let v = VersionInfo::from_json(&json!({ "latestver": "mainnet-2025-jan-14" }));
        assert_eq!(v.node, "mainnet-2025-jan-14");
        assert_eq!(v.space_acres, "Unknown");
    }

    #[test]
    fn non_string_fields_are_unknown() {
        let v = VersionInfo::from_json(&json!({ "latestver": 3, "latest_spaceacres_version": "" }));
        assert_eq!(v, VersionInfo::unknown());
    }
}
