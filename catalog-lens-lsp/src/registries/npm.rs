//! Client for npm registry

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::http_client::create_shared_client;
use super::{PackageInfo, Registry};

const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Client for the npm registry
pub struct NpmRegistry {
    client: Arc<Client>,
    base_url: String,
}

impl NpmRegistry {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_client(create_shared_client()?))
    }

    /// Use a shared HTTP client
    pub fn with_client(client: Arc<Client>) -> Self {
        Self {
            client,
            base_url: NPM_REGISTRY_URL.to_string(),
        }
    }

    /// Point the client at another registry (mirrors, tests)
    pub fn with_base_url(base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_shared_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http_client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }
}

// API response structures
#[derive(Debug, Deserialize)]
struct PackageResponse {
    description: Option<String>,
    homepage: Option<String>,
    #[serde(rename = "dist-tags")]
    dist_tags: Option<DistTags>,
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
    #[serde(default)]
    time: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DistTags {
    latest: Option<String>,
}

/// Encode a package name for use as a URL path segment
/// (@scope/name -> @scope%2fname)
fn encode_package_name(package_name: &str) -> String {
    if package_name.starts_with('@') {
        package_name.replace('/', "%2f")
    } else {
        package_name.to_string()
    }
}

/// Highest semver version, falling back to the lexicographically last key
fn highest_version<'a>(versions: impl Iterator<Item = &'a String>) -> Option<String> {
    versions
        .max_by(|a, b| match (semver::Version::parse(a), semver::Version::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            _ => a.cmp(b),
        })
        .cloned()
}

pub(crate) fn parse_publish_time(time: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(time)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Registry for NpmRegistry {
    async fn get_package_info(&self, package_name: &str) -> anyhow::Result<PackageInfo> {
        let url = format!("{}/{}", self.base_url, encode_package_name(package_name));

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch package info for {package_name}: {}",
                response.status()
            );
        }

        let pkg: PackageResponse = response.json().await?;

        let version = pkg
            .dist_tags
            .and_then(|tags| tags.latest)
            .or_else(|| highest_version(pkg.versions.keys()))
            .unwrap_or_default();

        let time = pkg
            .time
            .get(&version)
            .and_then(serde_json::Value::as_str)
            .and_then(parse_publish_time);

        Ok(PackageInfo {
            description: non_empty(pkg.description),
            version,
            time,
            homepage: non_empty(pkg.homepage),
        })
    }
}
