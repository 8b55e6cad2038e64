//! Package metadata lookups shown when hovering catalog entries

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::MemoryCache;
use crate::config::PackageInfoConfig;

pub mod http_client;
pub mod npm;
pub mod npm_cli;

use npm::NpmRegistry;
use npm_cli::NpmCli;

/// Maximum length of an npm package name
const MAX_NAME_LENGTH: usize = 214;

/// Metadata of the latest release of a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package description
    pub description: Option<String>,
    /// Latest version
    pub version: String,
    /// Publish time of `version`
    pub time: Option<DateTime<Utc>>,
    /// Homepage URL
    pub homepage: Option<String>,
}

/// Trait for package metadata sources
/// Note: async_fn_in_trait is allowed because this trait is internal and already bounds Send + Sync
#[allow(async_fn_in_trait)]
pub trait Registry: Send + Sync {
    /// Get metadata of the latest release of a package
    async fn get_package_info(&self, package_name: &str) -> anyhow::Result<PackageInfo>;
}

/// Check a package name against npm naming rules.
///
/// Rejects names that could not be published, which also keeps arbitrary
/// text out of registry URLs and `npm view` arguments.
pub fn is_valid_npm_name(name: &str) -> bool {
    if name.is_empty()
        || name.len() > MAX_NAME_LENGTH
        || name.starts_with(['-', '_', '.'])
        || name.starts_with(char::is_whitespace)
    {
        return false;
    }

    let (scope, package) = match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, package)) => (Some(scope), package),
            None => return false,
        },
        None => (None, name),
    };

    scope.is_none_or(is_url_safe_segment) && is_url_safe_segment(package)
}

/// Non-empty, unchanged by URI component encoding, and free of the
/// characters npm forbids (`~ ( ) ' ! *`)
fn is_url_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Looks up package metadata through `npm view` and the npm registry,
/// caching successful results.
pub struct PackageInfoProvider {
    registry: NpmRegistry,
    cache: MemoryCache<PackageInfo>,
    npm_on_path: OnceLock<Option<PathBuf>>,
}

impl PackageInfoProvider {
    pub fn new(registry: NpmRegistry, cache: MemoryCache<PackageInfo>) -> Self {
        Self {
            registry,
            cache,
            npm_on_path: OnceLock::new(),
        }
    }

    /// npm executable for `npm view`: the configured one, else `npm` from
    /// `PATH` (looked up once).
    pub fn npm_command(&self, settings: &PackageInfoConfig) -> Option<PathBuf> {
        if !settings.use_npm {
            return None;
        }
        if let Some(command) = &settings.npm_command {
            return Some(command.clone());
        }
        self.npm_on_path
            .get_or_init(|| match which::which("npm") {
                Ok(path) => {
                    tracing::debug!("Using npm at {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    tracing::debug!("npm not found on PATH: {e}");
                    None
                }
            })
            .clone()
    }

    pub fn cache(&self) -> &MemoryCache<PackageInfo> {
        &self.cache
    }

    /// Fetch metadata for `package_name`.
    ///
    /// `cwd` is the directory `npm view` runs in, so that project `.npmrc`
    /// files apply. Failures are logged and yield `None`; they are not
    /// cached.
    pub async fn fetch_package_info(
        &self,
        package_name: &str,
        settings: &PackageInfoConfig,
        cwd: Option<&Path>,
    ) -> Option<PackageInfo> {
        if !settings.enabled || !is_valid_npm_name(package_name) {
            return None;
        }

        if let Some(info) = self.cache.get(package_name) {
            tracing::debug!("Package info cache hit for {package_name}");
            return Some(info);
        }

        let mut info = None;

        if let Some(command) = self.npm_command(settings) {
            let cli = NpmCli::new(command, cwd.map(Path::to_path_buf));
            match cli.get_package_info(package_name).await {
                Ok(found) => info = Some(found),
                Err(e) => tracing::debug!("npm view failed for {package_name}: {e:#}"),
            }
        }

        if info.is_none() && settings.fetch_online {
            match self.registry.get_package_info(package_name).await {
                Ok(found) => info = Some(found),
                Err(e) => tracing::warn!("Failed to fetch package info for {package_name}: {e:#}"),
            }
        }

        if let Some(found) = &info {
            self.cache.insert(package_name.to_string(), found.clone());
        }
        info
    }
}
