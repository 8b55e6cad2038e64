//! Configuration management for Catalog Lens LSP

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default cache TTL (1 hour)
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Key under which editors nest the server settings in
/// `workspace/didChangeConfiguration`
pub const SETTINGS_SECTION: &str = "catalogLens";

/// LSP configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch for hints, hovers and definitions on `package.json`
    pub enabled: bool,
    /// Show hovers on catalog references
    pub hover: bool,
    /// Label hints of named catalogs with the catalog name
    pub named_catalogs_label: bool,
    /// Inlay hints configuration
    pub inlay_hints: InlayHintsConfig,
    /// Package info shown on workspace manifest hovers
    pub package_info: PackageInfoConfig,
    /// Cache configuration
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            hover: true,
            named_catalogs_label: true,
            inlay_hints: InlayHintsConfig::default(),
            package_info: PackageInfoConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Inlay hints configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InlayHintsConfig {
    /// Enable inlay hints
    pub enabled: bool,
}

impl Default for InlayHintsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Package metadata lookups
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageInfoConfig {
    /// Enable package info on workspace manifest hovers
    pub enabled: bool,
    /// Query registry.npmjs.org when `npm view` is unavailable or fails
    pub fetch_online: bool,
    /// Look packages up through `npm view` before the registry
    pub use_npm: bool,
    /// Path to the npm executable; `npm` is searched on `PATH` when unset
    pub npm_command: Option<PathBuf>,
}

impl Default for PackageInfoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_online: true,
            use_npm: true,
            npm_command: None,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Package info cache TTL in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Parse configuration from initialization options
    pub fn from_init_options(options: Option<serde_json::Value>) -> Self {
        match options {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Self::default(),
        }
    }

    /// Parse configuration from `workspace/didChangeConfiguration` settings
    ///
    /// Settings may be nested under [`SETTINGS_SECTION`] or sent as is.
    pub fn from_settings(settings: serde_json::Value) -> Self {
        match settings {
            serde_json::Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => {
                Self::from_init_options(map.remove(SETTINGS_SECTION))
            }
            other => Self::from_init_options(Some(other)),
        }
    }

    /// Whether inlay hints should be produced at all
    pub fn inlay_hints_enabled(&self) -> bool {
        self.enabled && self.inlay_hints.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.enabled);
        assert!(config.hover);
        assert!(config.named_catalogs_label);
        assert!(config.inlay_hints.enabled);
        assert!(config.package_info.enabled);
        assert!(config.package_info.fetch_online);
        assert!(config.package_info.use_npm);
        assert!(config.package_info.npm_command.is_none());
        assert_eq!(config.cache.ttl_secs, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_from_json() {
        let json = json!({
            "enabled": false,
            "hover": false,
            "named_catalogs_label": false,
            "inlay_hints": { "enabled": false },
            "package_info": {
                "fetch_online": false,
                "use_npm": false,
                "npm_command": "/usr/local/bin/npm"
            },
            "cache": { "ttl_secs": 7200 }
        });

        let config = Config::from_init_options(Some(json));
        assert!(!config.enabled);
        assert!(!config.hover);
        assert!(!config.named_catalogs_label);
        assert!(!config.inlay_hints.enabled);
        assert!(config.package_info.enabled);
        assert!(!config.package_info.fetch_online);
        assert!(!config.package_info.use_npm);
        assert_eq!(
            config.package_info.npm_command,
            Some(PathBuf::from("/usr/local/bin/npm"))
        );
        assert_eq!(config.cache.ttl_secs, 7200);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_init_options(Some(json!({ "hover": false })));
        assert!(!config.hover);
        // Other fields should use defaults
        assert!(config.enabled);
        assert!(config.inlay_hints.enabled);
    }

    #[test]
    fn test_from_init_options_none() {
        let config = Config::from_init_options(None);
        assert!(config.enabled);
    }

    #[test]
    fn test_from_init_options_invalid_json() {
        let config = Config::from_init_options(Some(json!("invalid")));
        assert!(config.enabled);

        let config = Config::from_init_options(Some(json!({ "enabled": "yes" })));
        assert!(config.enabled);
    }

    #[test]
    fn test_from_settings_nested_and_flat() {
        let nested = Config::from_settings(json!({ "catalogLens": { "enabled": false } }));
        assert!(!nested.enabled);

        let flat = Config::from_settings(json!({ "named_catalogs_label": false }));
        assert!(!flat.named_catalogs_label);
        assert!(flat.enabled);
    }

    #[test]
    fn test_inlay_hints_enabled() {
        let mut config = Config::default();
        assert!(config.inlay_hints_enabled());
        config.enabled = false;
        assert!(!config.inlay_hints_enabled());
        config.enabled = true;
        config.inlay_hints.enabled = false;
        assert!(!config.inlay_hints_enabled());
    }
}
