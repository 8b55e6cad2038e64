//! Workspace catalog model and resolution engine
//!
//! A workspace catalog is a shared version alias declared once in a
//! workspace manifest (`pnpm-workspace.yaml`, `.yarnrc.yml`, or a Bun
//! `package.json`) and referenced from consumer manifests as
//! `"pkg": "catalog:<name>"`.
//!
//! The engine is split in four parts:
//!
//! - [`locator`]: finds the nearest workspace manifest for a file
//! - [`manifest`]: parses a manifest into [`CatalogData`]
//! - [`positions`]: re-parses the same text into [`CatalogPositionData`]
//! - [`resolver`]: caches both per manifest and answers resolution requests

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub mod locator;
pub mod manifest;
pub mod positions;
pub mod resolver;

pub use locator::ManifestLocator;
pub use manifest::{ManifestError, parse_manifest, try_parse_manifest};
pub use positions::{recover_positions, try_recover_positions};
pub use resolver::{
    CatalogResolver, Definition, FsManifestSource, ManifestSource, Resolution, ResolverStats,
};

/// Prefix of a catalog reference in a consumer `package.json`.
pub const CATALOG_PREFIX: &str = "catalog:";

/// Name used for the unnamed catalog.
pub const DEFAULT_CATALOG: &str = "default";

/// pnpm workspace declaration file.
pub const PNPM_WORKSPACE_FILE: &str = "pnpm-workspace.yaml";

/// Yarn (berry) configuration file holding catalogs.
pub const YARN_RC_FILE: &str = ".yarnrc.yml";

/// Bun keeps catalogs in the root `package.json`.
pub const BUN_MANIFEST_FILE: &str = "package.json";

/// Lockfile names marking a Bun workspace root.
pub const BUN_LOCKFILES: [&str; 2] = ["bun.lockb", "bun.lock"];

/// Package managers with catalog support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    /// Source format of this package manager's workspace manifest.
    pub fn manifest_format(self) -> ManifestFormat {
        match self {
            PackageManager::Pnpm | PackageManager::Yarn => ManifestFormat::Yaml,
            PackageManager::Bun => ManifestFormat::Json,
        }
    }

    /// Human readable name, as shown in hovers.
    pub fn display_name(self) -> &'static str {
        match self {
            PackageManager::Pnpm => "PNPM",
            PackageManager::Yarn => "Yarn",
            PackageManager::Bun => "Bun",
        }
    }

    /// Classify a workspace declaration file by its file name.
    pub fn from_manifest_name(file_name: &str) -> Option<Self> {
        match file_name {
            PNPM_WORKSPACE_FILE => Some(PackageManager::Pnpm),
            YARN_RC_FILE => Some(PackageManager::Yarn),
            _ => None,
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// On-disk format of a workspace manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

/// A located workspace manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkspaceManifest {
    /// Absolute path of the manifest file
    pub path: PathBuf,
    /// Package manager owning the manifest
    pub package_manager: PackageManager,
}

impl WorkspaceManifest {
    pub fn new(path: impl Into<PathBuf>, package_manager: PackageManager) -> Self {
        Self {
            path: path.into(),
            package_manager,
        }
    }

    /// Build a reference for a file that is itself a YAML workspace manifest.
    pub fn from_manifest_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        PackageManager::from_manifest_name(name).map(|pm| Self::new(path, pm))
    }

    pub fn format(&self) -> ManifestFormat {
        self.package_manager.manifest_format()
    }
}

/// Catalog mapping shared by parsed data and recovered positions.
///
/// `default` is the top-level `catalog` key, `named` the `catalogs` key.
/// The two are never merged: a `default` entry in `named` is only used when
/// the top-level catalog is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalogs<T> {
    /// Top-level `catalog` mapping (package name -> value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<BTreeMap<String, T>>,
    /// `catalogs` mapping (catalog name -> package name -> value)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub named: BTreeMap<String, BTreeMap<String, T>>,
}

impl<T> Default for Catalogs<T> {
    fn default() -> Self {
        Self {
            default: None,
            named: BTreeMap::new(),
        }
    }
}

impl<T> Catalogs<T> {
    /// Select the catalog a `catalog:<name>` reference points at.
    pub fn catalog(&self, name: &str) -> Option<&BTreeMap<String, T>> {
        if name == DEFAULT_CATALOG {
            self.default
                .as_ref()
                .or_else(|| self.named.get(DEFAULT_CATALOG))
        } else {
            self.named.get(name)
        }
    }

    /// Look up a package in the given catalog.
    pub fn get(&self, catalog: &str, package: &str) -> Option<&T> {
        self.catalog(catalog)?.get(package)
    }

    /// Number of package entries across all catalogs.
    pub fn entry_count(&self) -> usize {
        self.default.as_ref().map_or(0, BTreeMap::len)
            + self.named.values().map(BTreeMap::len).sum::<usize>()
    }

    /// `true` when no catalog holds any entry.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Iterate `(catalog name, package, value)` over every entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &T)> {
        let default = self
            .default
            .iter()
            .flat_map(|m| m.iter().map(|(pkg, v)| (DEFAULT_CATALOG, pkg.as_str(), v)));
        let named = self.named.iter().flat_map(|(name, m)| {
            m.iter()
                .map(move |(pkg, v)| (name.as_str(), pkg.as_str(), v))
        });
        default.chain(named)
    }
}

/// Parsed catalog versions of one manifest.
pub type CatalogData = Catalogs<String>;

/// Source spans of every catalog version of one manifest.
pub type CatalogPositionData = Catalogs<Span>;

/// Source range of a version value.
///
/// Lines are 1-based, columns are 0-based UTF-16 code units. The range never
/// includes surrounding quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    /// Whether a 0-based LSP line falls inside the span.
    pub fn contains_line(&self, line: u32) -> bool {
        let line = line.saturating_add(1);
        line >= self.start_line && line <= self.end_line
    }
}
