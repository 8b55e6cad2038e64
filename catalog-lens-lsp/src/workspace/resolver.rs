//! Catalog resolution with per-manifest caching
//!
//! [`CatalogResolver`] ties the locator, the data parser and the position
//! engine together. Each manifest gets one cache entry holding its text,
//! parsed data, lazily recovered positions, and a one-shot change
//! subscription. A change notification drops the whole entry at once, so
//! data and positions are never out of sync.
//!
//! Every notification also bumps a per-manifest generation. A read that
//! started before the bump never populates the cache, so an edit landing
//! while a manifest is being read cannot be undone by the older text.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use super::{
    CatalogData, CatalogPositionData, DEFAULT_CATALOG, ManifestLocator, PackageManager, Span,
    WorkspaceManifest, parse_manifest, recover_positions,
};

/// Reads manifest text.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn read_manifest(&self, path: &Path) -> anyhow::Result<String>;
}

/// Reads manifests straight from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestSource;

#[async_trait]
impl ManifestSource for FsManifestSource {
    async fn read_manifest(&self, path: &Path) -> anyhow::Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Where a catalog version is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub manifest_path: PathBuf,
    pub span: Span,
}

/// Result of resolving a `catalog:` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub version: String,
    /// `None` on the fast path or when no span could be recovered
    pub definition: Option<Definition>,
    pub package_manager: PackageManager,
    pub catalog: String,
}

/// Resolver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub manifest_parses: u64,
    pub position_parses: u64,
    pub evictions: u64,
}

/// Handle tying a cache entry to change notifications for its manifest.
///
/// Records the generation the entry was read at and is dropped together
/// with the entry on the first notification.
#[derive(Debug)]
struct ChangeSubscription {
    path: PathBuf,
    generation: u64,
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        tracing::debug!("Released change subscription for {}", self.path.display());
    }
}

#[derive(Debug)]
struct CachedManifest {
    text: Arc<str>,
    data: Arc<CatalogData>,
    positions: Option<Arc<CatalogPositionData>>,
    subscription: ChangeSubscription,
}

/// Resolves catalog references against cached workspace manifests.
#[derive(Debug, Default)]
pub struct CatalogResolver {
    locator: ManifestLocator,
    entries: DashMap<PathBuf, CachedManifest>,
    generations: DashMap<PathBuf, u64>,
    manifest_parses: AtomicU64,
    position_parses: AtomicU64,
    evictions: AtomicU64,
}

impl CatalogResolver {
    pub fn new(locator: ManifestLocator) -> Self {
        Self {
            locator,
            ..Default::default()
        }
    }

    pub fn locator(&self) -> &ManifestLocator {
        &self.locator
    }

    /// Resolve `package` in `catalog` for the consumer file at `consumer`,
    /// including the definition span.
    pub async fn resolve(
        &self,
        source: &dyn ManifestSource,
        consumer: &Path,
        package: &str,
        catalog: &str,
    ) -> Option<Resolution> {
        let catalog = normalize_catalog(catalog);
        let manifest = self.locator.locate_async(consumer).await?;
        let data = self.catalog_data(source, &manifest).await?;
        let version = data.get(catalog, package)?.clone();

        let definition = self
            .position_data(source, &manifest)
            .await
            .and_then(|positions| positions.get(catalog, package).copied())
            .map(|span| Definition {
                manifest_path: manifest.path.clone(),
                span,
            });

        Some(Resolution {
            version,
            definition,
            package_manager: manifest.package_manager,
            catalog: catalog.to_string(),
        })
    }

    /// Resolve the version only, never touching position data.
    pub async fn resolve_version(
        &self,
        source: &dyn ManifestSource,
        consumer: &Path,
        package: &str,
        catalog: &str,
    ) -> Option<Resolution> {
        let catalog = normalize_catalog(catalog);
        let manifest = self.locator.locate_async(consumer).await?;
        let data = self.catalog_data(source, &manifest).await?;
        let version = data.get(catalog, package)?.clone();

        Some(Resolution {
            version,
            definition: None,
            package_manager: manifest.package_manager,
            catalog: catalog.to_string(),
        })
    }

    /// Parsed catalog data of a manifest, parsing on a cache miss.
    ///
    /// Returns `None` when the manifest cannot be read; nothing is cached
    /// in that case.
    pub async fn catalog_data(
        &self,
        source: &dyn ManifestSource,
        manifest: &WorkspaceManifest,
    ) -> Option<Arc<CatalogData>> {
        if let Some(data) = self
            .entries
            .get(&manifest.path)
            .map(|entry| Arc::clone(&entry.data))
        {
            tracing::debug!("Catalog cache hit for {}", manifest.path.display());
            return Some(data);
        }

        tracing::debug!("Catalog cache miss for {}", manifest.path.display());
        loop {
            let generation = self.generation(&manifest.path);
            let text = match source.read_manifest(&manifest.path).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("{e:#}");
                    return None;
                }
            };

            let data = Arc::new(parse_manifest(&text, manifest.format()));
            self.manifest_parses.fetch_add(1, Ordering::Relaxed);

            // The generation is checked under the entry lock so that a
            // notification either lands before (and the text is re-read) or
            // after the insert (and evicts it).
            match self.entries.entry(manifest.path.clone()) {
                Entry::Occupied(entry) => return Some(Arc::clone(&entry.get().data)),
                Entry::Vacant(vacant) => {
                    if self.generation(&manifest.path) != generation {
                        tracing::debug!(
                            "{} changed while being read, reading again",
                            manifest.path.display()
                        );
                        continue;
                    }
                    vacant.insert(CachedManifest {
                        text: Arc::from(text),
                        data: Arc::clone(&data),
                        positions: None,
                        subscription: ChangeSubscription {
                            path: manifest.path.clone(),
                            generation,
                        },
                    });
                    return Some(data);
                }
            }
        }
    }

    /// Source positions of a manifest's catalog versions, recovered lazily.
    pub async fn position_data(
        &self,
        source: &dyn ManifestSource,
        manifest: &WorkspaceManifest,
    ) -> Option<Arc<CatalogPositionData>> {
        self.catalog_data(source, manifest).await?;

        let (text, generation) = {
            let entry = self.entries.get(&manifest.path)?;
            if let Some(positions) = &entry.positions {
                return Some(Arc::clone(positions));
            }
            (Arc::clone(&entry.text), entry.subscription.generation)
        };

        let positions = Arc::new(recover_positions(&text, manifest.format()));
        self.position_parses.fetch_add(1, Ordering::Relaxed);

        // Only store them if the entry was not rebuilt from newer text.
        if let Some(mut entry) = self.entries.get_mut(&manifest.path)
            && entry.subscription.generation == generation
        {
            return Some(Arc::clone(
                entry.positions.get_or_insert_with(|| Arc::clone(&positions)),
            ));
        }
        Some(positions)
    }

    fn generation(&self, manifest_path: &Path) -> u64 {
        self.generations
            .get(manifest_path)
            .map_or(0, |generation| *generation)
    }

    /// Handle a change of the manifest at `manifest_path`.
    ///
    /// Drops data, positions and the subscription together, and makes any
    /// read still in flight for this manifest start over. Returns `false`
    /// when nothing was subscribed, which makes repeated notifications
    /// no-ops until the entry is rebuilt.
    pub fn notify_changed(&self, manifest_path: &Path) -> bool {
        *self
            .generations
            .entry(manifest_path.to_path_buf())
            .or_insert(0) += 1;

        match self.entries.remove(manifest_path) {
            Some(_) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Evicted catalog cache for {}", manifest_path.display());
                true
            }
            None => false,
        }
    }

    /// Whether a manifest currently has a cache entry.
    pub fn is_cached(&self, manifest_path: &Path) -> bool {
        self.entries.contains_key(manifest_path)
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            manifest_parses: self.manifest_parses.load(Ordering::Relaxed),
            position_parses: self.position_parses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

fn normalize_catalog(catalog: &str) -> &str {
    let catalog = catalog.trim();
    if catalog.is_empty() {
        DEFAULT_CATALOG
    } else {
        catalog
    }
}
