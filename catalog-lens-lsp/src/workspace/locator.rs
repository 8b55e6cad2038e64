//! Nearest workspace manifest lookup

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{
    BUN_LOCKFILES, BUN_MANIFEST_FILE, PNPM_WORKSPACE_FILE, PackageManager, WorkspaceManifest,
    YARN_RC_FILE,
};

/// Finds the workspace manifest governing a file.
///
/// Lookups walk ancestor directories, bounded by the deepest registered
/// workspace root containing the start path. Hits are memoized per start
/// path for the whole session; misses are not, so a manifest created later
/// is still discovered. A memoized hit is not revalidated if the manifest
/// is later deleted or a closer one appears.
#[derive(Debug, Default)]
pub struct ManifestLocator {
    roots: RwLock<Vec<PathBuf>>,
    hits: DashMap<PathBuf, WorkspaceManifest>,
    generation: AtomicU64,
}

impl ManifestLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a locator bounded by the given workspace roots.
    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let locator = Self::new();
        locator.set_roots(roots);
        locator
    }

    /// Replace the registered workspace roots.
    pub fn set_roots(&self, roots: impl IntoIterator<Item = PathBuf>) {
        if let Ok(mut guard) = self.roots.write() {
            *guard = roots.into_iter().collect();
        }
    }

    pub fn add_root(&self, root: PathBuf) {
        if let Ok(mut guard) = self.roots.write()
            && !guard.contains(&root)
        {
            guard.push(root);
        }
    }

    pub fn remove_root(&self, root: &Path) {
        if let Ok(mut guard) = self.roots.write() {
            guard.retain(|r| r != root);
        }
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.read().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of memoized hits.
    pub fn cached_len(&self) -> usize {
        self.hits.len()
    }

    /// Forget all memoized hits, e.g. after a manifest was created or deleted.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.hits.clear();
    }

    /// Locate the workspace manifest for `start` (a file or a directory).
    ///
    /// Blocks on filesystem checks; async callers use
    /// [`locate_async`](Self::locate_async).
    pub fn locate(&self, start: &Path) -> Option<WorkspaceManifest> {
        if let Some(hit) = self.cached(start) {
            return Some(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let found = search(start, &self.roots());
        self.remember(start, found, generation)
    }

    /// Locate the workspace manifest for `start`, walking the directories
    /// on the blocking thread pool.
    pub async fn locate_async(&self, start: &Path) -> Option<WorkspaceManifest> {
        if let Some(hit) = self.cached(start) {
            return Some(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let owned = start.to_path_buf();
        let roots = self.roots();
        let found = match tokio::task::spawn_blocking(move || search(&owned, &roots)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Manifest lookup for {} failed: {e}", start.display());
                None
            }
        };
        self.remember(start, found, generation)
    }

    fn cached(&self, start: &Path) -> Option<WorkspaceManifest> {
        let hit = self.hits.get(start)?;
        tracing::debug!("Locator cache hit for {}", start.display());
        Some(hit.clone())
    }

    /// Memoize a hit unless [`clear`](Self::clear) ran since `generation`
    /// was read.
    fn remember(
        &self,
        start: &Path,
        found: Option<WorkspaceManifest>,
        generation: u64,
    ) -> Option<WorkspaceManifest> {
        match &found {
            Some(manifest) => {
                tracing::debug!(
                    "Located {} manifest {} for {}",
                    manifest.package_manager,
                    manifest.path.display(),
                    start.display()
                );
                if self.generation.load(Ordering::Acquire) == generation {
                    self.hits.insert(start.to_path_buf(), manifest.clone());
                }
            }
            None => tracing::debug!("No workspace manifest found for {}", start.display()),
        }
        found
    }
}

/// Walk up from `start` to the deepest root containing it.
fn search(start: &Path, roots: &[PathBuf]) -> Option<WorkspaceManifest> {
    let start_dir = if start.is_dir() {
        start
    } else {
        start.parent()?
    };
    let boundary = boundary_for(roots, start_dir);

    find_yaml_manifest(start_dir, boundary)
        .or_else(|| find_bun_manifest(start_dir, boundary))
}

/// Deepest registered root containing `dir`.
fn boundary_for<'a>(roots: &'a [PathBuf], dir: &Path) -> Option<&'a Path> {
    roots
        .iter()
        .filter(|root| dir.starts_with(root))
        .max_by_key(|root| root.components().count())
        .map(PathBuf::as_path)
}

/// Ancestors of `start`, inclusive, stopping after `boundary`.
fn bounded_ancestors<'a>(
    start: &'a Path,
    boundary: Option<&'a Path>,
) -> impl Iterator<Item = &'a Path> {
    let mut done = false;
    start.ancestors().take_while(move |dir| {
        if done {
            return false;
        }
        done = boundary.is_some_and(|b| *dir == b);
        true
    })
}

fn find_yaml_manifest(start: &Path, boundary: Option<&Path>) -> Option<WorkspaceManifest> {
    bounded_ancestors(start, boundary).find_map(|dir| {
        [
            (PNPM_WORKSPACE_FILE, PackageManager::Pnpm),
            (YARN_RC_FILE, PackageManager::Yarn),
        ]
        .into_iter()
        .map(|(name, pm)| (dir.join(name), pm))
        .find(|(path, _)| path.is_file())
        .map(|(path, pm)| WorkspaceManifest::new(path, pm))
    })
}

fn find_bun_manifest(start: &Path, boundary: Option<&Path>) -> Option<WorkspaceManifest> {
    bounded_ancestors(start, boundary).find_map(|dir| {
        let has_lockfile = BUN_LOCKFILES.iter().any(|lock| dir.join(lock).is_file());
        let manifest = dir.join(BUN_MANIFEST_FILE);
        (has_lockfile && manifest.is_file())
            .then(|| WorkspaceManifest::new(manifest, PackageManager::Bun))
    })
}
