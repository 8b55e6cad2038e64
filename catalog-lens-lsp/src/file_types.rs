//! File type detection
//!
//! Maps document URIs to the role the file plays: a consumer `package.json`
//! or a YAML workspace manifest. A Bun root `package.json` is both a
//! consumer and a manifest; it is detected as a consumer and its manifest
//! role is handled by the resolver's change notifications.

use tower_lsp::lsp_types::Url;

use crate::workspace::{BUN_MANIFEST_FILE, PackageManager};

/// Supported file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Consumer manifest (package.json)
    PackageJson,
    /// YAML workspace manifest (pnpm-workspace.yaml, .yarnrc.yml)
    WorkspaceManifest(PackageManager),
}

impl FileType {
    /// Detect the file type from a document URI.
    ///
    /// Returns `None` if the file is not one the server cares about.
    pub fn detect(uri: &Url) -> Option<Self> {
        let path = uri.path();
        let filename = path.rsplit('/').next().unwrap_or(path);
        if filename == BUN_MANIFEST_FILE {
            Some(FileType::PackageJson)
        } else {
            PackageManager::from_manifest_name(filename).map(FileType::WorkspaceManifest)
        }
    }

    pub fn is_consumer(self) -> bool {
        matches!(self, FileType::PackageJson)
    }
}
