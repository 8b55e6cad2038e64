//! Document state for open files
//!
//! Open documents are kept in memory with their latest text and, for
//! consumer files, the catalog references found in them. The store also
//! serves as the [`ManifestSource`] of the server: manifests open in the
//! editor are read from their buffer, everything else from disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use crate::file_types::FileType;
use crate::parsers::{CatalogReference, scan_catalog_references};
use crate::workspace::{FsManifestSource, ManifestSource};

pub struct DocumentState {
    pub text: Arc<str>,
    pub file_type: FileType,
    /// Catalog references, empty for workspace manifests
    pub references: Vec<CatalogReference>,
}

impl DocumentState {
    pub fn new(text: &str, file_type: FileType) -> Self {
        let references = if file_type.is_consumer() {
            scan_catalog_references(text)
        } else {
            Vec::new()
        };
        Self {
            text: Arc::from(text),
            file_type,
            references,
        }
    }
}

/// Open documents keyed by URI
#[derive(Default)]
pub struct DocumentStore {
    documents: DashMap<Url, DocumentState>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest text of a document, returning its file type.
    ///
    /// Files the server does not handle are ignored.
    pub fn update(&self, uri: &Url, text: &str) -> Option<FileType> {
        let file_type = FileType::detect(uri)?;
        let state = DocumentState::new(text, file_type);
        tracing::debug!(
            "Stored {} with {} catalog references",
            uri,
            state.references.len()
        );
        self.documents.insert(uri.clone(), state);
        Some(file_type)
    }

    pub fn remove(&self, uri: &Url) -> Option<DocumentState> {
        self.documents.remove(uri).map(|(_, state)| state)
    }

    pub fn file_type(&self, uri: &Url) -> Option<FileType> {
        self.documents.get(uri).map(|doc| doc.file_type)
    }

    /// Catalog references of an open document
    pub fn references(&self, uri: &Url) -> Vec<CatalogReference> {
        self.documents
            .get(uri)
            .map(|doc| doc.references.clone())
            .unwrap_or_default()
    }

    pub fn text(&self, uri: &Url) -> Option<Arc<str>> {
        self.documents.get(uri).map(|doc| Arc::clone(&doc.text))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl ManifestSource for DocumentStore {
    async fn read_manifest(&self, path: &Path) -> anyhow::Result<String> {
        if let Some(text) = Url::from_file_path(path).ok().and_then(|uri| self.text(&uri)) {
            return Ok(text.to_string());
        }
        FsManifestSource.read_manifest(path).await
    }
}
