use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use reqwest::Client as HttpClient;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::document::DocumentStore;
use crate::file_types::FileType;
use crate::providers::definition::definition_location;
use crate::providers::hover::{catalog_hover, entry_at_line, package_info_hover};
use crate::providers::inlay_hints::{create_inlay_hint, is_in_range};
use crate::registries::PackageInfoProvider;
use crate::registries::npm::NpmRegistry;
use crate::workspace::{
    BUN_LOCKFILES, CatalogResolver, ManifestLocator, PackageManager, WorkspaceManifest,
};

/// Command flipping the `enabled` setting
pub const TOGGLE_COMMAND: &str = "catalogLens/toggle";
/// Command returning resolver counters
pub const STATS_COMMAND: &str = "catalogLens/stats";

const WATCHER_REGISTRATION_ID: &str = "catalog-lens-manifests";

/// Files whose on-disk changes invalidate catalog data
const WATCHED_GLOBS: [&str; 5] = [
    "**/pnpm-workspace.yaml",
    "**/.yarnrc.yml",
    "**/package.json",
    "**/bun.lock",
    "**/bun.lockb",
];

pub struct CatalogLensBackend {
    client: Client,
    /// Configuration
    config: RwLock<Config>,
    /// Open documents, also the source manifests are read from
    documents: DocumentStore,
    /// Catalog data and positions per workspace manifest
    resolver: CatalogResolver,
    /// npm metadata for workspace manifest hovers
    package_info: PackageInfoProvider,
}

impl CatalogLensBackend {
    /// Create a backend whose npm registry client shares `http_client`.
    pub fn new(client: Client, http_client: Arc<HttpClient>) -> Self {
        let config = Config::default();
        let cache = MemoryCache::with_ttl(config.cache.ttl());

        Self {
            client,
            config: RwLock::new(config),
            documents: DocumentStore::new(),
            resolver: CatalogResolver::new(ManifestLocator::new()),
            package_info: PackageInfoProvider::new(NpmRegistry::with_client(http_client), cache),
        }
    }

    /// Snapshot of the current configuration
    fn config(&self) -> Config {
        self.config.read().map(|cfg| cfg.clone()).unwrap_or_default()
    }

    fn set_config(&self, config: Config) {
        self.package_info.cache().set_ttl(config.cache.ttl());
        if let Ok(mut cfg) = self.config.write() {
            *cfg = config;
        }
    }

    async fn refresh_inlay_hints(&self) {
        self.client
            .send_request::<request::InlayHintRefreshRequest>(())
            .await
            .ok();
    }

    /// Store a new document text and invalidate catalog data if it is a
    /// manifest.
    async fn process_document(&self, uri: &Url, content: &str, manifest_changed: bool) {
        let Some(file_type) = self.documents.update(uri, content) else {
            return;
        };

        let evicted = manifest_changed
            && uri
                .to_file_path()
                .is_ok_and(|path| self.resolver.notify_changed(&path));

        if evicted {
            tracing::info!("Workspace manifest changed: {}", uri.path());
        }
        if evicted || file_type.is_consumer() {
            self.refresh_inlay_hints().await;
        }
    }

    /// Hover with npm metadata for the catalog entry on `line` of a manifest
    async fn manifest_hover(
        &self,
        path: &Path,
        package_manager: PackageManager,
        line: u32,
        config: &Config,
    ) -> Option<Hover> {
        if !config.package_info.enabled {
            return None;
        }

        let manifest = WorkspaceManifest::new(path, package_manager);
        let positions = self.resolver.position_data(&self.documents, &manifest).await?;
        let (package, span) = entry_at_line(&positions, line)?;

        let info = self
            .package_info
            .fetch_package_info(&package, &config.package_info, path.parent())
            .await?;
        Some(package_info_hover(&info, &span))
    }
}

/// Workspace roots announced by the client
#[allow(deprecated)]
fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
    match &params.workspace_folders {
        Some(folders) => folders
            .iter()
            .filter_map(|folder| folder.uri.to_file_path().ok())
            .collect(),
        None => params
            .root_uri
            .iter()
            .filter_map(|uri| uri.to_file_path().ok())
            .collect(),
    }
}

/// Whether creating or deleting this file can change which manifest a
/// consumer resolves to
fn affects_manifest_lookup(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            PackageManager::from_manifest_name(name).is_some() || BUN_LOCKFILES.contains(&name)
        })
}

#[tower_lsp::async_trait]
impl LanguageServer for CatalogLensBackend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Parse configuration from initialization options
        let config = Config::from_init_options(params.initialization_options.clone());
        tracing::info!("Configuration: {:?}", config);

        let roots = workspace_roots(&params);
        tracing::info!("Workspace roots: {:?}", roots);
        self.resolver.locator().set_roots(roots);

        self.set_config(config);

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "catalog-lens-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                inlay_hint_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![TOGGLE_COMMAND.to_string(), STATS_COMMAND.to_string()],
                    ..Default::default()
                }),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Catalog Lens LSP initialized")
            .await;

        self.package_info.cache().spawn_cleanup_task();

        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: WATCHED_GLOBS
                .iter()
                .map(|glob| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(glob.to_string()),
                    kind: None,
                })
                .collect(),
        };

        if let Err(e) = self
            .client
            .register_capability(vec![Registration {
                id: WATCHER_REGISTRATION_ID.to_string(),
                method: "workspace/didChangeWatchedFiles".to_string(),
                register_options: serde_json::to_value(options).ok(),
            }])
            .await
        {
            tracing::warn!("Failed to register manifest watchers: {}", e);
        }

        tracing::info!("Catalog Lens LSP initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Catalog Lens LSP shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let content = params.text_document.text;

        tracing::debug!("Document opened: {}", uri);
        self.process_document(&uri, &content, false).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // With FULL sync, we get the entire document content
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            self.process_document(&uri, &change.text, true).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;

        if let Some(text) = params.text {
            tracing::debug!("Document saved: {}", uri);
            self.process_document(&uri, &text, true).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        // Cached data may come from unsaved buffer text
        if self.documents.remove(&uri).is_some()
            && let Ok(path) = uri.to_file_path()
            && self.resolver.notify_changed(&path)
        {
            self.refresh_inlay_hints().await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let config = Config::from_settings(params.settings);
        tracing::info!("Configuration changed: {:?}", config);

        self.set_config(config);
        self.refresh_inlay_hints().await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let locator = self.resolver.locator();
        for folder in params.event.removed {
            if let Ok(path) = folder.uri.to_file_path() {
                locator.remove_root(&path);
            }
        }
        for folder in params.event.added {
            if let Ok(path) = folder.uri.to_file_path() {
                locator.add_root(path);
            }
        }
        locator.clear();
        tracing::info!("Workspace roots: {:?}", locator.roots());
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut changed = false;

        for change in params.changes {
            let Ok(path) = change.uri.to_file_path() else {
                continue;
            };

            if change.typ != FileChangeType::CHANGED && affects_manifest_lookup(&path) {
                tracing::debug!("Manifest lookup invalidated by {}", path.display());
                self.resolver.locator().clear();
                changed = true;
            }
            changed |= self.resolver.notify_changed(&path);
        }

        if changed {
            self.refresh_inlay_hints().await;
        }
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> Result<Option<Vec<InlayHint>>> {
        let config = self.config();
        if !config.inlay_hints_enabled() {
            return Ok(Some(vec![]));
        }

        let uri = &params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return Ok(Some(vec![]));
        };

        let references: Vec<_> = self
            .documents
            .references(uri)
            .into_iter()
            .filter(|reference| is_in_range(reference, &params.range))
            .collect();

        let resolutions = join_all(references.iter().map(|reference| {
            self.resolver.resolve_version(
                &self.documents,
                &path,
                &reference.name,
                &reference.catalog,
            )
        }))
        .await;

        let hints: Vec<InlayHint> = references
            .iter()
            .zip(resolutions)
            .filter_map(|(reference, resolution)| {
                resolution.map(|resolution| {
                    create_inlay_hint(reference, &resolution, config.named_catalogs_label)
                })
            })
            .collect();

        tracing::debug!("Returning {} inlay hints for {}", hints.len(), uri);
        Ok(Some(hints))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Ok(path) = uri.to_file_path() else {
            return Ok(None);
        };
        let config = self.config();

        match self.documents.file_type(uri) {
            Some(FileType::PackageJson) => {
                if !config.enabled || !config.hover {
                    return Ok(None);
                }

                let Some(reference) = self
                    .documents
                    .references(uri)
                    .into_iter()
                    .find(|reference| reference.contains(position.line, position.character))
                else {
                    return Ok(None);
                };

                let resolution = self
                    .resolver
                    .resolve(&self.documents, &path, &reference.name, &reference.catalog)
                    .await;
                Ok(resolution.map(|resolution| catalog_hover(&reference, &resolution)))
            }
            Some(FileType::WorkspaceManifest(package_manager)) => Ok(self
                .manifest_hover(&path, package_manager, position.line, &config)
                .await),
            None => Ok(None),
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        if !self.config().enabled {
            return Ok(None);
        }
        let Ok(path) = uri.to_file_path() else {
            return Ok(None);
        };

        let Some(reference) = self
            .documents
            .references(uri)
            .into_iter()
            .find(|reference| reference.contains(position.line, position.character))
        else {
            return Ok(None);
        };

        let location = self
            .resolver
            .resolve(&self.documents, &path, &reference.name, &reference.catalog)
            .await
            .and_then(|resolution| resolution.definition)
            .and_then(|definition| definition_location(&definition));

        Ok(location.map(GotoDefinitionResponse::Scalar))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        match params.command.as_str() {
            TOGGLE_COMMAND => {
                let enabled = match self.config.write() {
                    Ok(mut cfg) => {
                        cfg.enabled = !cfg.enabled;
                        cfg.enabled
                    }
                    Err(_) => return Ok(None),
                };
                tracing::info!("Catalog Lens {}", if enabled { "enabled" } else { "disabled" });

                self.refresh_inlay_hints().await;
                Ok(Some(serde_json::json!({ "enabled": enabled })))
            }
            STATS_COMMAND => Ok(serde_json::to_value(self.resolver.stats()).ok()),
            _ => {
                tracing::warn!("Unknown command: {}", params.command);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(deprecated)]
    fn test_workspace_roots_prefers_folders() {
        let params = InitializeParams {
            root_uri: Some(Url::parse("file:///root").unwrap()),
            workspace_folders: Some(vec![
                WorkspaceFolder {
                    uri: Url::parse("file:///a").unwrap(),
                    name: "a".to_string(),
                },
                WorkspaceFolder {
                    uri: Url::parse("file:///b").unwrap(),
                    name: "b".to_string(),
                },
            ]),
            ..Default::default()
        };
        assert_eq!(
            workspace_roots(&params),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    #[allow(deprecated)]
    fn test_workspace_roots_falls_back_to_root_uri() {
        let params = InitializeParams {
            root_uri: Some(Url::parse("file:///root").unwrap()),
            ..Default::default()
        };
        assert_eq!(workspace_roots(&params), vec![PathBuf::from("/root")]);
        assert!(workspace_roots(&InitializeParams::default()).is_empty());
    }

    #[test]
    fn test_affects_manifest_lookup() {
        assert!(affects_manifest_lookup(Path::new("/p/pnpm-workspace.yaml")));
        assert!(affects_manifest_lookup(Path::new("/p/.yarnrc.yml")));
        assert!(affects_manifest_lookup(Path::new("/p/bun.lock")));
        assert!(affects_manifest_lookup(Path::new("/p/bun.lockb")));
        assert!(!affects_manifest_lookup(Path::new("/p/package.json")));
        assert!(!affects_manifest_lookup(Path::new("/p/pnpm-lock.yaml")));
    }
}
