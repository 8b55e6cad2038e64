use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tower_lsp::{LspService, Server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use catalog_lens_lsp::backend::CatalogLensBackend;
use catalog_lens_lsp::registries::http_client::create_shared_client;
use catalog_lens_lsp::workspace::{
    CatalogResolver, FsManifestSource, ManifestFormat, ManifestLocator, WorkspaceManifest,
    recover_positions, try_parse_manifest,
};

#[derive(Parser)]
#[command(name = "catalog-lens-lsp")]
#[command(about = "Language server for pnpm, Yarn and Bun workspace catalogs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the LSP server (default behavior)
    Lsp,
    /// Resolve a catalog reference for a package.json and print it as JSON
    Resolve {
        /// Path to the consumer package.json
        #[arg(short, long)]
        file: PathBuf,

        /// Package name
        #[arg(short, long)]
        package: String,

        /// Catalog name
        #[arg(short, long, default_value = "default")]
        catalog: String,
    },
    /// Print the workspace manifest governing a file and its catalogs
    Catalogs {
        /// Path to a workspace manifest or any file inside a workspace
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Profile manifest parsing (for use with cargo-flamegraph)
    ProfileParse {
        /// Path to the workspace manifest to parse
        #[arg(short, long)]
        file: PathBuf,

        /// Number of iterations (for meaningful profiling)
        #[arg(short, long, default_value = "1000")]
        iterations: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Resolve {
            file,
            package,
            catalog,
        }) => run_resolve(file, package, catalog).await,
        Some(Commands::Catalogs { file }) => run_catalogs(file).await,
        Some(Commands::ProfileParse { file, iterations }) => {
            run_profile_parse(file, iterations).await
        }
        Some(Commands::Lsp) | None => run_lsp().await,
    }
}

async fn run_lsp() -> ExitCode {
    tracing::info!("Starting Catalog Lens LSP server");

    let http_client = match create_shared_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error creating HTTP client: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) =
        LspService::new(move |client| CatalogLensBackend::new(client, http_client));
    Server::new(stdin, stdout, socket).serve(service).await;
    ExitCode::SUCCESS
}

async fn absolute_path(file: &Path) -> Option<PathBuf> {
    match tokio::fs::canonicalize(file).await {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            None
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_resolve(file: PathBuf, package: String, catalog: String) -> ExitCode {
    let Some(file) = absolute_path(&file).await else {
        return ExitCode::FAILURE;
    };

    let resolver = CatalogResolver::new(ManifestLocator::new());
    match resolver
        .resolve(&FsManifestSource, &file, &package, &catalog)
        .await
    {
        Some(resolution) => print_json(&resolution),
        None => {
            eprintln!("{package} is not declared in catalog {catalog:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_catalogs(file: PathBuf) -> ExitCode {
    let Some(file) = absolute_path(&file).await else {
        return ExitCode::FAILURE;
    };

    let manifest = match WorkspaceManifest::from_manifest_path(&file) {
        Some(manifest) => manifest,
        None => match ManifestLocator::new().locate(&file) {
            Some(manifest) => manifest,
            None => {
                eprintln!("No workspace manifest found for {}", file.display());
                return ExitCode::FAILURE;
            }
        },
    };

    let resolver = CatalogResolver::new(ManifestLocator::new());
    let Some(data) = resolver.catalog_data(&FsManifestSource, &manifest).await else {
        return ExitCode::FAILURE;
    };

    print_json(&serde_json::json!({
        "manifest": manifest,
        "catalogs": data.as_ref(),
    }))
}

async fn run_profile_parse(file: PathBuf, iterations: usize) -> ExitCode {
    let content = match tokio::fs::read_to_string(&file).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let format = match WorkspaceManifest::from_manifest_path(&file) {
        Some(manifest) => manifest.format(),
        None if file.extension().is_some_and(|ext| ext == "json") => ManifestFormat::Json,
        None => {
            eprintln!("Unsupported file type: {}", file.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = try_parse_manifest(&content, format) {
        eprintln!("Error parsing {}: {}", file.display(), e);
        return ExitCode::FAILURE;
    }

    eprintln!("Profiling parse operations for: {}", file.display());
    eprintln!("Iterations: {}", iterations);
    eprintln!("File size: {} bytes", content.len());

    let iterations = iterations.max(1);

    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(try_parse_manifest(&content, format).ok());
    }
    let parse_elapsed = start.elapsed();

    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(recover_positions(&content, format));
    }
    let positions_elapsed = start.elapsed();

    eprintln!("\nProfiling complete!");
    eprintln!(
        "Data parse: {:?} total, {:?} per iteration",
        parse_elapsed,
        parse_elapsed / iterations as u32
    );
    eprintln!(
        "Position recovery: {:?} total, {:?} per iteration",
        positions_elapsed,
        positions_elapsed / iterations as u32
    );

    ExitCode::SUCCESS
}
