//! Benchmark suite for catalog-lens-lsp
//!
//! Run with: `cargo bench --bench benchmarks`
//! View report: `open target/criterion/report/index.html`

use std::fs;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use catalog_lens_lsp::cache::MemoryCache;
use catalog_lens_lsp::parsers::scan_catalog_references;
use catalog_lens_lsp::registries::PackageInfo;
use catalog_lens_lsp::workspace::{
    CatalogResolver, FsManifestSource, ManifestFormat, ManifestLocator, parse_manifest,
    recover_positions,
};

// =============================================================================
// Test Data Generation
// =============================================================================

const PACKAGES: [(&str, &str); 16] = [
    ("react", "^18.2.0"),
    ("react-dom", "^18.2.0"),
    ("vue", "^3.4.21"),
    ("lodash", "4.17.21"),
    ("typescript", "~5.4.5"),
    ("vite", "^5.2.8"),
    ("vitest", "^1.5.0"),
    ("eslint", "^9.0.0"),
    ("prettier", "3.2.5"),
    ("@types/node", "^20.12.7"),
    ("@types/react", "^18.2.79"),
    ("zod", "^3.23.0"),
    ("express", "^4.19.2"),
    ("axios", "^1.6.8"),
    ("tailwindcss", "^3.4.3"),
    ("@tanstack/react-query", "^5.29.2"),
];

fn package(i: usize) -> (String, &'static str) {
    let (name, version) = PACKAGES[i % PACKAGES.len()];
    (format!("{name}-{i}"), version)
}

fn generate_pnpm_workspace(entry_count: usize) -> String {
    let mut content = String::from("packages:\n  - packages/*\n\ncatalog:\n");
    for i in 0..entry_count {
        let (name, version) = package(i);
        content.push_str(&format!("  \"{name}\": \"{version}\"\n"));
    }

    content.push_str("\ncatalogs:\n");
    for catalog in ["legacy", "next"] {
        content.push_str(&format!("  {catalog}:\n"));
        for i in 0..entry_count / 2 {
            let (name, version) = package(i);
            content.push_str(&format!("    {name}: {version}\n"));
        }
    }
    content
}

fn generate_bun_manifest(entry_count: usize) -> String {
    let entries: Vec<String> = (0..entry_count)
        .map(|i| {
            let (name, version) = package(i);
            format!("      \"{name}\": \"{version}\"")
        })
        .collect();

    format!(
        "{{\n  \"name\": \"root\",\n  \"workspaces\": {{\n    \"packages\": [\"packages/*\"],\n    \"catalog\": {{\n{}\n    }}\n  }}\n}}\n",
        entries.join(",\n")
    )
}

fn generate_package_json(dep_count: usize) -> String {
    let deps: Vec<String> = (0..dep_count)
        .map(|i| {
            let (name, _) = package(i);
            match i % 3 {
                0 => format!("    \"{name}\": \"catalog:\""),
                1 => format!("    \"{name}\": \"catalog:legacy\""),
                _ => format!("    \"{name}\": \"^1.0.0\""),
            }
        })
        .collect();

    format!(
        "{{\n  \"name\": \"app\",\n  \"dependencies\": {{\n{}\n  }}\n}}\n",
        deps.join(",\n")
    )
}

// =============================================================================
// Manifest Benchmarks
// =============================================================================

fn bench_manifest_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest/parse");

    for entry_count in [10, 100, 1000] {
        let yaml = generate_pnpm_workspace(entry_count);
        group.bench_with_input(BenchmarkId::new("yaml", entry_count), &yaml, |b, content| {
            b.iter(|| parse_manifest(black_box(content), ManifestFormat::Yaml));
        });

        let json = generate_bun_manifest(entry_count);
        group.bench_with_input(BenchmarkId::new("json", entry_count), &json, |b, content| {
            b.iter(|| parse_manifest(black_box(content), ManifestFormat::Json));
        });
    }

    group.finish();
}

fn bench_position_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest/positions");

    for entry_count in [10, 100, 1000] {
        let yaml = generate_pnpm_workspace(entry_count);
        group.bench_with_input(BenchmarkId::new("yaml", entry_count), &yaml, |b, content| {
            b.iter(|| recover_positions(black_box(content), ManifestFormat::Yaml));
        });

        let json = generate_bun_manifest(entry_count);
        group.bench_with_input(BenchmarkId::new("json", entry_count), &json, |b, content| {
            b.iter(|| recover_positions(black_box(content), ManifestFormat::Json));
        });
    }

    group.finish();
}

// =============================================================================
// Consumer Scanner Benchmarks
// =============================================================================

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for dep_count in [10, 50, 100] {
        let content = generate_package_json(dep_count);
        group.bench_with_input(
            BenchmarkId::new("package_json", dep_count),
            &content,
            |b, content| {
                b.iter(|| scan_catalog_references(black_box(content)));
            },
        );
    }

    group.finish();
}

// =============================================================================
// Resolver Benchmarks
// =============================================================================

fn bench_cached_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver/cached");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let temp = tempfile::TempDir::new().unwrap();
    let root = temp.path().to_path_buf();
    fs::write(root.join("pnpm-workspace.yaml"), generate_pnpm_workspace(1000)).unwrap();
    let consumer = root.join("packages/app/package.json");
    fs::create_dir_all(consumer.parent().unwrap()).unwrap();
    fs::write(&consumer, generate_package_json(100)).unwrap();

    let resolver = CatalogResolver::new(ManifestLocator::with_roots([root]));
    let (name, _) = package(500);

    // Warm the caches
    runtime.block_on(resolver.resolve(&FsManifestSource, &consumer, &name, "default"));

    group.bench_function("resolve_version", |b| {
        b.iter(|| {
            runtime.block_on(resolver.resolve_version(
                &FsManifestSource,
                black_box(&consumer),
                black_box(&name),
                "default",
            ))
        });
    });

    group.bench_function("resolve_with_definition", |b| {
        b.iter(|| {
            runtime.block_on(resolver.resolve(
                &FsManifestSource,
                black_box(&consumer),
                black_box(&name),
                "default",
            ))
        });
    });

    group.finish();
}

// =============================================================================
// Cache Benchmarks
// =============================================================================

fn create_package_info() -> PackageInfo {
    PackageInfo {
        description: Some("A JavaScript library for building user interfaces".to_string()),
        version: "18.2.0".to_string(),
        time: None,
        homepage: Some("https://react.dev/".to_string()),
    }
}

fn bench_memory_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/memory");

    for entry_count in [100, 1000, 10000] {
        let cache = MemoryCache::new();

        // Pre-populate cache
        for i in 0..entry_count {
            cache.insert(format!("package_{i}"), create_package_info());
        }

        group.bench_with_input(
            BenchmarkId::new("get_hit", entry_count),
            &cache,
            |b, cache| {
                b.iter(|| {
                    black_box(cache.get("package_50"));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("get_miss", entry_count),
            &cache,
            |b, cache| {
                b.iter(|| {
                    black_box(cache.get("nonexistent_package"));
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_manifest_parse,
    bench_position_recovery,
    bench_scanner,
    bench_cached_resolution,
    bench_memory_cache,
);

criterion_main!(benches);
