//! Catalog Lens LSP - Language Server for workspace catalogs
//!
//! Resolves `catalog:` version references in `package.json` files against
//! the catalogs declared in `pnpm-workspace.yaml`, `.yarnrc.yml` or a Bun
//! root `package.json`, and serves the results as inlay hints, hovers and
//! definitions.

pub mod backend;
pub mod cache;
pub mod config;
pub mod document;
pub mod file_types;
pub mod parsers;
pub mod providers;
pub mod registries;
pub mod utils;
pub mod workspace;
