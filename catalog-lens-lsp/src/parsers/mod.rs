//! Parsers for consumer files (package.json)

use serde::{Deserialize, Serialize};

use crate::workspace::DEFAULT_CATALOG;

/// A `"pkg": "catalog:<name>"` entry found in a consumer file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogReference {
    /// Package name
    pub name: String,
    /// Catalog name ("default" for a bare `catalog:`)
    pub catalog: String,
    /// Line number in the file (0-indexed)
    pub line: u32,
    /// Column where the package name starts
    pub name_start: u32,
    /// Column where the package name ends
    pub name_end: u32,
    /// Column where the `catalog:` value starts (inside the quotes)
    pub value_start: u32,
    /// Column where the `catalog:` value ends
    pub value_end: u32,
}

impl CatalogReference {
    pub fn is_default_catalog(&self) -> bool {
        self.catalog == DEFAULT_CATALOG
    }

    /// Whether an LSP position falls on the package name or the value.
    pub fn contains(&self, line: u32, character: u32) -> bool {
        self.line == line
            && ((character >= self.name_start && character <= self.name_end)
                || (character >= self.value_start && character <= self.value_end))
    }
}

/// Trait for parsing consumer files
pub trait Parser: Send + Sync {
    /// Parse the given file content and extract catalog references
    fn parse(&self, content: &str) -> Vec<CatalogReference>;
}

pub mod npm;

/// Scan a `package.json` for catalog references.
pub fn scan_catalog_references(content: &str) -> Vec<CatalogReference> {
    npm::NpmParser::new().parse(content)
}
