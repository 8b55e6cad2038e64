//! Catalog reference scanner for package.json files
//!
//! The scan is line oriented so that it keeps working while the file is
//! half typed and not valid JSON.

use super::{CatalogReference, Parser};
use crate::utils::utf16_column;
use crate::workspace::{CATALOG_PREFIX, DEFAULT_CATALOG};

/// Parser for npm package.json consumer files
#[derive(Debug, Default)]
pub struct NpmParser;

impl NpmParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for NpmParser {
    fn parse(&self, content: &str) -> Vec<CatalogReference> {
        let mut references = Vec::new();
        for (line_idx, line) in content.lines().enumerate() {
            parse_line(line, line_idx as u32, &mut references);
        }
        references
    }
}

/// Collect every `"key": "catalog:..."` pair of a single line
/// e.g. `"react": "catalog:", "vue": "catalog:vue3"}`
fn parse_line(line: &str, line_num: u32, references: &mut Vec<CatalogReference>) {
    let mut pos = 0;

    while let Some((name_start, name_end)) = next_string(line, pos) {
        let after_name = name_end + 1;
        let rest = &line[after_name..];
        let trimmed = rest.trim_start();
        if !trimmed.starts_with(':') {
            pos = after_name;
            continue;
        }

        let after_colon = after_name + (rest.len() - trimmed.len()) + 1;
        let value_rest = &line[after_colon..];
        let value_quote = after_colon + (value_rest.len() - value_rest.trim_start().len());

        // Objects, arrays and non-string values are not references
        if !line[value_quote..].starts_with('"') {
            pos = value_quote;
            continue;
        }

        let Some((value_start, value_end)) = next_string(line, value_quote) else {
            break;
        };
        pos = value_end + 1;

        let name = &line[name_start..name_end];
        let value = &line[value_start..value_end];
        let Some(catalog) = value.strip_prefix(CATALOG_PREFIX) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let catalog = match catalog.trim() {
            "" => DEFAULT_CATALOG,
            named => named,
        };

        references.push(CatalogReference {
            name: name.to_string(),
            catalog: catalog.to_string(),
            line: line_num,
            name_start: utf16_column(line, name_start),
            name_end: utf16_column(line, name_end),
            value_start: utf16_column(line, value_start),
            value_end: utf16_column(line, value_end),
        });
    }
}

/// Byte range of the contents of the next complete string literal at or
/// after `from`, skipping escaped quotes.
fn next_string(line: &str, from: usize) -> Option<(usize, usize)> {
    let open = from + line.get(from..)?.find('"')?;
    let start = open + 1;

    let mut escaped = false;
    for (idx, ch) in line[start..].char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some((start, start + idx)),
            _ => {}
        }
    }
    None
}
