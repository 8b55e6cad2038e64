//! Regression tests for malformed input
//!
//! Broken manifests and consumer files must never panic, and every span or
//! column handed to the editor must stay inside the text.

use catalog_lens_lsp::parsers::{CatalogReference, scan_catalog_references};
use catalog_lens_lsp::utils::utf16_len;
use catalog_lens_lsp::workspace::{ManifestFormat, parse_manifest, recover_positions};
use std::panic::AssertUnwindSafe;

fn validate_references(references: &[CatalogReference], content: &str) {
    let lines: Vec<&str> = content.split('\n').collect();
    for reference in references {
        assert!(
            (reference.line as usize) < lines.len(),
            "line {} >= lines.len() {}",
            reference.line,
            lines.len()
        );

        let line_len = utf16_len(lines[reference.line as usize]);
        assert!(
            reference.name_start <= reference.name_end,
            "name_start {} > name_end {}",
            reference.name_start,
            reference.name_end
        );
        assert!(
            reference.value_start <= reference.value_end,
            "value_start {} > value_end {}",
            reference.value_start,
            reference.value_end
        );
        assert!(
            reference.value_end <= line_len,
            "value_end {} > line_len {} for {}",
            reference.value_end,
            line_len,
            reference.name
        );
    }
}

fn validate_manifest(content: &str, format: ManifestFormat) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        (
            parse_manifest(content, format),
            recover_positions(content, format),
        )
    }));
    let Ok((_, positions)) = result else {
        panic!("manifest handling panicked on {content:?}");
    };

    let lines: Vec<&str> = content.split('\n').collect();
    for (catalog, package, span) in positions.entries() {
        assert!(span.start_line >= 1, "{catalog}/{package}: line 0");
        assert!(span.start_line <= span.end_line);
        assert!(
            (span.end_line as usize) <= lines.len(),
            "{catalog}/{package}: line {} beyond {} lines",
            span.end_line,
            lines.len()
        );
        let end_line_len = utf16_len(lines[span.end_line as usize - 1]);
        assert!(
            span.end_column <= end_line_len,
            "{catalog}/{package}: end column {} > line length {}",
            span.end_column,
            end_line_len
        );
        if span.start_line == span.end_line {
            assert!(span.start_column <= span.end_column);
        }
    }
}

#[test]
fn test_consumer_unterminated_strings() {
    let content = "{\n  \"dependencies\": {\n    \"react\": \"catalog:\n    \"vue\": \"catalog:default\n";
    let result = std::panic::catch_unwind(|| scan_catalog_references(content));
    assert!(result.is_ok());
    validate_references(&result.unwrap(), content);
}

#[test]
fn test_consumer_escapes_and_multibyte() {
    let content = "{\"a\\\"b\": \"catalog:x\\\"y\", \"😀\": \"catalog:\", \"é\": \"catalog:ñ\"}";
    let references = scan_catalog_references(content);
    validate_references(&references, content);
    assert!(references.iter().any(|r| r.name == "😀"));
}

#[test]
fn test_consumer_garbage() {
    for content in [
        "",
        "\"",
        "\":\"catalog:",
        "\"\":\"catalog:\"",
        "\"a\"::\"catalog:\"",
        "\"a\" \"catalog:\"",
        "{{{{\"catalog:\":\"catalog:\"}}}}",
        "\r\n\"x\": \"catalog:\"\r\n",
    ] {
        let result = std::panic::catch_unwind(|| scan_catalog_references(content));
        let Ok(references) = result else {
            panic!("scanner panicked on {content:?}");
        };
        validate_references(&references, content);
    }
}

#[test]
fn test_yaml_manifest_garbage() {
    for content in [
        "",
        "catalog",
        "catalog:",
        "catalog: 1",
        "catalog:\n  - a\n  - b",
        "catalog:\n  react: [1, 2]\n",
        "catalog:\n  react: \"unterminated\n",
        "catalog:\n  react: 'it''s'\n",
        "catalog:\n\treact: 1.0.0\n",
        "catalogs:\n  default:\n  named:\n    a: ~\n",
        "catalog: {react: ^18.2.0, vue: \"3.4.0\"}",
        "catalog:\n  \"é😀\": \"😀1.0.0\"\n",
        "---\ncatalog:\n  a: 1\n---\ncatalog:\n  b: 2\n",
        "catalog: &anchor\n  a: 1\ncatalogs:\n  x: *anchor\n",
        ":\n:\n:",
    ] {
        validate_manifest(content, ManifestFormat::Yaml);
    }
}

#[test]
fn test_json_manifest_garbage() {
    for content in [
        "",
        "{",
        "[]",
        "null",
        "{\"catalog\": []}",
        "{\"catalog\": {\"a\": 1}}",
        "{\"catalog\": {\"a\": {\"nested\": \"1.0.0\"}}}",
        "{\"workspaces\": [\"packages/*\"]}",
        "{\"workspaces\": {\"catalogs\": {\"x\": {\"a\": \"😀\"}}}}",
        "{\"catalog\": {\"a\": \"1.0.0\",}}",
        "{\"catalog\": {\"a\": \"\\u00e9\"}}",
    ] {
        validate_manifest(content, ManifestFormat::Json);
    }
}
