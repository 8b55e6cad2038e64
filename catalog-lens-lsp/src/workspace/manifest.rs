//! Catalog data parser for workspace manifests
//!
//! This is the fast path: it only extracts versions and drops all source
//! locations. Positions are recovered separately by
//! [`positions`](super::positions).

use std::collections::BTreeMap;

use super::positions::recover_positions;
use super::{CatalogData, ManifestFormat, Span};
use crate::utils::byte_index;

/// Errors raised while reading a workspace manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("syntax tree unavailable: {0}")]
    Syntax(String),
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a manifest into catalog data, absorbing failures.
///
/// Malformed input is logged and yields empty data so that resolution simply
/// finds nothing.
pub fn parse_manifest(text: &str, format: ManifestFormat) -> CatalogData {
    match try_parse_manifest(text, format) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Failed to parse workspace manifest ({format:?}): {e}");
            CatalogData::default()
        }
    }
}

/// Parse a manifest into catalog data.
pub fn try_parse_manifest(text: &str, format: ManifestFormat) -> Result<CatalogData, ManifestError> {
    match format {
        ManifestFormat::Yaml => parse_yaml(text),
        ManifestFormat::Json => parse_json(text),
    }
}

/// Catalog entry holding a plain number: (`None` for the top-level
/// `catalog` or the `catalogs` name, package name).
type NumericEntry = (Option<String>, String);

fn parse_yaml(text: &str) -> Result<CatalogData, ManifestError> {
    if text.trim().is_empty() {
        return Ok(CatalogData::default());
    }

    let document: serde_yaml::Value = serde_yaml::from_str(text)?;
    let Some(root) = document.as_mapping() else {
        return Ok(CatalogData::default());
    };

    let mut numeric = Vec::new();
    let default = root
        .get("catalog")
        .and_then(serde_yaml::Value::as_mapping)
        .map(|catalog| yaml_catalog(catalog, None, &mut numeric));

    let mut named = BTreeMap::new();
    if let Some(catalogs) = root.get("catalogs").and_then(serde_yaml::Value::as_mapping) {
        for (name, catalog) in catalogs {
            let (Some(name), Some(catalog)) = (yaml_scalar(name), catalog.as_mapping()) else {
                continue;
            };
            let entries = yaml_catalog(catalog, Some(name.as_str()), &mut numeric);
            named.insert(name, entries);
        }
    }

    let mut data = CatalogData { default, named };
    restore_numeric_versions(text, ManifestFormat::Yaml, &mut data, &numeric);
    Ok(data)
}

fn yaml_catalog(
    mapping: &serde_yaml::Mapping,
    catalog: Option<&str>,
    numeric: &mut Vec<NumericEntry>,
) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for (name, version) in mapping {
        let (Some(name), Some(rendered)) = (yaml_scalar(name), yaml_scalar(version)) else {
            continue;
        };
        if version.is_number() {
            numeric.push((catalog.map(str::to_string), name.clone()));
        }
        entries.insert(name, rendered);
    }
    entries
}

/// Strings and numbers are accepted as keys and versions.
fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_json(text: &str) -> Result<CatalogData, ManifestError> {
    let document: serde_json::Value = serde_json::from_str(text)?;

    // Root-level placement wins; `workspaces.catalog(s)` is the legacy
    // location and is only consulted when the root holds nothing.
    let mut numeric = Vec::new();
    let mut data = json_catalogs(&document, &mut numeric);
    if data.is_empty() {
        numeric.clear();
        data = document
            .get("workspaces")
            .map(|legacy| json_catalogs(legacy, &mut numeric))
            .unwrap_or_default();
    }

    restore_numeric_versions(text, ManifestFormat::Json, &mut data, &numeric);
    Ok(data)
}

fn json_catalogs(value: &serde_json::Value, numeric: &mut Vec<NumericEntry>) -> CatalogData {
    let Some(object) = value.as_object() else {
        return CatalogData::default();
    };

    let default = object
        .get("catalog")
        .and_then(serde_json::Value::as_object)
        .map(|catalog| json_catalog(catalog, None, numeric));

    let mut named = BTreeMap::new();
    if let Some(catalogs) = object.get("catalogs").and_then(serde_json::Value::as_object) {
        for (name, catalog) in catalogs {
            if let Some(catalog) = catalog.as_object() {
                named.insert(name.clone(), json_catalog(catalog, Some(name.as_str()), numeric));
            }
        }
    }

    CatalogData { default, named }
}

fn json_catalog(
    object: &serde_json::Map<String, serde_json::Value>,
    catalog: Option<&str>,
    numeric: &mut Vec<NumericEntry>,
) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for (name, version) in object {
        let Some(rendered) = json_version(version) else {
            continue;
        };
        if version.is_number() {
            numeric.push((catalog.map(str::to_string), name.clone()));
        }
        entries.insert(name.clone(), rendered);
    }
    entries
}

/// Replace re-rendered numbers (`5.10` reads back as `5.1`) with the text
/// they were written as, located through the position pass.
fn restore_numeric_versions(
    text: &str,
    format: ManifestFormat,
    data: &mut CatalogData,
    numeric: &[NumericEntry],
) {
    if numeric.is_empty() {
        return;
    }

    let positions = recover_positions(text, format);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    for (catalog, package) in numeric {
        let span = match catalog {
            None => positions.default.as_ref(),
            Some(name) => positions.named.get(name),
        }
        .and_then(|spans| spans.get(package));
        let Some(raw) = span.and_then(|span| span_text(&lines, span)) else {
            continue;
        };

        let entries = match catalog {
            None => data.default.as_mut(),
            Some(name) => data.named.get_mut(name),
        };
        if let Some(version) = entries.and_then(|entries| entries.get_mut(package)) {
            *version = raw.to_string();
        }
    }
}

/// Source text of a single-line span.
fn span_text<'a>(lines: &[&'a str], span: &Span) -> Option<&'a str> {
    if span.start_line != span.end_line {
        return None;
    }
    let line = lines.get((span.start_line as usize).checked_sub(1)?)?;
    let start = byte_index(line, span.start_column)?;
    let end = byte_index(line, span.end_column)?;
    line.get(start..end).filter(|raw| !raw.is_empty())
}

pub(crate) fn json_version(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version<'a>(data: &'a CatalogData, catalog: &str, package: &str) -> Option<&'a str> {
        data.get(catalog, package).map(String::as_str)
    }

    #[test]
    fn test_pnpm_default_catalog() {
        let content = r#"packages:
  - packages/*
catalog:
  react: ^18.2.0
  lodash: "4.17.21"
  '@types/node': '20.11.0'
"#;
        let data = parse_manifest(content, ManifestFormat::Yaml);
        assert_eq!(version(&data, "default", "react"), Some("^18.2.0"));
        assert_eq!(version(&data, "default", "lodash"), Some("4.17.21"));
        assert_eq!(version(&data, "default", "@types/node"), Some("20.11.0"));
        assert!(data.named.is_empty());
    }

    #[test]
    fn test_pnpm_named_catalogs() {
        let content = r#"catalogs:
  react17:
    react: ^17.0.2
    react-dom: ^17.0.2
  react18:
    react: ^18.2.0
"#;
        let data = parse_manifest(content, ManifestFormat::Yaml);
        assert!(data.default.is_none());
        assert_eq!(version(&data, "react17", "react-dom"), Some("^17.0.2"));
        assert_eq!(version(&data, "react18", "react"), Some("^18.2.0"));
        assert_eq!(version(&data, "react19", "react"), None);
    }

    #[test]
    fn test_yaml_numbers_and_odd_values() {
        let content = r#"catalog:
  numeric: 5
  empty:
  list: [1, 2]
"#;
        let data = parse_manifest(content, ManifestFormat::Yaml);
        assert_eq!(version(&data, "default", "numeric"), Some("5"));
        assert_eq!(version(&data, "default", "empty"), None);
        assert_eq!(version(&data, "default", "list"), None);
    }

    #[test]
    fn test_yaml_numeric_versions_keep_source_text() {
        let content = "catalog:\n  ts: 5.10\n  big: 1e3\n  hex: 0x1A\ncatalogs:\n  next:\n    ts: 5.20\n";
        let data = parse_manifest(content, ManifestFormat::Yaml);
        assert_eq!(version(&data, "default", "ts"), Some("5.10"));
        assert_eq!(version(&data, "default", "big"), Some("1e3"));
        assert_eq!(version(&data, "default", "hex"), Some("0x1A"));
        assert_eq!(version(&data, "next", "ts"), Some("5.20"));

        let positions = recover_positions(content, ManifestFormat::Yaml);
        let lines: Vec<&str> = content.split('\n').collect();
        for (catalog, package, version) in data.entries() {
            let span = positions.get(catalog, package).unwrap();
            assert_eq!(span_text(&lines, span), Some(version.as_str()));
        }
    }

    #[test]
    fn test_json_numeric_versions_keep_source_text() {
        let content = r#"{"catalog": {"ts": 5.10, "big": 1e3, "int": 5}}"#;
        let data = parse_manifest(content, ManifestFormat::Json);
        assert_eq!(version(&data, "default", "ts"), Some("5.10"));
        assert_eq!(version(&data, "default", "big"), Some("1e3"));
        assert_eq!(version(&data, "default", "int"), Some("5"));
    }

    #[test]
    fn test_yaml_flow_mapping() {
        let content = "catalog: { react: ^18.2.0, vue: '3.4.0' }\n";
        let data = parse_manifest(content, ManifestFormat::Yaml);
        assert_eq!(version(&data, "default", "vue"), Some("3.4.0"));
    }

    #[test]
    fn test_yaml_without_catalogs() {
        let data = parse_manifest("packages:\n  - apps/*\n", ManifestFormat::Yaml);
        assert!(data.is_empty());
        assert!(parse_manifest("", ManifestFormat::Yaml).is_empty());
        assert!(parse_manifest("- just\n- a list\n", ManifestFormat::Yaml).is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_absorbed() {
        let content = "catalog:\n  react: [unterminated\n";
        assert!(try_parse_manifest(content, ManifestFormat::Yaml).is_err());
        assert!(parse_manifest(content, ManifestFormat::Yaml).is_empty());
    }

    #[test]
    fn test_bun_root_catalogs() {
        let content = r#"{
  "name": "monorepo",
  "workspaces": ["packages/*"],
  "catalog": { "react": "^19.0.0" },
  "catalogs": { "testing": { "jest": "30.0.0" } }
}"#;
        let data = parse_manifest(content, ManifestFormat::Json);
        assert_eq!(version(&data, "default", "react"), Some("^19.0.0"));
        assert_eq!(version(&data, "testing", "jest"), Some("30.0.0"));
    }

    #[test]
    fn test_bun_legacy_workspaces_placement() {
        let content = r#"{
  "workspaces": {
    "packages": ["packages/*"],
    "catalog": { "react": "^19.0.0" },
    "catalogs": { "testing": { "jest": "30.0.0" } }
  }
}"#;
        let data = parse_manifest(content, ManifestFormat::Json);
        assert_eq!(version(&data, "default", "react"), Some("^19.0.0"));
        assert_eq!(version(&data, "testing", "jest"), Some("30.0.0"));
    }

    #[test]
    fn test_bun_root_wins_over_legacy() {
        let content = r#"{"catalog": {"a": "1.0.0"}, "workspaces": {"catalog": {"a": "2.0.0", "b": "3.0.0"}}}"#;
        let data = parse_manifest(content, ManifestFormat::Json);
        assert_eq!(version(&data, "default", "a"), Some("1.0.0"));
        // never merged
        assert_eq!(version(&data, "default", "b"), None);
    }

    #[test]
    fn test_malformed_json_is_absorbed() {
        let content = r#"{"catalog": {"a": "1.0.0""#;
        assert!(matches!(
            try_parse_manifest(content, ManifestFormat::Json),
            Err(ManifestError::Json(_))
        ));
        assert!(parse_manifest(content, ManifestFormat::Json).is_empty());
    }
}
