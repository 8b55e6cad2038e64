//! Source position recovery for catalog versions
//!
//! The data parser in [`manifest`](super::manifest) drops locations, so this
//! module parses the same text a second time with location-preserving
//! parsers:
//!
//! - YAML manifests go through a `tree-sitter-yaml` syntax tree. The line of
//!   each version comes from the tree; the column is re-derived by searching
//!   the unquoted value inside that line, because quoting and escapes shift
//!   the raw node boundaries.
//! - JSON manifests are deserialized with `json-spanned-value`, which keeps
//!   the byte range of every value.
//!
//! Both entry points share the key structure of
//! [`CatalogData`](super::CatalogData): same catalogs, same packages, same
//! root-over-`workspaces` priority.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use json_spanned_value::Spanned;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use tree_sitter::Node;

use super::manifest::{ManifestError, json_version};
use super::{CatalogPositionData, ManifestFormat, Span};
use crate::utils::{offset_to_line_column, utf16_column, utf16_len};

/// Recover version spans, absorbing failures.
///
/// Position data only enables navigation, so any failure is logged and
/// degrades to empty data.
pub fn recover_positions(text: &str, format: ManifestFormat) -> CatalogPositionData {
    match try_recover_positions(text, format) {
        Ok(positions) => positions,
        Err(e) => {
            tracing::error!("Failed to recover catalog positions ({format:?}): {e}");
            CatalogPositionData::default()
        }
    }
}

/// Recover version spans.
pub fn try_recover_positions(
    text: &str,
    format: ManifestFormat,
) -> Result<CatalogPositionData, ManifestError> {
    match format {
        ManifestFormat::Yaml => recover_yaml(text),
        ManifestFormat::Json => recover_json(text),
    }
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

fn recover_yaml(text: &str) -> Result<CatalogPositionData, ManifestError> {
    let mut parser = tree_sitter::Parser::new();
    let language = tree_sitter_yaml::LANGUAGE;
    parser
        .set_language(&language.into())
        .map_err(|e| ManifestError::Syntax(e.to_string()))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ManifestError::Syntax("YAML parser returned no tree".to_string()))?;

    let source = YamlSource::new(text);
    let mut positions = CatalogPositionData::default();

    let Some(root) = find_mapping(tree.root_node()) else {
        return Ok(positions);
    };

    for pair in mapping_pairs(root) {
        let Some(key) = source.pair_key(pair) else {
            continue;
        };
        let Some(mapping) = pair.child_by_field_name("value").and_then(find_mapping) else {
            continue;
        };

        match key.as_str() {
            "catalog" => positions.default = Some(source.catalog_spans(mapping)),
            "catalogs" => {
                for named in mapping_pairs(mapping) {
                    let Some(name) = source.pair_key(named) else {
                        continue;
                    };
                    if let Some(catalog) = named.child_by_field_name("value").and_then(find_mapping) {
                        positions.named.insert(name, source.catalog_spans(catalog));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(positions)
}

/// Descend through wrapper nodes to the first mapping.
fn find_mapping(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "block_mapping" | "flow_mapping" => Some(node),
        "stream" | "document" | "block_node" | "flow_node" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            children.into_iter().find_map(find_mapping)
        }
        _ => None,
    }
}

fn mapping_pairs(mapping: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = mapping.walk();
    mapping
        .named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "block_mapping_pair" | "flow_pair"))
        .collect()
}

/// A scalar node with its decoded value.
struct Scalar<'tree> {
    node: Node<'tree>,
    value: String,
    quoted: bool,
}

struct YamlSource<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
}

impl<'a> YamlSource<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        Self { text, lines }
    }

    fn node_text(&self, node: Node<'_>) -> &'a str {
        self.text.get(node.byte_range()).unwrap_or("")
    }

    fn pair_key(&self, pair: Node<'_>) -> Option<String> {
        let key = pair.child_by_field_name("key")?;
        self.scalar(key).map(|scalar| scalar.value)
    }

    fn scalar<'tree>(&self, node: Node<'tree>) -> Option<Scalar<'tree>> {
        match node.kind() {
            "flow_node" | "block_node" => {
                let mut cursor = node.walk();
                let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
                children.into_iter().find_map(|child| self.scalar(child))
            }
            "plain_scalar" => {
                let kind = node.named_child(0).map(|child| child.kind());
                if matches!(kind, Some("boolean_scalar" | "null_scalar")) {
                    return None;
                }
                Some(Scalar {
                    node,
                    value: self.node_text(node).trim().to_string(),
                    quoted: false,
                })
            }
            "string_scalar" | "integer_scalar" | "float_scalar" => Some(Scalar {
                node,
                value: self.node_text(node).trim().to_string(),
                quoted: false,
            }),
            "double_quote_scalar" => Some(Scalar {
                node,
                value: unquote_double(self.node_text(node)),
                quoted: true,
            }),
            "single_quote_scalar" => Some(Scalar {
                node,
                value: unquote_single(self.node_text(node)),
                quoted: true,
            }),
            _ => None,
        }
    }

    fn catalog_spans(&self, mapping: Node<'_>) -> BTreeMap<String, Span> {
        let mut spans = BTreeMap::new();
        for pair in mapping_pairs(mapping) {
            let Some(name) = self.pair_key(pair) else {
                continue;
            };
            let Some(value) = pair
                .child_by_field_name("value")
                .and_then(|node| self.scalar(node))
            else {
                continue;
            };
            spans.insert(name, self.value_span(&value));
        }
        spans
    }

    /// Span of a version value, corrected by searching it in its line.
    fn value_span(&self, scalar: &Scalar<'_>) -> Span {
        let start = scalar.node.start_position();
        let line = self.lines.get(start.row).copied().unwrap_or("");

        let found = if scalar.value.is_empty() {
            None
        } else {
            line.get(start.column..)
                .and_then(|rest| rest.find(&scalar.value))
                .map(|idx| idx + start.column)
                .or_else(|| line.find(&scalar.value))
        };

        match found {
            Some(byte_col) => {
                let column = utf16_column(line, byte_col);
                Span {
                    start_line: start.row as u32 + 1,
                    start_column: column,
                    end_line: start.row as u32 + 1,
                    end_column: column + utf16_len(&scalar.value),
                }
            }
            None => self.raw_span(scalar),
        }
    }

    /// Span reported by the parser, without quotes.
    fn raw_span(&self, scalar: &Scalar<'_>) -> Span {
        let start = scalar.node.start_position();
        let end = scalar.node.end_position();
        let quote = usize::from(scalar.quoted);

        let start_line = self.lines.get(start.row).copied().unwrap_or("");
        let end_line = self.lines.get(end.row).copied().unwrap_or("");
        let start_col = start.column + quote;
        let end_col = end.column.saturating_sub(quote).max(start_col.min(end.column));

        Span {
            start_line: start.row as u32 + 1,
            start_column: utf16_column(start_line, start_col),
            end_line: end.row as u32 + 1,
            end_column: utf16_column(end_line, end_col),
        }
    }
}

fn unquote_double(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }
    value
}

fn unquote_single(raw: &str) -> String {
    raw.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw)
        .replace("''", "'")
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

type SpannedCatalog = BTreeMap<String, Spanned<serde_json::Value>>;

fn recover_json(text: &str) -> Result<CatalogPositionData, ManifestError> {
    let manifest: Placement =
        json_spanned_value::from_str(text).map_err(|e| ManifestError::Syntax(e.to_string()))?;

    let root = placement_spans(text, &manifest);
    if !root.is_empty() {
        return Ok(root);
    }

    Ok(manifest
        .workspaces
        .as_deref()
        .map(|legacy| placement_spans(text, legacy))
        .unwrap_or_default())
}

fn placement_spans(text: &str, placement: &Placement) -> CatalogPositionData {
    CatalogPositionData {
        default: placement
            .catalog
            .as_ref()
            .map(|catalog| catalog_spans(text, catalog)),
        named: placement
            .catalogs
            .iter()
            .map(|(name, catalog)| (name.clone(), catalog_spans(text, catalog)))
            .collect(),
    }
}

fn catalog_spans(text: &str, catalog: &SpannedCatalog) -> BTreeMap<String, Span> {
    catalog
        .iter()
        .filter(|(_, value)| json_version(value.get_ref()).is_some())
        .filter_map(|(name, value)| Some((name.clone(), json_value_span(text, value.span())?)))
        .collect()
}

/// Convert a value byte range to a span, trimming whitespace and quotes.
fn json_value_span(text: &str, (start, end): (usize, usize)) -> Option<Span> {
    let raw = text.get(start..end)?;
    let trimmed = raw.trim();
    let mut from = start + (raw.len() - raw.trim_start().len());
    let mut to = from + trimmed.len();

    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        from += 1;
        to -= 1;
    }

    let (start_line, start_column) = offset_to_line_column(text, from);
    let (end_line, end_column) = offset_to_line_column(text, to);
    Some(Span {
        start_line: start_line + 1,
        start_column,
        end_line: end_line + 1,
        end_column,
    })
}

/// Catalog placement inside a JSON object: either the document root or the
/// legacy `workspaces` object.
#[derive(Default)]
struct Placement {
    catalog: Option<SpannedCatalog>,
    catalogs: BTreeMap<String, SpannedCatalog>,
    workspaces: Option<Box<Placement>>,
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PlacementVisitor)
    }
}

struct PlacementVisitor;

impl<'de> Visitor<'de> for PlacementVisitor {
    type Value = Placement;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Placement, A::Error> {
        let mut placement = Placement::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "catalog" => {
                    placement.catalog = map.next_value::<LenientObject<Spanned<serde_json::Value>>>()?.0;
                }
                "catalogs" => {
                    let catalogs = map
                        .next_value::<LenientObject<LenientObject<Spanned<serde_json::Value>>>>()?
                        .0
                        .unwrap_or_default();
                    placement.catalogs = catalogs
                        .into_iter()
                        .filter_map(|(name, catalog)| Some((name, catalog.0?)))
                        .collect();
                }
                "workspaces" => {
                    placement.workspaces = Some(Box::new(map.next_value::<Placement>()?));
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(placement)
    }

    // `workspaces` is commonly a plain array of globs
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Placement, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Placement::default())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Placement, E> {
        Ok(Placement::default())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Placement, E> {
        Ok(Placement::default())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Placement, E> {
        Ok(Placement::default())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Placement, E> {
        Ok(Placement::default())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Placement, E> {
        Ok(Placement::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Placement, E> {
        Ok(Placement::default())
    }
}

/// A JSON object whose other shapes (arrays, scalars, null) read as absent.
struct LenientObject<T>(Option<BTreeMap<String, T>>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for LenientObject<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientObjectVisitor(PhantomData))
    }
}

struct LenientObjectVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for LenientObjectVisitor<T> {
    type Value = LenientObject<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value::<T>()?;
            entries.insert(key, value);
        }
        Ok(LenientObject(Some(entries)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LenientObject(None))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(LenientObject(None))
    }
}
