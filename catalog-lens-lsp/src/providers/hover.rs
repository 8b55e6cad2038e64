//! Hover content for catalog references and workspace manifest entries

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range, Url};

use crate::parsers::CatalogReference;
use crate::registries::PackageInfo;
use crate::utils::format_release_age;
use crate::workspace::{CatalogPositionData, Definition, Resolution, Span};

use super::definition::span_to_range;

/// Hover for a `catalog:` reference in a consumer file.
///
/// The range covers the whole `"name": "catalog:..."` pair.
pub fn catalog_hover(reference: &CatalogReference, resolution: &Resolution) -> Hover {
    let version = match resolution.definition.as_ref().and_then(definition_link) {
        Some(link) => format!("[{}]({link})", resolution.version),
        None => format!("`{}`", resolution.version),
    };

    let value = format!(
        "- {} Catalog: `{}`\n- Version: {version}",
        resolution.package_manager.display_name(),
        resolution.catalog
    );

    markdown_hover(
        value,
        Range {
            start: Position {
                line: reference.line,
                character: reference.name_start.saturating_sub(1),
            },
            end: Position {
                line: reference.line,
                character: reference.value_end + 1,
            },
        },
    )
}

/// `file://` link to the line a version is declared on
fn definition_link(definition: &Definition) -> Option<String> {
    let uri = Url::from_file_path(&definition.manifest_path).ok()?;
    Some(format!("{uri}#L{}", definition.span.start_line))
}

/// Hover with package metadata for an entry of a workspace manifest
pub fn package_info_hover(info: &PackageInfo, span: &Span) -> Hover {
    let mut parts = Vec::new();

    if let Some(description) = &info.description {
        parts.push(description.clone());
    }

    match info.time {
        Some(time) => parts.push(format!(
            "Latest version: {} published {}",
            info.version,
            format_release_age(time)
        )),
        None => parts.push(format!("Latest version: {}", info.version)),
    }

    if let Some(homepage) = &info.homepage {
        parts.push(homepage.clone());
    }

    markdown_hover(parts.join("\n\n"), span_to_range(span))
}

/// Catalog entry whose version is declared on a 0-based line
pub fn entry_at_line(positions: &CatalogPositionData, line: u32) -> Option<(String, Span)> {
    positions
        .entries()
        .find(|(_, _, span)| span.contains_line(line))
        .map(|(_, package, span)| (package.to_string(), *span))
}

fn markdown_hover(value: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(range),
    }
}
