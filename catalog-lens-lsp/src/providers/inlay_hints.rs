//! Inlay hints provider for catalog versions

use tower_lsp::lsp_types::{
    InlayHint, InlayHintKind, InlayHintLabel, InlayHintTooltip, Position, Range,
};

use crate::parsers::CatalogReference;
use crate::workspace::Resolution;

/// Generate an inlay hint showing the resolved version after a reference
pub fn create_inlay_hint(
    reference: &CatalogReference,
    resolution: &Resolution,
    named_catalogs_label: bool,
) -> InlayHint {
    InlayHint {
        position: Position {
            line: reference.line,
            // after the closing quote
            character: reference.value_end + 1,
        },
        label: InlayHintLabel::String(hint_label(reference, resolution, named_catalogs_label)),
        kind: Some(InlayHintKind::PARAMETER),
        text_edits: None,
        tooltip: Some(InlayHintTooltip::String(format!(
            "{} catalog `{}`",
            resolution.package_manager.display_name(),
            resolution.catalog
        ))),
        padding_left: Some(true),
        padding_right: None,
        data: None,
    }
}

fn hint_label(
    reference: &CatalogReference,
    resolution: &Resolution,
    named_catalogs_label: bool,
) -> String {
    if named_catalogs_label && !reference.is_default_catalog() {
        format!("{} ({})", resolution.version, reference.catalog)
    } else {
        resolution.version.clone()
    }
}

/// Whether a reference lies in the range requested by the client
pub fn is_in_range(reference: &CatalogReference, range: &Range) -> bool {
    reference.line >= range.start.line && reference.line <= range.end.line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::PackageManager;

    fn reference(catalog: &str) -> CatalogReference {
        CatalogReference {
            name: "react".to_string(),
            catalog: catalog.to_string(),
            line: 3,
            name_start: 5,
            name_end: 10,
            value_start: 14,
            value_end: 29,
        }
    }

    fn resolution(catalog: &str) -> Resolution {
        Resolution {
            version: "^18.2.0".to_string(),
            definition: None,
            package_manager: PackageManager::Pnpm,
            catalog: catalog.to_string(),
        }
    }

    fn label(hint: &InlayHint) -> &str {
        match &hint.label {
            InlayHintLabel::String(s) => s,
            _ => panic!("Expected string label"),
        }
    }

    #[test]
    fn test_hint_position_after_closing_quote() {
        let hint = create_inlay_hint(&reference("default"), &resolution("default"), true);
        assert_eq!(hint.position, Position { line: 3, character: 30 });
        assert_eq!(hint.padding_left, Some(true));
        assert_eq!(hint.kind, Some(InlayHintKind::PARAMETER));
    }

    #[test]
    fn test_default_catalog_label_is_version_only() {
        let hint = create_inlay_hint(&reference("default"), &resolution("default"), true);
        assert_eq!(label(&hint), "^18.2.0");
    }

    #[test]
    fn test_named_catalog_label() {
        let hint = create_inlay_hint(&reference("react18"), &resolution("react18"), true);
        assert_eq!(label(&hint), "^18.2.0 (react18)");

        let hint = create_inlay_hint(&reference("react18"), &resolution("react18"), false);
        assert_eq!(label(&hint), "^18.2.0");
    }

    #[test]
    fn test_tooltip_names_package_manager() {
        let hint = create_inlay_hint(&reference("react18"), &resolution("react18"), true);
        match hint.tooltip {
            Some(InlayHintTooltip::String(tooltip)) => {
                assert_eq!(tooltip, "PNPM catalog `react18`");
            }
            other => panic!("Unexpected tooltip: {other:?}"),
        }
    }

    #[test]
    fn test_is_in_range() {
        let range = Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 3, character: 0 },
        };
        assert!(is_in_range(&reference("default"), &range));

        let range = Range {
            start: Position { line: 4, character: 0 },
            end: Position { line: 10, character: 0 },
        };
        assert!(!is_in_range(&reference("default"), &range));
    }
}
