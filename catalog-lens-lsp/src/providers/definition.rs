//! Go-to-definition from catalog references into workspace manifests

use tower_lsp::lsp_types::{Location, Position, Range, Url};

use crate::workspace::{Definition, Span};

/// Convert a 1-based line span into an LSP range
pub fn span_to_range(span: &Span) -> Range {
    Range {
        start: Position {
            line: span.start_line.saturating_sub(1),
            character: span.start_column,
        },
        end: Position {
            line: span.end_line.saturating_sub(1),
            character: span.end_column,
        },
    }
}

/// Location of a catalog definition, `None` if the manifest path is not absolute
pub fn definition_location(definition: &Definition) -> Option<Location> {
    let uri = Url::from_file_path(&definition.manifest_path).ok()?;
    Some(Location {
        uri,
        range: span_to_range(&definition.span),
    })
}
