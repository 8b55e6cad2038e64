//! LSP feature providers (inlay hints, hover, definition)

pub mod definition;
pub mod hover;
pub mod inlay_hints;
