//! User-visible error taxonomy.
//!
//! Builders recover from per-file errors and keep going; the query layer
//! surfaces these verbatim; the CLI and server downcast them into
//! structured output.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    /// An operation required a built index and none exists on disk.
    #[error("No index found at {}; run `codeatlas index` first", .0.display())]
    IndexMissing(PathBuf),

    /// A queried file is absent from the dependency graph. Carries the
    /// normalized path so callers can echo it back.
    #[error("'{0}' is not in the dependency graph")]
    PathNotInGraph(String),

    /// No file declares the requested symbol.
    #[error("symbol '{0}' not found in the index")]
    SymbolNotFound(String),

    /// Missing or invalid project root / configuration. Fatal to the
    /// invocation.
    #[error("config error: {0}")]
    Config(String),

    /// Embedding model unavailable or inference failed. Structural
    /// queries are unaffected.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AtlasError {
    /// Stable machine-readable code for JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IndexMissing(_) => "index_missing",
            Self::PathNotInGraph(_) => "path_not_in_graph",
            Self::SymbolNotFound(_) => "symbol_not_found",
            Self::Config(_) => "config",
            Self::Embedding(_) => "embedding",
            Self::Io(_) => "io",
        }
    }
}
