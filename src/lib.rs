//! Code Atlas
//!
//! A structural code indexer for AI coding agents: it maintains a
//! compact, machine-readable map of a repository so downstream tools can
//! answer "where is X defined", "who imports Y", "what does Z call", and
//! "what breaks if W changes" without reading source.
//!
//! # Architecture
//!
//! Three subsystems carry the weight:
//!
//! 1. **Extraction**: per-language tree-sitter analyzers normalize each
//!    file into imports, exports, a nested symbol tree with outgoing call
//!    edges, and a display outline.
//! 2. **Indexing**: discovery, hash-keyed extraction, and the derived
//!    symbol index, dependency graph, and call graph, kept current by a
//!    debounced watch loop.
//! 3. **Queries**: structural lookups plus semantic search over a
//!    persistent embedding cache, served warm by a resident HTTP server.
//!
//! # Usage
//!
//! ```ignore
//! use codeatlas::{IndexBuilder, IndexConfig};
//!
//! let config = IndexConfig::for_root(Path::new("/path/to/repo"))?;
//! let builder = IndexBuilder::new(config.clone());
//! let index = builder.full_build().await?;
//! codeatlas::persist::save_index(&config.index_path(), &index)?;
//! ```

pub mod callgraph;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hash;
pub mod index;
pub mod parsing;
pub mod persist;
pub mod query;
pub mod resolve;
pub mod semantic;
pub mod server;
pub mod types;
pub mod watch;

pub use callgraph::CallGraph;
pub use config::IndexConfig;
pub use discovery::FileDiscovery;
pub use error::AtlasError;
pub use index::{IndexBuilder, UpdateReport};
pub use types::*;

/// Version reported by the CLI and server.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
