//! Index builder.
//!
//! Full builds discover, hash, and extract every file, then derive the
//! symbol index and dependency graph. Incremental updates re-extract only
//! the given slice and rebuild the derived maps from scratch over the
//! surviving files - linear in total symbols and deliberately simple.

use crate::config::IndexConfig;
use crate::discovery::FileDiscovery;
use crate::hash::content_hash;
use crate::parsing;
use crate::persist;
use crate::resolve::{normalize_path, resolve_import};
use crate::types::{FileRecord, Language, ProjectIndex, SymbolNode};
use anyhow::{Context, Result};
use chrono::Utc;

/// Outcome of an incremental slice.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateReport {
    pub reindexed: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

pub struct IndexBuilder {
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Full build. `created_at` survives from any previously persisted
    /// index; everything else is rebuilt.
    pub async fn full_build(&self) -> Result<ProjectIndex> {
        let root = &self.config.project_root;
        tracing::info!("indexing {}", root.display());

        let discovery = FileDiscovery::from_config(&self.config)?;
        let files = discovery.discover(root)?;
        tracing::info!("discovered {} files", files.len());

        let mut index = ProjectIndex::new(root.display().to_string());
        if let Ok(Some(previous)) = persist::load_index(&self.config.index_path()) {
            index.created_at = previous.created_at;
        }

        for rel in &files {
            match self.extract_file(rel).await {
                Ok(Some(record)) => {
                    index.files.insert(rel.clone(), record);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {rel}: {e}"),
            }
        }

        rebuild_symbol_index(&mut index);
        rebuild_dependency_graph(&mut index);
        index.updated_at = Utc::now();

        tracing::info!(
            "index complete: {} files, {} symbols",
            index.file_count(),
            index.symbol_count()
        );
        Ok(index)
    }

    /// Incremental update over a slice of repo-relative paths. Paths that
    /// no longer exist are dropped along with every derived edge; the
    /// rest are re-extracted when their content hash changed.
    pub async fn update_paths(
        &self,
        index: &mut ProjectIndex,
        paths: &[String],
    ) -> Result<UpdateReport> {
        let discovery = FileDiscovery::from_config(&self.config)?;
        let mut report = UpdateReport::default();

        for path in paths {
            let rel = normalize_path(path);
            let abs = self.config.project_root.join(&rel);

            if !abs.is_file() {
                if index.files.remove(&rel).is_some() {
                    report.removed += 1;
                    tracing::info!("removed {rel}");
                }
                continue;
            }

            if !discovery.matches(&rel) {
                report.skipped += 1;
                continue;
            }

            match self.extract_file(&rel).await {
                Ok(Some(record)) => {
                    let unchanged = index
                        .files
                        .get(&rel)
                        .map(|old| old.content_hash == record.content_hash)
                        .unwrap_or(false);
                    if unchanged {
                        report.unchanged += 1;
                    } else {
                        // Records are replaced, never mutated in place.
                        index.files.insert(rel, record);
                        report.reindexed += 1;
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("skipping {rel}: {e}");
                    report.skipped += 1;
                }
            }
        }

        rebuild_symbol_index(index);
        rebuild_dependency_graph(index);
        index.updated_at = Utc::now();
        Ok(report)
    }

    /// Read, hash, and extract one file. `None` means the file exceeds
    /// the size cap.
    async fn extract_file(&self, rel: &str) -> Result<Option<FileRecord>> {
        let abs = self.config.project_root.join(rel);
        let bytes = tokio::fs::read(&abs)
            .await
            .with_context(|| format!("failed to read {}", abs.display()))?;

        if bytes.len() as u64 > self.config.max_file_size {
            tracing::warn!(
                "skipping {rel}: {} bytes exceeds cap {}",
                bytes.len(),
                self.config.max_file_size
            );
            return Ok(None);
        }

        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes).into_owned();
        let language = rel
            .rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);

        let parsed = parsing::router().extract(&source, rel);

        Ok(Some(FileRecord {
            path: rel.to_string(),
            language,
            size_bytes: bytes.len() as u64,
            content_hash: hash,
            last_indexed_at: Utc::now(),
            imports: parsed.imports,
            exports: parsed.exports,
            symbols: parsed.symbols,
            outline: parsed.outline,
            ui_components: parsed.ui_components,
            api_endpoints: parsed.api_endpoints,
        }))
    }
}

/// Depth-first rebuild of the qualified-name map. Files iterate in
/// lexicographic order; duplicate keys are overwritten by later entries.
pub fn rebuild_symbol_index(index: &mut ProjectIndex) {
    index.symbol_index.clear();

    fn walk(
        path: &str,
        symbols: &[SymbolNode],
        ancestors: &mut Vec<String>,
        out: &mut std::collections::BTreeMap<String, String>,
    ) {
        for sym in symbols {
            let key = if ancestors.is_empty() {
                sym.name.clone()
            } else {
                format!("{}.{}", ancestors.join("."), sym.name)
            };
            out.insert(key, format!("{path}:{}", sym.line));

            if let Some(children) = &sym.children {
                ancestors.push(sym.name.clone());
                walk(path, children, ancestors, out);
                ancestors.pop();
            }
        }
    }

    let files = &index.files;
    let out = &mut index.symbol_index;
    for (path, record) in files {
        let mut ancestors = Vec::new();
        walk(path, &record.symbols, &mut ancestors, out);
    }
}

/// Rebuild forward and reverse dependency edges. Resolved specifiers
/// appear as repo-relative paths on both sides; unresolved specifiers
/// stay in `imports` verbatim and never create reverse edges.
pub fn rebuild_dependency_graph(index: &mut ProjectIndex) {
    let files = &index.files;
    let graph = &mut index.dependency_graph;
    graph.clear();

    for path in files.keys() {
        graph.entry(path.clone()).or_default();
    }

    for (path, record) in files {
        for edge in &record.imports {
            match resolve_import(&edge.module, path, files) {
                Some(target) if target != *path => {
                    let entry = graph.entry(path.clone()).or_default();
                    if !entry.imports.contains(&target) {
                        entry.imports.push(target.clone());
                    }
                    let reverse = graph.entry(target).or_default();
                    if !reverse.imported_by.contains(path) {
                        reverse.imported_by.push(path.clone());
                    }
                }
                Some(_) => {}
                None => {
                    let entry = graph.entry(path.clone()).or_default();
                    if !entry.imports.contains(&edge.module) {
                        entry.imports.push(edge.module.clone());
                    }
                }
            }
        }
    }
}
