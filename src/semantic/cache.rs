//! Persistent embedding cache.
//!
//! On disk: line-delimited JSON, a `{ "model", "count" }` header followed
//! by one entry per symbol. A cache is reused only when the model, the
//! entry count, and every entry text still match the current index;
//! anything else triggers a full rebuild.

use super::{cosine, Embedder};
use crate::persist::atomic_write;
use crate::types::{ProjectIndex, SymbolNode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One embedded symbol. `id` is `"file:symbol"` with the qualified name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocEntry {
    pub id: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct DocCache {
    pub model_id: String,
    pub dim: usize,
    pub entries: Vec<DocEntry>,
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct Header {
    model: String,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct EntryLine {
    id: String,
    file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    text: String,
    vec: Vec<f32>,
}

impl DocCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reuse is allowed only when model, count, and texts all match.
    pub fn is_reusable_for(&self, model_id: &str, entries: &[DocEntry]) -> bool {
        self.model_id == model_id
            && self.entries.len() == entries.len()
            && self
                .entries
                .iter()
                .zip(entries.iter())
                .all(|(a, b)| a.text == b.text)
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache {}", path.display()))?;
        let mut lines = data.lines();

        let header: Header = match lines.next() {
            Some(first) => serde_json::from_str(first)
                .with_context(|| format!("invalid cache header in {}", path.display()))?,
            None => return Ok(None),
        };

        let mut cache = Self {
            model_id: header.model,
            ..Self::default()
        };
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entry: EntryLine = serde_json::from_str(line)
                .with_context(|| format!("invalid cache entry in {}", path.display()))?;
            cache.entries.push(DocEntry {
                id: entry.id,
                file: entry.file,
                line: entry.line,
                text: entry.text,
            });
            cache.vectors.push(entry.vec);
        }

        if cache.entries.len() != header.count {
            tracing::warn!(
                "cache {} count mismatch: header {} vs {} entries",
                path.display(),
                header.count,
                cache.entries.len()
            );
            return Ok(None);
        }
        cache.dim = cache.vectors.first().map(|v| v.len()).unwrap_or(0);
        Ok(Some(cache))
    }

    /// Atomic replace: serialize to a buffer, write temp, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        let header = Header {
            model: self.model_id.clone(),
            count: self.entries.len(),
        };
        out.push_str(&serde_json::to_string(&header)?);
        out.push('\n');
        for (entry, vec) in self.entries.iter().zip(self.vectors.iter()) {
            let line = EntryLine {
                id: entry.id.clone(),
                file: entry.file.clone(),
                line: entry.line,
                text: entry.text.clone(),
                vec: vec.clone(),
            };
            out.push_str(&serde_json::to_string(&line)?);
            out.push('\n');
        }
        atomic_write(path, out.as_bytes())
    }
}

/// Flatten the index's symbol trees into embeddable entries, in file
/// iteration order then depth-first declaration order.
pub fn doc_entries(index: &ProjectIndex) -> Vec<DocEntry> {
    fn walk(file: &str, symbols: &[SymbolNode], ancestors: &mut Vec<String>, out: &mut Vec<DocEntry>) {
        for sym in symbols {
            let qualified = if ancestors.is_empty() {
                sym.name.clone()
            } else {
                format!("{}.{}", ancestors.join("."), sym.name)
            };
            out.push(DocEntry {
                id: format!("{file}:{qualified}"),
                file: file.to_string(),
                line: Some(sym.line),
                text: embedding_text(file, &qualified, sym),
            });
            if let Some(children) = &sym.children {
                ancestors.push(sym.name.clone());
                walk(file, children, ancestors, out);
                ancestors.pop();
            }
        }
    }

    let mut out = Vec::new();
    for (file, record) in &index.files {
        let mut ancestors = Vec::new();
        walk(file, &record.symbols, &mut ancestors, &mut out);
    }
    out
}

/// Text handed to the embedder for one symbol: name, kind, file, and the
/// signature and docstring when present.
fn embedding_text(file: &str, qualified: &str, sym: &SymbolNode) -> String {
    let mut parts = vec![
        format!("Symbol: {qualified}"),
        format!("Kind: {}", sym.kind.as_str()),
        format!("File: {file}"),
    ];
    if let Some(sig) = &sym.signature {
        parts.push(format!("Signature: {sig}"));
    }
    if let Some(doc) = &sym.docstring {
        parts.push(format!("Documentation: {doc}"));
    }
    parts.join("\n")
}

/// Build a fresh cache for the index with the given embedder.
pub fn build_cache(index: &ProjectIndex, embedder: &Embedder) -> Result<DocCache> {
    let entries = doc_entries(index);
    let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
    let vectors = embedder.embed(texts)?;
    let dim = vectors.first().map(|v| v.len()).unwrap_or(0);

    Ok(DocCache {
        model_id: embedder.model_id().to_string(),
        dim,
        entries,
        vectors,
    })
}

/// Load-or-build: reuse the on-disk cache when the reuse policy allows,
/// rebuild end-to-end (and persist) otherwise.
pub fn ensure_cache(index: &ProjectIndex, path: &Path, embedder: &Embedder) -> Result<DocCache> {
    let entries = doc_entries(index);

    match DocCache::load(path) {
        Ok(Some(cache)) if cache.is_reusable_for(embedder.model_id(), &entries) => {
            tracing::debug!("reusing embedding cache ({} vectors)", cache.len());
            return Ok(cache);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("ignoring unreadable cache: {e}"),
    }

    tracing::info!("building embedding cache for {} symbols", entries.len());
    let cache = build_cache(index, embedder)?;
    cache.save(path)?;
    Ok(cache)
}

/// A semantic search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticHit {
    pub id: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub score: f32,
}

/// Rank cached entries against an already-embedded query vector: cosine
/// against every vector, descending, truncated to `k`. Equal scores keep
/// cache order.
pub fn rank_by_vector(query_vec: &[f32], cache: &DocCache, k: usize) -> Vec<SemanticHit> {
    let mut hits: Vec<SemanticHit> = cache
        .entries
        .iter()
        .zip(cache.vectors.iter())
        .map(|(entry, vec)| SemanticHit {
            id: entry.id.clone(),
            file: entry.file.clone(),
            line: entry.line,
            score: cosine(query_vec, vec),
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    hits
}

/// Embed the query exactly once, then rank.
pub fn semantic_search(
    query: &str,
    cache: &DocCache,
    k: usize,
    embedder: &Embedder,
) -> Result<Vec<SemanticHit>> {
    let mut vectors = embedder.embed(vec![query.to_string()])?;
    let query_vec = vectors
        .pop()
        .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))?;
    Ok(rank_by_vector(&query_vec, cache, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, text: &str) -> DocEntry {
        DocEntry {
            id: id.to_string(),
            file: id.split(':').next().unwrap_or("").to_string(),
            line: Some(1),
            text: text.to_string(),
        }
    }

    fn sample_cache() -> DocCache {
        DocCache {
            model_id: "all-MiniLM-L6-v2".to_string(),
            dim: 3,
            entries: vec![
                entry("a.ts:alpha", "alpha text"),
                entry("b.ts:beta", "beta text"),
                entry("c.ts:gamma", "gamma text"),
            ],
            vectors: vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.7, 0.7, 0.0],
            ],
        }
    }

    #[test]
    fn jsonl_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("PROJECT_INDEX.vectors.jsonl");

        let cache = sample_cache();
        cache.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let first = raw.lines().next().unwrap();
        assert!(first.contains("\"model\""));
        assert!(first.contains("\"count\":3"));

        let loaded = DocCache::load(&path).unwrap().unwrap();
        assert_eq!(loaded.model_id, cache.model_id);
        assert_eq!(loaded.entries, cache.entries);
        assert_eq!(loaded.vectors, cache.vectors);
        assert_eq!(loaded.dim, 3);
    }

    #[test]
    fn reuse_policy_checks_model_count_and_texts() {
        let cache = sample_cache();
        let same = cache.entries.clone();
        assert!(cache.is_reusable_for("all-MiniLM-L6-v2", &same));

        // Different model.
        assert!(!cache.is_reusable_for("bge-small-en-v1.5", &same));

        // Different count.
        assert!(!cache.is_reusable_for("all-MiniLM-L6-v2", &same[..2]));

        // Same count, different text.
        let mut changed = same.clone();
        changed[1].text = "edited".to_string();
        assert!(!cache.is_reusable_for("all-MiniLM-L6-v2", &changed));
    }

    #[test]
    fn count_mismatch_invalidates_cache() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("vectors.jsonl");
        std::fs::write(
            &path,
            "{\"model\":\"m\",\"count\":5}\n{\"id\":\"a:b\",\"file\":\"a\",\"text\":\"t\",\"vec\":[1.0]}\n",
        )
        .unwrap();
        assert!(DocCache::load(&path).unwrap().is_none());
    }

    #[test]
    fn rank_orders_by_cosine_and_truncates() {
        let cache = sample_cache();
        let hits = rank_by_vector(&[1.0, 0.0, 0.0], &cache, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a.ts:alpha");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
    }

    #[test]
    fn doc_entries_follow_symbol_tree() {
        use crate::types::{FileRecord, Language, SymbolKind};
        use chrono::Utc;

        let mut class = SymbolNode::new("Greeter", SymbolKind::Class);
        class.line = 1;
        let mut method = SymbolNode::new("hello", SymbolKind::Method);
        method.line = 2;
        method.signature = Some("hello(name: string): string".to_string());
        class.push_child(method);

        let mut index = ProjectIndex::new("/repo");
        index.files.insert(
            "lib/a.ts".to_string(),
            FileRecord {
                path: "lib/a.ts".to_string(),
                language: Language::Typescript,
                size_bytes: 1,
                content_hash: "0123456789abcdef".to_string(),
                last_indexed_at: Utc::now(),
                imports: Vec::new(),
                exports: Vec::new(),
                symbols: vec![class],
                outline: Vec::new(),
                ui_components: None,
                api_endpoints: None,
            },
        );

        let entries = doc_entries(&index);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "lib/a.ts:Greeter");
        assert_eq!(entries[1].id, "lib/a.ts:Greeter.hello");
        assert!(entries[1].text.contains("Signature: hello(name: string): string"));
        assert!(entries[1].text.contains("Kind: method"));
    }
}
