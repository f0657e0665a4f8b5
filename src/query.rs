//! Structural queries over a loaded index.
//!
//! Everything here is read-only and deterministic: results follow the
//! lexicographic file order and the documented scoring rules, so repeated
//! queries against the same index give identical output.

use crate::error::AtlasError;
use crate::resolve::normalize_path;
use crate::types::{ProjectIndex, SymbolKind, SymbolNode};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Substring (case-insensitive) or exact search over the symbol index.
pub fn search(index: &ProjectIndex, query: &str, exact: bool) -> Vec<(String, String)> {
    let needle = query.to_lowercase();
    index
        .symbol_index
        .iter()
        .filter(|(name, _)| {
            if exact {
                name.as_str() == query
            } else {
                name.to_lowercase().contains(&needle)
            }
        })
        .map(|(name, loc)| (name.clone(), loc.clone()))
        .collect()
}

/// Forward or reverse dependencies for a file.
pub fn dependencies(index: &ProjectIndex, file: &str, reverse: bool) -> Result<Vec<String>> {
    let rel = normalize_path(file);
    let entry = index
        .dependency_graph
        .get(&rel)
        .ok_or(AtlasError::PathNotInGraph(rel))?;
    Ok(if reverse {
        entry.imported_by.clone()
    } else {
        entry.imports.clone()
    })
}

/// Files with no dependency edges in either direction.
pub fn orphans(index: &ProjectIndex) -> Vec<String> {
    index
        .dependency_graph
        .iter()
        .filter(|(_, entry)| entry.imports.is_empty() && entry.imported_by.is_empty())
        .map(|(path, _)| path.clone())
        .collect()
}

/// Impact buckets for a change to one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactReport {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
    pub tests: Vec<String>,
}

/// Breadth-first walk of `imported_by` from the target. Depth 1 is high,
/// depth 2 medium, deeper low; the first (shallowest) visit wins, so a
/// file is never classified twice.
pub fn impact(index: &ProjectIndex, file: &str, max_depth: usize) -> Result<ImpactReport> {
    let rel = normalize_path(file);
    if !index.dependency_graph.contains_key(&rel) {
        return Err(AtlasError::PathNotInGraph(rel).into());
    }

    let mut report = ImpactReport::default();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(rel.clone());
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((rel.clone(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(entry) = index.dependency_graph.get(&current) else {
            continue;
        };
        for dependent in &entry.imported_by {
            if !visited.insert(dependent.clone()) {
                continue;
            }
            match depth + 1 {
                1 => report.high.push(dependent.clone()),
                2 => report.medium.push(dependent.clone()),
                _ => report.low.push(dependent.clone()),
            }
            queue.push_back((dependent.clone(), depth + 1));
        }
    }

    let stem = file_stem(&rel);
    for path in index.files.keys() {
        if !is_test_shaped(path) {
            continue;
        }
        let in_bucket = visited.contains(path) && *path != rel;
        let name_match = !stem.is_empty() && file_stem(path).contains(&stem);
        if in_bucket || name_match {
            report.tests.push(path.clone());
        }
    }

    Ok(report)
}

fn is_test_shaped(path: &str) -> bool {
    path.contains("/test/") || path.contains(".test.") || path.contains(".spec.")
}

fn file_stem(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.split('.').next().unwrap_or(base).to_string()
}

/// A symbol that never appears in any call list.
#[derive(Debug, Clone, Serialize)]
pub struct DeadSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub line: u32,
}

/// Functions and methods with no incoming shape-based call. The call
/// graph is approximate, so treat these as candidates, not verdicts:
/// dynamic dispatch, exported API surface, and reflection are invisible
/// here. Names starting with `_` are skipped unless requested.
pub fn dead_code(index: &ProjectIndex, include_private: bool) -> Vec<DeadSymbol> {
    let mut called: HashSet<&str> = HashSet::new();

    fn collect_called<'a>(symbols: &'a [SymbolNode], called: &mut HashSet<&'a str>) {
        for sym in symbols {
            if let Some(calls) = &sym.calls {
                for call in calls {
                    called.insert(call.as_str());
                    // Receiver-qualified and scoped forms also mark the
                    // bare name as used.
                    if let Some(last) = call.rsplit(['.', ':']).next() {
                        called.insert(last);
                    }
                }
            }
            if let Some(children) = &sym.children {
                collect_called(children, called);
            }
        }
    }

    for record in index.files.values() {
        collect_called(&record.symbols, &mut called);
    }

    let mut dead = Vec::new();
    fn collect_dead(
        path: &str,
        symbols: &[SymbolNode],
        called: &HashSet<&str>,
        include_private: bool,
        out: &mut Vec<DeadSymbol>,
    ) {
        for sym in symbols {
            if sym.kind.is_callable() {
                let bare = sym.name.rsplit('.').next().unwrap_or(&sym.name);
                let private = bare.starts_with('_');
                let used = called.contains(sym.name.as_str())
                    || called.contains(bare)
                    || called.contains(format!("{}!", sym.name).as_str());
                if !used && (include_private || !private) {
                    out.push(DeadSymbol {
                        name: sym.name.clone(),
                        kind: sym.kind,
                        file: path.to_string(),
                        line: sym.line,
                    });
                }
            }
            if let Some(children) = &sym.children {
                collect_dead(path, children, called, include_private, out);
            }
        }
    }

    for (path, record) in &index.files {
        collect_dead(path, &record.symbols, &called, include_private, &mut dead);
    }
    dead
}

// ============================================================================
// Suggest
// ============================================================================

/// Category keyword boosts applied by the suggest scorer: when the
/// category word appears in the context, every keyword hit in the symbol
/// name adds 25 points.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("test", &["test", "spec", "mock", "fixture", "assert"]),
    ("auth", &["auth", "login", "token", "session", "credential"]),
    ("config", &["config", "settings", "option", "env"]),
    ("database", &["db", "database", "query", "sql", "store"]),
    ("http", &["http", "request", "response", "route", "endpoint", "handler"]),
    ("file", &["file", "path", "read", "write", "dir"]),
    ("parse", &["parse", "parser", "lex", "token", "ast"]),
    ("error", &["error", "err", "fail", "exception"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub location: String,
    pub score: u32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SuggestResponse {
    pub primary: Vec<Suggestion>,
    pub related: Vec<Suggestion>,
}

/// Rank symbols against a free-text context. Scoring is fixed: substring
/// containment +100, +50 per component-word overlap, +25 per category
/// keyword hit; confidence is `min(score/100, 1)`.
pub fn suggest(index: &ProjectIndex, context: &str) -> SuggestResponse {
    let context_lower = context.to_lowercase();
    let context_words: HashSet<String> = split_words(&context_lower).collect();

    let mut scored: Vec<Suggestion> = index
        .symbol_index
        .iter()
        .filter_map(|(name, location)| {
            let score = score_symbol(name, &context_lower, &context_words);
            (score > 0).then(|| Suggestion {
                name: name.clone(),
                location: location.clone(),
                score,
                confidence: (score as f32 / 100.0).min(1.0),
            })
        })
        .collect();

    // Stable sort keeps map order as the tie-break.
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    let mut primary = scored;
    let related = primary.split_off(primary.len().min(3));
    let related = related.into_iter().take(5).collect();

    SuggestResponse { primary, related }
}

fn score_symbol(name: &str, context_lower: &str, context_words: &HashSet<String>) -> u32 {
    let name_lower = name.to_lowercase();
    let mut score = 0;

    if context_lower.contains(&name_lower) || name_lower.contains(context_lower.trim()) {
        score += 100;
    }

    let name_words: Vec<String> = split_words(&name_lower).collect();
    for word in &name_words {
        if context_words.contains(word) {
            score += 50;
        }
    }

    for (category, keywords) in CATEGORY_KEYWORDS {
        if !context_lower.contains(category) {
            continue;
        }
        for keyword in *keywords {
            if name_words.iter().any(|w| w.contains(keyword)) {
                score += 25;
            }
        }
    }

    score
}

/// Split on `_`, `-`, `.`, and whitespace; lowercase input expected.
fn split_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DependencyEntry, FileRecord, Language};
    use chrono::Utc;

    fn empty_record(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::Typescript,
            size_bytes: 1,
            content_hash: "cafebabecafebabe".to_string(),
            last_indexed_at: Utc::now(),
            imports: Vec::new(),
            exports: Vec::new(),
            symbols: Vec::new(),
            outline: Vec::new(),
            ui_components: None,
            api_endpoints: None,
        }
    }

    fn chain_index() -> ProjectIndex {
        // x <- y <- z <- w ("is imported by")
        let mut index = ProjectIndex::new("/repo");
        for path in ["x.ts", "y.ts", "z.ts", "w.ts", "x.test.ts"] {
            index.files.insert(path.to_string(), empty_record(path));
        }
        index.dependency_graph.insert(
            "x.ts".into(),
            DependencyEntry {
                imports: vec![],
                imported_by: vec!["y.ts".into()],
            },
        );
        index.dependency_graph.insert(
            "y.ts".into(),
            DependencyEntry {
                imports: vec!["x.ts".into()],
                imported_by: vec!["z.ts".into()],
            },
        );
        index.dependency_graph.insert(
            "z.ts".into(),
            DependencyEntry {
                imports: vec!["y.ts".into()],
                imported_by: vec!["w.ts".into()],
            },
        );
        index.dependency_graph.insert(
            "w.ts".into(),
            DependencyEntry {
                imports: vec!["z.ts".into()],
                imported_by: vec![],
            },
        );
        index
            .dependency_graph
            .insert("x.test.ts".into(), DependencyEntry::default());
        index
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut index = ProjectIndex::new("/repo");
        index
            .symbol_index
            .insert("Greeter.hello".into(), "a.ts:2".into());
        index.symbol_index.insert("parse".into(), "b.ts:1".into());

        let hits = search(&index, "GREETER", false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "Greeter.hello");

        assert!(search(&index, "Greeter.hello", true).len() == 1);
        assert!(search(&index, "greeter.hello", true).is_empty());
    }

    #[test]
    fn dependencies_normalizes_and_errors() {
        let index = chain_index();
        assert_eq!(dependencies(&index, "./y.ts", false).unwrap(), vec!["x.ts"]);
        assert_eq!(dependencies(&index, "y.ts", true).unwrap(), vec!["z.ts"]);

        let err = dependencies(&index, "ghost.ts", false).unwrap_err();
        assert!(err.to_string().contains("ghost.ts"));
    }

    #[test]
    fn impact_buckets_by_depth() {
        let index = chain_index();

        let report = impact(&index, "x.ts", 2).unwrap();
        assert_eq!(report.high, vec!["y.ts"]);
        assert_eq!(report.medium, vec!["z.ts"]);
        assert!(report.low.is_empty());
        assert_eq!(report.tests, vec!["x.test.ts"]);

        let report = impact(&index, "x.ts", 3).unwrap();
        assert_eq!(report.low, vec!["w.ts"]);
    }

    #[test]
    fn orphans_have_no_edges() {
        let index = chain_index();
        assert_eq!(orphans(&index), vec!["x.test.ts"]);
    }

    #[test]
    fn dead_code_respects_private_flag() {
        let mut caller = SymbolNode::new("caller", SymbolKind::Function);
        caller.line = 1;
        caller.set_calls(vec!["used".to_string()]);
        let mut used = SymbolNode::new("used", SymbolKind::Function);
        used.line = 3;
        let mut unused = SymbolNode::new("unused", SymbolKind::Function);
        unused.line = 5;
        let mut private = SymbolNode::new("_hidden", SymbolKind::Function);
        private.line = 7;

        let mut index = ProjectIndex::new("/repo");
        let mut record = empty_record("lib.ts");
        record.symbols = vec![caller, used, unused, private];
        index.files.insert("lib.ts".into(), record);

        let dead = dead_code(&index, false);
        let names: Vec<&str> = dead.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"caller"));
        assert!(names.contains(&"unused"));
        assert!(!names.contains(&"used"));
        assert!(!names.contains(&"_hidden"));

        let with_private = dead_code(&index, true);
        assert!(with_private.iter().any(|d| d.name == "_hidden"));
    }

    #[test]
    fn suggest_ranks_by_documented_scoring() {
        let mut index = ProjectIndex::new("/repo");
        index
            .symbol_index
            .insert("parse_config".into(), "a.ts:1".into());
        index
            .symbol_index
            .insert("render_view".into(), "b.ts:1".into());
        index
            .symbol_index
            .insert("config".into(), "c.ts:1".into());

        let response = suggest(&index, "parse config files");
        assert!(!response.primary.is_empty());
        // `config` is substring-contained in the context (+100) on top of
        // its word overlap, so it outranks the overlap-only candidates.
        assert_eq!(response.primary[0].name, "config");
        assert!(response.primary.iter().any(|s| s.name == "parse_config"));
        assert!(!response
            .primary
            .iter()
            .chain(response.related.iter())
            .any(|s| s.name == "render_view"));

        let top = &response.primary[0];
        assert!(top.confidence <= 1.0);
        assert!(top.score >= 100);
    }
}
