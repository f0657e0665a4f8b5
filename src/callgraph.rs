//! Derived call graph.
//!
//! Call names are extracted by shape, not by overload resolution, so the
//! graph is approximate: same-named symbols collapse onto one node and
//! dynamic dispatch is invisible. Every query here documents that caveat.

use crate::types::{ProjectIndex, SymbolNode};
use std::collections::{HashMap, VecDeque};

/// One caller with its outgoing edges.
#[derive(Debug, Clone)]
pub struct CallerEntry {
    /// Qualified name when nested, plain name otherwise.
    pub key: String,
    /// Plain symbol name.
    pub name: String,
    pub file: String,
    pub line: u32,
    /// Sorted, deduplicated callee names.
    pub calls: Vec<String>,
}

/// A caller reference returned by incoming-call queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CallerRef {
    pub caller: String,
    pub file: String,
    pub line: u32,
}

pub struct CallGraph {
    entries: Vec<CallerEntry>,
    by_name: HashMap<String, Vec<usize>>,
}

impl CallGraph {
    /// Build the forward map from every symbol with a non-empty call
    /// list. Entries land in two phases - all top-level symbols across
    /// every file first (in file order), then all nested children - so
    /// name lookups resolve top-level symbols before nested ones.
    pub fn build(index: &ProjectIndex) -> Self {
        let mut entries = Vec::new();

        fn push_entry(path: &str, sym: &SymbolNode, key: String, out: &mut Vec<CallerEntry>) {
            if let Some(calls) = &sym.calls {
                if !calls.is_empty() {
                    out.push(CallerEntry {
                        key,
                        name: sym.name.clone(),
                        file: path.to_string(),
                        line: sym.line,
                        calls: calls.clone(),
                    });
                }
            }
        }

        fn walk_nested(
            path: &str,
            symbols: &[SymbolNode],
            ancestors: &mut Vec<String>,
            out: &mut Vec<CallerEntry>,
        ) {
            for sym in symbols {
                let key = format!("{}.{}", ancestors.join("."), sym.name);
                push_entry(path, sym, key, out);
                if let Some(children) = &sym.children {
                    ancestors.push(sym.name.clone());
                    walk_nested(path, children, ancestors, out);
                    ancestors.pop();
                }
            }
        }

        for (path, record) in &index.files {
            for sym in &record.symbols {
                push_entry(path, sym, sym.name.clone(), &mut entries);
            }
        }
        for (path, record) in &index.files {
            for sym in &record.symbols {
                if let Some(children) = &sym.children {
                    let mut ancestors = vec![sym.name.clone()];
                    walk_nested(path, children, &mut ancestors, &mut entries);
                }
            }
        }

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.clone()).or_default().push(i);
        }

        Self { entries, by_name }
    }

    /// Outgoing calls of the first symbol matching the given name (plain
    /// or qualified), in file-then-declaration order.
    pub fn outgoing(&self, name: &str) -> Option<&CallerEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name || e.key == name)
    }

    /// All callers whose call list includes the target name.
    pub fn incoming(&self, name: &str) -> Vec<CallerRef> {
        self.entries
            .iter()
            .filter(|e| e.calls.iter().any(|c| c == name))
            .map(|e| CallerRef {
                caller: e.key.clone(),
                file: e.file.clone(),
                line: e.line,
            })
            .collect()
    }

    /// Breadth-first path of call names from `from` to `to`, bounded by
    /// `max_depth` edges; ties break by insertion order. Returns `None`
    /// when no path exists within the bound.
    pub fn chain(&self, from: &str, to: &str, max_depth: usize) -> Option<Vec<String>> {
        let start: Vec<usize> = self
            .by_name
            .get(from)
            .cloned()
            .unwrap_or_else(|| {
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.key == from)
                    .map(|(i, _)| i)
                    .collect()
            });
        if start.is_empty() {
            return None;
        }

        let mut visited = vec![false; self.entries.len()];
        let mut queue: VecDeque<(usize, Vec<String>)> = VecDeque::new();
        for idx in start {
            if !visited[idx] {
                visited[idx] = true;
                queue.push_back((idx, vec![self.entries[idx].name.clone()]));
            }
        }

        while let Some((idx, path)) = queue.pop_front() {
            if path.len() > max_depth {
                continue;
            }
            let entry = &self.entries[idx];
            for call in &entry.calls {
                if call == to {
                    let mut found = path.clone();
                    found.push(call.clone());
                    return Some(found);
                }
                if let Some(next_indices) = self.by_name.get(call) {
                    for &next in next_indices {
                        if !visited[next] {
                            visited[next] = true;
                            let mut next_path = path.clone();
                            next_path.push(call.clone());
                            queue.push_back((next, next_path));
                        }
                    }
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
