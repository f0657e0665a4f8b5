//! Parsing layer: per-language analyzers over tree-sitter.
//!
//! Each analyzer turns file bytes plus a path into a normalized
//! [`ParseResult`]. Analyzers are stateless with respect to their inputs
//! and never let an error escape the adapter boundary; the router converts
//! failures into an empty result with a recoverable warning.

pub mod go;
pub mod python;
pub mod rust;
pub mod shell;
pub mod typescript;

use crate::types::{
    ComponentDecl, EndpointDecl, ExportDecl, ImportEdge, Language, OutlineEntry, SymbolNode,
};
use anyhow::Result;
use std::sync::OnceLock;

/// Normalized extraction record for one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub imports: Vec<ImportEdge>,
    pub exports: Vec<ExportDecl>,
    pub symbols: Vec<SymbolNode>,
    pub outline: Vec<OutlineEntry>,
    pub ui_components: Option<Vec<ComponentDecl>>,
    pub api_endpoints: Option<Vec<EndpointDecl>>,
}

/// Trait for language-specific analyzers.
pub trait Analyzer: Send + Sync {
    fn language(&self) -> Language;

    /// Extract the normalized record. Positions are 1-based lines and
    /// 0-based columns throughout.
    fn parse(&self, source: &str, path: &str) -> Result<ParseResult>;
}

/// Process-wide dispatch from file extension to analyzer. Adapters are
/// constructed lazily and exactly once.
pub struct LanguageRouter {
    typescript: typescript::TypeScriptAnalyzer,
    tsx: typescript::TypeScriptAnalyzer,
    javascript: typescript::TypeScriptAnalyzer,
    python: python::PythonAnalyzer,
    go: go::GoAnalyzer,
    rust: rust::RustAnalyzer,
    shell: shell::ShellAnalyzer,
}

impl LanguageRouter {
    fn new() -> Self {
        Self {
            typescript: typescript::TypeScriptAnalyzer::new_typescript(),
            tsx: typescript::TypeScriptAnalyzer::new_tsx(),
            javascript: typescript::TypeScriptAnalyzer::new_javascript(),
            python: python::PythonAnalyzer::new(),
            go: go::GoAnalyzer::new(),
            rust: rust::RustAnalyzer::new(),
            shell: shell::ShellAnalyzer::new(),
        }
    }

    /// Analyzer for a path, by extension. `None` for unsupported kinds.
    pub fn analyzer_for(&self, path: &str) -> Option<&dyn Analyzer> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        match ext.as_str() {
            "ts" | "mts" | "cts" => Some(&self.typescript),
            "tsx" => Some(&self.tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(&self.javascript),
            "py" => Some(&self.python),
            "go" => Some(&self.go),
            "rs" => Some(&self.rust),
            "sh" | "bash" => Some(&self.shell),
            _ => None,
        }
    }

    /// Parse a file, isolating analyzer failures: a failed parse produces
    /// an empty result and a warning, never an error.
    pub fn extract(&self, source: &str, path: &str) -> ParseResult {
        let Some(analyzer) = self.analyzer_for(path) else {
            return ParseResult::default();
        };
        match analyzer.parse(source, path) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("parse failure in {path}: {e}");
                ParseResult::default()
            }
        }
    }
}

/// The process-wide router instance.
pub fn router() -> &'static LanguageRouter {
    static ROUTER: OnceLock<LanguageRouter> = OnceLock::new();
    ROUTER.get_or_init(LanguageRouter::new)
}

/// Derive the flat outline from a symbol tree: depth-first, level 1 at the
/// top, sorted by start line.
pub fn outline_from_symbols(symbols: &[SymbolNode]) -> Vec<OutlineEntry> {
    fn walk(symbols: &[SymbolNode], level: u32, out: &mut Vec<OutlineEntry>) {
        for sym in symbols {
            out.push(OutlineEntry {
                title: sym.name.clone(),
                level,
                line: sym.line,
            });
            if let Some(children) = &sym.children {
                walk(children, level + 1, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(symbols, 1, &mut out);
    out.sort_by_key(|e| e.line);
    out
}

// ============================================================================
// Shared tree-sitter helpers
// ============================================================================

pub(crate) mod support {
    use crate::types::SymbolNode;
    use tree_sitter::Node;

    /// Source text of a node.
    pub fn text_of<'a>(source: &'a str, node: Node) -> &'a str {
        node.utf8_text(source.as_bytes()).unwrap_or("")
    }

    /// 1-based start line of a node.
    pub fn line_of(node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// Copy a node's span onto a symbol: 1-based lines, 0-based columns.
    pub fn set_span(sym: &mut SymbolNode, node: Node) {
        let start = node.start_position();
        let end = node.end_position();
        sym.line = start.row as u32 + 1;
        sym.column = start.column as u32;
        sym.end_line = end.row as u32 + 1;
        sym.end_column = end.column as u32;
    }

    /// Strip surrounding string quotes.
    pub fn strip_quotes(s: &str) -> String {
        s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
    }

    /// Run a tree-sitter parse with the given grammar, returning the tree
    /// or a descriptive error.
    pub fn parse_tree(
        language: &tree_sitter::Language,
        source: &str,
    ) -> anyhow::Result<tree_sitter::Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(language)
            .map_err(|e| anyhow::anyhow!("failed to set grammar: {e}"))?;
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("parser produced no tree"))
    }

    /// True when nothing at the top level parsed: the root has children
    /// and every named one is an ERROR. Such a file is indexed with its
    /// language set and all extraction arrays empty.
    pub fn only_errors(root: Node) -> bool {
        let mut cursor = root.walk();
        let mut any = false;
        for child in root.named_children(&mut cursor) {
            if child.kind() != "ERROR" {
                return false;
            }
            any = true;
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;

    #[test]
    fn router_dispatches_by_extension() {
        let router = router();
        assert_eq!(
            router.analyzer_for("src/app.tsx").unwrap().language(),
            Language::Typescript
        );
        assert_eq!(
            router.analyzer_for("main.go").unwrap().language(),
            Language::Go
        );
        assert!(router.analyzer_for("README.md").is_none());
        assert!(router.analyzer_for("Makefile").is_none());
    }

    #[test]
    fn extract_is_total_for_unknown_files() {
        let result = router().extract("whatever", "notes.txt");
        assert!(result.imports.is_empty());
        assert!(result.symbols.is_empty());
    }

    #[test]
    fn outline_levels_follow_nesting() {
        let mut class = SymbolNode::new("Greeter", SymbolKind::Class);
        class.line = 1;
        let mut method = SymbolNode::new("hello", SymbolKind::Method);
        method.line = 2;
        class.push_child(method);
        let mut func = SymbolNode::new("main", SymbolKind::Function);
        func.line = 6;

        let outline = outline_from_symbols(&[class, func]);
        assert_eq!(outline.len(), 3);
        assert_eq!(outline[0].title, "Greeter");
        assert_eq!(outline[0].level, 1);
        assert_eq!(outline[1].title, "hello");
        assert_eq!(outline[1].level, 2);
        assert_eq!(outline[2].title, "main");
        assert_eq!(outline[2].level, 1);
    }
}
