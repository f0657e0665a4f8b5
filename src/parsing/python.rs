//! Python analyzer.
//!
//! Indentation-family extraction: module and from-imports with aliases,
//! underscore-aware exports, top-level functions/classes/variables with
//! docstrings, and shape-based call edges.

use super::support::{only_errors, parse_tree, set_span, text_of};
use super::{outline_from_symbols, Analyzer, ParseResult};
use crate::types::{ExportDecl, ExportKind, ImportEdge, Language, SymbolKind, SymbolNode};
use anyhow::Result;
use tree_sitter::Node;

pub struct PythonAnalyzer {
    grammar: tree_sitter::Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, source: &str, _path: &str) -> Result<ParseResult> {
        let tree = parse_tree(&self.grammar, source)?;
        let root = tree.root_node();
        if only_errors(root) {
            return Ok(ParseResult::default());
        }

        let mut imports = Vec::new();
        collect_imports(root, source, &mut imports);

        let symbols = collect_module_symbols(root, source);
        let exports = exports_from_symbols(&symbols);
        let outline = outline_from_symbols(&symbols);

        Ok(ParseResult {
            imports,
            exports,
            symbols,
            outline,
            ui_components: None,
            api_endpoints: None,
        })
    }
}

// ============================================================================
// Imports
// ============================================================================

fn collect_imports(node: Node, source: &str, imports: &mut Vec<ImportEdge>) {
    match node.kind() {
        "import_statement" => {
            // `import a, b as c` - each name becomes its own edge.
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => {
                        imports.push(ImportEdge::new(text_of(source, child)));
                    }
                    "aliased_import" => {
                        let module = child
                            .child_by_field_name("name")
                            .map(|n| text_of(source, n).to_string())
                            .unwrap_or_default();
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| text_of(source, n).to_string());
                        let mut edge = ImportEdge::new(module);
                        edge.alias = alias;
                        imports.push(edge);
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            // `from m import a, b as c` - one edge with a name list.
            let module = node
                .child_by_field_name("module_name")
                .map(|n| text_of(source, n).to_string())
                .unwrap_or_default();
            let mut edge = ImportEdge::new(module);

            let mut cursor = node.walk();
            let mut past_module = false;
            for child in node.named_children(&mut cursor) {
                if !past_module {
                    // The first named child is the module itself.
                    past_module = true;
                    continue;
                }
                match child.kind() {
                    "dotted_name" => edge.names.push(text_of(source, child).to_string()),
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| text_of(source, n))
                            .unwrap_or("");
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| text_of(source, n))
                            .unwrap_or("");
                        edge.names.push(format!("{name} as {alias}"));
                    }
                    "wildcard_import" => edge.names.push("*".to_string()),
                    _ => {}
                }
            }
            imports.push(edge);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_imports(child, source, imports);
            }
        }
    }
}

// ============================================================================
// Symbols
// ============================================================================

fn collect_module_symbols(root: Node, source: &str) -> Vec<SymbolNode> {
    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        push_statement_symbols(node, source, &mut symbols);
    }
    symbols
}

fn push_statement_symbols(node: Node, source: &str, symbols: &mut Vec<SymbolNode>) {
    match node.kind() {
        "function_definition" => {
            if let Some(sym) = function_symbol(node, source, None) {
                symbols.push(sym);
            }
        }
        "class_definition" => {
            if let Some(sym) = class_symbol(node, source) {
                symbols.push(sym);
            }
        }
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                push_statement_symbols(def, source, symbols);
            }
        }
        "expression_statement" => {
            // Top-level assignment targets become variable symbols.
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() != "assignment" {
                    continue;
                }
                if let Some(left) = child.child_by_field_name("left") {
                    for name in assignment_targets(left, source) {
                        let mut sym = SymbolNode::new(name, SymbolKind::Variable);
                        set_span(&mut sym, child);
                        symbols.push(sym);
                    }
                }
            }
        }
        _ => {}
    }
}

fn assignment_targets(left: Node, source: &str) -> Vec<String> {
    match left.kind() {
        "identifier" => vec![text_of(source, left).to_string()],
        "pattern_list" | "tuple_pattern" => {
            let mut names = Vec::new();
            let mut cursor = left.walk();
            for child in left.named_children(&mut cursor) {
                if child.kind() == "identifier" {
                    names.push(text_of(source, child).to_string());
                }
            }
            names
        }
        _ => Vec::new(),
    }
}

fn function_symbol(node: Node, source: &str, parent: Option<&str>) -> Option<SymbolNode> {
    let name = node
        .child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())?;
    // A real definition always has at least one body statement; anything
    // the parser recovered without one is a parse artifact.
    let body = node.child_by_field_name("body")?;
    if body.named_child_count() == 0 {
        return None;
    }
    let kind = if parent.is_some() {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };

    let mut sym = SymbolNode::new(&name, kind);
    set_span(&mut sym, node);
    sym.parent = parent.map(|p| p.to_string());
    sym.signature = Some(function_signature(node, source, &name));
    sym.docstring = block_docstring(body, source);
    sym.set_calls(collect_calls(body, source));
    Some(sym)
}

fn class_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let name = node
        .child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Class);
    set_span(&mut sym, node);

    if let Some(body) = node.child_by_field_name("body") {
        sym.docstring = block_docstring(body, source);
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let def = match member.kind() {
                "function_definition" => Some(member),
                "decorated_definition" => member.child_by_field_name("definition"),
                _ => None,
            };
            if let Some(def) = def.filter(|d| d.kind() == "function_definition") {
                if let Some(child) = function_symbol(def, source, Some(&name)) {
                    sym.push_child(child);
                }
            }
        }
    }
    Some(sym)
}

/// `name(params) -> ret` with annotations as written.
fn function_signature(node: Node, source: &str, name: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| text_of(source, n).to_string())
        .unwrap_or_else(|| "()".to_string());
    match node.child_by_field_name("return_type") {
        Some(ret) => format!("{name}{params} -> {}", text_of(source, ret)),
        None => format!("{name}{params}"),
    }
}

/// First string-expression statement in a body.
fn block_docstring(body: Node, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = text_of(source, expr);
    let cleaned = raw
        .trim_start_matches(|c| c == 'r' || c == 'b' || c == 'u' || c == 'f')
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

// ============================================================================
// Exports
// ============================================================================

/// Top-level names that do not start with an underscore.
fn exports_from_symbols(symbols: &[SymbolNode]) -> Vec<ExportDecl> {
    symbols
        .iter()
        .filter(|s| !s.name.starts_with('_'))
        .map(|s| ExportDecl {
            name: s.name.clone(),
            kind: match s.kind {
                SymbolKind::Function => ExportKind::Function,
                SymbolKind::Class => ExportKind::Class,
                _ => ExportKind::Var,
            },
            line: s.line,
            signature: s.signature.clone(),
        })
        .collect()
}

// ============================================================================
// Calls
// ============================================================================

fn collect_calls(body: Node, source: &str) -> Vec<String> {
    let mut calls = Vec::new();
    walk_calls(body, source, &mut calls);
    calls
}

fn walk_calls(node: Node, source: &str, calls: &mut Vec<String>) {
    if node.kind() == "call" {
        if let Some(callee) = node.child_by_field_name("function") {
            match callee.kind() {
                "identifier" => calls.push(text_of(source, callee).to_string()),
                "attribute" => {
                    if let Some(attr) = callee.child_by_field_name("attribute") {
                        calls.push(text_of(source, attr).to_string());
                        if let Some(receiver) = receiver_form(callee, source) {
                            calls.push(receiver);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(child, source, calls);
    }
}

/// `receiver.method` when the receiver is a plain attribute chain and not
/// the implicit `self`.
fn receiver_form(callee: Node, source: &str) -> Option<String> {
    let object = callee.child_by_field_name("object")?;
    if object.kind() == "identifier" && text_of(source, object) == "self" {
        return None;
    }
    if !is_attribute_chain(object) {
        return None;
    }
    Some(text_of(source, callee).to_string())
}

fn is_attribute_chain(node: Node) -> bool {
    match node.kind() {
        "identifier" => true,
        "attribute" => node
            .child_by_field_name("object")
            .map(is_attribute_chain)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        PythonAnalyzer::new().parse(source, "pkg/mod.py").unwrap()
    }

    #[test]
    fn import_forms() {
        let result = parse(
            "import os\nimport sys, json as j\nfrom typing import List, Optional as Opt\nfrom . import sibling\n",
        );

        assert_eq!(result.imports.len(), 5);
        assert_eq!(result.imports[0].module, "os");
        assert_eq!(result.imports[1].module, "sys");
        assert_eq!(result.imports[2].module, "json");
        assert_eq!(result.imports[2].alias.as_deref(), Some("j"));

        let from_edge = &result.imports[3];
        assert_eq!(from_edge.module, "typing");
        assert_eq!(from_edge.names, vec!["List", "Optional as Opt"]);

        assert_eq!(result.imports[4].module, ".");
        assert_eq!(result.imports[4].names, vec!["sibling"]);
    }

    #[test]
    fn class_with_methods_and_docstrings() {
        let result = parse(
            r#"
class UserService:
    """Service class for user management."""

    def __init__(self, url: str):
        self.url = url

    def get_user(self, user_id: int) -> str:
        """Fetch a user."""
        return self.format(user_id)
"#,
        );

        let class = &result.symbols[0];
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(
            class.docstring.as_deref(),
            Some("Service class for user management.")
        );

        let methods = class.children.as_ref().unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name, "__init__");
        assert_eq!(methods[0].kind, SymbolKind::Method);
        assert_eq!(methods[1].parent.as_deref(), Some("UserService"));
        assert_eq!(
            methods[1].signature.as_deref(),
            Some("get_user(self, user_id: int) -> str")
        );
        assert_eq!(methods[1].docstring.as_deref(), Some("Fetch a user."));
        // self.format(...) records only the method name.
        assert_eq!(methods[1].calls.as_deref(), Some(&["format".to_string()][..]));
    }

    #[test]
    fn underscore_names_are_not_exported() {
        let result = parse("def visible():\n    pass\n\ndef _hidden():\n    pass\n\nLIMIT = 10\n");

        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["visible", "LIMIT"]);
        assert_eq!(result.exports[0].kind, ExportKind::Function);
        assert_eq!(result.exports[1].kind, ExportKind::Var);
        // _hidden is still a symbol, just not exported.
        assert!(result.symbols.iter().any(|s| s.name == "_hidden"));
    }

    #[test]
    fn calls_capture_receiver_and_awaited_forms() {
        let result = parse(
            r#"
async def handler(client):
    helper()
    client.send("x")
    await client.recv()
    data.inner.load()
"#,
        );

        let calls = result.symbols[0].calls.as_ref().unwrap();
        assert_eq!(
            calls,
            &vec![
                "client.recv".to_string(),
                "client.send".to_string(),
                "data.inner.load".to_string(),
                "helper".to_string(),
                "load".to_string(),
                "recv".to_string(),
                "send".to_string(),
            ]
        );
    }

    #[test]
    fn tuple_assignment_targets() {
        let result = parse("a, b = 1, 2\n");
        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn decorated_functions_are_extracted() {
        let result = parse("@app.route('/x')\ndef handler():\n    pass\n");
        assert_eq!(result.symbols[0].name, "handler");
        assert_eq!(result.symbols[0].kind, SymbolKind::Function);
    }

    #[test]
    fn pure_syntax_error_extracts_nothing() {
        let result = parse("def broken(:\n");
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
        assert!(result.symbols.is_empty());
        assert!(result.outline.is_empty());
    }
}
