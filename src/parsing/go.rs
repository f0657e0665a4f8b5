//! Go analyzer.
//!
//! Import specs with alias and dot-import handling, capitalization-based
//! exports, struct/interface children, receiver-qualified methods, and
//! call edges recorded as full selector text.

use super::support::{only_errors, parse_tree, set_span, strip_quotes, text_of};
use super::{outline_from_symbols, Analyzer, ParseResult};
use crate::types::{ExportDecl, ExportKind, ImportEdge, Language, SymbolKind, SymbolNode};
use anyhow::Result;
use tree_sitter::Node;

pub struct GoAnalyzer {
    grammar: tree_sitter::Language,
}

impl GoAnalyzer {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_go::LANGUAGE.into(),
        }
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn parse(&self, source: &str, _path: &str) -> Result<ParseResult> {
        let tree = parse_tree(&self.grammar, source)?;
        let root = tree.root_node();
        if only_errors(root) {
            return Ok(ParseResult::default());
        }

        let mut imports = Vec::new();
        collect_imports(root, source, &mut imports);

        let symbols = collect_symbols(root, source);
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
    if node.kind() == "import_spec" {
        let module = node
            .child_by_field_name("path")
            .map(|n| strip_quotes(text_of(source, n)))
            .unwrap_or_default();
        let mut edge = ImportEdge::new(module);
        if let Some(name) = node.child_by_field_name("name") {
            // Alias, dot import (`.`), or blank import (`_`).
            edge.alias = Some(text_of(source, name).to_string());
        }
        imports.push(edge);
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

// ============================================================================
// Symbols
// ============================================================================

fn collect_symbols(root: Node, source: &str) -> Vec<SymbolNode> {
    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        match node.kind() {
            "function_declaration" => {
                if let Some(sym) = function_symbol(node, source) {
                    symbols.push(sym);
                }
            }
            "method_declaration" => {
                if let Some(sym) = method_symbol(node, source) {
                    symbols.push(sym);
                }
            }
            "type_declaration" => {
                let mut type_cursor = node.walk();
                for spec in node.named_children(&mut type_cursor) {
                    if spec.kind() == "type_spec" {
                        if let Some(sym) = type_symbol(spec, node, source) {
                            symbols.push(sym);
                        }
                    }
                }
            }
            "const_declaration" | "var_declaration" => {
                let kind = if node.kind() == "const_declaration" {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                };
                collect_value_specs(node, source, kind, &mut symbols);
            }
            _ => {}
        }
    }
    symbols
}

fn function_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let name = node
        .child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Function);
    set_span(&mut sym, node);
    sym.signature = Some(function_signature(node, source, &name));
    sym.docstring = leading_comment(node, source);
    if let Some(body) = node.child_by_field_name("body") {
        sym.set_calls(collect_calls(body, source));
    }
    Some(sym)
}

/// Methods are top-level symbols whose name is qualified by the receiver
/// type (`Service.Get`).
fn method_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let method_name = node
        .child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())?;
    let receiver = node
        .child_by_field_name("receiver")
        .and_then(|r| receiver_type_name(r, source));

    let (name, parent) = match receiver {
        Some(recv) => (format!("{recv}.{method_name}"), Some(recv)),
        None => (method_name.clone(), None),
    };

    let mut sym = SymbolNode::new(&name, SymbolKind::Method);
    set_span(&mut sym, node);
    sym.parent = parent;
    sym.signature = Some(function_signature(node, source, &method_name));
    sym.docstring = leading_comment(node, source);
    if let Some(body) = node.child_by_field_name("body") {
        sym.set_calls(collect_calls(body, source));
    }
    Some(sym)
}

fn receiver_type_name(receiver: Node, source: &str) -> Option<String> {
    // receiver is a parameter_list with one parameter_declaration whose
    // type may be a pointer type.
    let mut cursor = receiver.walk();
    for param in receiver.named_children(&mut cursor) {
        if let Some(ty) = param.child_by_field_name("type") {
            let text = text_of(source, ty).trim_start_matches('*');
            // Drop generic brackets: Service[T] -> Service.
            let base = text.split('[').next().unwrap_or(text);
            if !base.is_empty() {
                return Some(base.to_string());
            }
        }
    }
    None
}

fn type_symbol(spec: Node, decl: Node, source: &str) -> Option<SymbolNode> {
    let name = spec
        .child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())?;
    let ty = spec.child_by_field_name("type")?;

    let mut sym = match ty.kind() {
        "struct_type" => {
            let mut sym = SymbolNode::new(&name, SymbolKind::Struct);
            for (field_name, field_node) in struct_fields(ty, source) {
                let mut child = SymbolNode::new(field_name, SymbolKind::Field);
                set_span(&mut child, field_node);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
            sym
        }
        "interface_type" => {
            let mut sym = SymbolNode::new(&name, SymbolKind::Interface);
            for (method_name, method_node) in interface_methods(ty, source) {
                let mut child = SymbolNode::new(method_name, SymbolKind::Method);
                set_span(&mut child, method_node);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
            sym
        }
        _ => SymbolNode::new(&name, SymbolKind::TypeParameter),
    };

    set_span(&mut sym, spec);
    sym.docstring = leading_comment(decl, source);
    Some(sym)
}

fn struct_fields<'a>(struct_type: Node<'a>, source: &str) -> Vec<(String, Node<'a>)> {
    let mut fields = Vec::new();
    let Some(list) = struct_type
        .named_children(&mut struct_type.walk())
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return fields;
    };

    let mut cursor = list.walk();
    for decl in list.named_children(&mut cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let mut decl_cursor = decl.walk();
        let mut named = false;
        for child in decl.named_children(&mut decl_cursor) {
            if child.kind() == "field_identifier" {
                fields.push((text_of(source, child).to_string(), decl));
                named = true;
            }
        }
        // Embedded field: use the type name itself.
        if !named {
            if let Some(ty) = decl.child_by_field_name("type") {
                let text = text_of(source, ty).trim_start_matches('*').to_string();
                fields.push((text, decl));
            }
        }
    }
    fields
}

fn interface_methods<'a>(interface: Node<'a>, source: &str) -> Vec<(String, Node<'a>)> {
    let mut methods = Vec::new();
    let mut cursor = interface.walk();
    for child in interface.named_children(&mut cursor) {
        // Grammar versions name this node method_elem or method_spec.
        if matches!(child.kind(), "method_elem" | "method_spec") {
            if let Some(name) = child.child_by_field_name("name") {
                methods.push((text_of(source, name).to_string(), child));
            }
        }
    }
    methods
}

fn collect_value_specs(decl: Node, source: &str, kind: SymbolKind, symbols: &mut Vec<SymbolNode>) {
    let mut cursor = decl.walk();
    for spec in decl.named_children(&mut cursor) {
        if !matches!(spec.kind(), "const_spec" | "var_spec") {
            continue;
        }
        let mut spec_cursor = spec.walk();
        for child in spec.named_children(&mut spec_cursor) {
            if child.kind() == "identifier" {
                let mut sym = SymbolNode::new(text_of(source, child), kind);
                set_span(&mut sym, spec);
                symbols.push(sym);
            }
        }
    }
}

/// `Name(params) results` with types as written.
fn function_signature(node: Node, source: &str, name: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| text_of(source, n).to_string())
        .unwrap_or_else(|| "()".to_string());
    match node.child_by_field_name("result") {
        Some(result) => format!("{name}{params} {}", text_of(source, result)),
        None => format!("{name}{params}"),
    }
}

/// Contiguous `//` comment block immediately above a declaration.
fn leading_comment(node: Node, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut cur = node.prev_sibling();
    let mut expected_line = node.start_position().row;

    while let Some(sib) = cur {
        if sib.kind() != "comment" || sib.end_position().row + 1 != expected_line {
            break;
        }
        let text = text_of(source, sib).trim_start_matches("//").trim();
        lines.push(text.to_string());
        expected_line = sib.start_position().row;
        cur = sib.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

// ============================================================================
// Exports
// ============================================================================

/// Capitalization as visibility: exported iff the name starts uppercase.
fn exports_from_symbols(symbols: &[SymbolNode]) -> Vec<ExportDecl> {
    symbols
        .iter()
        .filter(|s| {
            // Methods use the bare method name for the visibility check.
            let last = s.name.rsplit('.').next().unwrap_or(&s.name);
            last.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        })
        .map(|s| ExportDecl {
            name: s.name.clone(),
            kind: match s.kind {
                SymbolKind::Function | SymbolKind::Method => ExportKind::Function,
                SymbolKind::Interface => ExportKind::Interface,
                SymbolKind::Constant => ExportKind::Const,
                SymbolKind::Variable => ExportKind::Var,
                _ => ExportKind::Type,
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
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            match callee.kind() {
                "identifier" => calls.push(text_of(source, callee).to_string()),
                // Selector calls are recorded as the full selector text.
                "selector_expression" => calls.push(text_of(source, callee).to_string()),
                _ => {}
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(child, source, calls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        GoAnalyzer::new().parse(source, "pkg/main.go").unwrap()
    }

    #[test]
    fn import_specs_with_alias_and_dot() {
        let result = parse(
            "package main\n\nimport (\n\t\"fmt\"\n\tyaml \"gopkg.in/yaml.v2\"\n\t. \"github.com/example/utils\"\n)\n",
        );

        assert_eq!(result.imports.len(), 3);
        assert_eq!(result.imports[0].module, "fmt");
        assert!(result.imports[0].alias.is_none());
        assert_eq!(result.imports[1].module, "gopkg.in/yaml.v2");
        assert_eq!(result.imports[1].alias.as_deref(), Some("yaml"));
        assert_eq!(result.imports[2].alias.as_deref(), Some("."));
    }

    #[test]
    fn struct_and_interface_children() {
        let result = parse(
            r#"package main

// User represents a user.
type User struct {
	ID   int
	Name string
}

type UserService interface {
	GetUser(id int) (*User, error)
	DeleteUser(id int) error
}
"#,
        );

        let user = &result.symbols[0];
        assert_eq!(user.kind, SymbolKind::Struct);
        assert_eq!(user.docstring.as_deref(), Some("User represents a user."));
        let fields = user.children.as_ref().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.kind == SymbolKind::Field));

        let service = &result.symbols[1];
        assert_eq!(service.kind, SymbolKind::Interface);
        let methods = service.children.as_ref().unwrap();
        assert_eq!(methods[0].name, "GetUser");
        assert_eq!(methods[0].kind, SymbolKind::Method);
    }

    #[test]
    fn methods_are_receiver_qualified() {
        let result = parse(
            "package main\n\ntype Store struct{}\n\nfunc (s *Store) Load(id int) error {\n\treturn s.open(id)\n}\n",
        );

        let method = result.symbols.iter().find(|s| s.kind == SymbolKind::Method).unwrap();
        assert_eq!(method.name, "Store.Load");
        assert_eq!(method.parent.as_deref(), Some("Store"));
        assert_eq!(method.calls.as_deref(), Some(&["s.open".to_string()][..]));
    }

    #[test]
    fn capitalization_is_visibility() {
        let result = parse(
            "package main\n\nfunc Public() {}\n\nfunc private() {}\n\nconst MaxSize = 10\nvar internal = 1\n",
        );

        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Public"));
        assert!(names.contains(&"MaxSize"));
        assert!(!names.contains(&"private"));
        assert!(!names.contains(&"internal"));

        let max = result.exports.iter().find(|e| e.name == "MaxSize").unwrap();
        assert_eq!(max.kind, ExportKind::Const);
    }

    #[test]
    fn calls_record_full_selector_text() {
        let result = parse(
            "package main\n\nfunc run() {\n\thelper()\n\tfmt.Println(\"x\")\n\tlog.Fatal(err)\n}\n",
        );

        let calls = result.symbols[0].calls.as_ref().unwrap();
        assert_eq!(
            calls,
            &vec![
                "fmt.Println".to_string(),
                "helper".to_string(),
                "log.Fatal".to_string(),
            ]
        );
    }

    #[test]
    fn other_type_declarations_become_type_parameters() {
        let result = parse("package main\n\ntype Status int\n");
        assert_eq!(result.symbols[0].kind, SymbolKind::TypeParameter);
        let export = &result.exports[0];
        assert_eq!(export.kind, ExportKind::Type);
    }
}
