//! Rust analyzer.
//!
//! Use-declaration flattening, visibility-based exports, the item tree
//! with struct/enum/trait/impl children, and call edges including scoped
//! paths, field expressions, and macro invocations.

use super::support::{only_errors, parse_tree, set_span, text_of};
use super::{outline_from_symbols, Analyzer, ParseResult};
use crate::types::{ExportDecl, ExportKind, ImportEdge, Language, SymbolKind, SymbolNode};
use anyhow::Result;
use tree_sitter::Node;

pub struct RustAnalyzer {
    grammar: tree_sitter::Language,
}

impl RustAnalyzer {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse(&self, source: &str, _path: &str) -> Result<ParseResult> {
        let tree = parse_tree(&self.grammar, source)?;
        let root = tree.root_node();
        if only_errors(root) {
            return Ok(ParseResult::default());
        }

        let mut imports = Vec::new();
        collect_imports(root, source, &mut imports);

        let mut symbols = Vec::new();
        let mut exports = Vec::new();
        collect_items(root, source, None, &mut symbols, &mut exports);
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
        "use_declaration" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                imports.push(use_tree_edge(arg, source));
            }
            return;
        }
        "extern_crate_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                imports.push(ImportEdge::new(text_of(source, name)));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

/// One edge per use-declaration: the module path plus the flattened
/// terminal names (grouped uses are expanded; `*` marks a glob).
fn use_tree_edge(node: Node, source: &str) -> ImportEdge {
    match node.kind() {
        "identifier" | "crate" | "super" | "self" => ImportEdge::new(text_of(source, node)),
        "scoped_identifier" => {
            let path = node
                .child_by_field_name("path")
                .map(|n| text_of(source, n).to_string())
                .unwrap_or_default();
            let mut edge = ImportEdge::new(path);
            if let Some(name) = node.child_by_field_name("name") {
                edge.names.push(text_of(source, name).to_string());
            }
            edge
        }
        "use_as_clause" => {
            let mut edge = node
                .child_by_field_name("path")
                .map(|p| use_tree_edge(p, source))
                .unwrap_or_else(|| ImportEdge::new(""));
            if let Some(alias) = node.child_by_field_name("alias") {
                let alias = text_of(source, alias);
                if let Some(last) = edge.names.pop() {
                    edge.names.push(format!("{last} as {alias}"));
                } else {
                    edge.names.push(format!("{} as {alias}", edge.module));
                }
            }
            edge
        }
        "use_wildcard" => {
            let text = text_of(source, node);
            let module = text.strip_suffix("::*").unwrap_or(text).to_string();
            let mut edge = ImportEdge::new(module);
            edge.names.push("*".to_string());
            edge
        }
        "scoped_use_list" => {
            let path = node
                .child_by_field_name("path")
                .map(|n| text_of(source, n).to_string())
                .unwrap_or_default();
            let mut edge = ImportEdge::new(path);
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_terminals(list, source, &mut edge.names);
            }
            edge
        }
        _ => ImportEdge::new(text_of(source, node)),
    }
}

fn collect_use_terminals(node: Node, source: &str, names: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" | "self" => names.push(text_of(source, child).to_string()),
            "scoped_identifier" => {
                if let Some(name) = child.child_by_field_name("name") {
                    names.push(text_of(source, name).to_string());
                }
            }
            "use_as_clause" => {
                let inner = child
                    .child_by_field_name("path")
                    .map(|p| terminal_name(p, source))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| text_of(source, a))
                    .unwrap_or("");
                names.push(format!("{inner} as {alias}"));
            }
            "use_wildcard" => names.push("*".to_string()),
            "scoped_use_list" => {
                if let Some(list) = child.child_by_field_name("list") {
                    collect_use_terminals(list, source, names);
                }
            }
            "use_list" => collect_use_terminals(child, source, names),
            _ => {}
        }
    }
}

fn terminal_name(node: Node, source: &str) -> String {
    match node.kind() {
        "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|n| text_of(source, n).to_string())
            .unwrap_or_default(),
        _ => text_of(source, node).to_string(),
    }
}

// ============================================================================
// Items
// ============================================================================

fn collect_items(
    container: Node,
    source: &str,
    parent: Option<&str>,
    symbols: &mut Vec<SymbolNode>,
    exports: &mut Vec<ExportDecl>,
) {
    let mut cursor = container.walk();
    for node in container.children(&mut cursor) {
        match node.kind() {
            "function_item" => {
                if let Some(sym) = function_symbol(node, source, parent) {
                    push_export(&sym, node, ExportKind::Function, exports);
                    symbols.push(sym);
                }
            }
            "struct_item" => {
                if let Some(sym) = struct_symbol(node, source) {
                    push_export(&sym, node, ExportKind::Type, exports);
                    symbols.push(sym);
                }
            }
            "enum_item" => {
                if let Some(sym) = enum_symbol(node, source) {
                    push_export(&sym, node, ExportKind::Type, exports);
                    symbols.push(sym);
                }
            }
            "trait_item" => {
                if let Some(sym) = trait_symbol(node, source) {
                    push_export(&sym, node, ExportKind::Interface, exports);
                    symbols.push(sym);
                }
            }
            "impl_item" => {
                if let Some(sym) = impl_symbol(node, source) {
                    symbols.push(sym);
                }
            }
            "type_item" => {
                if let Some(sym) = named_symbol(node, source, SymbolKind::TypeParameter) {
                    push_export(&sym, node, ExportKind::Type, exports);
                    symbols.push(sym);
                }
            }
            "const_item" | "static_item" => {
                if let Some(sym) = named_symbol(node, source, SymbolKind::Constant) {
                    push_export(&sym, node, ExportKind::Const, exports);
                    symbols.push(sym);
                }
            }
            "mod_item" => {
                if let Some(sym) = module_symbol(node, source, exports) {
                    push_export(&sym, node, ExportKind::Type, exports);
                    symbols.push(sym);
                }
            }
            "use_declaration" => {
                // pub use re-exports.
                if is_public(node) {
                    if let Some(arg) = node.child_by_field_name("argument") {
                        let edge = use_tree_edge(arg, source);
                        let names = if edge.names.is_empty() {
                            vec![edge.module.clone()]
                        } else {
                            edge.names
                        };
                        for name in names {
                            let exported =
                                name.rsplit(" as ").next().unwrap_or(&name).to_string();
                            exports.push(ExportDecl {
                                name: exported,
                                kind: ExportKind::Const,
                                line: node.start_position().row as u32 + 1,
                                signature: None,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_export(sym: &SymbolNode, node: Node, kind: ExportKind, exports: &mut Vec<ExportDecl>) {
    if is_public(node) {
        exports.push(ExportDecl {
            name: sym.name.clone(),
            kind,
            line: sym.line,
            signature: sym.signature.clone(),
        });
    }
}

fn is_public(node: Node) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == "visibility_modifier");
    result
}

fn item_name(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())
}

fn named_symbol(node: Node, source: &str, kind: SymbolKind) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(name, kind);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);
    Some(sym)
}

fn function_symbol(node: Node, source: &str, parent: Option<&str>) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Function);
    set_span(&mut sym, node);
    sym.parent = parent.map(|p| p.to_string());
    sym.signature = Some(function_signature(node, source, &name));
    sym.docstring = doc_comment_of(node, source);
    if let Some(body) = node.child_by_field_name("body") {
        sym.set_calls(collect_calls(body, source));
    }
    Some(sym)
}

fn struct_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Struct);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for field in body.named_children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            if let Some(field_name) = item_name(field, source) {
                let mut child = SymbolNode::new(field_name, SymbolKind::Field);
                set_span(&mut child, field);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
        }
    }
    Some(sym)
}

fn enum_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Enum);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for variant in body.named_children(&mut cursor) {
            if variant.kind() != "enum_variant" {
                continue;
            }
            if let Some(variant_name) = item_name(variant, source) {
                let mut child = SymbolNode::new(variant_name, SymbolKind::EnumMember);
                set_span(&mut child, variant);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
        }
    }
    Some(sym)
}

fn trait_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Trait);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if !matches!(member.kind(), "function_signature_item" | "function_item") {
                continue;
            }
            if let Some(method_name) = item_name(member, source) {
                let mut child = SymbolNode::new(&method_name, SymbolKind::Method);
                set_span(&mut child, member);
                child.parent = Some(name.clone());
                child.signature = Some(function_signature(member, source, &method_name));
                child.docstring = doc_comment_of(member, source);
                if let Some(body) = member.child_by_field_name("body") {
                    child.set_calls(collect_calls(body, source));
                }
                sym.push_child(child);
            }
        }
    }
    Some(sym)
}

/// Impl blocks are symbols named `impl <Target>` with the methods as
/// children; the target type name is the parent label.
fn impl_symbol(node: Node, source: &str) -> Option<SymbolNode> {
    let target = node.child_by_field_name("type").map(|ty| {
        let text = text_of(source, ty);
        text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .find(|s| !s.is_empty())
            .unwrap_or(text)
            .to_string()
    })?;

    let mut sym = SymbolNode::new(format!("impl {target}"), SymbolKind::Class);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() != "function_item" {
                continue;
            }
            if let Some(mut child) = function_symbol(member, source, Some(&target)) {
                child.kind = SymbolKind::Method;
                sym.push_child(child);
            }
        }
    }
    Some(sym)
}

fn module_symbol(
    node: Node,
    source: &str,
    exports: &mut Vec<ExportDecl>,
) -> Option<SymbolNode> {
    let name = item_name(node, source)?;
    let mut sym = SymbolNode::new(&name, SymbolKind::Module);
    set_span(&mut sym, node);
    sym.docstring = doc_comment_of(node, source);

    if let Some(body) = node.child_by_field_name("body") {
        let mut children = Vec::new();
        collect_items(body, source, Some(&name), &mut children, exports);
        for mut child in children {
            child.parent = Some(name.clone());
            sym.push_child(child);
        }
    }
    Some(sym)
}

/// `fn name(params) -> ret` with types as written.
fn function_signature(node: Node, source: &str, name: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| text_of(source, n).to_string())
        .unwrap_or_else(|| "()".to_string());
    match node.child_by_field_name("return_type") {
        Some(ret) => format!("fn {name}{params} -> {}", text_of(source, ret)),
        None => format!("fn {name}{params}"),
    }
}

/// Leading `///` doc comment lines, markers stripped, attributes skipped.
fn doc_comment_of(node: Node, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut cur = node.prev_sibling();

    while let Some(sib) = cur {
        match sib.kind() {
            "line_comment" => {
                let text = text_of(source, sib);
                if let Some(stripped) = text.strip_prefix("///") {
                    lines.push(stripped.trim().to_string());
                    cur = sib.prev_sibling();
                    continue;
                }
                break;
            }
            "attribute_item" => {
                cur = sib.prev_sibling();
                continue;
            }
            _ => break,
        }
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
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
    match node.kind() {
        "call_expression" => {
            if let Some(callee) = node.child_by_field_name("function") {
                match callee.kind() {
                    "identifier" => calls.push(text_of(source, callee).to_string()),
                    "scoped_identifier" => {
                        let full = text_of(source, callee).to_string();
                        if let Some(name) = callee.child_by_field_name("name") {
                            let last = text_of(source, name).to_string();
                            if last != full {
                                calls.push(last);
                            }
                        }
                        calls.push(full);
                    }
                    "field_expression" => {
                        if let Some(field) = callee.child_by_field_name("field") {
                            calls.push(text_of(source, field).to_string());
                            if let Some(receiver) = receiver_form(callee, source) {
                                calls.push(receiver);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "macro_invocation" => {
            if let Some(mac) = node.child_by_field_name("macro") {
                calls.push(format!("{}!", text_of(source, mac)));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(child, source, calls);
    }
}

/// `receiver.method` when the receiver is a plain field chain and not
/// `self`.
fn receiver_form(callee: Node, source: &str) -> Option<String> {
    let value = callee.child_by_field_name("value")?;
    if value.kind() == "self" {
        return None;
    }
    if !is_field_chain(value) {
        return None;
    }
    Some(text_of(source, callee).to_string())
}

fn is_field_chain(node: Node) -> bool {
    match node.kind() {
        "identifier" => true,
        "field_expression" => node
            .child_by_field_name("value")
            .map(is_field_chain)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        RustAnalyzer::new().parse(source, "src/lib.rs").unwrap()
    }

    #[test]
    fn use_declarations_flatten_groups() {
        let result = parse(
            "use std::collections::{HashMap, HashSet};\nuse std::fmt;\nuse crate::types::Symbol as Sym;\nuse super::*;\nextern crate log;\n",
        );

        assert_eq!(result.imports.len(), 5);
        assert_eq!(result.imports[0].module, "std::collections");
        assert_eq!(result.imports[0].names, vec!["HashMap", "HashSet"]);
        assert_eq!(result.imports[1].module, "std");
        assert_eq!(result.imports[1].names, vec!["fmt"]);
        assert_eq!(result.imports[2].names, vec!["Symbol as Sym"]);
        assert_eq!(result.imports[3].module, "super");
        assert_eq!(result.imports[3].names, vec!["*"]);
        assert_eq!(result.imports[4].module, "log");
    }

    #[test]
    fn public_items_are_exported() {
        let result = parse(
            r#"
pub fn visible() {}
fn hidden() {}
pub struct User { pub id: u32, name: String }
pub trait Service { fn run(&self); }
pub const MAX: usize = 8;
pub use crate::types::Symbol;
"#,
        );

        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"visible"));
        assert!(!names.contains(&"hidden"));
        assert!(names.contains(&"User"));
        assert!(names.contains(&"Service"));
        assert!(names.contains(&"MAX"));
        assert!(names.contains(&"Symbol"));

        let service = result.exports.iter().find(|e| e.name == "Service").unwrap();
        assert_eq!(service.kind, ExportKind::Interface);
    }

    #[test]
    fn struct_enum_trait_children() {
        let result = parse(
            r#"
/// A user.
pub struct User {
    pub id: u32,
    name: String,
}

pub enum Status { Pending, Done }

pub trait Store {
    fn load(&self, id: u32) -> Option<User>;
}
"#,
        );

        let user = &result.symbols[0];
        assert_eq!(user.kind, SymbolKind::Struct);
        assert_eq!(user.docstring.as_deref(), Some("A user."));
        let fields = user.children.as_ref().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].kind, SymbolKind::Field);

        let status = &result.symbols[1];
        let variants = status.children.as_ref().unwrap();
        assert!(variants.iter().all(|v| v.kind == SymbolKind::EnumMember));

        let store = &result.symbols[2];
        let methods = store.children.as_ref().unwrap();
        assert_eq!(methods[0].name, "load");
        assert_eq!(
            methods[0].signature.as_deref(),
            Some("fn load(&self, id: u32) -> Option<User>")
        );
    }

    #[test]
    fn impl_blocks_group_methods() {
        let result = parse(
            r#"
struct Greeter;

impl Greeter {
    pub fn new() -> Self { Greeter }
    fn hello(&self) { self.format(); other.render(); }
}
"#,
        );

        let imp = result
            .symbols
            .iter()
            .find(|s| s.name == "impl Greeter")
            .unwrap();
        let methods = imp.children.as_ref().unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name, "new");
        assert_eq!(methods[0].kind, SymbolKind::Method);
        assert_eq!(methods[0].parent.as_deref(), Some("Greeter"));

        // self.format() records the bare name; other.render() both forms.
        let hello = &methods[1];
        assert_eq!(
            hello.calls.as_deref(),
            Some(
                &[
                    "format".to_string(),
                    "other.render".to_string(),
                    "render".to_string(),
                ][..]
            )
        );
    }

    #[test]
    fn macros_are_suffixed() {
        let result = parse(
            "fn run() {\n    println!(\"x\");\n    let s = format!(\"y\");\n    helper();\n}\n",
        );

        let calls = result.symbols[0].calls.as_ref().unwrap();
        assert_eq!(
            calls,
            &vec![
                "format!".to_string(),
                "helper".to_string(),
                "println!".to_string(),
            ]
        );
    }

    #[test]
    fn scoped_calls_record_both_forms() {
        let result = parse("fn run() {\n    Vec::new();\n    inner::helper();\n}\n");
        let calls = result.symbols[0].calls.as_ref().unwrap();
        assert!(calls.contains(&"Vec::new".to_string()));
        assert!(calls.contains(&"new".to_string()));
        assert!(calls.contains(&"inner::helper".to_string()));
        assert!(calls.contains(&"helper".to_string()));
    }

    #[test]
    fn modules_nest_their_items() {
        let result = parse(
            "pub mod storage {\n    pub struct Disk;\n    pub fn open() {}\n}\n",
        );

        let module = &result.symbols[0];
        assert_eq!(module.kind, SymbolKind::Module);
        let children = module.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Disk");
        assert_eq!(children[0].parent.as_deref(), Some("storage"));
        assert_eq!(children[1].name, "open");
        // Functions nested in a module keep their Function kind.
        assert_eq!(children[1].kind, SymbolKind::Function);
    }
}
