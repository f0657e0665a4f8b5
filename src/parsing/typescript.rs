//! TypeScript / JavaScript / JSX analyzer.
//!
//! Covers static and dynamic imports, export declarations, the top-level
//! symbol tree with class/interface/enum children, shape-based outgoing
//! calls, and the optional view-component and HTTP-endpoint detectors.

use super::support::{line_of, only_errors, parse_tree, set_span, strip_quotes, text_of};
use super::{outline_from_symbols, Analyzer, ParseResult};
use crate::types::{
    ComponentDecl, ComponentKind, EndpointDecl, ExportDecl, ExportKind, ImportEdge, Language,
    SymbolKind, SymbolNode,
};
use anyhow::Result;
use tree_sitter::Node;

const HTTP_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];
const FILE_ROUTE_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];
const SERVER_FRAMEWORKS: &[&str] = &["express", "koa", "fastify"];
const ROUTER_RECEIVERS: &[&str] = &["router", "app", "server"];

pub struct TypeScriptAnalyzer {
    grammar: tree_sitter::Language,
}

impl TypeScriptAnalyzer {
    pub fn new_typescript() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }

    pub fn new_tsx() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// The JavaScript grammar shares its statement shapes with the
    /// TypeScript one, so a single walker serves both.
    pub fn new_javascript() -> Self {
        Self {
            grammar: tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl Analyzer for TypeScriptAnalyzer {
    fn language(&self) -> Language {
        Language::Typescript
    }

    fn parse(&self, source: &str, path: &str) -> Result<ParseResult> {
        let tree = parse_tree(&self.grammar, source)?;
        let root = tree.root_node();
        if only_errors(root) {
            return Ok(ParseResult::default());
        }

        let mut imports = Vec::new();
        collect_imports(root, source, &mut imports);

        let mut exports = Vec::new();
        collect_exports(root, source, &mut exports);

        let symbols = collect_top_level_symbols(root, source);
        let outline = outline_from_symbols(&symbols);

        let ui_components = if has_view_import(&imports) {
            let components = detect_components(root, source);
            (!components.is_empty()).then_some(components)
        } else {
            None
        };

        let mut endpoints = Vec::new();
        let frameworks = imported_frameworks(&imports);
        if !frameworks.is_empty() {
            // A single imported framework settles inference outright;
            // otherwise fall through to parameter and receiver cues.
            let settled = (frameworks.len() == 1).then(|| frameworks[0]);
            collect_route_calls(root, source, settled, &mut endpoints);
        }
        collect_file_routes(root, source, path, &mut endpoints);
        let api_endpoints = (!endpoints.is_empty()).then_some(endpoints);

        Ok(ParseResult {
            imports,
            exports,
            symbols,
            outline,
            ui_components,
            api_endpoints,
        })
    }
}

// ============================================================================
// Imports
// ============================================================================

fn collect_imports(node: Node, source: &str, imports: &mut Vec<ImportEdge>) {
    match node.kind() {
        "import_statement" => {
            if let Some(edge) = import_edge_of(node, source) {
                imports.push(edge);
            }
            return;
        }
        "call_expression" => {
            // Dynamic import with a string literal argument; non-literal
            // arguments are ignored.
            if let Some(func) = node.child_by_field_name("function") {
                if func.kind() == "import" {
                    if let Some(module) = first_string_argument(node, source) {
                        let mut edge = ImportEdge::new(module);
                        edge.names.push("dynamic".to_string());
                        imports.push(edge);
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

fn import_edge_of(node: Node, source: &str) -> Option<ImportEdge> {
    let module = node
        .child_by_field_name("source")
        .map(|n| strip_quotes(text_of(source, n)))?;
    let mut edge = ImportEdge::new(module);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for part in child.children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => {
                    edge.default_import = true;
                    edge.names.push(text_of(source, part).to_string());
                }
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    for ns_child in part.children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            edge.alias = Some(text_of(source, ns_child).to_string());
                        }
                    }
                }
                "named_imports" => {
                    let mut named_cursor = part.walk();
                    for spec in part.children(&mut named_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let name = spec
                            .child_by_field_name("name")
                            .map(|n| text_of(source, n).to_string());
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|n| text_of(source, n).to_string());
                        if let Some(name) = name {
                            edge.names.push(match alias {
                                Some(a) => format!("{name} as {a}"),
                                None => name,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Some(edge)
}

fn first_string_argument(call: Node, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        return match arg.kind() {
            "string" => Some(strip_quotes(text_of(source, arg))),
            _ => None,
        };
    }
    None
}

// ============================================================================
// Exports
// ============================================================================

fn collect_exports(root: Node, source: &str, exports: &mut Vec<ExportDecl>) {
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        if node.kind() != "export_statement" {
            continue;
        }

        if is_default_export(node) {
            exports.push(ExportDecl {
                name: "default".to_string(),
                kind: ExportKind::Default,
                line: line_of(node),
                signature: None,
            });
            continue;
        }

        if let Some(decl) = node.child_by_field_name("declaration") {
            push_declaration_exports(decl, source, exports);
            continue;
        }

        // Re-export or local export clause: export { a, b as c } [from 'x']
        let mut clause_cursor = node.walk();
        for child in node.children(&mut clause_cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = child.walk();
            for spec in child.children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let exported = spec
                    .child_by_field_name("alias")
                    .or_else(|| spec.child_by_field_name("name"))
                    .map(|n| text_of(source, n).to_string());
                if let Some(name) = exported {
                    exports.push(ExportDecl {
                        name,
                        kind: ExportKind::Const,
                        line: line_of(spec),
                        signature: None,
                    });
                }
            }
        }
    }
}

fn is_default_export(export: Node) -> bool {
    let mut cursor = export.walk();
    let result = export.children(&mut cursor).any(|c| c.kind() == "default");
    result
}

fn push_declaration_exports(decl: Node, source: &str, exports: &mut Vec<ExportDecl>) {
    let line = line_of(decl);
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = name_of(decl, source) {
                let signature = function_signature(decl, source, &name);
                exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Function,
                    line,
                    signature: Some(signature),
                });
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = name_of(decl, source) {
                exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Class,
                    line,
                    signature: None,
                });
            }
        }
        "interface_declaration" => {
            if let Some(name) = name_of(decl, source) {
                exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Interface,
                    line,
                    signature: None,
                });
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = name_of(decl, source) {
                exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Type,
                    line,
                    signature: None,
                });
            }
        }
        "enum_declaration" => {
            if let Some(name) = name_of(decl, source) {
                exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Const,
                    line,
                    signature: None,
                });
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let kind = declaration_export_kind(decl, source);
            let mut cursor = decl.walk();
            for declarator in decl.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = name_of(declarator, source) {
                    exports.push(ExportDecl {
                        name,
                        kind,
                        line: line_of(declarator),
                        signature: None,
                    });
                }
            }
        }
        _ => {}
    }
}

fn declaration_export_kind(decl: Node, source: &str) -> ExportKind {
    match decl.child(0).map(|c| text_of(source, c)) {
        Some("const") => ExportKind::Const,
        Some("let") => ExportKind::Let,
        _ => ExportKind::Var,
    }
}

// ============================================================================
// Symbols
// ============================================================================

fn collect_top_level_symbols(root: Node, source: &str) -> Vec<SymbolNode> {
    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        let decl = if node.kind() == "export_statement" {
            match node.child_by_field_name("declaration") {
                Some(d) => d,
                None => continue,
            }
        } else {
            node
        };
        push_declaration_symbols(decl, source, &mut symbols);
    }
    symbols
}

fn push_declaration_symbols(decl: Node, source: &str, symbols: &mut Vec<SymbolNode>) {
    if matches!(decl.kind(), "lexical_declaration" | "variable_declaration") {
        let is_const = decl
            .child(0)
            .map(|c| text_of(source, c) == "const")
            .unwrap_or(false);
        let mut cursor = decl.walk();
        for declarator in decl.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            if let Some(sym) = variable_symbol(declarator, is_const, decl, source) {
                symbols.push(sym);
            }
        }
    } else if let Some(sym) = symbol_of_declaration(decl, source) {
        symbols.push(sym);
    }
}

fn symbol_of_declaration(decl: Node, source: &str) -> Option<SymbolNode> {
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let name = name_of(decl, source)?;
            let mut sym = SymbolNode::new(&name, SymbolKind::Function);
            set_span(&mut sym, decl);
            sym.signature = Some(function_signature(decl, source, &name));
            sym.docstring = doc_comment_of(decl, source);
            if let Some(body) = decl.child_by_field_name("body") {
                sym.set_calls(collect_calls(body, source));
            }
            Some(sym)
        }
        "class_declaration" | "abstract_class_declaration" => Some(class_symbol(decl, source)),
        "interface_declaration" => Some(interface_symbol(decl, source)),
        "enum_declaration" => Some(enum_symbol(decl, source)),
        "type_alias_declaration" => {
            let name = name_of(decl, source)?;
            let mut sym = SymbolNode::new(name, SymbolKind::TypeParameter);
            set_span(&mut sym, decl);
            sym.docstring = doc_comment_of(decl, source);
            Some(sym)
        }
        _ => None,
    }
}

fn class_symbol(decl: Node, source: &str) -> SymbolNode {
    let name = name_of(decl, source).unwrap_or_else(|| "<anonymous>".to_string());
    let mut sym = SymbolNode::new(&name, SymbolKind::Class);
    set_span(&mut sym, decl);
    sym.docstring = doc_comment_of(decl, source);

    if let Some(body) = decl.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" => {
                    if let Some(method_name) = name_of(member, source) {
                        let kind = if method_name == "constructor" {
                            SymbolKind::Constructor
                        } else {
                            SymbolKind::Method
                        };
                        let mut child = SymbolNode::new(&method_name, kind);
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
                "public_field_definition" | "field_definition" => {
                    if let Some(field_name) = name_of(member, source) {
                        let mut child = SymbolNode::new(field_name, SymbolKind::Property);
                        set_span(&mut child, member);
                        child.parent = Some(name.clone());
                        sym.push_child(child);
                    }
                }
                _ => {}
            }
        }
    }
    sym
}

fn interface_symbol(decl: Node, source: &str) -> SymbolNode {
    let name = name_of(decl, source).unwrap_or_else(|| "<anonymous>".to_string());
    let mut sym = SymbolNode::new(&name, SymbolKind::Interface);
    set_span(&mut sym, decl);
    sym.docstring = doc_comment_of(decl, source);

    if let Some(body) = decl.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let (kind, member_name) = match member.kind() {
                "property_signature" => (SymbolKind::Property, name_of(member, source)),
                "method_signature" => (SymbolKind::Method, name_of(member, source)),
                _ => (SymbolKind::Property, None),
            };
            if let Some(member_name) = member_name {
                let mut child = SymbolNode::new(member_name, kind);
                set_span(&mut child, member);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
        }
    }
    sym
}

fn enum_symbol(decl: Node, source: &str) -> SymbolNode {
    let name = name_of(decl, source).unwrap_or_else(|| "<anonymous>".to_string());
    let mut sym = SymbolNode::new(&name, SymbolKind::Enum);
    set_span(&mut sym, decl);
    sym.docstring = doc_comment_of(decl, source);

    if let Some(body) = decl.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let member_name = match member.kind() {
                "enum_assignment" => name_of(member, source),
                "property_identifier" => Some(text_of(source, member).to_string()),
                _ => None,
            };
            if let Some(member_name) = member_name {
                let mut child = SymbolNode::new(member_name, SymbolKind::EnumMember);
                set_span(&mut child, member);
                child.parent = Some(name.clone());
                sym.push_child(child);
            }
        }
    }
    sym
}

fn variable_symbol(
    declarator: Node,
    is_const: bool,
    decl: Node,
    source: &str,
) -> Option<SymbolNode> {
    let name = name_of(declarator, source)?;

    // Arrow and function expressions assigned to a name behave as
    // function declarations.
    if let Some(value) = declarator.child_by_field_name("value") {
        if matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "function"
        ) {
            let mut sym = SymbolNode::new(&name, SymbolKind::Function);
            set_span(&mut sym, declarator);
            sym.signature = Some(function_signature(value, source, &name));
            sym.docstring = doc_comment_of(decl, source);
            if let Some(body) = value.child_by_field_name("body") {
                sym.set_calls(collect_calls(body, source));
            }
            return Some(sym);
        }
    }

    let kind = if is_const {
        SymbolKind::Constant
    } else {
        SymbolKind::Variable
    };
    let mut sym = SymbolNode::new(name, kind);
    set_span(&mut sym, declarator);
    sym.docstring = doc_comment_of(decl, source);
    Some(sym)
}

// ============================================================================
// Signatures, docs, calls
// ============================================================================

fn name_of(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| text_of(source, n).to_string())
}

/// `name(param: type, ...): return_type` using the annotations as written.
fn function_signature(node: Node, source: &str, name: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
        .map(|n| text_of(source, n).to_string())
        .unwrap_or_else(|| "()".to_string());
    let params = if params.starts_with('(') {
        params
    } else {
        format!("({params})")
    };
    let ret = node
        .child_by_field_name("return_type")
        .map(|n| text_of(source, n).to_string())
        .unwrap_or_default();
    format!("{name}{params}{ret}")
}

/// First leading documentation comment (`/** ... */`), cleaned of comment
/// markers.
fn doc_comment_of(node: Node, source: &str) -> Option<String> {
    let mut cur = node.prev_sibling();
    while let Some(sib) = cur {
        if sib.kind() == "comment" {
            let text = text_of(source, sib);
            if text.starts_with("/**") {
                return Some(clean_block_comment(text));
            }
            cur = sib.prev_sibling();
            continue;
        }
        break;
    }
    // Exported declarations carry the comment on the export statement.
    if let Some(parent) = node.parent() {
        if parent.kind() == "export_statement" {
            return doc_comment_of(parent, source);
        }
    }
    None
}

fn clean_block_comment(text: &str) -> String {
    let inner = text
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .trim();
    inner
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collect outgoing call names from a body subtree: plain calls, property
/// access calls (both the method name and `receiver.method` when the
/// receiver is not `this`), constructor calls, and awaited calls.
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
                    "member_expression" => {
                        if let Some(property) = callee.child_by_field_name("property") {
                            let method = text_of(source, property).to_string();
                            calls.push(method);
                            if let Some(receiver) = dotted_receiver(callee, source) {
                                calls.push(receiver);
                            }
                        }
                    }
                    "import" => {} // dynamic import, recorded as an import edge
                    _ => {}
                }
            }
        }
        "new_expression" => {
            if let Some(ctor) = node.child_by_field_name("constructor") {
                let text = text_of(source, ctor);
                if let Some(name) = text.rsplit('.').next() {
                    if !name.is_empty() {
                        calls.push(name.to_string());
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(child, source, calls);
    }
}

/// `receiver.method` text for a member callee, provided the whole chain is
/// a plain dotted identifier path and the receiver is not `this`.
fn dotted_receiver(callee: Node, source: &str) -> Option<String> {
    let object = callee.child_by_field_name("object")?;
    if object.kind() == "this" {
        return None;
    }
    if !is_dotted_chain(object) {
        return None;
    }
    Some(text_of(source, callee).to_string())
}

fn is_dotted_chain(node: Node) -> bool {
    match node.kind() {
        "identifier" | "property_identifier" => true,
        "member_expression" => {
            let object_ok = node.child_by_field_name("object").map(is_dotted_chain);
            let property_ok = node.child_by_field_name("property").map(is_dotted_chain);
            object_ok == Some(true) && property_ok == Some(true)
        }
        _ => false,
    }
}

// ============================================================================
// View component detection
// ============================================================================

fn has_view_import(imports: &[ImportEdge]) -> bool {
    imports
        .iter()
        .any(|i| i.module == "react" || i.module.starts_with("react/") || i.module == "preact")
}

fn detect_components(root: Node, source: &str) -> Vec<ComponentDecl> {
    let mut components = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        let decl = if node.kind() == "export_statement" {
            match node.child_by_field_name("declaration") {
                Some(d) => d,
                None => continue,
            }
        } else {
            node
        };

        match decl.kind() {
            "function_declaration" => {
                if let Some(name) = name_of(decl, source) {
                    let jsx = decl
                        .child_by_field_name("body")
                        .map(contains_jsx)
                        .unwrap_or(false);
                    if jsx || starts_uppercase(&name) {
                        components.push(ComponentDecl {
                            name,
                            kind: ComponentKind::Functional,
                            line: line_of(decl),
                            hooks: hook_names(decl, source),
                        });
                    }
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = name_of(decl, source) {
                    if heritage_mentions_component(decl, source) {
                        components.push(ComponentDecl {
                            name,
                            kind: ComponentKind::Class,
                            line: line_of(decl),
                            hooks: Vec::new(),
                        });
                    }
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut decl_cursor = decl.walk();
                for declarator in decl.named_children(&mut decl_cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = name_of(declarator, source) else {
                        continue;
                    };
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if let Some(component) =
                        component_of_initializer(&name, declarator, value, source)
                    {
                        components.push(component);
                    }
                }
            }
            _ => {}
        }
    }
    components
}

fn component_of_initializer(
    name: &str,
    declarator: Node,
    value: Node,
    source: &str,
) -> Option<ComponentDecl> {
    match value.kind() {
        "arrow_function" | "function_expression" | "function" => {
            let jsx = value
                .child_by_field_name("body")
                .map(contains_jsx)
                .unwrap_or(false);
            (jsx || starts_uppercase(name)).then(|| ComponentDecl {
                name: name.to_string(),
                kind: ComponentKind::Functional,
                line: line_of(declarator),
                hooks: hook_names(value, source),
            })
        }
        "call_expression" => {
            let callee = value.child_by_field_name("function")?;
            let callee_name = text_of(source, callee)
                .rsplit('.')
                .next()
                .unwrap_or("")
                .to_string();
            let kind = match callee_name.as_str() {
                "forwardRef" => ComponentKind::ForwardRef,
                "memo" => ComponentKind::Memo,
                _ if callee_name.starts_with("with")
                    && callee_name.len() > 4
                    && wraps_uppercase_identifier(value, source) =>
                {
                    ComponentKind::Hoc
                }
                _ => return None,
            };
            Some(ComponentDecl {
                name: name.to_string(),
                kind,
                line: line_of(declarator),
                hooks: hook_names(value, source),
            })
        }
        _ => None,
    }
}

fn wraps_uppercase_identifier(call: Node, source: &str) -> bool {
    let Some(args) = call.child_by_field_name("arguments") else {
        return false;
    };
    let mut cursor = args.walk();
    let result = args
        .named_children(&mut cursor)
        .any(|arg| arg.kind() == "identifier" && starts_uppercase(text_of(source, arg)));
    result
}

fn heritage_mentions_component(decl: Node, source: &str) -> bool {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() == "class_heritage" {
            let text = text_of(source, child);
            return text.contains("Component") || text.contains("PureComponent");
        }
    }
    false
}

fn contains_jsx(node: Node) -> bool {
    if matches!(
        node.kind(),
        "jsx_element" | "jsx_self_closing_element" | "jsx_fragment"
    ) {
        return true;
    }
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(contains_jsx);
    result
}

/// Identifiers of called expressions that look like hooks: start with
/// `use` and are longer than three characters.
fn hook_names(scope: Node, source: &str) -> Vec<String> {
    let mut hooks = Vec::new();
    collect_hooks(scope, source, &mut hooks);
    hooks
}

fn collect_hooks(node: Node, source: &str, hooks: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            if callee.kind() == "identifier" {
                let name = text_of(source, callee);
                if name.starts_with("use") && name.len() > 3 && !hooks.iter().any(|h| h == name) {
                    hooks.push(name.to_string());
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_hooks(child, source, hooks);
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

// ============================================================================
// Endpoint detection
// ============================================================================

fn imported_frameworks(imports: &[ImportEdge]) -> Vec<&'static str> {
    SERVER_FRAMEWORKS
        .iter()
        .filter(|f| {
            imports
                .iter()
                .any(|i| i.module == **f || i.module.starts_with(&format!("{}/", f)))
        })
        .copied()
        .collect()
}

fn collect_route_calls(
    node: Node,
    source: &str,
    imported: Option<&'static str>,
    endpoints: &mut Vec<EndpointDecl>,
) {
    if node.kind() == "call_expression" {
        if let Some(endpoint) = route_call_endpoint(node, source, imported) {
            endpoints.push(endpoint);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_route_calls(child, source, imported, endpoints);
    }
}

fn route_call_endpoint(
    call: Node,
    source: &str,
    imported: Option<&'static str>,
) -> Option<EndpointDecl> {
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let method = callee
        .child_by_field_name("property")
        .map(|n| text_of(source, n))?;
    if !HTTP_METHODS.contains(&method) {
        return None;
    }
    let receiver = callee.child_by_field_name("object")?;
    if receiver.kind() != "identifier" {
        return None;
    }
    let receiver_name = text_of(source, receiver);

    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let arg_nodes: Vec<Node> = args.named_children(&mut cursor).collect();
    let path_node = arg_nodes.first()?;
    if path_node.kind() != "string" {
        return None;
    }
    let path = strip_quotes(text_of(source, *path_node));

    let handler_node = if arg_nodes.len() >= 2 {
        arg_nodes.last()
    } else {
        None
    };
    let handler = handler_node
        .map(|n| handler_label(*n, source))
        .unwrap_or_else(|| "<anonymous>".to_string());

    let middleware: Vec<String> = arg_nodes
        .iter()
        .skip(1)
        .take(arg_nodes.len().saturating_sub(2))
        .filter(|n| n.kind() == "identifier")
        .map(|n| text_of(source, *n).to_string())
        .collect();

    // Framework inference: module import, then handler parameter names,
    // then the receiver identifier, resolved in that order.
    let framework = infer_framework(imported, handler_node, source, receiver_name);

    Some(EndpointDecl {
        method: method.to_uppercase(),
        path,
        handler,
        line: line_of(call),
        framework: framework.to_string(),
        middleware,
    })
}

fn handler_label(node: Node, source: &str) -> String {
    match node.kind() {
        "identifier" => text_of(source, node).to_string(),
        "member_expression" => text_of(source, node).to_string(),
        _ => "<anonymous>".to_string(),
    }
}

fn infer_framework(
    imported: Option<&'static str>,
    handler: Option<&Node>,
    source: &str,
    receiver: &str,
) -> &'static str {
    if let Some(framework) = imported {
        return framework;
    }
    if let Some(handler) = handler {
        if let Some(params) = handler.child_by_field_name("parameters") {
            let text = text_of(source, params);
            if text.contains("ctx") {
                return "koa";
            }
            if text.contains("req") || text.contains("res") {
                return "express";
            }
            if text.contains("request") || text.contains("reply") {
                return "fastify";
            }
        }
    }
    if ROUTER_RECEIVERS.contains(&receiver) {
        return "express";
    }
    "unknown"
}

/// Exported top-level functions named after HTTP verbs are file-routed
/// endpoints (app-router convention); the path is the file itself.
fn collect_file_routes(root: Node, source: &str, path: &str, endpoints: &mut Vec<EndpointDecl>) {
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        if node.kind() != "export_statement" {
            continue;
        }
        let Some(decl) = node.child_by_field_name("declaration") else {
            continue;
        };
        if decl.kind() != "function_declaration" {
            continue;
        }
        let Some(name) = name_of(decl, source) else {
            continue;
        };
        if FILE_ROUTE_METHODS.contains(&name.as_str()) {
            endpoints.push(EndpointDecl {
                method: name.clone(),
                path: path.to_string(),
                handler: name,
                line: line_of(decl),
                framework: "nextjs".to_string(),
                middleware: Vec::new(),
            });
        }
    }
}
