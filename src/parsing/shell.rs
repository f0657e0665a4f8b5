//! Shell analyzer.
//!
//! Both definition styles (`name() { .. }` and `function name { .. }`),
//! positional-parameter signatures, `source`/`.` imports, `export` lines,
//! and call edges restricted to names defined in the same file.

use super::support::{only_errors, parse_tree, set_span, strip_quotes, text_of};
use super::{outline_from_symbols, Analyzer, ParseResult};
use crate::types::{ExportDecl, ExportKind, ImportEdge, Language, SymbolKind, SymbolNode};
use anyhow::Result;
use tree_sitter::Node;

pub struct ShellAnalyzer {
    grammar: tree_sitter::Language,
}

impl ShellAnalyzer {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_bash::LANGUAGE.into(),
        }
    }
}

impl Default for ShellAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for ShellAnalyzer {
    fn language(&self) -> Language {
        Language::Shell
    }

    fn parse(&self, source: &str, _path: &str) -> Result<ParseResult> {
        let tree = parse_tree(&self.grammar, source)?;
        let root = tree.root_node();
        if only_errors(root) {
            return Ok(ParseResult::default());
        }

        let mut imports = Vec::new();
        collect_source_commands(root, source, &mut imports);

        // First pass: definitions. Call extraction needs the full name
        // set, so it runs second.
        let mut defs = Vec::new();
        collect_functions(root, source, &mut defs);
        let names: Vec<String> = defs.iter().map(|(name, _, _)| name.clone()).collect();

        let mut symbols = Vec::new();
        let mut exports = Vec::new();
        for (name, node, body) in &defs {
            let mut sym = SymbolNode::new(name, SymbolKind::Function);
            set_span(&mut sym, *node);
            sym.signature = Some(positional_signature(name, body));
            sym.set_calls(body_calls(body, &names));
            exports.push(ExportDecl {
                name: name.clone(),
                kind: ExportKind::Function,
                line: sym.line,
                signature: sym.signature.clone(),
            });
            symbols.push(sym);
        }

        collect_export_lines(root, source, &mut exports);
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
// Definitions
// ============================================================================

fn collect_functions<'a>(node: Node<'a>, source: &str, defs: &mut Vec<(String, Node<'a>, String)>) {
    if node.kind() == "function_definition" {
        if let Some(name) = node.child_by_field_name("name") {
            let body = node
                .child_by_field_name("body")
                .or_else(|| {
                    let mut cursor = node.walk();
                    let found = node
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "compound_statement");
                    found
                })
                .map(|b| text_of(source, b).to_string())
                .unwrap_or_default();
            defs.push((text_of(source, name).to_string(), node, body));
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_functions(child, source, defs);
    }
}

/// Reconstruct a signature from the highest positional reference in the
/// body: `$1` and `$3` yield `name($1, $2, $3)`.
fn positional_signature(name: &str, body: &str) -> String {
    let max = max_positional(body);
    if max == 0 {
        return format!("{name}()");
    }
    let params: Vec<String> = (1..=max).map(|i| format!("${i}")).collect();
    format!("{name}({})", params.join(", "))
}

fn max_positional(body: &str) -> u32 {
    let bytes = body.as_bytes();
    let mut max = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            // ${1} and $1 both count.
            let mut j = i + 1;
            if j < bytes.len() && bytes[j] == b'{' {
                j += 1;
            }
            let start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > start {
                if let Ok(n) = body[start..j].parse::<u32>() {
                    if n > max && n < 100 {
                        max = n;
                    }
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }
    max
}

// ============================================================================
// Calls
// ============================================================================

/// An occurrence of a known function name counts as a call when it sits
/// at line start, follows `;`, `|` or `&`, or appears inside `$( .. )` or
/// back-ticks. Names never defined in this file are ignored.
fn body_calls(body: &str, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| occurs_as_call(body, name))
        .cloned()
        .collect()
}

fn occurs_as_call(body: &str, name: &str) -> bool {
    for line in body.lines() {
        let bytes = line.as_bytes();
        let mut search_from = 0;
        while let Some(pos) = line[search_from..].find(name) {
            let i = search_from + pos;
            let end = i + name.len();
            search_from = i + 1;

            if i > 0 && is_word_byte(bytes[i - 1]) {
                continue;
            }
            if end < bytes.len() && (is_word_byte(bytes[end]) || bytes[end] == b'(') {
                continue;
            }

            let prefix = line[..i].trim_end();
            if prefix.is_empty() {
                return true;
            }
            if prefix.ends_with("$(") {
                return true;
            }
            match prefix.chars().last() {
                Some(';') | Some('|') | Some('&') | Some('`') => return true,
                _ => {}
            }
        }
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'/' || b == b'.' || b == b'='
}

// ============================================================================
// Imports and exports
// ============================================================================

/// `source` / `.` directives with literal, quoted, or command-substitution
/// targets.
fn collect_source_commands(node: Node, source: &str, imports: &mut Vec<ImportEdge>) {
    if node.kind() == "command" {
        if let Some(name) = node.child_by_field_name("name") {
            let cmd = text_of(source, name);
            if cmd == "source" || cmd == "." {
                let mut cursor = node.walk();
                for arg in node.named_children(&mut cursor) {
                    if arg.id() == name.id() {
                        continue;
                    }
                    let target = strip_quotes(text_of(source, arg));
                    if !target.is_empty() {
                        imports.push(ImportEdge::new(target));
                        break;
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_source_commands(child, source, imports);
    }
}

/// Every `export NAME` or `export NAME=value` line.
fn collect_export_lines(node: Node, source: &str, exports: &mut Vec<ExportDecl>) {
    if node.kind() == "declaration_command" {
        let is_export = node
            .child(0)
            .map(|c| text_of(source, c) == "export")
            .unwrap_or(false);
        if is_export {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                let name = match child.kind() {
                    "variable_assignment" => child
                        .child_by_field_name("name")
                        .map(|n| text_of(source, n).to_string()),
                    "variable_name" | "word" => Some(text_of(source, child).to_string()),
                    _ => None,
                };
                if let Some(name) = name {
                    exports.push(ExportDecl {
                        name,
                        kind: ExportKind::Var,
                        line: node.start_position().row as u32 + 1,
                        signature: None,
                    });
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_export_lines(child, source, exports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        ShellAnalyzer::new().parse(source, "scripts/run.sh").unwrap()
    }

    #[test]
    fn both_definition_styles() {
        let result = parse(
            "#!/bin/sh\n\nbuild() {\n  echo building\n}\n\nfunction deploy {\n  echo deploying\n}\n",
        );

        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["build", "deploy"]);
        assert!(result.symbols.iter().all(|s| s.kind == SymbolKind::Function));
        // Every defined function is exported.
        assert!(result.exports.iter().any(|e| e.name == "build"));
        assert!(result.exports.iter().any(|e| e.name == "deploy"));
    }

    #[test]
    fn positional_signature_from_max_index() {
        let result = parse("greet() {\n  echo \"hello $1, from $3\"\n}\n");
        assert_eq!(
            result.symbols[0].signature.as_deref(),
            Some("greet($1, $2, $3)")
        );

        let result = parse("noop() {\n  true\n}\n");
        assert_eq!(result.symbols[0].signature.as_deref(), Some("noop()"));
    }

    #[test]
    fn calls_only_match_known_functions_at_call_positions() {
        let result = parse(
            r#"
helper() {
  echo ok
}

main() {
  helper
  echo skip helper mention
  out=$(helper)
  true; helper
}
"#,
        );

        let main = result.symbols.iter().find(|s| s.name == "main").unwrap();
        assert_eq!(main.calls.as_deref(), Some(&["helper".to_string()][..]));

        // `echo` is an external command, never recorded.
        assert!(!main
            .calls
            .as_ref()
            .unwrap()
            .iter()
            .any(|c| c == "echo"));
    }

    #[test]
    fn mid_line_mentions_are_not_calls() {
        let result = parse(
            "helper() {\n  true\n}\n\nmain() {\n  echo helper\n}\n",
        );
        let main = result.symbols.iter().find(|s| s.name == "main").unwrap();
        assert!(main.calls.is_none());
    }

    #[test]
    fn source_directives_become_imports() {
        let result = parse(
            ". ./lib.sh\nsource \"$HOME/env.sh\"\nsource ./common.sh\n",
        );
        let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
        assert!(modules.contains(&"./lib.sh"));
        assert!(modules.contains(&"./common.sh"));
        assert_eq!(result.imports.len(), 3);
    }

    #[test]
    fn export_lines_are_recorded() {
        let result = parse("export PATH_EXTRA=/opt/bin\nexport LIMIT\n");
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"PATH_EXTRA"));
        assert!(names.contains(&"LIMIT"));
        assert!(result.exports.iter().all(|e| e.kind == ExportKind::Var));
    }
}
