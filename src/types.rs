//! Core types for the code atlas.
//!
//! Everything here serializes to the on-disk index document, so field names
//! are part of the external contract. Maps are `BTreeMap` to keep output
//! byte-stable across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written to new index documents. Bumping the major or
/// minor component requires a migration step.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Language tag attached to every indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Javascript,
    Python,
    Go,
    Rust,
    Shell,
    Unknown,
}

impl Language {
    /// Map a file extension (without the dot) to a language tag.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "ts" | "tsx" | "mts" | "cts" => Self::Typescript,
            "js" | "jsx" | "mjs" | "cjs" => Self::Javascript,
            "py" => Self::Python,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "sh" | "bash" => Self::Shell,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Javascript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Shell => "shell",
            Self::Unknown => "unknown",
        }
    }
}

/// Source extensions tried by the import resolver, in resolution order.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "py", "go", "rs", "sh"];

/// Kind of a declared symbol. The set is fixed; adapters normalize their
/// grammar-specific node kinds onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Module,
    Class,
    Method,
    Property,
    Field,
    Constructor,
    Enum,
    EnumMember,
    Interface,
    Function,
    Variable,
    Constant,
    Struct,
    Trait,
    TypeParameter,
    Component,
    Hook,
    Endpoint,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Method => "method",
            Self::Property => "property",
            Self::Field => "field",
            Self::Constructor => "constructor",
            Self::Enum => "enum",
            Self::EnumMember => "enum-member",
            Self::Interface => "interface",
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Struct => "struct",
            Self::Trait => "trait",
            Self::TypeParameter => "type-parameter",
            Self::Component => "component",
            Self::Hook => "hook",
            Self::Endpoint => "endpoint",
        }
    }

    /// Kinds that participate in dead-code analysis.
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

/// One import site in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Module specifier as written, quotes stripped.
    pub module: String,
    /// Imported names as written, in source order. May carry an alias
    /// suffix (`Foo as Bar`); empty for side-effect imports; the literal
    /// `dynamic` marks a dynamic import.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default_import: bool,
    /// Namespace or whole-module alias (`* as ns`, `import x as y`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ImportEdge {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
            default_import: false,
            alias: None,
        }
    }
}

/// Declaration kind recorded on an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    Type,
    Const,
    Let,
    Var,
    Default,
}

/// One exported entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDecl {
    /// `default` for default exports.
    pub name: String,
    pub kind: ExportKind,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A declared code entity. Children are owned by inclusion; `parent` is a
/// textual label used for display and qualified-name construction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line, 0-based column.
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SymbolNode>>,
    /// Outgoing call names, deduplicated and sorted. Method calls appear
    /// both bare and as `receiver.method`; macro calls carry a `!` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<Vec<String>>,
}

impl SymbolNode {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            line: 0,
            column: 0,
            end_line: 0,
            end_column: 0,
            signature: None,
            docstring: None,
            parent: None,
            children: None,
            calls: None,
        }
    }

    /// Attach outgoing calls, normalizing to the sorted/deduplicated form
    /// the index guarantees. Empty lists collapse to `None`.
    pub fn set_calls(&mut self, mut calls: Vec<String>) {
        calls.sort();
        calls.dedup();
        self.calls = if calls.is_empty() { None } else { Some(calls) };
    }

    pub fn push_child(&mut self, child: SymbolNode) {
        self.children.get_or_insert_with(Vec::new).push(child);
    }
}

/// Flat structural marker used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub title: String,
    pub level: u32,
    pub line: u32,
}

/// Classification of a detected view component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Functional,
    Class,
    ForwardRef,
    Memo,
    Hoc,
}

/// A detected view-framework component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    pub kind: ComponentKind,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<String>,
}

/// A detected HTTP endpoint registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDecl {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub line: u32,
    pub framework: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
}

/// One indexed file. `(path, content_hash)` determines every extraction
/// field; `last_indexed_at` is bookkeeping only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Repo-relative, forward-slash-normalized.
    pub path: String,
    pub language: Language,
    pub size_bytes: u64,
    /// First 16 hex chars of the SHA-256 of the file bytes.
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<SymbolNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outline: Vec<OutlineEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_components: Option<Vec<ComponentDecl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoints: Option<Vec<EndpointDecl>>,
}

/// Forward and reverse dependency edges for one file. `imports` holds
/// resolved repo-relative paths or raw external specifiers; `imported_by`
/// holds repo-relative paths only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub imported_by: Vec<String>,
}

/// Root of the persisted index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectIndex {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    pub project_root: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub files: BTreeMap<String, FileRecord>,
    /// Qualified name -> `"path:line"`. Later insertions overwrite on
    /// collision; uniqueness across files is not guaranteed.
    pub symbol_index: BTreeMap<String, String>,
    pub dependency_graph: BTreeMap<String, DependencyEntry>,
}

impl ProjectIndex {
    pub fn new(project_root: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            project_root: project_root.into(),
            created_at: now,
            updated_at: now,
            files: BTreeMap::new(),
            symbol_index: BTreeMap::new(),
            dependency_graph: BTreeMap::new(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tags_are_stable() {
        assert_eq!(Language::from_extension("tsx"), Language::Typescript);
        assert_eq!(Language::from_extension("mjs"), Language::Javascript);
        assert_eq!(Language::from_extension("zig"), Language::Unknown);
        assert_eq!(
            serde_json::to_string(&Language::Typescript).unwrap(),
            "\"typescript\""
        );
    }

    #[test]
    fn symbol_kind_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&SymbolKind::EnumMember).unwrap(),
            "\"enum-member\""
        );
        assert_eq!(
            serde_json::to_string(&SymbolKind::TypeParameter).unwrap(),
            "\"type-parameter\""
        );
    }

    #[test]
    fn set_calls_sorts_and_dedups() {
        let mut sym = SymbolNode::new("f", SymbolKind::Function);
        sym.set_calls(vec![
            "zeta".to_string(),
            "alpha".to_string(),
            "zeta".to_string(),
        ]);
        assert_eq!(
            sym.calls.as_deref(),
            Some(&["alpha".to_string(), "zeta".to_string()][..])
        );

        sym.set_calls(Vec::new());
        assert!(sym.calls.is_none());
    }

    #[test]
    fn index_round_trips_through_json() {
        let mut index = ProjectIndex::new("/repo");
        let mut sym = SymbolNode::new("Greeter", SymbolKind::Class);
        sym.line = 3;
        index.files.insert(
            "lib/a.ts".to_string(),
            FileRecord {
                path: "lib/a.ts".to_string(),
                language: Language::Typescript,
                size_bytes: 42,
                content_hash: "0123456789abcdef".to_string(),
                last_indexed_at: index.created_at,
                imports: vec![ImportEdge::new("./util")],
                exports: Vec::new(),
                symbols: vec![sym],
                outline: Vec::new(),
                ui_components: None,
                api_endpoints: None,
            },
        );
        index
            .symbol_index
            .insert("Greeter".to_string(), "lib/a.ts:3".to_string());

        let json = serde_json::to_string_pretty(&index).unwrap();
        assert!(json.contains("\"schemaVersion\""));
        let back: ProjectIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back.files.len(), 1);
        assert_eq!(back.symbol_index["Greeter"], "lib/a.ts:3");
        // Canonical JSON is stable across a save/load cycle.
        assert_eq!(serde_json::to_string_pretty(&back).unwrap(), json);
    }
}
