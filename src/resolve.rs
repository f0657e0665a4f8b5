//! Import specifier resolution.
//!
//! Relative specifiers resolve against the set of indexed files; anything
//! else stays external. Resolution is purely path-based, there is no
//! module-system awareness beyond extension and `index.<ext>` probing.

use crate::types::{FileRecord, SOURCE_EXTENSIONS};
use std::collections::BTreeMap;

/// Strip a leading `./` and normalize separators. Does not touch `..`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

/// Resolve `specifier` written in `from_path` against the indexed file
/// set. Returns the first existing candidate: the bare specifier, then
/// each source extension appended, then `index.<ext>` under the
/// specifier. Non-relative specifiers are external and return `None`.
pub fn resolve_import(
    specifier: &str,
    from_path: &str,
    files: &BTreeMap<String, FileRecord>,
) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }

    let base = match from_path.rfind('/') {
        Some(idx) => &from_path[..idx],
        None => "",
    };
    let joined = join_relative(base, specifier)?;

    if files.contains_key(&joined) {
        return Some(joined);
    }
    for ext in SOURCE_EXTENSIONS {
        let candidate = format!("{joined}.{ext}");
        if files.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    for ext in SOURCE_EXTENSIONS {
        let candidate = format!("{joined}/index.{ext}");
        if files.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Join a repo-relative base directory with a `./`/`../` specifier,
/// collapsing dot segments. Escaping above the repo root yields `None`.
fn join_relative(base: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };

    let normalized = specifier.replace('\\', "/");
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, ProjectIndex};
    use chrono::Utc;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::Typescript,
            size_bytes: 0,
            content_hash: "0".repeat(16),
            last_indexed_at: Utc::now(),
            imports: Vec::new(),
            exports: Vec::new(),
            symbols: Vec::new(),
            outline: Vec::new(),
            ui_components: None,
            api_endpoints: None,
        }
    }

    fn files_of(paths: &[&str]) -> BTreeMap<String, FileRecord> {
        let mut index = ProjectIndex::new("/r");
        for p in paths {
            index.files.insert(p.to_string(), record(p));
        }
        index.files
    }

    #[test]
    fn resolves_sibling_with_extension_probe() {
        let files = files_of(&["src/app.ts", "src/util.ts"]);
        assert_eq!(
            resolve_import("./util", "src/app.ts", &files),
            Some("src/util.ts".to_string())
        );
    }

    #[test]
    fn resolves_index_variant() {
        let files = files_of(&["src/app.ts", "src/lib/index.ts"]);
        assert_eq!(
            resolve_import("./lib", "src/app.ts", &files),
            Some("src/lib/index.ts".to_string())
        );
    }

    #[test]
    fn resolves_parent_traversal() {
        let files = files_of(&["src/a/deep.ts", "src/util.ts"]);
        assert_eq!(
            resolve_import("../util", "src/a/deep.ts", &files),
            Some("src/util.ts".to_string())
        );
    }

    #[test]
    fn bare_specifier_with_extension_wins() {
        let files = files_of(&["src/app.ts", "src/util.js", "src/util.js.ts"]);
        assert_eq!(
            resolve_import("./util.js", "src/app.ts", &files),
            Some("src/util.js".to_string())
        );
    }

    #[test]
    fn external_specifiers_stay_external() {
        let files = files_of(&["src/app.ts"]);
        assert_eq!(resolve_import("express", "src/app.ts", &files), None);
        assert_eq!(resolve_import("@scope/pkg", "src/app.ts", &files), None);
    }

    #[test]
    fn escaping_the_root_fails() {
        let files = files_of(&["app.ts"]);
        assert_eq!(resolve_import("../../nope", "app.ts", &files), None);
    }

    #[test]
    fn normalize_strips_leading_dot_slash() {
        assert_eq!(normalize_path("./src/app.ts"), "src/app.ts");
        assert_eq!(normalize_path("src\\app.ts"), "src/app.ts");
    }
}
