use codeatlas::callgraph::CallGraph;
use codeatlas::{query, IndexBuilder, IndexConfig};
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write fixture");
}

async fn build(root: &Path) -> codeatlas::ProjectIndex {
    IndexBuilder::new(IndexConfig::for_root(root).expect("config"))
        .full_build()
        .await
        .expect("full build")
}

#[tokio::test]
async fn impact_buckets_follow_import_chain() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    // x <- y <- z <- w, where "<-" means "is imported by".
    write(root, "x.ts", "export function x() {}\n");
    write(root, "y.ts", "import { x } from './x';\n");
    write(root, "z.ts", "import './y';\n");
    write(root, "w.ts", "import './z';\n");
    write(root, "x.test.ts", "import { x } from './x';\n");

    let index = build(root).await;

    let report = query::impact(&index, "x.ts", 2).unwrap();
    assert!(report.high.contains(&"y.ts".to_string()));
    assert!(report.high.contains(&"x.test.ts".to_string()));
    assert_eq!(report.medium, vec!["z.ts"]);
    assert!(report.low.is_empty());
    assert!(report.tests.contains(&"x.test.ts".to_string()));

    let deeper = query::impact(&index, "x.ts", 3).unwrap();
    assert_eq!(deeper.low, vec!["w.ts"]);
}

#[tokio::test]
async fn impact_unknown_path_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(root, "a.ts", "export const A = 1;\n");

    let index = build(root).await;
    let err = query::impact(&index, "./missing.ts", 2).unwrap_err();
    assert!(err.to_string().contains("missing.ts"));
}

#[tokio::test]
async fn call_chain_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(
        root,
        "chain.ts",
        "function a() { b(); }\nfunction b() { c(); }\nfunction c() {}\n",
    );

    let index = build(root).await;
    let graph = CallGraph::build(&index);

    assert_eq!(
        graph.chain("a", "c", 5),
        Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(graph.chain("a", "d", 5), None);

    let outgoing = graph.outgoing("a").unwrap();
    assert_eq!(outgoing.calls, vec!["b"]);

    let callers = graph.incoming("c");
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].caller, "b");
}

#[tokio::test]
async fn dead_code_finds_uncalled_functions() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(
        root,
        "lib.py",
        "def entry():\n    used()\n\ndef used():\n    pass\n\ndef forgotten():\n    pass\n\ndef _scratch():\n    pass\n",
    );

    let index = build(root).await;

    let dead = query::dead_code(&index, false);
    let names: Vec<&str> = dead.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"forgotten"));
    assert!(!names.contains(&"used"));
    assert!(!names.contains(&"_scratch"));

    let with_private = query::dead_code(&index, true);
    assert!(with_private.iter().any(|d| d.name == "_scratch"));
}

#[tokio::test]
async fn search_exact_and_substring() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(
        root,
        "svc.ts",
        "class UserService {\n  getUser() {}\n}\nfunction getUserList() {}\n",
    );

    let index = build(root).await;

    let hits = query::search(&index, "getuser", false);
    let names: Vec<&str> = hits.iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.contains(&"UserService.getUser"));
    assert!(names.contains(&"getUserList"));

    let exact = query::search(&index, "getUserList", true);
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].1, "svc.ts:4");
}

#[tokio::test]
async fn orphans_and_deps() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(root, "linked/a.ts", "import './b';\n");
    write(root, "linked/b.ts", "export const B = 1;\n");
    write(root, "island.ts", "export const I = 1;\n");

    let index = build(root).await;

    assert_eq!(query::orphans(&index), vec!["island.ts"]);
    assert_eq!(
        query::dependencies(&index, "./linked/a.ts", false).unwrap(),
        vec!["linked/b.ts"]
    );
    assert_eq!(
        query::dependencies(&index, "linked/b.ts", true).unwrap(),
        vec!["linked/a.ts"]
    );
}

#[tokio::test]
async fn suggest_surfaces_relevant_symbols() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write(
        root,
        "config.py",
        "def load_config():\n    pass\n\ndef save_settings():\n    pass\n\ndef render_chart():\n    pass\n",
    );

    let index = build(root).await;
    let response = query::suggest(&index, "load config from disk");

    assert!(!response.primary.is_empty());
    assert_eq!(response.primary[0].name, "load_config");
    assert!(response.primary[0].confidence > 0.5);
    assert!(!response
        .primary
        .iter()
        .chain(response.related.iter())
        .any(|s| s.name == "render_chart"));
}
