//! Language server integration tests
//!
//! Needs rust-analyzer: `rustup component add rust-analyzer`
//! Run: `cargo test -p diagram --test lsp_integration -- --ignored`

use diagram::{collect_snapshot, DotRenderer, GraphBuilder, SymbolKind};
use lsp::{LanguageAdapter, RustAdapter};
use std::fs;
use tempfile::tempdir;

/// Temporary crate with a short call chain and one nested function.
fn create_test_project() -> tempfile::TempDir {
    let dir = tempdir().expect("Failed to create temp dir");

    fs::write(
        dir.path().join("Cargo.toml"),
        r#"[package]
name = "test_project"
version = "0.1.0"
edition = "2021"
"#,
    )
    .expect("Failed to write Cargo.toml");

    fs::create_dir_all(dir.path().join("src/store")).expect("Failed to create src dir");
    fs::write(
        dir.path().join("src/lib.rs"),
        r#"mod store;

pub struct Config {
    pub depth: u32,
}

pub fn main_entry() {
    fn local_step() -> i32 {
        helper()
    }
    let result = local_step() + store::load();
    println!("{}", result);
}

fn helper() -> i32 {
    helper_inner() + helper_inner()
}

fn helper_inner() -> i32 {
    42
}
"#,
    )
    .expect("Failed to write lib.rs");

    fs::write(
        dir.path().join("src/store/mod.rs"),
        r#"pub fn load() -> i32 {
    7
}
"#,
    )
    .expect("Failed to write store/mod.rs");

    dir
}

#[tokio::test]
#[ignore = "needs rust-analyzer"]
async fn test_collect_snapshot_from_rust_analyzer() {
    let project = create_test_project();
    let workspace = project.path().to_str().unwrap();

    let mut adapter = RustAdapter::new(workspace);
    if adapter.start().await.is_err() {
        eprintln!("skipping: rust-analyzer missing or failed to start");
        return;
    }

    let snapshot = collect_snapshot(&mut adapter).await.expect("Failed to collect snapshot");
    adapter.stop().expect("Failed to stop adapter");

    let lib = snapshot
        .files
        .iter()
        .find(|(path, _)| path.ends_with("src/lib.rs"))
        .map(|(_, symbols)| symbols)
        .expect("lib.rs missing from snapshot");

    let names: Vec<_> = lib.iter().map(|s| s.name.as_str()).collect();
    for expected in ["Config", "main_entry", "local_step", "helper", "helper_inner"] {
        assert!(names.contains(&expected), "Should find {expected}");
    }

    let local = lib.iter().find(|s| s.name == "local_step").unwrap();
    assert_eq!(local.kind, SymbolKind::Closure);
    assert!(local.parent.is_some());

    assert!(snapshot.call_graph.edge_count() >= 3, "Should record calls");
    assert!(!snapshot.packages.is_empty());
}

#[tokio::test]
#[ignore = "needs rust-analyzer"]
async fn test_render_rust_project() {
    let project = create_test_project();
    let workspace = project.path().to_str().unwrap();

    let mut adapter = RustAdapter::new(workspace);
    if adapter.start().await.is_err() {
        eprintln!("skipping: rust-analyzer missing or failed to start");
        return;
    }

    let snapshot = collect_snapshot(&mut adapter).await.expect("Failed to collect snapshot");
    adapter.stop().expect("Failed to stop adapter");

    let graph = GraphBuilder::new().build(&snapshot).expect("Failed to build graph");
    assert_eq!(graph.tables.len(), 2);
    assert!(!graph.edges.is_empty());
    for edge in &graph.edges {
        assert!(graph.resolves(edge.from) && graph.resolves(edge.to));
    }

    let dot = DotRenderer::new().render(&graph).expect("Failed to render");
    assert!(dot.starts_with("digraph {"), "Should generate a DOT document");
    assert!(dot.contains("subgraph \"cluster_"));
}
