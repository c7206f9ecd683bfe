//! Analysis facts consumed by the graph builder.
//!
//! A snapshot is fully materialized before building starts and is never
//! mutated by the builder.

use crate::error::{InputError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Everything the builder needs from one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    /// Absolute file path to the symbols declared in it, in any order
    pub files: BTreeMap<String, Vec<Symbol>>,
    #[serde(default)]
    pub call_graph: CallGraph,
    /// Package tree; each file belongs to at most one package
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl AnalysisSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(&mut self, file: &str, symbol: Symbol) {
        self.files.entry(file.to_string()).or_default().push(symbol);
    }

    pub fn symbol_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// A declared program entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Qualified display name, e.g. `(*Server).Serve` or `Foo[T any](x T)`
    pub name: String,
    #[serde(default)]
    pub kind: SymbolKind,
    /// Source offset within the defining file
    pub pos: u32,
    /// Position of the immediately enclosing symbol in the same file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    /// Call graph identity, present when the symbol takes part in the call graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<u32>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, pos: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            pos,
            parent: None,
            call_id: None,
        }
    }

    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_call_id(mut self, id: u32) -> Self {
        self.call_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    /// Anonymous or locally declared function
    Closure,
    Type,
    Interface,
    Constant,
    Variable,
    Module,
    #[default]
    Other,
}

impl SymbolKind {
    /// Class tag attached to rows of this kind, if any.
    pub fn class(self) -> Option<&'static str> {
        match self {
            Self::Method => Some("method"),
            Self::Closure => Some("closure"),
            Self::Type => Some("type"),
            Self::Interface => Some("interface"),
            Self::Constant => Some("const"),
            Self::Variable => Some("var"),
            Self::Module => Some("mod"),
            Self::Function | Self::Other => None,
        }
    }
}

/// Directed call graph keyed by call graph id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    pub nodes: BTreeMap<u32, CallNode>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: u32, file: &str, pos: u32) {
        self.nodes.entry(id).or_insert_with(|| CallNode {
            id,
            file: file.to_string(),
            pos,
            inbound: Vec::new(),
        });
    }

    /// Records one call site. Repeated calls between the same pair are kept
    /// as parallel edges. Unknown callees are ignored.
    pub fn add_call(&mut self, caller: u32, callee: u32) {
        if let Some(node) = self.nodes.get_mut(&callee) {
            node.inbound.push(CallSite { caller });
        }
    }

    pub fn get(&self, id: u32) -> Option<&CallNode> {
        self.nodes.get(&id)
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.inbound.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    pub id: u32,
    /// Defining file; empty when the position cannot be resolved
    pub file: String,
    pub pos: u32,
    #[serde(default)]
    pub inbound: Vec<CallSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller: u32,
}

/// A package and the files it owns. Nested packages become nested clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub path: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Package>,
}

impl Package {
    pub fn new(path: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            path: path.into(),
            files,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Package) -> Self {
        self.children.push(child);
        self
    }
}

/// Reads a snapshot stored as JSON.
pub fn load_snapshot(path: &Path) -> Result<AnalysisSnapshot, InputError> {
    let content = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes a snapshot as pretty JSON.
pub fn save_snapshot(snapshot: &AnalysisSnapshot, path: &Path) -> Result<(), InputError> {
    let content = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, content).map_err(|source| InputError::Read {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_call_keeps_parallel_edges() {
        let mut graph = CallGraph::new();
        graph.add_node(1, "/a.go", 10);
        graph.add_node(2, "/a.go", 20);
        graph.add_call(1, 2);
        graph.add_call(1, 2);

        assert_eq!(graph.get(2).unwrap().inbound.len(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_add_call_unknown_callee_ignored() {
        let mut graph = CallGraph::new();
        graph.add_node(1, "/a.go", 10);
        graph.add_call(1, 99);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_node_keeps_first() {
        let mut graph = CallGraph::new();
        graph.add_node(1, "/a.go", 10);
        graph.add_node(1, "/b.go", 30);
        assert_eq!(graph.get(1).unwrap().file, "/a.go");
    }

    #[test]
    fn test_symbol_kind_classes() {
        assert_eq!(SymbolKind::Function.class(), None);
        assert_eq!(SymbolKind::Method.class(), Some("method"));
        assert_eq!(SymbolKind::Constant.class(), Some("const"));
        assert_eq!(SymbolKind::Other.class(), None);
    }

    #[test]
    fn test_snapshot_json_defaults() {
        let json = r#"{
            "files": {
                "/src/main.go": [
                    { "name": "main", "kind": "function", "pos": 12, "call_id": 0 },
                    { "name": "Config", "pos": 40 }
                ]
            }
        }"#;
        let snapshot: AnalysisSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.symbol_count(), 2);
        assert!(snapshot.packages.is_empty());
        assert!(snapshot.call_graph.nodes.is_empty());

        let symbols = &snapshot.files["/src/main.go"];
        assert_eq!(symbols[0].call_id, Some(0));
        assert_eq!(symbols[1].kind, SymbolKind::Other);
        assert_eq!(symbols[1].parent, None);
    }
}
