//! Flattens analysis facts into the visual graph model.

use crate::error::InputError;
use crate::model::{Cluster, Edge, EdgeEnd, Graph, Node, NodeId, Table, TableId, DECL_ID_BASE};
use crate::snapshot::{AnalysisSnapshot, CallGraph, Package, Symbol};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Table id of a file: 32-bit FNV-1a of the absolute path.
///
/// Tables and edges compute it independently, so no shared lookup is needed.
pub fn file_id(path: &str) -> TableId {
    path.bytes()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME))
}

/// Row id of a symbol. Call graph symbols keep their call graph id so edges
/// can reference them; other declarations live above `DECL_ID_BASE`.
pub fn node_id(symbol: &Symbol) -> NodeId {
    match symbol.call_id {
        Some(id) => NodeId::from(id),
        None => DECL_ID_BASE + NodeId::from(symbol.pos),
    }
}

/// Builds a [`Graph`] from one analysis snapshot.
///
/// The builder keeps no state between calls; concurrent builds only need
/// their own snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Fails only when no file yields a table. Symbols without a file path
    /// and edges whose caller cannot be placed are dropped.
    pub fn build(&self, snapshot: &AnalysisSnapshot) -> Result<Graph, InputError> {
        let mut tables = Vec::new();
        for (path, symbols) in &snapshot.files {
            if path.is_empty() {
                warn!(count = symbols.len(), "dropping symbols without a file path");
                continue;
            }
            if let Some(table) = build_table(path, symbols) {
                tables.push(table);
            }
        }

        if tables.is_empty() {
            return Err(InputError::NoUsableSymbols);
        }

        let edges = build_edges(&tables, &snapshot.call_graph);

        let table_ids: HashSet<TableId> = tables.iter().map(|t| t.id).collect();
        let mut assigned = HashSet::new();
        let clusters: Vec<Cluster> = snapshot
            .packages
            .iter()
            .filter_map(|pkg| build_cluster(pkg, &table_ids, &mut assigned))
            .collect();

        let graph = Graph {
            tables,
            edges,
            clusters,
        };
        info!(
            tables = graph.tables.len(),
            rows = graph.node_count(),
            edges = graph.edges.len(),
            clusters = graph.clusters.len(),
            "built graph"
        );
        Ok(graph)
    }
}

/// One table per file. Returns `None` when the file has no symbols.
fn build_table(path: &str, symbols: &[Symbol]) -> Option<Table> {
    // providers deliver symbols in arbitrary order
    let mut ordered: Vec<&Symbol> = symbols.iter().collect();
    ordered.sort_by_key(|s| s.pos);

    // only kept symbols claim a position, so children of a dropped symbol
    // fall back to roots
    let mut kept_pos = HashSet::new();
    let mut seen_ids = HashSet::new();
    ordered.retain(|s| {
        let id = node_id(s);
        if kept_pos.contains(&s.pos) || seen_ids.contains(&id) {
            warn!(file = path, name = %s.name, pos = s.pos, id, "dropping duplicate symbol");
            return false;
        }
        kept_pos.insert(s.pos);
        seen_ids.insert(id);
        true
    });

    if ordered.is_empty() {
        return None;
    }

    // walk backwards so children are complete before their parent is built
    let mut pending: HashMap<u32, Vec<Node>> = HashMap::new();
    let mut roots = Vec::new();
    for symbol in ordered.iter().rev() {
        let mut node = symbol_node(symbol);
        if let Some(mut children) = pending.remove(&symbol.pos) {
            children.reverse();
            node.sub_nodes = children;
        }

        // a parent must enclose its child, so it sits at an earlier position
        match symbol
            .parent
            .filter(|p| *p < symbol.pos && kept_pos.contains(p))
        {
            Some(parent) => pending.entry(parent).or_default().push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();

    let title = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    Some(Table {
        id: file_id(path),
        title,
        path: path.to_string(),
        sections: roots,
    })
}

fn symbol_node(symbol: &Symbol) -> Node {
    let mut node = Node::new(node_id(symbol), symbol.name.clone());
    if symbol.call_id.is_some() {
        node.classes.insert("fn".to_string());
    }
    if let Some(class) = symbol.kind.class() {
        node.classes.insert(class.to_string());
    }
    node
}

/// One edge per distinct (caller row, callee row) pair.
fn build_edges(tables: &[Table], call_graph: &CallGraph) -> Vec<Edge> {
    let present: HashSet<EdgeEnd> = tables
        .iter()
        .flat_map(|t| t.nodes().map(move |n| EdgeEnd::new(t.id, n.id)))
        .collect();

    let mut edges = BTreeSet::new();
    for table in tables {
        for node in table.nodes().filter(|n| n.id < DECL_ID_BASE) {
            let Some(callee) = u32::try_from(node.id).ok().and_then(|id| call_graph.get(id)) else {
                continue;
            };
            let to = EdgeEnd::new(table.id, node.id);

            for site in &callee.inbound {
                let Some(caller) = call_graph.get(site.caller) else {
                    debug!(caller = site.caller, callee = callee.id, "dropping edge from unknown caller");
                    continue;
                };
                if caller.file.is_empty() {
                    debug!(caller = caller.id, callee = callee.id, "dropping edge from caller without a file");
                    continue;
                }

                let from = EdgeEnd::new(file_id(&caller.file), NodeId::from(caller.id));
                if !present.contains(&from) {
                    debug!(caller = caller.id, file = %caller.file, "dropping edge from caller without a row");
                    continue;
                }

                edges.insert(Edge::new(from, to));
            }
        }
    }

    edges.into_iter().collect()
}

/// A cluster for a package with at least one table, directly or through
/// nested packages. Each table joins the first package that claims it.
fn build_cluster(
    pkg: &Package,
    tables: &HashSet<TableId>,
    assigned: &mut HashSet<TableId>,
) -> Option<Cluster> {
    if pkg.path.is_empty() {
        debug!(files = pkg.files.len(), "skipping package without a path");
        return None;
    }

    let mut members = Vec::new();
    for file in &pkg.files {
        let id = file_id(file);
        if !tables.contains(&id) {
            continue;
        }
        if !assigned.insert(id) {
            warn!(package = %pkg.path, file = %file, "file already belongs to another package");
            continue;
        }
        members.push(id);
    }

    let sub_clusters: Vec<Cluster> = pkg
        .children
        .iter()
        .filter_map(|child| build_cluster(child, tables, assigned))
        .collect();

    if members.is_empty() && sub_clusters.is_empty() {
        return None;
    }

    Some(Cluster {
        title: pkg.path.clone(),
        tables: members,
        sub_clusters,
    })
}
