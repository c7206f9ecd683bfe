//! Visual graph model: one table per file, one row per symbol, call edges
//! between rows and package clusters around tables.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// FNV-1a hash of the file path.
pub type TableId = u32;

/// Call graph id for call graph symbols, `DECL_ID_BASE + pos` otherwise.
pub type NodeId = u64;

/// Start of the id range used by plain declarations.
pub const DECL_ID_BASE: NodeId = 1 << 32;

/// Immutable snapshot produced by the builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub tables: Vec<Table>,
    pub edges: Vec<Edge>,
    pub clusters: Vec<Cluster>,
}

impl Graph {
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Whether `end` names a row of an existing table.
    pub fn resolves(&self, end: EdgeEnd) -> bool {
        self.table(end.table).is_some_and(|t| t.contains(end.node))
    }

    pub fn node_count(&self) -> usize {
        self.tables.iter().map(|t| t.nodes().count()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub id: TableId,
    /// Base name of the file
    pub title: String,
    /// Absolute path the id was derived from
    pub path: String,
    /// Root rows ordered by source position
    pub sections: Vec<Node>,
}

impl Table {
    /// All rows of the table, depth first in display order.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            stack: self.sections.iter().rev().collect(),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes().any(|n| n.id == id)
    }
}

/// Depth-first iterator over a table's rows.
pub struct Nodes<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.sub_nodes.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub classes: BTreeSet<String>,
    /// Locally declared symbols, ordered by source position
    pub sub_nodes: Vec<Node>,
}

impl Node {
    pub fn new(id: NodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            classes: BTreeSet::new(),
            sub_nodes: Vec::new(),
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.insert(class.to_string());
        self
    }

    pub fn with_sub_node(mut self, node: Node) -> Self {
        self.sub_nodes.push(node);
        self
    }
}

/// One endpoint of an edge: a row inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeEnd {
    pub table: TableId,
    pub node: NodeId,
}

impl EdgeEnd {
    pub fn new(table: TableId, node: NodeId) -> Self {
        Self { table, node }
    }
}

impl fmt::Display for EdgeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.node)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    DotArrow,
}

/// A call from the `from` row to the `to` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Edge {
    pub from: EdgeEnd,
    pub to: EdgeEnd,
    pub style: EdgeStyle,
}

impl Edge {
    pub fn new(from: EdgeEnd, to: EdgeEnd) -> Self {
        Self {
            from,
            to,
            style: EdgeStyle::Solid,
        }
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_intra_file(&self) -> bool {
        self.from.table == self.to.table
    }
}

/// Tables of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    /// Package path
    pub title: String,
    pub tables: Vec<TableId>,
    pub sub_clusters: Vec<Cluster>,
}

impl Cluster {
    pub fn new(title: impl Into<String>, tables: Vec<TableId>) -> Self {
        Self {
            title: title.into(),
            tables,
            sub_clusters: Vec::new(),
        }
    }

    pub fn with_sub_cluster(mut self, cluster: Cluster) -> Self {
        self.sub_clusters.push(cluster);
        self
    }

    /// Member table ids of this cluster and every nested cluster.
    pub fn all_tables(&self) -> Vec<TableId> {
        let mut ids = self.tables.clone();
        for sub in &self.sub_clusters {
            ids.extend(sub.all_tables());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table {
            id: 7,
            title: "main.go".to_string(),
            path: "/src/main.go".to_string(),
            sections: vec![
                Node::new(1, "main")
                    .with_sub_node(Node::new(2, "main$1").with_sub_node(Node::new(3, "main$1$1"))),
                Node::new(4, "helper"),
            ],
        }
    }

    #[test]
    fn test_nodes_walks_depth_first() {
        let table = sample_table();
        let ids: Vec<_> = table.nodes().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_resolves_nested_nodes() {
        let graph = Graph {
            tables: vec![sample_table()],
            ..Default::default()
        };
        assert!(graph.resolves(EdgeEnd::new(7, 3)));
        assert!(!graph.resolves(EdgeEnd::new(7, 9)));
        assert!(!graph.resolves(EdgeEnd::new(8, 1)));
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_edge_end_display() {
        assert_eq!(EdgeEnd::new(12, 5).to_string(), "12:5");
    }

    #[test]
    fn test_intra_file_edge() {
        assert!(Edge::new(EdgeEnd::new(1, 2), EdgeEnd::new(1, 3)).is_intra_file());
        assert!(!Edge::new(EdgeEnd::new(1, 2), EdgeEnd::new(2, 3)).is_intra_file());
    }

    #[test]
    fn test_cluster_all_tables() {
        let cluster = Cluster::new("app", vec![1])
            .with_sub_cluster(Cluster::new("app/db", vec![2, 3]));
        assert_eq!(cluster.all_tables(), vec![1, 2, 3]);
    }
}
