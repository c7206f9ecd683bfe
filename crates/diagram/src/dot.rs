//! Graphviz DOT output.
//!
//! Tables become plaintext nodes with HTML-like labels, one inner bordered
//! table per section. Rows expose a port equal to the node id so edges can
//! attach to individual symbols.

use crate::error::RenderError;
use crate::model::{Cluster, Edge, EdgeEnd, EdgeStyle, Graph, Node, NodeId, Table, TableId};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// Href prefix the page script strips from rendered rows; the remaining
/// dot-separated parts become CSS classes.
pub const CELL_HREF_PREFIX: &str = "remove_me_url.cell";

/// Class the page script uses to reshape edges that loop within one table.
pub const INTRA_FILE_CLASS: &str = "modify-me";

const PREAMBLE: &str = r#"digraph {
    graph [
        rankdir = "LR"
        ranksep = 2.0
    ];
    node [
        fontsize = "16"
        fontname = "helvetica, open-sans"
        shape = "plaintext"
        style = "rounded, filled"
    ];
"#;

const INDENT: &str = "    ";

/// Serializes a [`Graph`] into a DOT document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotRenderer;

impl DotRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders the whole document. Fails only when the graph references
    /// tables or rows it does not contain.
    pub fn render(&self, graph: &Graph) -> Result<String, RenderError> {
        validate(graph)?;

        let mut out = String::with_capacity(4096);
        out.push_str(PREAMBLE);

        for table in &graph.tables {
            out.push('\n');
            write_table(&mut out, table);
        }

        if !graph.edges.is_empty() {
            out.push('\n');
        }
        for edge in &graph.edges {
            write_edge(&mut out, edge);
        }

        for cluster in &graph.clusters {
            out.push('\n');
            write_cluster(&mut out, cluster, 1);
        }

        out.push_str("}\n");
        Ok(out)
    }
}

/// Checks every reference before anything is written.
fn validate(graph: &Graph) -> Result<(), RenderError> {
    let mut rows: HashMap<TableId, HashSet<NodeId>> = HashMap::new();
    for table in &graph.tables {
        if rows.contains_key(&table.id) {
            return Err(RenderError::DuplicateTable(table.id));
        }
        rows.insert(table.id, table.nodes().map(|n| n.id).collect());
    }

    for edge in &graph.edges {
        let found = |end: EdgeEnd| {
            rows.get(&end.table).is_some_and(|ids| ids.contains(&end.node))
        };
        if !found(edge.from) || !found(edge.to) {
            return Err(RenderError::DanglingEdge {
                from: edge.from,
                to: edge.to,
            });
        }
    }

    graph
        .clusters
        .iter()
        .try_for_each(|cluster| check_cluster(cluster, &rows))
}

fn check_cluster(
    cluster: &Cluster,
    rows: &HashMap<TableId, HashSet<NodeId>>,
) -> Result<(), RenderError> {
    if let Some(&table) = cluster.tables.iter().find(|id| !rows.contains_key(id)) {
        return Err(RenderError::DanglingMember {
            cluster: cluster.title.clone(),
            table,
        });
    }
    cluster
        .sub_clusters
        .iter()
        .try_for_each(|sub| check_cluster(sub, rows))
}

fn write_table(out: &mut String, table: &Table) {
    let _ = writeln!(out, "{INDENT}{} [id=\"{}\", label=<", table.id, table.id);
    let _ = writeln!(out, "{INDENT}{INDENT}<TABLE BORDER=\"0\" CELLBORDER=\"0\">");
    let _ = writeln!(
        out,
        "{INDENT}{INDENT}<TR><TD WIDTH=\"230\" BORDER=\"0\"><FONT POINT-SIZE=\"12\">{}</FONT></TD></TR>",
        escape_html(&table.title)
    );

    for section in &table.sections {
        let _ = writeln!(out, "{INDENT}{INDENT}<TR><TD>");
        let _ = writeln!(
            out,
            "{INDENT}{INDENT}<TABLE BORDER=\"0\" CELLSPACING=\"0\" CELLPADDING=\"4\" CELLBORDER=\"1\">"
        );
        write_cell(out, table.id, section);
        let _ = writeln!(out, "{INDENT}{INDENT}</TABLE>");
        let _ = writeln!(out, "{INDENT}{INDENT}</TD></TR>");
    }

    let _ = writeln!(out, "{INDENT}{INDENT}<TR><TD BORDER=\"0\"></TD></TR>");
    let _ = writeln!(out, "{INDENT}{INDENT}</TABLE>");
    let _ = writeln!(out, "{INDENT}>];");
}

/// The node's own row followed by its sub nodes' rows, recursively.
fn write_cell(out: &mut String, table_id: TableId, node: &Node) {
    let _ = writeln!(
        out,
        "{INDENT}{INDENT}<TR><TD PORT=\"{id}\" ID=\"{table_id}:{id}\" HREF=\"{CELL_HREF_PREFIX}{classes}\">{title}</TD></TR>",
        id = node.id,
        classes = classes_attr(node),
        title = format_title(&node.title),
    );
    for sub in &node.sub_nodes {
        write_cell(out, table_id, sub);
    }
}

fn write_edge(out: &mut String, edge: &Edge) {
    let _ = writeln!(
        out,
        "{INDENT}{} -> {} [{}];",
        edge.from,
        edge.to,
        edge_attributes(edge)
    );
}

/// Attribute list of an edge: its id, the intra-file marker and the style.
pub fn edge_attributes(edge: &Edge) -> String {
    let mut attrs = vec![format!("id=\"{} -> {}\"", edge.from, edge.to)];

    if edge.is_intra_file() {
        attrs.push(format!("class=\"{INTRA_FILE_CLASS}\""));
    }

    match edge.style {
        EdgeStyle::Solid => {}
        EdgeStyle::Dashed => attrs.push("style=\"dashed\"".to_string()),
        EdgeStyle::DotArrow => attrs.push("arrowhead=\"normalnoneodot\"".to_string()),
    }

    attrs.join(", ")
}

fn write_cluster(out: &mut String, cluster: &Cluster, depth: usize) {
    let pad = INDENT.repeat(depth);
    let title = escape_quoted(&cluster.title);

    let _ = writeln!(out, "{pad}subgraph \"cluster_{title}\" {{");
    let _ = writeln!(out, "{pad}{INDENT}label = \"{title}\";");
    for id in &cluster.tables {
        let _ = writeln!(out, "{pad}{INDENT}{id}");
    }
    for sub in &cluster.sub_clusters {
        write_cluster(out, sub, depth + 1);
    }
    let _ = writeln!(out, "{pad}}};");
}

/// Row label. Bracketed parameter lists move to their own line so long
/// generic signatures do not widen the table.
///
/// A title that starts with `[` (such as `[]int`) has no name to split off
/// and stays on one line.
pub fn format_title(title: &str) -> String {
    match title.find('[') {
        Some(start) if start > 0 => format!(
            "{}<BR/>{}",
            escape_html(&title[..start]),
            escape_html(&title[start..])
        ),
        _ => escape_html(title),
    }
}

/// `.a.b` for classes `{a, b}`, empty for no classes.
pub fn classes_attr(node: &Node) -> String {
    node.classes.iter().fold(String::new(), |mut acc, class| {
        acc.push('.');
        acc.push_str(class);
        acc
    })
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> Graph {
        Graph {
            tables: vec![
                Table {
                    id: 100,
                    title: "main.go".to_string(),
                    path: "/src/main.go".to_string(),
                    sections: vec![Node::new(1, "main")
                        .with_class("fn")
                        .with_sub_node(Node::new(2, "main$1").with_class("fn"))],
                },
                Table {
                    id: 200,
                    title: "util.go".to_string(),
                    path: "/src/util.go".to_string(),
                    sections: vec![Node::new(3, "Helper").with_class("fn")],
                },
            ],
            edges: vec![
                Edge::new(EdgeEnd::new(100, 1), EdgeEnd::new(100, 2)),
                Edge::new(EdgeEnd::new(100, 2), EdgeEnd::new(200, 3)),
            ],
            clusters: vec![Cluster::new("example.com/app", vec![100])
                .with_sub_cluster(Cluster::new("example.com/app/util", vec![200]))],
        }
    }

    #[test]
    fn test_format_title_splits_type_parameters() {
        assert_eq!(format_title("Foo[T any](x T)"), "Foo<BR/>[T any](x T)");
        assert_eq!(format_title("Bar"), "Bar");
        assert_eq!(format_title("[]int"), "[]int");
    }

    #[test]
    fn test_format_title_escapes_markup() {
        assert_eq!(format_title("recv(c <-chan T)"), "recv(c &lt;-chan T)");
        assert_eq!(format_title("Map[K, V](m map[K]V)"), "Map<BR/>[K, V](m map[K]V)");
        assert_eq!(format_title("a&b"), "a&amp;b");
    }

    #[test]
    fn test_classes_attr() {
        assert_eq!(classes_attr(&Node::new(1, "x")), "");
        assert_eq!(classes_attr(&Node::new(1, "x").with_class("fn")), ".fn");
        assert_eq!(
            classes_attr(&Node::new(1, "x").with_class("method").with_class("fn")),
            ".fn.method"
        );
    }

    #[test]
    fn test_edge_attributes() {
        let intra = Edge::new(EdgeEnd::new(1, 2), EdgeEnd::new(1, 3));
        assert_eq!(edge_attributes(&intra), r#"id="1:2 -> 1:3", class="modify-me""#);

        let cross = Edge::new(EdgeEnd::new(1, 2), EdgeEnd::new(4, 3)).with_style(EdgeStyle::Dashed);
        assert_eq!(edge_attributes(&cross), r#"id="1:2 -> 4:3", style="dashed""#);

        let dot_arrow = cross.with_style(EdgeStyle::DotArrow);
        assert_eq!(
            edge_attributes(&dot_arrow),
            r#"id="1:2 -> 4:3", arrowhead="normalnoneodot""#
        );
    }

    #[test]
    fn test_render_empty_graph() {
        let dot = DotRenderer::new().render(&Graph::default()).unwrap();
        assert_eq!(dot, format!("{PREAMBLE}}}\n"));
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(!dot.contains("{{"));
    }

    #[test]
    fn test_render_tables_rows_and_ports() {
        let dot = DotRenderer::new().render(&sample_graph()).unwrap();

        assert!(dot.contains("    100 [id=\"100\", label=<"));
        assert!(dot.contains("<FONT POINT-SIZE=\"12\">main.go</FONT>"));
        assert!(dot.contains(
            "<TR><TD PORT=\"1\" ID=\"100:1\" HREF=\"remove_me_url.cell.fn\">main</TD></TR>"
        ));
        assert!(dot.contains(
            "<TR><TD PORT=\"2\" ID=\"100:2\" HREF=\"remove_me_url.cell.fn\">main$1</TD></TR>"
        ));
        // main$1 shares main's section table
        assert_eq!(dot.matches("CELLBORDER=\"1\"").count(), 2);
    }

    #[test]
    fn test_render_edges() {
        let dot = DotRenderer::new().render(&sample_graph()).unwrap();
        assert!(dot.contains("    100:1 -> 100:2 [id=\"100:1 -> 100:2\", class=\"modify-me\"];"));
        assert!(dot.contains("    100:2 -> 200:3 [id=\"100:2 -> 200:3\"];"));
    }

    #[test]
    fn test_render_nested_clusters() {
        let dot = DotRenderer::new().render(&sample_graph()).unwrap();
        let expected = [
            "    subgraph \"cluster_example.com/app\" {",
            "        label = \"example.com/app\";",
            "        100",
            "        subgraph \"cluster_example.com/app/util\" {",
            "            label = \"example.com/app/util\";",
            "            200",
            "        };",
            "    };",
        ]
        .join("\n");
        assert!(dot.contains(&expected), "{dot}");
    }

    #[test]
    fn test_render_deep_cluster_nesting() {
        let mut cluster = Cluster::new("level5", vec![100]);
        for level in (0..5).rev() {
            cluster = Cluster::new(format!("level{level}"), vec![]).with_sub_cluster(cluster);
        }
        let graph = Graph {
            tables: sample_graph().tables,
            edges: vec![],
            clusters: vec![cluster],
        };

        let dot = DotRenderer::new().render(&graph).unwrap();
        assert_eq!(dot.matches("subgraph").count(), 6);
        assert_eq!(dot.matches("{").count(), dot.matches("}").count());
    }

    #[test]
    fn test_render_rejects_dangling_edge() {
        let mut graph = sample_graph();
        graph.edges.push(Edge::new(EdgeEnd::new(100, 1), EdgeEnd::new(200, 99)));
        let err = DotRenderer::new().render(&graph).unwrap_err();
        assert!(matches!(err, RenderError::DanglingEdge { .. }));
    }

    #[test]
    fn test_render_rejects_missing_cluster_member() {
        let mut graph = sample_graph();
        graph.clusters[0].sub_clusters[0].tables.push(999);
        let err = DotRenderer::new().render(&graph).unwrap_err();
        assert!(matches!(err, RenderError::DanglingMember { table: 999, .. }));
    }

    #[test]
    fn test_render_rejects_duplicate_table() {
        let mut graph = sample_graph();
        let copy = graph.tables[0].clone();
        graph.tables.push(copy);
        let err = DotRenderer::new().render(&graph).unwrap_err();
        assert!(matches!(err, RenderError::DuplicateTable(100)));
    }

    #[test]
    fn test_cluster_title_is_quoted() {
        let graph = Graph {
            clusters: vec![Cluster::new("we\"ird", vec![])],
            ..Default::default()
        };
        let dot = DotRenderer::new().render(&graph).unwrap();
        assert!(dot.contains("subgraph \"cluster_we\\\"ird\" {"));
    }
}
