//! diagram - call map rendering
//!
//! Builds a file-level call map from analysis facts and writes it as a
//! Graphviz DOT document: one table per file, one row per declaration,
//! call edges between rows and package clusters around tables.

mod builder;
mod collect;
mod dot;
mod error;
mod layout;
mod model;
mod snapshot;

pub use builder::{file_id, node_id, GraphBuilder};
pub use collect::{collect_snapshot, package_tree};
pub use dot::{classes_attr, edge_attributes, format_title, DotRenderer, CELL_HREF_PREFIX, INTRA_FILE_CLASS};
pub use error::{DiagramError, InputError, RenderError, Result};
pub use layout::{GraphvizLayout, ImageFormat};
pub use model::{Cluster, Edge, EdgeEnd, EdgeStyle, Graph, Node, NodeId, Nodes, Table, TableId, DECL_ID_BASE};
pub use snapshot::{
    load_snapshot, save_snapshot, AnalysisSnapshot, CallGraph, CallNode, CallSite, Package, Symbol, SymbolKind,
};
