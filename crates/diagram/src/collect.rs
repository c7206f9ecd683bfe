//! Turns a language server session into an [`AnalysisSnapshot`].

use crate::error::InputError;
use crate::snapshot::{AnalysisSnapshot, Package, Symbol, SymbolKind};
use lsp::{LanguageAdapter, SourceSymbol, SymbolKind as LspKind};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Collects symbols, incoming calls and a directory based package tree from
/// a started adapter.
pub async fn collect_snapshot<A: LanguageAdapter>(adapter: &mut A) -> Result<AnalysisSnapshot, InputError> {
    let symbols = adapter
        .get_symbols()
        .await
        .map_err(|e| InputError::Analysis(e.to_string()))?;
    info!(symbols = symbols.len(), "collected symbols");

    let mut snapshot = AnalysisSnapshot::new();

    // call graph ids follow (file, offset) order so repeated runs agree
    let mut callables: Vec<&SourceSymbol> = symbols.iter().filter(|s| s.is_callable()).collect();
    callables.sort_by(|a, b| (&a.file_path, a.offset).cmp(&(&b.file_path, b.offset)));

    let mut by_location = HashMap::new();
    let mut by_offset = HashMap::new();
    for (idx, symbol) in callables.iter().enumerate() {
        let id = idx as u32;
        snapshot.call_graph.add_node(id, &symbol.file_path, symbol.offset);
        by_location.insert(symbol.location_key(), id);
        by_offset.insert((symbol.file_path.as_str(), symbol.offset), id);
    }

    let callable_offsets: HashSet<(&str, u32)> = by_offset.keys().copied().collect();
    for symbol in &symbols {
        let nested_in_callable = symbol
            .parent_offset
            .is_some_and(|p| callable_offsets.contains(&(symbol.file_path.as_str(), p)));

        snapshot.add_symbol(
            &symbol.file_path,
            Symbol {
                name: symbol.name.clone(),
                kind: map_kind(symbol.kind, nested_in_callable),
                pos: symbol.offset,
                parent: symbol.parent_offset,
                call_id: by_offset
                    .get(&(symbol.file_path.as_str(), symbol.offset))
                    .copied(),
            },
        );
    }

    for symbol in &callables {
        let callee = by_offset[&(symbol.file_path.as_str(), symbol.offset)];
        let hierarchy = match adapter.get_call_hierarchy(symbol).await {
            Ok(h) => h,
            Err(e) => {
                warn!(symbol = %symbol.name, file = %symbol.file_path, "call hierarchy failed: {}", e);
                continue;
            }
        };

        for item in hierarchy.incoming {
            let Some(&caller) = by_location.get(&item.location_key()) else {
                debug!(caller = %item.stable_id(), "caller is not a collected symbol");
                continue;
            };
            for _ in 0..item.call_sites {
                snapshot.call_graph.add_call(caller, callee);
            }
        }
    }

    snapshot.packages = package_tree(adapter.workspace(), snapshot.files.keys());

    info!(
        files = snapshot.files.len(),
        calls = snapshot.call_graph.edge_count(),
        "collected snapshot"
    );
    Ok(snapshot)
}

fn map_kind(kind: LspKind, nested_in_callable: bool) -> SymbolKind {
    match kind {
        LspKind::FUNCTION if nested_in_callable => SymbolKind::Closure,
        LspKind::FUNCTION => SymbolKind::Function,
        LspKind::METHOD | LspKind::CONSTRUCTOR => SymbolKind::Method,
        LspKind::STRUCT | LspKind::CLASS | LspKind::ENUM | LspKind::OBJECT => SymbolKind::Type,
        LspKind::INTERFACE => SymbolKind::Interface,
        LspKind::CONSTANT => SymbolKind::Constant,
        LspKind::VARIABLE => SymbolKind::Variable,
        LspKind::MODULE | LspKind::NAMESPACE => SymbolKind::Module,
        _ => SymbolKind::Other,
    }
}

/// Groups files by directory relative to the workspace. Directories nest
/// like the file system; a directory without files of its own and with a
/// single child collapses into that child. Files outside the workspace get
/// no package.
pub fn package_tree<'a>(workspace: &str, files: impl IntoIterator<Item = &'a String>) -> Vec<Package> {
    let root = Path::new(workspace);
    let mut by_dir: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    let mut dirs = BTreeSet::new();

    for file in files {
        let Ok(relative) = Path::new(file).strip_prefix(root) else {
            continue;
        };
        let dir = relative.parent().unwrap_or(Path::new("")).to_path_buf();
        for ancestor in dir.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        by_dir.entry(dir).or_default().push(file.clone());
    }

    if by_dir.is_empty() {
        return Vec::new();
    }

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| workspace.to_string());

    vec![dir_package(Path::new(""), &root_name, &dirs, &by_dir)]
}

fn dir_package(
    dir: &Path,
    root_name: &str,
    dirs: &BTreeSet<PathBuf>,
    by_dir: &BTreeMap<PathBuf, Vec<String>>,
) -> Package {
    let files = by_dir.get(dir).cloned().unwrap_or_default();
    let mut children: Vec<Package> = dirs
        .iter()
        .filter(|d| d.as_os_str() != "" && d.parent() == Some(dir))
        .map(|d| dir_package(d, root_name, dirs, by_dir))
        .collect();

    if files.is_empty() && children.len() == 1 {
        return children.remove(0);
    }

    let path = if dir.as_os_str().is_empty() {
        root_name.to_string()
    } else {
        format!("{}/{}", root_name, dir.to_string_lossy().replace('\\', "/"))
    };

    Package {
        path,
        files,
        children,
    }
}
