mod rust;
mod typescript;

pub use rust::RustAdapter;
pub use typescript::TypeScriptAdapter;

use crate::protocol::{LspClient, LspError, Result};
use crate::types::{byte_offset, CallHierarchy, CallHierarchyItem, SourceSymbol};
use async_trait::async_trait;
use lsp_types::{DocumentSymbol, SymbolKind, Uri};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Language adapter trait
#[async_trait]
pub trait LanguageAdapter: Send + Sync {
    /// Start the language server and wait for initial indexing
    async fn start(&mut self) -> Result<()>;

    /// All declared symbols of every source file, flattened with parent links
    async fn get_symbols(&mut self) -> Result<Vec<SourceSymbol>>;

    /// Source files of the workspace, sorted
    fn get_source_files(&self) -> Result<Vec<String>>;

    /// Incoming calls of a callable symbol
    async fn get_call_hierarchy(&mut self, symbol: &SourceSymbol) -> Result<CallHierarchy>;

    /// Workspace root the adapter was created for
    fn workspace(&self) -> &str;

    fn stop(&mut self) -> Result<()>;
}

/// Grace period for the server to process a freshly opened file.
const OPEN_FILE_DELAY: Duration = Duration::from_millis(100);

/// Opens a file, asks for its symbols and flattens them.
pub(crate) async fn file_symbols(
    client: &mut LspClient,
    file_path: &str,
    language_id: &str,
    out: &mut Vec<SourceSymbol>,
) -> Result<()> {
    let content = fs::read_to_string(file_path)?;
    client.open_file(file_path, &content, language_id)?;
    tokio::time::sleep(OPEN_FILE_DELAY).await;

    let symbols = client.document_symbols(file_path).await?;
    extract_symbols(&symbols, file_path, &content, None, out);
    Ok(())
}

/// Whether a document symbol becomes a row in the diagram. Locals only count
/// at the top level.
fn is_declaration(kind: SymbolKind, top_level: bool) -> bool {
    match kind {
        SymbolKind::FUNCTION
        | SymbolKind::METHOD
        | SymbolKind::CONSTRUCTOR
        | SymbolKind::STRUCT
        | SymbolKind::CLASS
        | SymbolKind::ENUM
        | SymbolKind::INTERFACE
        | SymbolKind::OBJECT
        | SymbolKind::MODULE
        | SymbolKind::NAMESPACE => true,
        SymbolKind::CONSTANT | SymbolKind::VARIABLE => top_level,
        _ => false,
    }
}

/// Recursively flattens the document symbol tree. Symbols that are skipped
/// pass their parent link down to their children.
pub(crate) fn extract_symbols(
    symbols: &[DocumentSymbol],
    file_path: &str,
    content: &str,
    parent_offset: Option<u32>,
    out: &mut Vec<SourceSymbol>,
) {
    for symbol in symbols {
        let mut next_parent = parent_offset;

        if is_declaration(symbol.kind, parent_offset.is_none()) {
            let start = symbol.range.start;
            let offset = byte_offset(content, start.line, start.character);

            out.push(SourceSymbol {
                name: symbol.name.clone(),
                file_path: file_path.to_string(),
                kind: symbol.kind,
                offset,
                parent_offset,
                selection_line: symbol.selection_range.start.line,
                selection_column: symbol.selection_range.start.character,
            });
            next_parent = Some(offset);
        }

        if let Some(children) = &symbol.children {
            extract_symbols(children, file_path, content, next_parent, out);
        }
    }
}

/// Incoming call hierarchy at the symbol's name position.
pub(crate) async fn incoming_hierarchy(
    client: &mut LspClient,
    symbol: &SourceSymbol,
) -> Result<CallHierarchy> {
    let items = client
        .prepare_call_hierarchy(&symbol.file_path, symbol.selection_line, symbol.selection_column)
        .await?;

    let mut incoming = Vec::new();
    if let Some(item) = items.first() {
        for call in client.incoming_calls(item).await? {
            incoming.push(CallHierarchyItem {
                name: call.from.name.clone(),
                file_path: uri_to_path(&call.from.uri),
                line: call.from.selection_range.start.line,
                column: call.from.selection_range.start.character,
                call_sites: call.from_ranges.len().max(1),
            });
        }
    }

    Ok(CallHierarchy { incoming })
}

fn uri_to_path(uri: &Uri) -> String {
    url::Url::parse(uri.as_str())
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Recursively collects files with one of `extensions`, skipping `skip_dirs`.
pub(crate) fn collect_source_files(
    dir: &Path,
    extensions: &[&str],
    skip_dirs: &[&str],
    files: &mut Vec<String>,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    if dir
        .file_name()
        .map(|n| skip_dirs.iter().any(|&s| n == s))
        .unwrap_or(false)
    {
        return Ok(());
    }

    for entry in fs::read_dir(dir).map_err(LspError::Io)? {
        let path = entry.map_err(LspError::Io)?.path();

        if path.is_dir() {
            collect_source_files(&path, extensions, skip_dirs, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e))
            .unwrap_or(false)
        {
            files.push(path.to_string_lossy().to_string());
        }
    }

    files.sort();
    Ok(())
}
