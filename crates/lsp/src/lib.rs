//! lsp - language server access
//!
//! Enumerates declared symbols and incoming call hierarchy through a
//! language server.

mod adapters;
mod protocol;
mod types;

pub use adapters::{LanguageAdapter, RustAdapter, TypeScriptAdapter};
pub use lsp_types::SymbolKind;
pub use protocol::{LspClient, LspError, Result};
pub use types::{byte_offset, CallHierarchy, CallHierarchyItem, SourceSymbol};
