use lsp_types::SymbolKind;
use serde::{Deserialize, Serialize};

/// A declared symbol reported by a language server, flattened out of the
/// document symbol hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSymbol {
    /// Display name as reported by the server
    pub name: String,
    /// Absolute path of the defining file
    pub file_path: String,
    pub kind: SymbolKind,
    /// Byte offset of the declaration start within the file
    pub offset: u32,
    /// Byte offset of the immediately enclosing reported symbol
    pub parent_offset: Option<u32>,
    /// Position of the symbol name, used for call hierarchy lookups
    pub selection_line: u32,
    pub selection_column: u32,
}

impl SourceSymbol {
    /// Whether the symbol can appear in a call hierarchy.
    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::FUNCTION | SymbolKind::METHOD | SymbolKind::CONSTRUCTOR
        )
    }

    /// Key matching the selection position of a call hierarchy item.
    pub fn location_key(&self) -> (String, u32, u32) {
        (self.file_path.clone(), self.selection_line, self.selection_column)
    }
}

/// Incoming call hierarchy of one callable symbol.
#[derive(Debug, Clone, Default)]
pub struct CallHierarchy {
    /// One entry per calling function, in server order
    pub incoming: Vec<CallHierarchyItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHierarchyItem {
    pub name: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    /// Number of distinct call sites inside the caller
    pub call_sites: usize,
}

impl CallHierarchyItem {
    /// Unique identifier (file:line:name)
    pub fn stable_id(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.line, self.name)
    }

    pub fn location_key(&self) -> (String, u32, u32) {
        (self.file_path.clone(), self.line, self.column)
    }
}

/// Converts an LSP position (line, UTF-16 column) into a byte offset.
///
/// Positions past the end of a line clamp to the line end, positions past
/// the last line clamp to the end of the content.
pub fn byte_offset(content: &str, line: u32, character: u32) -> u32 {
    let mut offset = 0usize;
    for (idx, text) in content.split_inclusive('\n').enumerate() {
        if idx as u32 == line {
            let mut units = 0u32;
            for (byte_idx, ch) in text.char_indices() {
                if units >= character || ch == '\n' || ch == '\r' {
                    return (offset + byte_idx) as u32;
                }
                units += ch.len_utf16() as u32;
            }
            return (offset + text.trim_end_matches(['\n', '\r']).len()) as u32;
        }
        offset += text.len();
    }
    content.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_symbol(kind: SymbolKind) -> SourceSymbol {
        SourceSymbol {
            name: "run".to_string(),
            file_path: "/src/lib.rs".to_string(),
            kind,
            offset: 10,
            parent_offset: None,
            selection_line: 2,
            selection_column: 7,
        }
    }

    #[test]
    fn test_is_callable() {
        assert!(make_symbol(SymbolKind::FUNCTION).is_callable());
        assert!(make_symbol(SymbolKind::METHOD).is_callable());
        assert!(make_symbol(SymbolKind::CONSTRUCTOR).is_callable());
        assert!(!make_symbol(SymbolKind::STRUCT).is_callable());
        assert!(!make_symbol(SymbolKind::CONSTANT).is_callable());
    }

    #[test]
    fn test_location_keys_line_up() {
        let symbol = make_symbol(SymbolKind::FUNCTION);
        let item = CallHierarchyItem {
            name: "run".to_string(),
            file_path: "/src/lib.rs".to_string(),
            line: 2,
            column: 7,
            call_sites: 1,
        };
        assert_eq!(symbol.location_key(), item.location_key());
    }

    #[test]
    fn test_call_hierarchy_item_stable_id() {
        let item = CallHierarchyItem {
            name: "foo".to_string(),
            file_path: "/src/lib.rs".to_string(),
            line: 42,
            column: 4,
            call_sites: 2,
        };
        assert_eq!(item.stable_id(), "/src/lib.rs:42:foo");
    }

    #[test]
    fn test_byte_offset_ascii() {
        let content = "fn a() {}\nfn b() {}\n";
        assert_eq!(byte_offset(content, 0, 0), 0);
        assert_eq!(byte_offset(content, 0, 3), 3);
        assert_eq!(byte_offset(content, 1, 0), 10);
        assert_eq!(byte_offset(content, 1, 3), 13);
    }

    #[test]
    fn test_byte_offset_counts_utf16_units() {
        // 'é' is one UTF-16 unit but two bytes
        let content = "let é = 1;\nfn x() {}";
        assert_eq!(byte_offset(content, 0, 5), 6);
    }

    #[test]
    fn test_byte_offset_clamps() {
        let content = "ab\ncd";
        assert_eq!(byte_offset(content, 0, 99), 2);
        assert_eq!(byte_offset(content, 7, 0), 5);
    }
}
