//! Bridges a plugin's parse output to `codegraph-storage`'s insert shape.
//! The two types are structurally identical by design — extraction stays
//! storage-agnostic, storage stays parser-agnostic — so this is a plain
//! field-for-field `From` rather than anything clever.

use codegraph_storage::symbols::{NewReference, NewSymbol};

use super::plugin::{ParsedReference, ParsedSymbol};

impl From<ParsedSymbol> for NewSymbol {
    fn from(symbol: ParsedSymbol) -> Self {
        NewSymbol {
            name: symbol.name,
            qualified_name: symbol.qualified_name,
            parent_qualified_name: symbol.parent_qualified_name,
            kind: symbol.kind,
            source_code: symbol.source_code,
            signature: symbol.signature,
            extra_data: symbol.extra_data,
            start_line: symbol.start_line,
            end_line: symbol.end_line,
            start_col: symbol.start_col,
            end_col: symbol.end_col,
        }
    }
}

impl From<ParsedReference> for NewReference {
    fn from(reference: ParsedReference) -> Self {
        NewReference {
            source_file_path: reference.source_file_path,
            source_symbol_name: reference.source_symbol_name,
            source_qualified_name: reference.source_qualified_name,
            target_file_path: reference.target_file_path,
            target_symbol_name: reference.target_symbol_name,
            reference_type: reference.reference_type,
        }
    }
}

/// Converts a plugin's full parse output into storage's insert shape in
/// one pass.
pub fn into_storage_inputs(parsed: super::plugin::ParsedFile) -> (Vec<NewSymbol>, Vec<NewReference>) {
    let symbols = parsed.symbols.into_iter().map(NewSymbol::from).collect();
    let references = parsed.references.into_iter().map(NewReference::from).collect();
    (symbols, references)
}
