//! The `LanguagePlugin` port (C1). Each language implements this trait;
//! plugins are pure — no storage or I/O touches this boundary.

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};

/// One symbol found in a file, prior to id assignment.
#[derive(Debug, Clone)]
pub struct ParsedSymbol {
    pub name: String,
    pub qualified_name: String,
    pub parent_qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub source_code: String,
    pub signature: Option<String>,
    pub extra_data: serde_json::Value,
    pub start_line: Option<i32>,
    pub end_line: Option<i32>,
    pub start_col: Option<i32>,
    pub end_col: Option<i32>,
}

/// One reference found in a file, addressed by both endpoints' dotted
/// file-path + name so it can be resolved against either a same-file or a
/// cross-file target later (§4.1's reference-emission contract).
#[derive(Debug, Clone)]
pub struct ParsedReference {
    pub source_file_path: String,
    pub source_symbol_name: String,
    pub source_qualified_name: Option<String>,
    pub target_file_path: String,
    pub target_symbol_name: String,
    pub reference_type: ReferenceType,
}

/// The result of parsing one file. Always returned, even on error — a
/// failed parse is an empty `ParsedFile` with `errors` populated, so the
/// caller can continue with the rest of the repository.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub symbols: Vec<ParsedSymbol>,
    pub references: Vec<ParsedReference>,
    pub errors: Vec<String>,
}

impl ParsedFile {
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            symbols: Vec::new(),
            references: Vec::new(),
            errors: vec![message.into()],
        }
    }
}

/// Scope-aware context threaded through a single-file parse. `file_dotted_path`
/// is the file's relative path with its extension stripped and separators
/// normalized to `.` — the prefix every qualified name in this file shares.
pub struct ExtractionContext<'a> {
    pub source: &'a str,
    pub file_dotted_path: String,
    pub scope_stack: Vec<String>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(source: &'a str, relative_path: &str, scope_separator: &str) -> Self {
        let without_ext = relative_path
            .rsplit_once('.')
            .map(|(stem, _ext)| stem)
            .unwrap_or(relative_path);
        let file_dotted_path = without_ext.replace(['/', '\\'], ".");

        Self {
            source,
            file_dotted_path,
            scope_stack: Vec::new(),
        }
    }

    /// Builds the qualified name for `name` at the current scope depth,
    /// per §4.1's qualified-name rule.
    pub fn qualified_name(&self, name: &str) -> String {
        let mut parts = vec![self.file_dotted_path.clone()];
        parts.extend(self.scope_stack.iter().cloned());
        parts.push(name.to_string());
        parts.join(".")
    }

    pub fn parent_qualified_name(&self) -> Option<String> {
        if self.scope_stack.is_empty() {
            None
        } else {
            let mut parts = vec![self.file_dotted_path.clone()];
            parts.extend(self.scope_stack.iter().cloned());
            Some(parts.join("."))
        }
    }

    pub fn push_scope(&mut self, name: &str) {
        self.scope_stack.push(name.to_string());
    }

    pub fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }
}

pub trait LanguagePlugin: Send + Sync {
    fn language(&self) -> Language;

    /// File extensions this plugin claims, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses one file's source text into symbols and references. Never
    /// panics on malformed input — a syntax error becomes an entry in
    /// `ParsedFile::errors`, never a propagated error, so one bad file
    /// never stalls the rest of a repository's parse batch.
    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile;
}
