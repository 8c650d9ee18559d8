//! Language parsing and file discovery (C1-C3, §4.1-§4.3): tree-sitter
//! based extraction plugins behind a common `LanguagePlugin` port, plus the
//! walkdir-based repository file discovery that feeds a parsing run.

pub mod extraction;
