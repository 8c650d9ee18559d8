//! Rust plugin (C1, §4.1). `::` is the scope separator everywhere inside a
//! file; it is only ever collapsed to `.` at the file-path boundary that
//! `ExtractionContext::file_dotted_path` already applies, so scope pushes
//! here use plain names and the context's `.`-joining stays untouched.

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::extraction::plugin::{
    ExtractionContext, LanguagePlugin, ParsedFile, ParsedReference, ParsedSymbol,
};

pub struct RustPlugin;

fn node_text<'b>(node: &Node, source: &'b [u8]) -> &'b str {
    node.utf8_text(source).unwrap_or_default()
}

struct Walker<'a, 'b> {
    ctx: ExtractionContext<'a>,
    symbols: Vec<ParsedSymbol>,
    references: Vec<ParsedReference>,
    source: &'b [u8],
}

impl<'a, 'b> Walker<'a, 'b> {
    fn walk(&mut self, node: Node) {
        match node.kind() {
            "struct_item" => self.extract_item(node, SymbolKind::Struct, None),
            "enum_item" => self.extract_item(node, SymbolKind::Enum, None),
            "trait_item" => self.extract_item(node, SymbolKind::Trait, Some("body")),
            "function_item" => self.extract_function(node),
            "mod_item" => self.extract_mod(node),
            "impl_item" => self.extract_impl(node),
            "use_declaration" => self.extract_use(node),
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn extract_item(&mut self, node: Node, kind: SymbolKind, body_field: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: self.ctx.qualified_name(&name),
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        if let Some(field) = body_field {
            self.ctx.push_scope(&name);
            if let Some(body) = node.child_by_field_name(field) {
                self.walk_children(body);
            }
            self.ctx.pop_scope();
        }
    }

    fn extract_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let is_method = !self.ctx.scope_stack.is_empty();
        let signature = node
            .child_by_field_name("parameters")
            .map(|params| node_text(&params, self.source).to_string());

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name: parent_qualified_name.clone(),
            kind: if is_method { SymbolKind::Method } else { SymbolKind::Function },
            source_code: node_text(&node, self.source).to_string(),
            signature,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        if is_method {
            if let Some(container) = parent_qualified_name {
                let container_name = self.ctx.scope_stack.last().cloned().unwrap_or_default();
                self.references.push(ParsedReference {
                    source_file_path: self.ctx.file_dotted_path.clone(),
                    source_symbol_name: container_name,
                    source_qualified_name: Some(container),
                    target_file_path: self.ctx.file_dotted_path.clone(),
                    target_symbol_name: name.clone(),
                    reference_type: ReferenceType::Member,
                });
            }
        }

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_calls(body, &name, &qualified_name);
        }
        self.ctx.pop_scope();
    }

    fn extract_mod(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: self.ctx.qualified_name(&name),
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind: SymbolKind::Module,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body);
        }
        self.ctx.pop_scope();
    }

    fn extract_impl(&mut self, node: Node) {
        let Some(type_node) = node.child_by_field_name("type") else { return };
        let type_name = node_text(&type_node, self.source).to_string();
        if type_name.is_empty() {
            return;
        }

        let trait_name = node.child_by_field_name("trait").map(|n| node_text(&n, self.source).to_string());
        let label = match &trait_name {
            Some(trait_name) => format!("impl {trait_name} for {type_name}"),
            None => format!("impl {type_name}"),
        };
        let qualified_name = self.ctx.qualified_name(&label);

        if let Some(trait_name) = &trait_name {
            self.references.push(ParsedReference {
                source_file_path: self.ctx.file_dotted_path.clone(),
                source_symbol_name: type_name.clone(),
                source_qualified_name: Some(self.ctx.qualified_name(&type_name)),
                target_file_path: self.ctx.file_dotted_path.clone(),
                target_symbol_name: trait_name.clone(),
                reference_type: ReferenceType::Inheritance,
            });
        }

        self.symbols.push(ParsedSymbol {
            name: label.clone(),
            qualified_name,
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind: SymbolKind::Impl,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({ "type_name": type_name, "trait_name": trait_name }),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        self.ctx.push_scope(&type_name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body);
        }
        self.ctx.pop_scope();
    }

    /// `use a::b::{c, d as e};` — each leaf becomes its own import symbol,
    /// keeping `::` untouched since it never crosses the file-path boundary.
    fn extract_use(&mut self, node: Node) {
        let Some(argument) = node.child_by_field_name("argument") else { return };
        self.walk_use_tree(&argument, String::new());
    }

    fn walk_use_tree(&mut self, node: &Node, prefix: String) {
        match node.kind() {
            "scoped_identifier" => {
                let full_path = node_text(node, self.source).to_string();
                let short_name = full_path.rsplit("::").next().unwrap_or(&full_path).to_string();
                self.register_use(&short_name, &full_path);
            }
            "identifier" => {
                let name = node_text(node, self.source).to_string();
                let full_path = if prefix.is_empty() { name.clone() } else { format!("{prefix}::{name}") };
                self.register_use(&name, &full_path);
            }
            "use_as_clause" => {
                let Some(path_node) = node.child_by_field_name("path") else { return };
                let Some(alias_node) = node.child_by_field_name("alias") else { return };
                let full_path = node_text(&path_node, self.source).to_string();
                let alias = node_text(&alias_node, self.source).to_string();
                self.register_use(&alias, &full_path);
            }
            "use_list" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.walk_use_tree(&child, prefix.clone());
                }
            }
            "scoped_use_list" => {
                let new_prefix = node
                    .child_by_field_name("path")
                    .map(|n| node_text(&n, self.source).to_string())
                    .unwrap_or(prefix);
                if let Some(list) = node.child_by_field_name("list") {
                    self.walk_use_tree(&list, new_prefix);
                }
            }
            "use_wildcard" => {}
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.walk_use_tree(&child, prefix.clone());
                }
            }
        }
    }

    fn register_use(&mut self, short_name: &str, full_path: &str) {
        if short_name.is_empty() {
            return;
        }
        self.symbols.push(ParsedSymbol {
            name: short_name.to_string(),
            qualified_name: self.ctx.qualified_name(short_name),
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind: SymbolKind::Import,
            source_code: full_path.to_string(),
            signature: None,
            extra_data: serde_json::json!({ "full_path": full_path }),
            start_line: None,
            end_line: None,
            start_col: None,
            end_col: None,
        });

        let (path, sym) = full_path.rsplit_once("::").unwrap_or((full_path, short_name));
        self.references.push(ParsedReference {
            source_file_path: self.ctx.file_dotted_path.clone(),
            source_symbol_name: self.ctx.file_dotted_path.clone(),
            source_qualified_name: Some(self.ctx.file_dotted_path.clone()),
            target_file_path: path.replace("::", "."),
            target_symbol_name: sym.to_string(),
            reference_type: ReferenceType::Import,
        });
    }

    fn walk_calls(&mut self, node: Node, enclosing_name: &str, enclosing_qualified: &str) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "call_expression" {
                if let Some(function_node) = current.child_by_field_name("function") {
                    let callee = node_text(&function_node, self.source).to_string();
                    self.references.push(ParsedReference {
                        source_file_path: self.ctx.file_dotted_path.clone(),
                        source_symbol_name: enclosing_name.to_string(),
                        source_qualified_name: Some(enclosing_qualified.to_string()),
                        target_file_path: self.ctx.file_dotted_path.clone(),
                        target_symbol_name: callee,
                        reference_type: ReferenceType::Call,
                    });
                }
            }
            let mut cursor = current.walk();
            for child in current.children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

impl LanguagePlugin for RustPlugin {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_rust::language()).is_err() {
            return ParsedFile::with_error("failed to load rust grammar");
        }

        let Some(tree) = parser.parse(source, None) else {
            return ParsedFile::with_error("tree-sitter failed to parse rust source");
        };

        let mut walker = Walker {
            ctx: ExtractionContext::new(source, relative_path, "."),
            symbols: Vec::new(),
            references: Vec::new(),
            source: source.as_bytes(),
        };

        walker.walk_children(tree.root_node());

        ParsedFile {
            symbols: walker.symbols,
            references: walker.references,
            errors: Vec::new(),
        }
    }
}
