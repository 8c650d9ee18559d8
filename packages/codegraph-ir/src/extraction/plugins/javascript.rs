//! JavaScript plugin (C1, §4.1). Reuses the TypeScript grammar (the JS
//! dialect it's a strict superset of); only the declaration shapes §4.1
//! names are walked — function declarations, `const`/`let` bindings whose
//! initializer is an arrow function, classes and their methods, `require`
//! and `import`, and `new` instantiation.

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::extraction::plugin::{
    ExtractionContext, LanguagePlugin, ParsedFile, ParsedReference, ParsedSymbol,
};

pub struct JavaScriptPlugin;

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
            "function_declaration" => self.extract_function(node, None),
            "class_declaration" => self.extract_class(node),
            "lexical_declaration" | "variable_declaration" => self.extract_bindings(node),
            "import_statement" => self.extract_import(node),
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn extract_function(&mut self, node: Node, forced_name: Option<String>) {
        let name = forced_name
            .or_else(|| node.child_by_field_name("name").map(|n| node_text(&n, self.source).to_string()))
            .unwrap_or_default();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let is_method = node.kind() == "method_definition";
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

    fn extract_class(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();

        if let Some(heritage) = node.child_by_field_name("superclass") {
            let base_name = node_text(&heritage, self.source).trim_start_matches("extends").trim().to_string();
            if !base_name.is_empty() {
                self.references.push(ParsedReference {
                    source_file_path: self.ctx.file_dotted_path.clone(),
                    source_symbol_name: name.clone(),
                    source_qualified_name: Some(qualified_name.clone()),
                    target_file_path: self.ctx.file_dotted_path.clone(),
                    target_symbol_name: base_name,
                    reference_type: ReferenceType::Inheritance,
                });
            }
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name,
            parent_qualified_name,
            kind: SymbolKind::Class,
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
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                if child.kind() == "method_definition" {
                    self.extract_function(child, None);
                }
            }
        }
        self.ctx.pop_scope();
    }

    /// `const foo = () => {}` (and `const Bar = class {}`) are the two
    /// binding shapes §4.1 calls out; plain value bindings become variables.
    fn extract_bindings(&mut self, node: Node) {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else { continue };
            let name = node_text(&name_node, self.source).to_string();
            if name.is_empty() {
                continue;
            }

            let value = declarator.child_by_field_name("value");
            if let Some(value_node) = value {
                if value_node.kind() == "arrow_function" || value_node.kind() == "function" {
                    self.extract_function(value_node, Some(name));
                    continue;
                }
            }

            let kind = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_numeric()) {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };

            self.symbols.push(ParsedSymbol {
                name: name.clone(),
                qualified_name: self.ctx.qualified_name(&name),
                parent_qualified_name: self.ctx.parent_qualified_name(),
                kind,
                source_code: node_text(&declarator, self.source).to_string(),
                signature: None,
                extra_data: serde_json::json!({}),
                start_line: Some(declarator.start_position().row as i32 + 1),
                end_line: Some(declarator.end_position().row as i32 + 1),
                start_col: Some(declarator.start_position().column as i32),
                end_col: Some(declarator.end_position().column as i32),
            });

            if let Some(value_node) = value {
                if value_node.kind() == "call_expression" {
                    self.record_require(&value_node, &name);
                }
            }
        }
    }

    fn record_require(&mut self, call_node: &Node, binding_name: &str) {
        let Some(function_node) = call_node.child_by_field_name("function") else { return };
        if node_text(&function_node, self.source) != "require" {
            return;
        }
        let Some(args) = call_node.child_by_field_name("arguments") else { return };
        let Some(first_arg) = args.named_child(0) else { return };
        let module_path = node_text(&first_arg, self.source).trim_matches(['"', '\'']).to_string();
        self.register_import(binding_name, &module_path);
    }

    fn extract_import(&mut self, node: Node) {
        let Some(source_node) = node.child_by_field_name("source") else { return };
        let module_path = node_text(&source_node, self.source).trim_matches(['"', '\'']).to_string();

        let mut found_binding = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_clause" => {
                    let mut inner = child.walk();
                    for clause_child in child.children(&mut inner) {
                        match clause_child.kind() {
                            "identifier" => {
                                found_binding = true;
                                self.register_import(&node_text(&clause_child, self.source).to_string(), &module_path);
                            }
                            "named_imports" => {
                                let mut spec_cursor = clause_child.walk();
                                for spec in clause_child.children(&mut spec_cursor) {
                                    if spec.kind() == "import_specifier" {
                                        found_binding = true;
                                        let bound = spec
                                            .child_by_field_name("alias")
                                            .or_else(|| spec.child_by_field_name("name"))
                                            .map(|n| node_text(&n, self.source).to_string())
                                            .unwrap_or_default();
                                        if !bound.is_empty() {
                                            self.register_import(&bound, &module_path);
                                        }
                                    }
                                }
                            }
                            "namespace_import" => {
                                found_binding = true;
                                self.register_import(&module_path, &module_path);
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        if !found_binding {
            self.register_import(&module_path, &module_path);
        }
    }

    fn register_import(&mut self, short_name: &str, module_path: &str) {
        self.symbols.push(ParsedSymbol {
            name: short_name.to_string(),
            qualified_name: self.ctx.qualified_name(short_name),
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind: SymbolKind::Import,
            source_code: module_path.to_string(),
            signature: None,
            extra_data: serde_json::json!({ "module_path": module_path }),
            start_line: None,
            end_line: None,
            start_col: None,
            end_col: None,
        });

        self.references.push(ParsedReference {
            source_file_path: self.ctx.file_dotted_path.clone(),
            source_symbol_name: self.ctx.file_dotted_path.clone(),
            source_qualified_name: Some(self.ctx.file_dotted_path.clone()),
            target_file_path: module_path.to_string(),
            target_symbol_name: short_name.to_string(),
            reference_type: ReferenceType::Import,
        });
    }

    fn walk_calls(&mut self, node: Node, enclosing_name: &str, enclosing_qualified: &str) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "call_expression" => {
                    if let Some(function_node) = current.child_by_field_name("function") {
                        let callee = node_text(&function_node, self.source).to_string();
                        if callee != "require" {
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
                }
                "new_expression" => {
                    if let Some(ctor_node) = current.child_by_field_name("constructor") {
                        let type_name = node_text(&ctor_node, self.source).to_string();
                        self.references.push(ParsedReference {
                            source_file_path: self.ctx.file_dotted_path.clone(),
                            source_symbol_name: enclosing_name.to_string(),
                            source_qualified_name: Some(enclosing_qualified.to_string()),
                            target_file_path: self.ctx.file_dotted_path.clone(),
                            target_symbol_name: type_name,
                            reference_type: ReferenceType::Instantiation,
                        });
                    }
                }
                _ => {}
            }
            let mut cursor = current.walk();
            for child in current.children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

impl LanguagePlugin for JavaScriptPlugin {
    fn language(&self) -> Language {
        Language::Javascript
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "mjs", "cjs"]
    }

    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_typescript::language_typescript()).is_err() {
            return ParsedFile::with_error("failed to load javascript grammar");
        }

        let Some(tree) = parser.parse(source, None) else {
            return ParsedFile::with_error("tree-sitter failed to parse javascript source");
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
