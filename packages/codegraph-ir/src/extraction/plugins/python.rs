//! Python plugin (C1, §4.1). One tree-sitter-python parse, walked
//! recursively; classes and `def`s push a scope, module-level assignments
//! become `variable`/`constant` symbols, imports populate a short-name →
//! full-path table used to resolve call targets.

use std::collections::HashMap;

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::extraction::plugin::{
    ExtractionContext, LanguagePlugin, ParsedFile, ParsedReference, ParsedSymbol,
};

pub struct PythonPlugin;

struct Walker<'a, 'b> {
    ctx: ExtractionContext<'a>,
    imports: HashMap<String, String>,
    symbols: Vec<ParsedSymbol>,
    references: Vec<ParsedReference>,
    source: &'b [u8],
}

fn node_text<'b>(node: &Node, source: &'b [u8]) -> &'b str {
    node.utf8_text(source).unwrap_or_default()
}

impl<'a, 'b> Walker<'a, 'b> {
    fn emit_reference(&mut self, source_symbol_name: &str, target_name: &str, kind: ReferenceType) {
        let (target_file_path, target_symbol_name) = self.resolve_target(target_name);
        self.references.push(ParsedReference {
            source_file_path: self.ctx.file_dotted_path.clone(),
            source_symbol_name: source_symbol_name.to_string(),
            source_qualified_name: Some(self.ctx.qualified_name(source_symbol_name)),
            target_file_path,
            target_symbol_name,
            reference_type: kind,
        });
    }

    /// Resolves a bare name against the local import table, falling back to
    /// treating it as defined in the current file.
    fn resolve_target(&self, name: &str) -> (String, String) {
        let head = name.split('.').next().unwrap_or(name);
        if let Some(full_path) = self.imports.get(head) {
            if head == name {
                let (path, sym) = full_path.rsplit_once('.').unwrap_or((full_path.as_str(), name));
                return (path.to_string(), sym.to_string());
            }
            let rest = &name[head.len() + 1..];
            return (full_path.clone(), rest.to_string());
        }
        (self.ctx.file_dotted_path.clone(), name.to_string())
    }

    fn walk_module(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_statement(child);
        }
    }

    fn walk_statement(&mut self, node: Node) {
        match node.kind() {
            "class_definition" => self.extract_class(node),
            "function_definition" => self.extract_function(node),
            "decorated_definition" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if matches!(child.kind(), "function_definition" | "class_definition") {
                        self.walk_statement(child);
                    }
                }
            }
            "import_statement" => self.extract_import(node),
            "import_from_statement" => self.extract_import_from(node),
            "expression_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "assignment" {
                        self.extract_module_assignment(child);
                    } else if child.kind() == "call" {
                        self.extract_calls_in(child);
                    }
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.walk_statement(child);
                }
            }
        }
    }

    fn extract_class(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let mut extra_data = serde_json::Map::new();

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            let mut bases = Vec::new();
            for child in superclasses.children(&mut cursor) {
                if child.kind() == "identifier" || child.kind() == "attribute" {
                    let base_name = node_text(&child, self.source).to_string();
                    bases.push(base_name.clone());
                    let (target_file_path, target_symbol_name) = self.resolve_target(&base_name);
                    self.references.push(ParsedReference {
                        source_file_path: self.ctx.file_dotted_path.clone(),
                        source_symbol_name: name.clone(),
                        source_qualified_name: Some(qualified_name.clone()),
                        target_file_path,
                        target_symbol_name,
                        reference_type: ReferenceType::Inheritance,
                    });
                }
            }
            extra_data.insert("bases".into(), serde_json::json!(bases));
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name,
            kind: SymbolKind::Class,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::Value::Object(extra_data),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk_statement(child);
            }
        }
        self.ctx.pop_scope();
    }

    fn extract_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let is_method = self
            .ctx
            .scope_stack
            .last()
            .map(|s| s.chars().next().is_some_and(char::is_uppercase))
            .unwrap_or(false);

        let signature = node
            .child_by_field_name("parameters")
            .map(|params| node_text(&params, self.source).to_string());

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name,
            parent_qualified_name,
            kind: if is_method { SymbolKind::Method } else { SymbolKind::Function },
            source_code: node_text(&node, self.source).to_string(),
            signature,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.extract_calls_in(body);
        }
        self.ctx.pop_scope();
    }

    /// Walks a subtree looking for `call` expressions, emitting a `call`
    /// reference for each one resolved against the enclosing function/method.
    fn extract_calls_in(&mut self, node: Node) {
        let enclosing = self
            .ctx
            .scope_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.ctx.file_dotted_path.clone());

        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "call" {
                if let Some(function_node) = current.child_by_field_name("function") {
                    let callee = node_text(&function_node, self.source).to_string();
                    self.emit_reference(&enclosing, &callee, ReferenceType::Call);
                }
            }
            let mut cursor = current.walk();
            for child in current.children(&mut cursor) {
                stack.push(child);
            }
        }
    }

    fn extract_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "dotted_name" || child.kind() == "aliased_import" {
                let (full_path, alias) = if child.kind() == "aliased_import" {
                    let name_node = child.child_by_field_name("name");
                    let alias_node = child.child_by_field_name("alias");
                    let full_path = name_node.map(|n| node_text(&n, self.source).to_string()).unwrap_or_default();
                    let alias = alias_node.map(|n| node_text(&n, self.source).to_string());
                    (full_path, alias)
                } else {
                    (node_text(&child, self.source).to_string(), None)
                };

                if full_path.is_empty() {
                    continue;
                }
                let short_name = alias.unwrap_or_else(|| {
                    full_path.rsplit('.').next().unwrap_or(&full_path).to_string()
                });
                self.imports.insert(short_name.clone(), full_path.replace('.', "."));
                self.register_import_symbol(&short_name, &full_path);
            }
        }
    }

    fn extract_import_from(&mut self, node: Node) {
        let Some(module_node) = node.child_by_field_name("module_name") else { return };
        let module_path = node_text(&module_node, self.source).to_string();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "dotted_name" || child.kind() == "identifier" {
                let imported = node_text(&child, self.source).to_string();
                if imported.is_empty() || imported == module_path {
                    continue;
                }
                let full_path = format!("{module_path}.{imported}");
                self.imports.insert(imported.clone(), full_path.clone());
                self.register_import_symbol(&imported, &full_path);
            } else if child.kind() == "aliased_import" {
                let name_node = child.child_by_field_name("name");
                let alias_node = child.child_by_field_name("alias");
                let imported = name_node.map(|n| node_text(&n, self.source).to_string()).unwrap_or_default();
                let alias = alias_node.map(|n| node_text(&n, self.source).to_string()).unwrap_or(imported.clone());
                if imported.is_empty() {
                    continue;
                }
                let full_path = format!("{module_path}.{imported}");
                self.imports.insert(alias.clone(), full_path.clone());
                self.register_import_symbol(&alias, &full_path);
            }
        }
    }

    fn register_import_symbol(&mut self, short_name: &str, full_path: &str) {
        let qualified_name = self.ctx.qualified_name(short_name);
        self.symbols.push(ParsedSymbol {
            name: short_name.to_string(),
            qualified_name: qualified_name.clone(),
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

        let (path, sym) = full_path.rsplit_once('.').unwrap_or((full_path, short_name));
        self.references.push(ParsedReference {
            source_file_path: self.ctx.file_dotted_path.clone(),
            source_symbol_name: self.ctx.file_dotted_path.clone(),
            source_qualified_name: Some(self.ctx.file_dotted_path.clone()),
            target_file_path: path.to_string(),
            target_symbol_name: sym.to_string(),
            reference_type: ReferenceType::Import,
        });
    }

    fn extract_module_assignment(&mut self, node: Node) {
        if !self.ctx.scope_stack.is_empty() {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else { return };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(&left, self.source).to_string();
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
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });
    }
}

impl LanguagePlugin for PythonPlugin {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::language()).is_err() {
            return ParsedFile::with_error("failed to load python grammar");
        }

        let Some(tree) = parser.parse(source, None) else {
            return ParsedFile::with_error("tree-sitter failed to parse python source");
        };

        let mut walker = Walker {
            ctx: ExtractionContext::new(source, relative_path, "."),
            imports: HashMap::new(),
            symbols: Vec::new(),
            references: Vec::new(),
            source: source.as_bytes(),
        };

        walker.walk_module(tree.root_node());

        ParsedFile {
            symbols: walker.symbols,
            references: walker.references,
            errors: Vec::new(),
        }
    }
}
