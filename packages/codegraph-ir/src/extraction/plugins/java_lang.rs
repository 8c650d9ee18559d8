//! Java plugin (C1, §4.1). Shares its scope-walking shape with Kotlin —
//! class/interface/enum bodies push a scope, methods (and the constructor,
//! named after the class) are the leaves, a `member` edge ties each method
//! back to its declaring type.

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::extraction::plugin::{
    ExtractionContext, LanguagePlugin, ParsedFile, ParsedReference, ParsedSymbol,
};

pub struct JavaPlugin;

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
            "class_declaration" => self.extract_type(node, SymbolKind::Class),
            "interface_declaration" => self.extract_type(node, SymbolKind::Interface),
            "enum_declaration" => self.extract_type(node, SymbolKind::Enum),
            "method_declaration" | "constructor_declaration" => self.extract_method(node),
            "field_declaration" => self.extract_field(node),
            "import_declaration" => self.extract_import(node),
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn extract_type(&mut self, node: Node, kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let mut extra_data = serde_json::Map::new();
        self.collect_annotations(&node, &mut extra_data);

        if let Some(superclass) = node.child_by_field_name("superclass") {
            self.emit_type_reference(&name, &qualified_name, &superclass, ReferenceType::Inheritance);
        }
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            let mut cursor = interfaces.walk();
            for child in interfaces.children(&mut cursor) {
                if child.kind() == "type_list" || child.kind() == "interface_type_list" {
                    let mut inner = child.walk();
                    for iface in child.children(&mut inner) {
                        self.emit_type_reference(&name, &qualified_name, &iface, ReferenceType::Inheritance);
                    }
                } else {
                    self.emit_type_reference(&name, &qualified_name, &child, ReferenceType::Inheritance);
                }
            }
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name,
            kind,
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
            self.walk_children(body);
        }
        self.ctx.pop_scope();
    }

    fn emit_type_reference(&mut self, source_name: &str, source_qualified: &str, type_node: &Node, kind: ReferenceType) {
        let type_name = node_text(type_node, self.source).trim().to_string();
        if type_name.is_empty() || type_name == "," {
            return;
        }
        self.references.push(ParsedReference {
            source_file_path: self.ctx.file_dotted_path.clone(),
            source_symbol_name: source_name.to_string(),
            source_qualified_name: Some(source_qualified.to_string()),
            target_file_path: self.ctx.file_dotted_path.clone(),
            target_symbol_name: type_name,
            reference_type: kind,
        });
    }

    fn extract_method(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, self.source).to_string())
            .unwrap_or_else(|| {
                self.ctx.scope_stack.last().cloned().unwrap_or_default()
            });
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let mut extra_data = serde_json::Map::new();
        self.collect_annotations(&node, &mut extra_data);

        let signature = node
            .child_by_field_name("parameters")
            .map(|params| node_text(&params, self.source).to_string());

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name: parent_qualified_name.clone(),
            kind: SymbolKind::Method,
            source_code: node_text(&node, self.source).to_string(),
            signature,
            extra_data: serde_json::Value::Object(extra_data),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        if let Some(container) = parent_qualified_name.clone() {
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

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.extract_calls_and_instantiations(body, &name, &qualified_name);
        }
        self.ctx.pop_scope();
    }

    fn extract_field(&mut self, node: Node) {
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

    fn extract_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "scoped_identifier" || child.kind() == "identifier" {
                let full_path = node_text(&child, self.source).to_string();
                let short_name = full_path.rsplit('.').next().unwrap_or(&full_path).to_string();
                self.symbols.push(ParsedSymbol {
                    name: short_name.clone(),
                    qualified_name: self.ctx.qualified_name(&short_name),
                    parent_qualified_name: self.ctx.parent_qualified_name(),
                    kind: SymbolKind::Import,
                    source_code: full_path.clone(),
                    signature: None,
                    extra_data: serde_json::json!({ "full_path": full_path }),
                    start_line: None,
                    end_line: None,
                    start_col: None,
                    end_col: None,
                });

                let (path, sym) = full_path.rsplit_once('.').unwrap_or((full_path.as_str(), short_name.as_str()));
                self.references.push(ParsedReference {
                    source_file_path: self.ctx.file_dotted_path.clone(),
                    source_symbol_name: self.ctx.file_dotted_path.clone(),
                    source_qualified_name: Some(self.ctx.file_dotted_path.clone()),
                    target_file_path: path.to_string(),
                    target_symbol_name: sym.to_string(),
                    reference_type: ReferenceType::Import,
                });
            }
        }
    }

    /// Flat annotation names, recorded but never turned into their own symbols.
    fn collect_annotations(&mut self, node: &Node, extra_data: &mut serde_json::Map<String, serde_json::Value>) {
        let Some(modifiers) = node.child_by_field_name("modifiers") else { return };
        let mut annotations = Vec::new();
        let mut cursor = modifiers.walk();
        for child in modifiers.children(&mut cursor) {
            if child.kind() == "marker_annotation" || child.kind() == "annotation" {
                annotations.push(node_text(&child, self.source).to_string());
            }
        }
        if !annotations.is_empty() {
            extra_data.insert("annotations".into(), serde_json::json!(annotations));
        }
    }

    fn extract_calls_and_instantiations(&mut self, node: Node, enclosing_name: &str, enclosing_qualified: &str) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "method_invocation" => {
                    if let Some(name_node) = current.child_by_field_name("name") {
                        let callee = node_text(&name_node, self.source).to_string();
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
                "object_creation_expression" => {
                    if let Some(type_node) = current.child_by_field_name("type") {
                        let type_name = node_text(&type_node, self.source).to_string();
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

impl LanguagePlugin for JavaPlugin {
    fn language(&self) -> Language {
        Language::Java
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_java::language()).is_err() {
            return ParsedFile::with_error("failed to load java grammar");
        }

        let Some(tree) = parser.parse(source, None) else {
            return ParsedFile::with_error("tree-sitter failed to parse java source");
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
