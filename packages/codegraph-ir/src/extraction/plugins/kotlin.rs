//! Kotlin plugin (C1, §4.1). Extends the Java-shaped walk with `data class`/
//! `object` declarations, a property name→type table used to resolve DSL
//! receiver calls, and a walk into trailing-lambda arguments.

use std::collections::HashMap;

use codegraph_core::domain::{Language, ReferenceType, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::extraction::plugin::{
    ExtractionContext, LanguagePlugin, ParsedFile, ParsedReference, ParsedSymbol,
};

pub struct KotlinPlugin;

fn node_text<'b>(node: &Node, source: &'b [u8]) -> &'b str {
    node.utf8_text(source).unwrap_or_default()
}

struct Walker<'a, 'b> {
    ctx: ExtractionContext<'a>,
    /// property name → declared type, used when a later call's receiver is a
    /// bare property name (the DSL-builder pattern: `repository { ... }`).
    field_types: HashMap<String, String>,
    symbols: Vec<ParsedSymbol>,
    references: Vec<ParsedReference>,
    source: &'b [u8],
}

impl<'a, 'b> Walker<'a, 'b> {
    fn walk(&mut self, node: Node) {
        match node.kind() {
            "class_declaration" => self.extract_class(node),
            "object_declaration" => self.extract_object(node),
            "function_declaration" => self.extract_function(node),
            "property_declaration" => self.extract_property(node),
            "import_header" => self.extract_import(node),
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn is_data_class(&self, node: &Node) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" {
                let text = node_text(&child, self.source);
                if text.contains("data") {
                    return true;
                }
            }
        }
        false
    }

    fn extract_class(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let is_data_class = self.is_data_class(&node);
        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();

        if let Some(delegation) = node.child_by_field_name("delegation_specifiers") {
            let mut cursor = delegation.walk();
            for spec in delegation.children(&mut cursor) {
                let type_name = node_text(&spec, self.source)
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                if type_name.is_empty() || type_name == "," {
                    continue;
                }
                self.references.push(ParsedReference {
                    source_file_path: self.ctx.file_dotted_path.clone(),
                    source_symbol_name: name.clone(),
                    source_qualified_name: Some(qualified_name.clone()),
                    target_file_path: self.ctx.file_dotted_path.clone(),
                    target_symbol_name: type_name,
                    reference_type: ReferenceType::Inheritance,
                });
            }
        }

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name,
            kind: SymbolKind::Class,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({ "data_class": is_data_class }),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

        if let Some(constructor) = node.child_by_field_name("primary_constructor") {
            self.extract_constructor_params(&constructor);
        }

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body);
        }
        self.ctx.pop_scope();
    }

    /// `val`/`var` parameters in a data class's primary constructor become
    /// fields, recorded in the type table the same way a body property is.
    fn extract_constructor_params(&mut self, node: &Node) {
        let mut cursor = node.walk();
        for param in node.children(&mut cursor) {
            if param.kind() != "class_parameter" {
                continue;
            }
            let Some(name_node) = param.child_by_field_name("name") else { continue };
            let name = node_text(&name_node, self.source).to_string();
            if name.is_empty() {
                continue;
            }
            if let Some(type_node) = param.child_by_field_name("type") {
                self.field_types.insert(name.clone(), node_text(&type_node, self.source).to_string());
            }
            self.symbols.push(ParsedSymbol {
                name: name.clone(),
                qualified_name: self.ctx.qualified_name(&name),
                parent_qualified_name: self.ctx.parent_qualified_name(),
                kind: SymbolKind::Variable,
                source_code: node_text(&param, self.source).to_string(),
                signature: None,
                extra_data: serde_json::json!({}),
                start_line: Some(param.start_position().row as i32 + 1),
                end_line: Some(param.end_position().row as i32 + 1),
                start_col: Some(param.start_position().column as i32),
                end_col: Some(param.end_position().column as i32),
            });
        }
    }

    fn extract_object(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, self.source).to_string())
            .unwrap_or_else(|| "companion".to_string());

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: self.ctx.qualified_name(&name),
            parent_qualified_name: self.ctx.parent_qualified_name(),
            kind: SymbolKind::Class,
            source_code: node_text(&node, self.source).to_string(),
            signature: None,
            extra_data: serde_json::json!({ "object": true }),
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

    fn extract_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let qualified_name = self.ctx.qualified_name(&name);
        let parent_qualified_name = self.ctx.parent_qualified_name();
        let signature = node
            .child_by_field_name("parameters")
            .map(|params| node_text(&params, self.source).to_string());

        self.symbols.push(ParsedSymbol {
            name: name.clone(),
            qualified_name: qualified_name.clone(),
            parent_qualified_name: parent_qualified_name.clone(),
            kind: if parent_qualified_name.is_some() { SymbolKind::Method } else { SymbolKind::Function },
            source_code: node_text(&node, self.source).to_string(),
            signature,
            extra_data: serde_json::json!({}),
            start_line: Some(node.start_position().row as i32 + 1),
            end_line: Some(node.end_position().row as i32 + 1),
            start_col: Some(node.start_position().column as i32),
            end_col: Some(node.end_position().column as i32),
        });

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

        self.ctx.push_scope(&name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_calls_and_dsl(body, &name, &qualified_name);
        }
        self.ctx.pop_scope();
    }

    fn extract_property(&mut self, node: Node) {
        let Some(name_node) = node
            .child_by_field_name("name")
            .or_else(|| node.named_child(0))
        else {
            return;
        };
        let name = node_text(&name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }
        if let Some(type_node) = node.child_by_field_name("type") {
            self.field_types.insert(name.clone(), node_text(&type_node, self.source).to_string());
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

    fn extract_import(&mut self, node: Node) {
        let Some(identifier) = node.named_child(0) else { return };
        let full_path = node_text(&identifier, self.source).to_string();
        if full_path.is_empty() {
            return;
        }
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

    /// Walks call expressions, resolving a bare-identifier receiver against
    /// the field-type table first so `repository { ... }`-style DSL builder
    /// calls resolve to the receiver's declared type rather than its
    /// variable name.
    fn walk_calls_and_dsl(&mut self, node: Node, enclosing_name: &str, enclosing_qualified: &str) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "call_expression" {
                if let Some(callee_node) = current.child(0) {
                    let raw = node_text(&callee_node, self.source).to_string();
                    let receiver = raw.split('.').next().unwrap_or(&raw).to_string();
                    let target = self.field_types.get(&receiver).cloned().unwrap_or(raw);
                    self.references.push(ParsedReference {
                        source_file_path: self.ctx.file_dotted_path.clone(),
                        source_symbol_name: enclosing_name.to_string(),
                        source_qualified_name: Some(enclosing_qualified.to_string()),
                        target_file_path: self.ctx.file_dotted_path.clone(),
                        target_symbol_name: target,
                        reference_type: ReferenceType::Call,
                    });
                }
                if let Some(lambda) = current.child_by_field_name("lambda") {
                    stack.push(lambda);
                }
            }
            let mut cursor = current.walk();
            for child in current.children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

impl LanguagePlugin for KotlinPlugin {
    fn language(&self) -> Language {
        Language::Kotlin
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["kt", "kts"]
    }

    fn parse(&self, source: &str, relative_path: &str) -> ParsedFile {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_kotlin::language()).is_err() {
            return ParsedFile::with_error("failed to load kotlin grammar");
        }

        let Some(tree) = parser.parse(source, None) else {
            return ParsedFile::with_error("tree-sitter failed to parse kotlin source");
        };

        let mut walker = Walker {
            ctx: ExtractionContext::new(source, relative_path, "."),
            field_types: HashMap::new(),
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
