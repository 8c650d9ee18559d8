//! Symbol and reference persistence (C4, §3/§4.1/§4.7). Bulk replace per
//! file, cross-file reference resolution, lookup by qualified name and by
//! path pattern for the graph service (C7).

use std::collections::HashMap;

use codegraph_core::domain::{Reference, ReferenceType, Symbol, SymbolKind};
use codegraph_core::{CodegraphError, Id, Result};
use sqlx::Row;
use tracing::warn;

use crate::rows::{row_to_reference, row_to_symbol};
use crate::store::PostgresStore;

fn kind_str(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Module => "module",
        SymbolKind::Class => "class",
        SymbolKind::Function => "function",
        SymbolKind::Method => "method",
        SymbolKind::Variable => "variable",
        SymbolKind::Constant => "constant",
        SymbolKind::Import => "import",
        SymbolKind::Interface => "interface",
        SymbolKind::Enum => "enum",
        SymbolKind::Struct => "struct",
        SymbolKind::Trait => "trait",
        SymbolKind::Impl => "impl",
    }
}

fn reference_type_str(reference_type: ReferenceType) -> &'static str {
    match reference_type {
        ReferenceType::Call => "call",
        ReferenceType::Import => "import",
        ReferenceType::Inheritance => "inheritance",
        ReferenceType::TypeAnnotation => "type_annotation",
        ReferenceType::Instantiation => "instantiation",
        ReferenceType::Member => "member",
    }
}

/// One symbol extracted from a file, prior to id assignment. Mirrors the
/// plugin output shape so parsers don't need to know about storage ids.
#[derive(Debug, Clone)]
pub struct NewSymbol {
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

/// One reference extracted from a file, prior to resolution against the
/// qualified-name table built during insertion.
#[derive(Debug, Clone)]
pub struct NewReference {
    pub source_file_path: String,
    pub source_symbol_name: String,
    pub source_qualified_name: Option<String>,
    pub target_file_path: String,
    pub target_symbol_name: String,
    pub reference_type: ReferenceType,
}

impl PostgresStore {
    /// Replaces all symbols and references for `file_id` with the freshly
    /// parsed set. Symbols are deleted first (references cascade), then
    /// reinserted with new ids; references are resolved against the new
    /// qualified-name table built while inserting.
    pub async fn bulk_insert_from_parsed_file(
        &self,
        repo_id: Id,
        file_id: Id,
        symbols: &[NewSymbol],
        references: &[NewReference],
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM symbols WHERE file_id = $1")
            .bind(file_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let mut qualified_name_to_id: HashMap<String, Id> = HashMap::new();

        for symbol in symbols {
            if symbol.name.is_empty() || symbol.qualified_name.is_empty() {
                warn!(file_id = %file_id, "skipping_invalid_symbol");
                continue;
            }

            let symbol_id = Id::new();
            qualified_name_to_id.insert(symbol.qualified_name.clone(), symbol_id);

            let parent_id = symbol
                .parent_qualified_name
                .as_ref()
                .and_then(|name| qualified_name_to_id.get(name).copied());

            sqlx::query(
                r#"
                INSERT INTO symbols (
                    id, file_id, repo_id, name, qualified_name, kind, source_code,
                    signature, parent_symbol_id, extra_data, start_line, end_line,
                    start_col, end_col
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(symbol_id.as_uuid())
            .bind(file_id.as_uuid())
            .bind(repo_id.as_uuid())
            .bind(&symbol.name)
            .bind(&symbol.qualified_name)
            .bind(kind_str(symbol.kind))
            .bind(&symbol.source_code)
            .bind(&symbol.signature)
            .bind(parent_id.map(|id| id.as_uuid()))
            .bind(&symbol.extra_data)
            .bind(symbol.start_line)
            .bind(symbol.end_line)
            .bind(symbol.start_col)
            .bind(symbol.end_col)
            .execute(&mut *tx)
            .await?;
        }

        for reference in references {
            let source_qualified = format!(
                "{}.{}",
                reference.source_file_path, reference.source_symbol_name
            );
            let source_id = qualified_name_to_id
                .get(&source_qualified)
                .copied()
                .or_else(|| {
                    reference
                        .source_qualified_name
                        .as_ref()
                        .and_then(|name| qualified_name_to_id.get(name).copied())
                })
                .or_else(|| qualified_name_to_id.get(&reference.source_file_path).copied());

            let Some(source_id) = source_id else {
                continue;
            };

            let target_qualified = format!(
                "{}.{}",
                reference.target_file_path, reference.target_symbol_name
            );
            let target_id = qualified_name_to_id.get(&target_qualified).copied();

            sqlx::query(
                r#"
                INSERT INTO "references" (
                    id, repo_id, source_symbol_id, target_symbol_id, source_file_path,
                    source_symbol_name, target_file_path, target_symbol_name, reference_type
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Id::new().as_uuid())
            .bind(repo_id.as_uuid())
            .bind(source_id.as_uuid())
            .bind(target_id.map(|id| id.as_uuid()))
            .bind(&reference.source_file_path)
            .bind(&reference.source_symbol_name)
            .bind(&reference.target_file_path)
            .bind(&reference.target_symbol_name)
            .bind(reference_type_str(reference.reference_type))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Resolves references whose target symbol lives in a different file,
    /// by matching `target_symbol_name` against symbols whose file path
    /// contains the dotted `target_file_path` converted to a path fragment.
    /// Returns the number of references resolved.
    pub async fn resolve_cross_file_references(&self, repo_id: Id) -> Result<u64> {
        let ambiguous_count: i64 = sqlx::query_scalar(
            r#"
            SELECT count(*)
            FROM (
                SELECT r.id
                FROM "references" r
                JOIN symbols s ON s.repo_id = $1
                    AND s.name = r.target_symbol_name
                JOIN files f ON f.id = s.file_id
                    AND f.relative_path LIKE '%' || replace(r.target_file_path, '.', '/') || '%'
                WHERE r.repo_id = $1
                  AND r.target_symbol_id IS NULL
                GROUP BY r.id
                HAVING count(*) > 1
            ) ambiguous
            "#,
        )
        .bind(repo_id.as_uuid())
        .fetch_one(self.pool())
        .await?;

        if ambiguous_count > 0 {
            warn!(
                repo_id = %repo_id,
                ambiguous_count,
                "multiple candidate symbols matched for cross-file reference resolution, keeping first-by-id"
            );
        }

        // Among multiple same-name/path-substring candidates, resolution keeps
        // first-by-id semantics: ordered by the symbol's primary key.
        let result = sqlx::query(
            r#"
            UPDATE "references" r
            SET target_symbol_id = (
                SELECT s.id
                FROM symbols s
                JOIN files f ON s.file_id = f.id
                WHERE s.repo_id = $1
                  AND s.name = r.target_symbol_name
                  AND f.relative_path LIKE '%' || replace(r.target_file_path, '.', '/') || '%'
                ORDER BY s.id
                LIMIT 1
            )
            WHERE r.repo_id = $1
              AND r.target_symbol_id IS NULL
              AND EXISTS (
                  SELECT 1
                  FROM symbols s
                  JOIN files f ON s.file_id = f.id
                  WHERE s.repo_id = $1
                    AND s.name = r.target_symbol_name
                    AND f.relative_path LIKE '%' || replace(r.target_file_path, '.', '/') || '%'
              )
            "#,
        )
        .bind(repo_id.as_uuid())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_symbol(&self, id: Id) -> Result<Symbol> {
        let row = sqlx::query(
            r#"
            SELECT id, file_id, repo_id, name, qualified_name, kind, source_code, signature,
                   parent_symbol_id, extra_data, start_line, end_line, start_col, end_col
            FROM symbols WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("symbol {id} not found")))?;

        row_to_symbol(&row)
    }

    pub async fn get_symbols(&self, ids: &[Id]) -> Result<Vec<Symbol>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, file_id, repo_id, name, qualified_name, kind, source_code, signature,
                   parent_symbol_id, extra_data, start_line, end_line, start_col, end_col
            FROM symbols WHERE id = ANY($1)
            "#,
        )
        .bind(&uuids)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_symbol).collect()
    }

    pub async fn get_symbol_by_qualified_name(&self, repo_id: Id, qualified_name: &str) -> Result<Symbol> {
        let row = sqlx::query(
            r#"
            SELECT id, file_id, repo_id, name, qualified_name, kind, source_code, signature,
                   parent_symbol_id, extra_data, start_line, end_line, start_col, end_col
            FROM symbols WHERE repo_id = $1 AND qualified_name = $2
            "#,
        )
        .bind(repo_id.as_uuid())
        .bind(qualified_name)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("symbol {qualified_name} not found")))?;

        row_to_symbol(&row)
    }

    pub async fn list_symbols_in_file(&self, file_id: Id) -> Result<Vec<Symbol>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_id, repo_id, name, qualified_name, kind, source_code, signature,
                   parent_symbol_id, extra_data, start_line, end_line, start_col, end_col
            FROM symbols WHERE file_id = $1 ORDER BY qualified_name
            "#,
        )
        .bind(file_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_symbol).collect()
    }

    pub async fn search_symbols(&self, repo_id: Id, query: &str, limit: i64) -> Result<Vec<Symbol>> {
        let pattern = format!("{query}%");
        let rows = sqlx::query(
            r#"
            SELECT id, file_id, repo_id, name, qualified_name, kind, source_code, signature,
                   parent_symbol_id, extra_data, start_line, end_line, start_col, end_col
            FROM symbols WHERE repo_id = $1 AND name ILIKE $2
            ORDER BY name LIMIT $3
            "#,
        )
        .bind(repo_id.as_uuid())
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_symbol).collect()
    }

    /// Resolves a package-dotted or file-path symbol reference against the
    /// files table first, then joins symbols by name (C9's snippet
    /// resolution and the `/symbols/{path}/{name}` lookup both use this).
    pub async fn get_symbols_by_path_and_name(
        &self,
        repo_id: Id,
        path_pattern: &str,
        symbol_name: &str,
    ) -> Result<Vec<Symbol>> {
        let file_path_pattern = if path_pattern.contains('/') {
            format!("%{path_pattern}%")
        } else {
            format!("%{}%", path_pattern.replace('.', "/"))
        };

        let rows = sqlx::query(
            r#"
            WITH matching_files AS (
                SELECT id FROM files WHERE repo_id = $1 AND relative_path LIKE $2
            )
            SELECT s.id, s.file_id, s.repo_id, s.name, s.qualified_name, s.kind, s.source_code,
                   s.signature, s.parent_symbol_id, s.extra_data, s.start_line, s.end_line,
                   s.start_col, s.end_col
            FROM matching_files f
            JOIN symbols s ON s.file_id = f.id
            WHERE s.name = $3
            ORDER BY s.qualified_name
            "#,
        )
        .bind(repo_id.as_uuid())
        .bind(file_path_pattern)
        .bind(symbol_name)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_symbol).collect()
    }

    pub async fn symbol_stats(&self, repo_id: Id) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT kind, COUNT(*) as count FROM symbols WHERE repo_id = $1 GROUP BY kind",
        )
        .bind(repo_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        let mut stats = HashMap::new();
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let count: i64 = row.try_get("count")?;
            stats.insert(kind, count);
        }
        Ok(stats)
    }

    pub async fn list_references_from(&self, source_symbol_id: Id) -> Result<Vec<Reference>> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_id, source_symbol_id, target_symbol_id, source_file_path,
                   source_symbol_name, target_file_path, target_symbol_name, reference_type
            FROM "references" WHERE source_symbol_id = $1
            "#,
        )
        .bind(source_symbol_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_reference).collect()
    }
}
