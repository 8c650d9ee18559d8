//! Bounded call-graph traversal (C7, §4.7). Both directions walk the
//! `references` table via a recursive CTE capped at `max_depth`; downstream
//! left-joins `symbols` so unresolved external targets still surface their
//! `target_file_path`/`target_symbol_name`, while upstream only ever visits
//! rows with a resolved source, so an inner join suffices.

use codegraph_core::domain::ReferenceType;
use codegraph_core::{CodegraphError, Id, Result};
use sqlx::Row;

use crate::store::PostgresStore;

/// One hop in a traversal result. `symbol` is `None` for a downstream hop
/// whose target symbol never resolved (a reference into a file or
/// dependency that was never parsed).
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub symbol_id: Option<Id>,
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: Option<String>,
    pub source_code: Option<String>,
    pub signature: Option<String>,
    pub depth: i32,
    pub reference_type: ReferenceType,
    pub target_file_path: Option<String>,
    pub target_symbol_name: Option<String>,
}

fn reference_type_from_str(s: &str) -> ReferenceType {
    match s {
        "call" => ReferenceType::Call,
        "import" => ReferenceType::Import,
        "inheritance" => ReferenceType::Inheritance,
        "type_annotation" => ReferenceType::TypeAnnotation,
        "instantiation" => ReferenceType::Instantiation,
        "member" => ReferenceType::Member,
        _ => ReferenceType::Call,
    }
}

impl PostgresStore {
    pub async fn get_downstream(&self, symbol_id: Id, max_depth: i32) -> Result<Vec<GraphNode>> {
        if max_depth < 1 {
            return Err(CodegraphError::input_invalid("max_depth must be at least 1"));
        }

        let rows = sqlx::query(
            r#"
            WITH RECURSIVE downstream AS (
                SELECT
                    r.target_symbol_id AS symbol_id,
                    r.target_file_path,
                    r.target_symbol_name,
                    r.reference_type,
                    1 AS depth
                FROM "references" r
                WHERE r.source_symbol_id = $1

                UNION ALL

                SELECT
                    r.target_symbol_id,
                    r.target_file_path,
                    r.target_symbol_name,
                    r.reference_type,
                    d.depth + 1
                FROM "references" r
                JOIN downstream d ON r.source_symbol_id = d.symbol_id
                WHERE d.depth < $2 AND d.symbol_id IS NOT NULL
            )
            SELECT DISTINCT
                s.id, s.name, s.qualified_name, s.kind, s.source_code, s.signature,
                d.depth, d.reference_type, d.target_file_path, d.target_symbol_name
            FROM downstream d
            LEFT JOIN symbols s ON d.symbol_id = s.id
            ORDER BY d.depth, s.qualified_name
            "#,
        )
        .bind(symbol_id.as_uuid())
        .bind(max_depth)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let symbol_uuid: Option<uuid::Uuid> = row.try_get("id")?;
                let name: Option<String> = row.try_get("name")?;
                let target_symbol_name: Option<String> = row.try_get("target_symbol_name")?;
                let reference_type: String = row.try_get("reference_type")?;

                Ok(GraphNode {
                    symbol_id: symbol_uuid.map(Id::from_uuid),
                    name: name.or_else(|| target_symbol_name.clone()).unwrap_or_default(),
                    qualified_name: row.try_get("qualified_name")?,
                    kind: row.try_get("kind")?,
                    source_code: row.try_get("source_code")?,
                    signature: row.try_get("signature")?,
                    depth: row.try_get("depth")?,
                    reference_type: reference_type_from_str(&reference_type),
                    target_file_path: row.try_get("target_file_path")?,
                    target_symbol_name,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(CodegraphError::from)
    }

    pub async fn get_upstream(&self, symbol_id: Id, max_depth: i32) -> Result<Vec<GraphNode>> {
        if max_depth < 1 {
            return Err(CodegraphError::input_invalid("max_depth must be at least 1"));
        }

        let rows = sqlx::query(
            r#"
            WITH RECURSIVE upstream AS (
                SELECT r.source_symbol_id AS symbol_id, r.reference_type, 1 AS depth
                FROM "references" r
                WHERE r.target_symbol_id = $1

                UNION ALL

                SELECT r.source_symbol_id, r.reference_type, u.depth + 1
                FROM "references" r
                JOIN upstream u ON r.target_symbol_id = u.symbol_id
                WHERE u.depth < $2
            )
            SELECT DISTINCT
                s.id, s.name, s.qualified_name, s.kind, s.source_code, s.signature,
                u.depth, u.reference_type
            FROM upstream u
            JOIN symbols s ON u.symbol_id = s.id
            ORDER BY u.depth, s.qualified_name
            "#,
        )
        .bind(symbol_id.as_uuid())
        .bind(max_depth)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let symbol_uuid: uuid::Uuid = row.try_get("id")?;
                let reference_type: String = row.try_get("reference_type")?;

                Ok(GraphNode {
                    symbol_id: Some(Id::from_uuid(symbol_uuid)),
                    name: row.try_get("name")?,
                    qualified_name: row.try_get("qualified_name")?,
                    kind: row.try_get("kind")?,
                    source_code: row.try_get("source_code")?,
                    signature: row.try_get("signature")?,
                    depth: row.try_get("depth")?,
                    reference_type: reference_type_from_str(&reference_type),
                    target_file_path: None,
                    target_symbol_name: None,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(CodegraphError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reference_type_falls_back_to_call() {
        assert!(matches!(
            reference_type_from_str("nonsense"),
            ReferenceType::Call
        ));
    }
}
